use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, ensure};
use serde::Deserialize;

use crate::core::domain::{ExecutionMode, FaultPolicy};

/// Set to `1` by the hosting platform when running as a serverless function.
pub const FUNCTION_MODE_VAR: &str = "VERCEL";
pub const FUNCTION_MODE_SENTINEL: &str = "1";
/// Set to `development` to expose error details in function-mode responses.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";
pub const DEVELOPMENT_SENTINEL: &str = "development";
pub const HOST_VAR: &str = "HOST";
pub const PORT_VAR: &str = "PORT";
pub const FAULT_POLICY_VAR: &str = "DUALHOST_FAULT_POLICY";

pub const DEFAULT_PORT: u16 = 3000;

/// Resolved host configuration. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub mode: ExecutionMode,
    pub development: bool,
    pub host: IpAddr,
    pub port: u16,
    pub fault_policy: FaultPolicy,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Local,
            development: false,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            fault_policy: FaultPolicy::Terminate,
        }
    }
}

/// On-disk layer; every key is optional and overrides the defaults.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
struct HostConfigFile {
    #[serde(default)]
    mode: Option<ExecutionMode>,
    #[serde(default)]
    development: Option<bool>,
    #[serde(default)]
    host: Option<IpAddr>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    fault_policy: Option<FaultPolicy>,
}

/// Values supplied on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mode: Option<ExecutionMode>,
    pub development: bool,
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
}

impl HostConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file at {}", path_ref.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("Invalid configuration in {}", path_ref.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: HostConfigFile = if yaml.trim().is_empty() {
            HostConfigFile::default()
        } else {
            serde_yaml::from_str(yaml).context("Unable to parse config YAML")?
        };
        let defaults = Self::default();
        let config = Self {
            mode: file.mode.unwrap_or(defaults.mode),
            development: file.development.unwrap_or(defaults.development),
            host: file.host.unwrap_or(defaults.host),
            port: file.port.unwrap_or(defaults.port),
            fault_policy: file.fault_policy.unwrap_or(defaults.fault_policy),
        };
        config.validate()?;
        Ok(config)
    }

    /// Overlays environment variables read through `lookup`. An absent
    /// variable leaves the current value alone.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup(FUNCTION_MODE_VAR) {
            self.mode = if flag.trim() == FUNCTION_MODE_SENTINEL {
                ExecutionMode::Function
            } else {
                ExecutionMode::Local
            };
        }
        if let Some(env) = lookup(ENVIRONMENT_VAR) {
            self.development = env.trim() == DEVELOPMENT_SENTINEL;
        }
        if let Some(host) = lookup(HOST_VAR) {
            self.host = host
                .trim()
                .parse()
                .map_err(|_| anyhow!("{HOST_VAR} must be an IP address, got '{host}'"))?;
        }
        if let Some(port) = lookup(PORT_VAR) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| anyhow!("{PORT_VAR} must be a port number, got '{port}'"))?;
        }
        if let Some(policy) = lookup(FAULT_POLICY_VAR) {
            self.fault_policy = FaultPolicy::from_name(&policy).ok_or_else(|| {
                anyhow!("{FAULT_POLICY_VAR} must be 'continue' or 'terminate', got '{policy}'")
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if overrides.development {
            self.development = true;
        }
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.port != 0, "port must be between 1 and 65535");
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Fault policy named by the environment, for hooks installed before the
/// full configuration is resolved. Unset or unknown values keep the default;
/// resolution reports unknown values later.
pub fn startup_fault_policy<F>(lookup: F) -> FaultPolicy
where
    F: Fn(&str) -> Option<String>,
{
    lookup(FAULT_POLICY_VAR)
        .and_then(|value| FaultPolicy::from_name(&value))
        .unwrap_or_default()
}

impl FromStr for HostConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_yaml_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_select_local_mode_on_port_3000() {
        let config = HostConfig::default().with_env(lookup(&[])).unwrap();
        assert_eq!(config.mode, ExecutionMode::Local);
        assert!(!config.development);
        assert_eq!(config.socket_addr(), "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.fault_policy, FaultPolicy::Terminate);
    }

    #[test]
    fn function_sentinel_selects_function_mode() {
        let config = HostConfig::default()
            .with_env(lookup(&[("VERCEL", "1")]))
            .unwrap();
        assert_eq!(config.mode, ExecutionMode::Function);
    }

    #[test]
    fn other_function_flag_values_select_local_mode() {
        for value in ["0", "true", ""] {
            let config = HostConfig {
                mode: ExecutionMode::Function,
                ..HostConfig::default()
            }
            .with_env(lookup(&[("VERCEL", value)]))
            .unwrap();
            assert_eq!(config.mode, ExecutionMode::Local, "VERCEL={value:?}");
        }
    }

    #[test]
    fn development_requires_exact_sentinel() {
        let dev = HostConfig::default()
            .with_env(lookup(&[("APP_ENV", "development")]))
            .unwrap();
        assert!(dev.development);

        let prod = HostConfig {
            development: true,
            ..HostConfig::default()
        }
        .with_env(lookup(&[("APP_ENV", "production")]))
        .unwrap();
        assert!(!prod.development);
    }

    #[test]
    fn env_overrides_bind_settings() {
        let config = HostConfig::default()
            .with_env(lookup(&[
                ("HOST", "127.0.0.1"),
                ("PORT", "8080"),
                ("DUALHOST_FAULT_POLICY", "Continue"),
            ]))
            .unwrap();
        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.fault_policy, FaultPolicy::Continue);
    }

    #[test]
    fn rejects_bad_port() {
        let err = HostConfig::default()
            .with_env(lookup(&[("PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = HostConfig::default()
            .with_env(lookup(&[("PORT", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn rejects_unknown_fault_policy() {
        let err = HostConfig::default()
            .with_env(lookup(&[("DUALHOST_FAULT_POLICY", "retry")]))
            .unwrap_err();
        assert!(err.to_string().contains("retry"));
    }

    #[test]
    fn startup_policy_reads_env_or_falls_back() {
        assert_eq!(startup_fault_policy(lookup(&[])), FaultPolicy::Terminate);
        assert_eq!(
            startup_fault_policy(lookup(&[("DUALHOST_FAULT_POLICY", " continue ")])),
            FaultPolicy::Continue
        );
        assert_eq!(
            startup_fault_policy(lookup(&[("DUALHOST_FAULT_POLICY", "retry")])),
            FaultPolicy::Terminate
        );
    }

    #[test]
    fn loads_yaml_layer() {
        let yaml = r#"
mode: function
development: true
host: "::1"
port: 4000
fault_policy: continue
"#;
        let config: HostConfig = yaml.parse().expect("valid config");
        assert_eq!(config.mode, ExecutionMode::Function);
        assert!(config.development);
        assert_eq!(config.socket_addr(), "[::1]:4000".parse().unwrap());
        assert_eq!(config.fault_policy, FaultPolicy::Continue);
    }

    #[test]
    fn empty_yaml_keeps_defaults() {
        assert_eq!(HostConfig::from_yaml_str("").unwrap(), HostConfig::default());
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        let err = HostConfig::from_yaml_str("listen: 80").unwrap_err();
        let messages: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
        assert!(
            messages.iter().any(|msg| msg.contains("listen")),
            "error chain missing unknown key: {messages:?}"
        );
    }

    #[test]
    fn layers_apply_in_order() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("host.yaml");
        fs::write(&path, "port: 4000\nmode: function\n").unwrap();

        let config = HostConfig::from_path(&path)
            .unwrap()
            .with_env(lookup(&[("PORT", "5000")]))
            .unwrap()
            .with_overrides(&ConfigOverrides {
                mode: Some(ExecutionMode::Local),
                ..ConfigOverrides::default()
            })
            .unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.mode, ExecutionMode::Local);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = HostConfig::from_path("/nonexistent/host.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/host.yaml"));
    }
}
