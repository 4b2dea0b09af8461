use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(author, version, about = "Workspace maintenance tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that inner layers never reach into outer ones.
    CheckArchitecture,
}

/// A directory and the module paths its sources must not mention.
struct LayerRule {
    dir: &'static str,
    forbidden: &'static [&'static str],
}

const LAYER_RULES: &[LayerRule] = &[
    LayerRule {
        dir: "src/core",
        forbidden: &["crate::adapters", "crate::application", "crate::site"],
    },
    LayerRule {
        dir: "src/application",
        forbidden: &["crate::adapters", "crate::site"],
    },
];

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::CheckArchitecture => check_architecture(Path::new(".")),
    }
}

fn check_architecture(root: &Path) -> Result<()> {
    let mut violations = Vec::new();
    for rule in LAYER_RULES {
        violations.extend(scan_layer(&root.join(rule.dir), rule.forbidden)?);
    }

    if violations.is_empty() {
        println!("layering ok ({} rules)", LAYER_RULES.len());
        Ok(())
    } else {
        Err(anyhow!(
            "Layering violations:\n  {}",
            violations.join("\n  ")
        ))
    }
}

fn scan_layer(dir: &Path, forbidden: &[&str]) -> Result<Vec<String>> {
    let mut violations = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|ext| ext.to_str()) != Some("rs")
        {
            continue;
        }
        let content = fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        for (idx, line) in content.lines().enumerate() {
            for needle in forbidden {
                if line.contains(needle) {
                    violations.push(format!(
                        "{}:{}: references {needle}",
                        entry.path().display(),
                        idx + 1
                    ));
                }
            }
        }
    }
    Ok(violations)
}
