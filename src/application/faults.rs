//! Process-wide fault boundary: panic hook installation, tracking of
//! in-flight invocations, and reporting of failures nobody is awaiting.

use std::{
    any::Any,
    future::Future,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::core::{
    domain::{Fault, FaultAction, FaultKind, FaultPolicy},
    ports::FaultSink,
};

/// Exit status used when an uncaught panic terminates the process.
pub const PANIC_EXIT_CODE: i32 = 70;

static PANIC_HOOK: OnceLock<()> = OnceLock::new();

tokio::task_local! {
    static INVOCATION: Uuid;
}

/// Runs `fut` as part of the invocation `id`. Panics raised inside it are
/// handled by the invocation rather than treated as uncaught.
pub async fn track<F>(id: Uuid, fut: F) -> F::Output
where
    F: Future,
{
    INVOCATION.scope(id, fut).await
}

/// The invocation the current task belongs to, if any.
pub fn current_invocation() -> Option<Uuid> {
    INVOCATION.try_with(|id| *id).ok()
}

pub struct FaultBoundary {
    sink: Arc<dyn FaultSink>,
    policy: RwLock<FaultPolicy>,
}

impl FaultBoundary {
    pub fn new(sink: Arc<dyn FaultSink>, policy: FaultPolicy) -> Self {
        Self {
            sink,
            policy: RwLock::new(policy),
        }
    }

    pub fn policy(&self) -> FaultPolicy {
        *self.policy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the policy once configuration is fully resolved. Hooks are
    /// installed earlier, with the policy known at that point.
    pub fn set_policy(&self, policy: FaultPolicy) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Records `fault` and decides whether the process may keep running.
    pub fn report(&self, fault: Fault) -> FaultAction {
        self.sink.record(&fault);
        match (fault.kind, self.policy()) {
            (FaultKind::UncaughtPanic, FaultPolicy::Terminate) => {
                FaultAction::Terminate(PANIC_EXIT_CODE)
            }
            _ => FaultAction::Continue,
        }
    }

    /// Installs the process panic hook. Only the first call in a process
    /// installs anything; later calls return `false`.
    pub fn install_process_hooks(self: &Arc<Self>) -> bool {
        let mut installed = false;
        PANIC_HOOK.get_or_init(|| {
            let boundary = Arc::clone(self);
            std::panic::set_hook(Box::new(move |info| {
                let message = panic_message(info.payload());
                let location = info
                    .location()
                    .map(|loc| format!("{}:{}", loc.file(), loc.line()));
                boundary.on_panic(message, location);
            }));
            installed = true;
        });
        installed
    }

    fn on_panic(&self, message: String, location: Option<String>) {
        if let Some(invocation_id) = current_invocation() {
            warn!(
                %invocation_id,
                location = location.as_deref().unwrap_or("<unknown>"),
                "handler panicked: {message}"
            );
            return;
        }

        if let FaultAction::Terminate(code) = self.report(untracked_panic(message, location)) {
            std::process::exit(code);
        }
    }

    /// Observes a delegate task whose invocation has already settled. A
    /// panic there has no caller left, so it is reported as an unhandled
    /// rejection and the process continues.
    pub fn watch(self: &Arc<Self>, invocation_id: Uuid, task: JoinHandle<()>) {
        let boundary = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = task.await
                && err.is_panic()
            {
                let message = panic_message(err.into_panic().as_ref());
                boundary.report(Fault::new(
                    FaultKind::UnhandledRejection,
                    format!("invocation {invocation_id} failed after settling: {message}"),
                ));
            }
        });
    }
}

/// Classifies a panic raised outside any invocation. On a runtime task
/// (a connection handler, a spawned job) nothing awaits the failure and the
/// process keeps serving; anywhere else it is an uncaught panic.
fn untracked_panic(message: String, location: Option<String>) -> Fault {
    let kind = if tokio::task::try_id().is_some() {
        FaultKind::UnhandledRejection
    } else {
        FaultKind::UncaughtPanic
    };
    let fault = Fault::new(kind, message);
    match location {
        Some(location) => fault.at(location),
        None => fault,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
