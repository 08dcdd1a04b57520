// Queue Server Infrastructure - Built-in Workers
// Implements: JobWorker (shell, echo)

pub mod echo_worker;
pub mod shell_worker;

pub use echo_worker::EchoWorker;
pub use shell_worker::{ShellOutput, ShellWorker, DEFAULT_ENV_ALLOWLIST};

use queueserver_core::application::WorkerRegistry;
use queueserver_core::port::TimeProvider;
use std::sync::Arc;

pub const SHELL_WORKER: &str = "shell";
pub const ECHO_WORKER: &str = "echo";

/// Register the built-in workers under their default names
pub fn register_builtin_workers(registry: &WorkerRegistry, time_provider: Arc<dyn TimeProvider>) {
    let allowlist: Vec<String> = DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect();
    registry.register(SHELL_WORKER, move || {
        Box::new(ShellWorker::new(time_provider.clone(), allowlist.clone()))
    });
    registry.register(ECHO_WORKER, || Box::new(EchoWorker));
}
