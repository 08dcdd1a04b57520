// Panic isolation helpers for worker invocations
use std::any::Any;
use tokio::task::JoinError;

/// Extract a readable message from a panic payload
pub fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Describe why a spawned worker task did not return
pub fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("Worker panicked: {}", panic_message(err.into_panic().as_ref()))
    } else {
        "Worker task was cancelled".to_string()
    }
}
