// Panic isolation helpers for job execution
use std::any::Any;
use tokio::task::JoinError;

/// Human-readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Describe why a spawned task did not produce a value
pub fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        format!("job panicked: {}", panic_message(err.into_panic().as_ref()))
    } else {
        "job task was cancelled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let caught = std::panic::catch_unwind(|| panic!("static str")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static str");

        let caught = std::panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "formatted 42");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "Unknown panic");
    }

    #[tokio::test]
    async fn test_join_error_message_for_panicking_task() {
        let err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        assert_eq!(join_error_message(err), "job panicked: boom");
    }
}
