// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic IDs in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new job ID
    fn generate_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Hands out a fixed sequence of IDs, then falls back to `seq-<n>`
    pub struct SequenceIdProvider {
        queued: Mutex<VecDeque<String>>,
        counter: Mutex<u64>,
    }

    impl SequenceIdProvider {
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                queued: Mutex::new(ids.into_iter().map(Into::into).collect()),
                counter: Mutex::new(0),
            }
        }
    }

    impl IdProvider for SequenceIdProvider {
        fn generate_id(&self) -> String {
            if let Some(id) = self.queued.lock().unwrap().pop_front() {
                return id;
            }
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            format!("seq-{}", *counter)
        }
    }
}
