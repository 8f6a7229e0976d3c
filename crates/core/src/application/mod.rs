// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod job_store;
pub mod verification;
pub mod worker;

// Re-exports
pub use job_store::JobRecordStore;
pub use verification::{VerificationService, VerifierConfig};
pub use worker::WorkerPool;
