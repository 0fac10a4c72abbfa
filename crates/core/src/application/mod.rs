// Application Layer - Use Cases and Business Logic

pub mod admission;
pub mod dispatcher;

// Re-exports
pub use admission::{AdmissionController, CreateQueueRequest, DrainOutcome};
pub use dispatcher::{shutdown_channel, Dispatcher, ShutdownSender, ShutdownToken};
