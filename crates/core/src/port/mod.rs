// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod queue_store;
pub mod task_launcher;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use queue_store::{Mutation, Predicate, QueueFilter, QueueStore, UpdateOutcome};
pub use task_launcher::{LaunchError, TaskExit, TaskLauncher};
pub use time_provider::TimeProvider;
