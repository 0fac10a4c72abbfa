// taskq Infrastructure - System Adapters
// Implements: TaskLauncher

pub mod subprocess_launcher;

pub use subprocess_launcher::{LaunchCredential, SubprocessLauncher};
