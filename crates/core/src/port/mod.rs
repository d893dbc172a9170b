// Port Layer - Interfaces for external dependencies

pub mod process_spawner;
pub mod time_provider;

// Re-exports
pub use process_spawner::{ChildHandle, ExitInfo, ProcessSpawner, SpawnError};
pub use time_provider::TimeProvider;
