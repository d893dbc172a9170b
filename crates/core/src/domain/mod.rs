// Domain Layer - Pure data and validation

pub mod ecosystem;
pub mod error;
pub mod process_set;
pub mod process_spec;

// Re-exports
pub use ecosystem::{AppEntry, Args, EcosystemFile, EnvValue, ResolveContext};
pub use error::DomainError;
pub use process_set::ProcessSet;
pub use process_spec::{ExecMode, ProcessName, ProcessSpec, RestartPolicy};
