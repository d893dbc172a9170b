// Procman Infrastructure - System Adapters
// Implements: ProcessSpawner, ecosystem file loading

pub mod ecosystem_loader;
pub mod subprocess_spawner;

pub use ecosystem_loader::{load_ecosystem, FileFormat};
pub use subprocess_spawner::{SubprocessChild, SubprocessSpawner};
