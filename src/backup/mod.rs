pub mod archive;
pub mod clock;
pub mod compression;
pub mod engine;
pub mod manifest;
pub mod scheduler;

pub use engine::{BackupEngine, BackupResult};
pub use scheduler::run_scheduler;
