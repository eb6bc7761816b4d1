#[cfg(feature = "cli")]
pub mod cli;
pub mod compose;
pub mod env_file;
pub mod settings;

pub use compose::{ComposeFile, DescriptorIssue, ServiceRecord};
pub use settings::Settings;
