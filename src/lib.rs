pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::ServeArgs;

pub use config::{ComposeFile, DescriptorIssue, Settings};
pub use core::CatalogService;
pub use server::{build_router, serve, AppState};
pub use utils::error::{FitCheckError, Result};
