// Adapters layer: concrete implementations of the domain ports.

pub mod google;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;
