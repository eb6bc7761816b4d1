pub mod catalog;
pub mod csv_import;
pub mod title;

pub use crate::domain::model::{DocumentId, Exercise, Routine, RoutineInput};
pub use crate::domain::ports::{ExerciseStore, ImageSearch, RoutineStore};
pub use crate::utils::error::Result;
pub use catalog::CatalogService;
