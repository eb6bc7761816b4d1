use crate::domain::model::{DocumentId, Exercise, Routine, RoutineInput};
use crate::utils::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ExerciseStore: Send + Sync {
    /// Fails when the backing database is unreachable.
    async fn ensure_indexes(&self) -> Result<()>;
    /// Case-insensitive exact title match.
    async fn find_by_title(&self, title: &str) -> Result<Option<Exercise>>;
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Exercise>>;
    async fn list(&self) -> Result<Vec<Exercise>>;
    async fn list_titles(&self) -> Result<Vec<String>>;
    async fn insert(&self, exercise: Exercise) -> Result<DocumentId>;
    async fn insert_many(&self, exercises: Vec<Exercise>) -> Result<Vec<DocumentId>>;
    /// Sets `searchedGifs` and `gifUrl` on the exercise matching `title`.
    async fn set_gifs(&self, title: &str, urls: &[String]) -> Result<()>;
    /// Returns whether a document matched.
    async fn set_gif_url(&self, id: &DocumentId, url: &str) -> Result<bool>;
}

#[async_trait]
pub trait RoutineStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Routine>>;
    async fn insert(&self, routine: Routine) -> Result<DocumentId>;
    async fn insert_many(&self, routines: Vec<Routine>) -> Result<Vec<DocumentId>>;
    /// Overwrites name, description and exercise_ids. Returns whether a document matched.
    async fn replace_fields(&self, id: &DocumentId, input: RoutineInput) -> Result<bool>;
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn search_gifs(&self, title: &str) -> Result<Vec<String>>;
}
