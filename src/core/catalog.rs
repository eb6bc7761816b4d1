use crate::core::csv_import::{parse_exercises_csv, parse_routines_csv};
use crate::core::title::clean_title;
use crate::domain::model::{
    DocumentId, Exercise, Routine, RoutineInput, SearchOutcome, SearchSource,
};
use crate::domain::ports::{ExerciseStore, ImageSearch, RoutineStore};
use crate::utils::error::{FitCheckError, Result};
use std::path::Path;
use std::sync::Arc;

/// Exercise and routine use-cases over the store and image-search ports.
#[derive(Clone)]
pub struct CatalogService {
    exercises: Arc<dyn ExerciseStore>,
    routines: Arc<dyn RoutineStore>,
    search: Arc<dyn ImageSearch>,
    fallback_routines: Option<Arc<Vec<serde_json::Value>>>,
}

impl CatalogService {
    pub fn new(
        exercises: Arc<dyn ExerciseStore>,
        routines: Arc<dyn RoutineStore>,
        search: Arc<dyn ImageSearch>,
    ) -> Self {
        Self {
            exercises,
            routines,
            search,
            fallback_routines: None,
        }
    }

    /// 建立索引；失敗時改用備援課表檔（降級模式）
    pub async fn initialize(&mut self, fallback_path: impl AsRef<Path>) {
        match self.exercises.ensure_indexes().await {
            Ok(()) => {
                tracing::info!("Exercise title index ready");
                self.fallback_routines = None;
            }
            Err(e) => {
                tracing::error!("DB connection/index creation failed: {}", e);
                let routines = load_fallback_routines(fallback_path.as_ref());
                self.fallback_routines = Some(Arc::new(routines));
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fallback_routines.is_some()
    }

    pub async fn exercise_by_title(&self, title: &str) -> Result<Exercise> {
        let normalized = clean_title(title);
        self.exercises
            .find_by_title(&normalized)
            .await?
            .ok_or_else(|| FitCheckError::not_found("Exercise not found"))
    }

    pub async fn search_or_insert(&self, title: &str) -> Result<SearchOutcome> {
        let normalized = clean_title(title);

        if let Some(mut existing) = self.exercises.find_by_title(&normalized).await? {
            if !existing.searched_gifs.is_empty() {
                return Ok(SearchOutcome {
                    source: SearchSource::Db,
                    exercise: existing,
                });
            }

            let urls = self.fetch_gifs(&normalized).await?;
            self.exercises.set_gifs(&normalized, &urls).await?;
            existing = existing.with_gifs(urls);
            tracing::info!("Stored {} gifs for '{}'", existing.searched_gifs.len(), normalized);
            return Ok(SearchOutcome {
                source: SearchSource::GoogleUpdate,
                exercise: existing,
            });
        }

        let urls = self.fetch_gifs(&normalized).await?;
        let mut exercise = Exercise::blank(normalized).with_gifs(urls);
        let id = self.exercises.insert(exercise.clone()).await?;
        exercise.id = Some(id);
        tracing::info!("Inserted exercise '{}' from image search", exercise.title);
        Ok(SearchOutcome {
            source: SearchSource::GoogleInsert,
            exercise,
        })
    }

    async fn fetch_gifs(&self, title: &str) -> Result<Vec<String>> {
        let urls = self.search.search_gifs(title).await?;
        if urls.is_empty() {
            return Err(FitCheckError::not_found("No images found for that title"));
        }
        Ok(urls)
    }

    pub async fn exercise_by_id(&self, id: &str) -> Result<Exercise> {
        let id: DocumentId = id.parse().map_err(|_| FitCheckError::InvalidIdError {
            value: id.to_string(),
        })?;
        self.exercises
            .find_by_id(&id)
            .await?
            .ok_or_else(|| FitCheckError::not_found("Exercise not found"))
    }

    pub async fn exercises(&self) -> Result<Vec<Exercise>> {
        self.exercises.list().await
    }

    pub async fn titles(&self) -> Result<Vec<String>> {
        let mut titles = self.exercises.list_titles().await?;
        titles.sort();
        Ok(titles)
    }

    pub async fn create_exercise(&self, exercise: Exercise) -> Result<DocumentId> {
        self.exercises.insert(exercise).await
    }

    pub async fn update_gif(&self, id: &str, gif_url: &str) -> Result<()> {
        let document_id: DocumentId = id.parse()?;
        if !self.exercises.set_gif_url(&document_id, gif_url).await? {
            return Err(FitCheckError::not_found(format!(
                "No exercise found with id '{}'",
                id
            )));
        }
        Ok(())
    }

    /// Returns the ids of the inserted exercises; empty when the CSV held none.
    pub async fn import_exercises_csv(&self, content: &[u8]) -> Result<Vec<DocumentId>> {
        let exercises = parse_exercises_csv(content)?;
        if exercises.is_empty() {
            return Ok(Vec::new());
        }
        self.exercises.insert_many(exercises).await
    }

    pub async fn routines(&self) -> Result<Vec<serde_json::Value>> {
        if let Some(fallback) = &self.fallback_routines {
            return Ok(fallback.as_ref().clone());
        }
        let routines = self.routines.list().await?;
        routines
            .into_iter()
            .map(|r| serde_json::to_value(r).map_err(FitCheckError::from))
            .collect()
    }

    pub async fn create_routine(&self, input: RoutineInput) -> Result<DocumentId> {
        self.routines.insert(Routine::from(input)).await
    }

    pub async fn update_routine(&self, id: &str, input: RoutineInput) -> Result<()> {
        let document_id: DocumentId = id.parse()?;
        if !self.routines.replace_fields(&document_id, input).await? {
            return Err(FitCheckError::not_found("Routine not found"));
        }
        Ok(())
    }

    pub async fn import_routines_csv(&self, content: &[u8]) -> Result<Vec<DocumentId>> {
        let routines = parse_routines_csv(content)?;
        if routines.is_empty() {
            return Ok(Vec::new());
        }
        self.routines.insert_many(routines).await
    }
}

fn load_fallback_routines(path: &Path) -> Vec<serde_json::Value> {
    let loaded = std::fs::read_to_string(path)
        .map_err(FitCheckError::from)
        .and_then(|content| serde_json::from_str::<Vec<serde_json::Value>>(&content).map_err(FitCheckError::from));

    match loaded {
        Ok(routines) => {
            tracing::warn!(
                "Loaded {} fallback routines from {}",
                routines.len(),
                path.display()
            );
            routines
        }
        Err(e) => {
            tracing::error!("Failed to load fallback JSON file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
