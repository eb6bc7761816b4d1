use crate::domain::model::{DocumentId, Exercise, Routine, RoutineInput};
use crate::domain::ports::{ExerciseStore, RoutineStore};
use crate::utils::error::{FitCheckError, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-process store for both collections. Used when no `MONGO_URI` is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    exercises: RwLock<Vec<Exercise>>,
    routines: RwLock<Vec<Routine>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模擬連線失敗的資料庫，`ensure_indexes` 會回傳錯誤
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ExerciseStore for MemoryStore {
    async fn ensure_indexes(&self) -> Result<()> {
        if self.unavailable {
            return Err(FitCheckError::database("memory store marked unavailable"));
        }
        Ok(())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Exercise>> {
        let exercises = self.exercises.read().await;
        Ok(exercises
            .iter()
            .find(|e| e.title.eq_ignore_ascii_case(title))
            .cloned())
    }

    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Exercise>> {
        let exercises = self.exercises.read().await;
        Ok(exercises.iter().find(|e| e.id.as_ref() == Some(id)).cloned())
    }

    async fn list(&self) -> Result<Vec<Exercise>> {
        Ok(self.exercises.read().await.clone())
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        let exercises = self.exercises.read().await;
        Ok(exercises.iter().map(|e| e.title.clone()).collect())
    }

    async fn insert(&self, mut exercise: Exercise) -> Result<DocumentId> {
        let id = DocumentId::new();
        exercise.id = Some(id);
        self.exercises.write().await.push(exercise);
        Ok(id)
    }

    async fn insert_many(&self, exercises: Vec<Exercise>) -> Result<Vec<DocumentId>> {
        let mut stored = self.exercises.write().await;
        let mut ids = Vec::with_capacity(exercises.len());
        for mut exercise in exercises {
            let id = DocumentId::new();
            exercise.id = Some(id);
            stored.push(exercise);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn set_gifs(&self, title: &str, urls: &[String]) -> Result<()> {
        let mut exercises = self.exercises.write().await;
        if let Some(exercise) = exercises
            .iter_mut()
            .find(|e| e.title.eq_ignore_ascii_case(title))
        {
            exercise.searched_gifs = urls.to_vec();
            exercise.gif_url = urls.first().cloned().unwrap_or_default();
        }
        Ok(())
    }

    async fn set_gif_url(&self, id: &DocumentId, url: &str) -> Result<bool> {
        let mut exercises = self.exercises.write().await;
        match exercises.iter_mut().find(|e| e.id.as_ref() == Some(id)) {
            Some(exercise) => {
                exercise.gif_url = url.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl RoutineStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Routine>> {
        Ok(self.routines.read().await.clone())
    }

    async fn insert(&self, mut routine: Routine) -> Result<DocumentId> {
        let id = DocumentId::new();
        routine.id = Some(id);
        self.routines.write().await.push(routine);
        Ok(id)
    }

    async fn insert_many(&self, routines: Vec<Routine>) -> Result<Vec<DocumentId>> {
        let mut stored = self.routines.write().await;
        let mut ids = Vec::with_capacity(routines.len());
        for mut routine in routines {
            let id = DocumentId::new();
            routine.id = Some(id);
            stored.push(routine);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn replace_fields(&self, id: &DocumentId, input: RoutineInput) -> Result<bool> {
        let mut routines = self.routines.write().await;
        match routines.iter_mut().find(|r| r.id.as_ref() == Some(id)) {
            Some(routine) => {
                routine.name = input.name;
                routine.description = input.description;
                routine.exercise_ids = input.exercise_ids;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_title_lookup_is_case_insensitive_and_exact() {
        let store = MemoryStore::new();
        ExerciseStore::insert(&store, Exercise::blank("Bench Press"))
            .await
            .unwrap();

        assert!(store.find_by_title("bench press").await.unwrap().is_some());
        assert!(store.find_by_title("Bench").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_many_assigns_distinct_ids() {
        let store = MemoryStore::new();
        let ids = ExerciseStore::insert_many(
            &store,
            vec![Exercise::blank("A"), Exercise::blank("B")],
        )
        .await
        .unwrap();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        let found = store.find_by_id(&ids[1]).await.unwrap().unwrap();
        assert_eq!(found.title, "B");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_index_creation() {
        assert!(MemoryStore::unavailable().ensure_indexes().await.is_err());
        assert!(MemoryStore::new().ensure_indexes().await.is_ok());
    }
}
