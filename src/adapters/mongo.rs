use crate::domain::model::{DocumentId, Exercise, Routine, RoutineInput};
use crate::domain::ports::{ExerciseStore, RoutineStore};
use crate::utils::error::{FitCheckError, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Cursor, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// MongoDB-backed store for the `exercise` and `routine` collections.
#[derive(Debug, Clone)]
pub struct MongoStore {
    exercises: Collection<Document>,
    routines: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(FitCheckError::database)?;
        options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.app_name = Some("fit-check".to_string());

        let client = Client::with_options(options).map_err(FitCheckError::database)?;
        let db = client.database(db_name);
        tracing::info!("MongoDB client configured for database '{}'", db_name);

        Ok(Self {
            exercises: db.collection::<Document>("exercise"),
            routines: db.collection::<Document>("routine"),
        })
    }
}

fn object_id(id: &DocumentId) -> ObjectId {
    ObjectId::from_bytes(id.bytes())
}

fn document_id(value: &Bson) -> Result<DocumentId> {
    value
        .as_object_id()
        .map(|oid| DocumentId::from_bytes(oid.bytes()))
        .ok_or_else(|| FitCheckError::database(format!("unexpected _id value: {}", value)))
}

/// 序列化為 BSON 文件，`_id` 交由資料庫產生
fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    let mut json = serde_json::to_value(value)?;
    if let Some(object) = json.as_object_mut() {
        object.remove("_id");
    }
    mongodb::bson::to_document(&json).map_err(FitCheckError::database)
}

fn from_document<T: DeserializeOwned>(mut document: Document) -> Result<T> {
    if let Ok(oid) = document.get_object_id("_id") {
        document.insert("_id", oid.to_hex());
    }
    let json = Bson::Document(document).into_relaxed_extjson();
    Ok(serde_json::from_value(json)?)
}

async fn collect<T: DeserializeOwned>(mut cursor: Cursor<Document>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while cursor.advance().await.map_err(FitCheckError::database)? {
        let document = cursor
            .deserialize_current()
            .map_err(FitCheckError::database)?;
        items.push(from_document(document)?);
    }
    Ok(items)
}

fn title_filter(title: &str) -> Document {
    doc! {"title": {"$regex": format!("^{}$", regex::escape(title)), "$options": "i"}}
}

async fn insert_all(collection: &Collection<Document>, documents: Vec<Document>) -> Result<Vec<DocumentId>> {
    let result = collection
        .insert_many(documents)
        .await
        .map_err(FitCheckError::database)?;
    let mut inserted: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
    inserted.sort_by_key(|(index, _)| *index);
    inserted.iter().map(|(_, id)| document_id(id)).collect()
}

#[async_trait]
impl ExerciseStore for MongoStore {
    async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder().keys(doc! {"title": 1}).build();
        self.exercises
            .create_index(index)
            .await
            .map_err(FitCheckError::database)?;
        Ok(())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Exercise>> {
        let found = self
            .exercises
            .find_one(title_filter(title))
            .await
            .map_err(FitCheckError::database)?;
        found.map(from_document).transpose()
    }

    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Exercise>> {
        let found = self
            .exercises
            .find_one(doc! {"_id": object_id(id)})
            .await
            .map_err(FitCheckError::database)?;
        found.map(from_document).transpose()
    }

    async fn list(&self) -> Result<Vec<Exercise>> {
        let cursor = self
            .exercises
            .find(doc! {})
            .await
            .map_err(FitCheckError::database)?;
        collect(cursor).await
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        let mut cursor = self
            .exercises
            .find(doc! {})
            .projection(doc! {"title": 1, "_id": 0})
            .await
            .map_err(FitCheckError::database)?;

        let mut titles = Vec::new();
        while cursor.advance().await.map_err(FitCheckError::database)? {
            let document = cursor
                .deserialize_current()
                .map_err(FitCheckError::database)?;
            if let Ok(title) = document.get_str("title") {
                titles.push(title.to_string());
            }
        }
        Ok(titles)
    }

    async fn insert(&self, exercise: Exercise) -> Result<DocumentId> {
        let result = self
            .exercises
            .insert_one(to_document(&exercise)?)
            .await
            .map_err(FitCheckError::database)?;
        document_id(&result.inserted_id)
    }

    async fn insert_many(&self, exercises: Vec<Exercise>) -> Result<Vec<DocumentId>> {
        let documents = exercises
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        insert_all(&self.exercises, documents).await
    }

    async fn set_gifs(&self, title: &str, urls: &[String]) -> Result<()> {
        let first = urls.first().cloned().unwrap_or_default();
        self.exercises
            .update_one(
                title_filter(title),
                doc! {"$set": {"searchedGifs": urls.to_vec(), "gifUrl": first}},
            )
            .await
            .map_err(FitCheckError::database)?;
        Ok(())
    }

    async fn set_gif_url(&self, id: &DocumentId, url: &str) -> Result<bool> {
        let result = self
            .exercises
            .update_one(doc! {"_id": object_id(id)}, doc! {"$set": {"gifUrl": url}})
            .await
            .map_err(FitCheckError::database)?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl RoutineStore for MongoStore {
    async fn list(&self) -> Result<Vec<Routine>> {
        let cursor = self
            .routines
            .find(doc! {})
            .await
            .map_err(FitCheckError::database)?;
        collect(cursor).await
    }

    async fn insert(&self, routine: Routine) -> Result<DocumentId> {
        let result = self
            .routines
            .insert_one(to_document(&routine)?)
            .await
            .map_err(FitCheckError::database)?;
        document_id(&result.inserted_id)
    }

    async fn insert_many(&self, routines: Vec<Routine>) -> Result<Vec<DocumentId>> {
        let documents = routines
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        insert_all(&self.routines, documents).await
    }

    async fn replace_fields(&self, id: &DocumentId, input: RoutineInput) -> Result<bool> {
        let result = self
            .routines
            .update_one(
                doc! {"_id": object_id(id)},
                doc! {"$set": {
                    "name": input.name,
                    "description": input.description,
                    "exercise_ids": input.exercise_ids,
                }},
            )
            .await
            .map_err(FitCheckError::database)?;
        Ok(result.matched_count > 0)
    }
}
