use super::error::ApiError;
use super::AppState;
use crate::domain::model::{Exercise, RoutineInput};
use crate::utils::error::FitCheckError;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResult = std::result::Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    pub title: Option<String>,
}

impl TitleQuery {
    fn required(self) -> std::result::Result<String, ApiError> {
        self.title
            .ok_or_else(|| ApiError::unprocessable("Query parameter 'title' is required"))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateGifRequest {
    pub id: Option<String>,
    #[serde(rename = "gifUrl")]
    pub gif_url: Option<String>,
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

pub async fn hello(Path(name): Path<String>) -> Json<Value> {
    Json(json!({ "message": format!("Hello {}", name) }))
}

pub async fn exercise_by_title(
    State(state): State<AppState>,
    Query(query): Query<TitleQuery>,
) -> ApiResult {
    let title = query.required()?;
    let exercise = state.catalog.exercise_by_title(&title).await?;
    Ok(Json(serde_json::to_value(exercise).map_err(FitCheckError::from)?))
}

pub async fn search_exercise(
    State(state): State<AppState>,
    Query(query): Query<TitleQuery>,
) -> ApiResult {
    let title = query.required()?;
    let outcome = state.catalog.search_or_insert(&title).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(FitCheckError::from)?))
}

pub async fn exercise_by_id(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let exercise = state.catalog.exercise_by_id(&id).await?;
    Ok(Json(serde_json::to_value(exercise).map_err(FitCheckError::from)?))
}

pub async fn titles(State(state): State<AppState>) -> ApiResult {
    let titles = state.catalog.titles().await?;
    Ok(Json(json!({ "titles": titles })))
}

pub async fn exercises(State(state): State<AppState>) -> ApiResult {
    let exercises = state.catalog.exercises().await?;
    Ok(Json(json!({ "exercises": exercises })))
}

pub async fn upload_exercises_csv(State(state): State<AppState>, multipart: Multipart) -> ApiResult {
    let content = read_file_field(multipart).await?;
    let ids = state.catalog.import_exercises_csv(&content).await?;
    if ids.is_empty() {
        return Ok(Json(json!({ "message": "No exercises found in CSV" })));
    }
    tracing::info!("Imported {} exercises from CSV", ids.len());
    Ok(Json(json!({ "inserted_count": ids.len() })))
}

pub async fn create_exercise(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload?;
    let Value::Object(mut fields) = payload else {
        return Err(ApiError::unprocessable("Request body must be a JSON object"));
    };
    // 由資料庫配發 id
    fields.remove("_id");
    let exercise: Exercise = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let id = state.catalog.create_exercise(exercise).await?;
    Ok(Json(json!({ "inserted_id": id.to_string() })))
}

pub async fn update_gif(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateGifRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let (Some(id), Some(gif_url)) = (
        request.id.filter(|v| !v.is_empty()),
        request.gif_url.filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Both 'id' and 'gifUrl' are required."));
    };

    state
        .catalog
        .update_gif(&id, &gif_url)
        .await
        .map_err(|e| match e {
            FitCheckError::InvalidIdError { .. } => {
                ApiError::bad_request("Invalid MongoDB ObjectId format.")
            }
            other => ApiError::from(other),
        })?;

    Ok(Json(json!({
        "message": format!("gifUrl updated for exercise with id '{}'", id)
    })))
}

pub async fn routines(State(state): State<AppState>) -> ApiResult {
    let routines = state.catalog.routines().await?;
    Ok(Json(json!({ "routines": routines })))
}

pub async fn create_routine(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RoutineInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    let id = state.catalog.create_routine(input).await?;
    Ok(Json(json!({ "inserted_id": id.to_string() })))
}

pub async fn update_routine(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<RoutineInput>, JsonRejection>,
) -> ApiResult {
    let Json(input) = payload?;
    state.catalog.update_routine(&id, input).await?;
    Ok(Json(json!({ "message": "Routine updated successfully" })))
}

pub async fn upload_routines_csv(State(state): State<AppState>, multipart: Multipart) -> ApiResult {
    let content = read_file_field(multipart).await?;
    let ids = state.catalog.import_routines_csv(&content).await?;
    if ids.is_empty() {
        return Ok(Json(json!({ "message": "No valid routines found in CSV" })));
    }
    tracing::info!("Imported {} routines from CSV", ids.len());
    Ok(Json(json!({
        "inserted_count": ids.len(),
        "inserted_ids": ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
    })))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

/// Bytes of the multipart field named `file`. A body over the upload limit is a 413.
async fn read_file_field(mut multipart: Multipart) -> std::result::Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::unprocessable("Form field 'file' is required"))
}
