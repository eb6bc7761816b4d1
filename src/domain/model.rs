use crate::utils::error::{FitCheckError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

/// 12-byte document id: 4-byte seconds timestamp, 5 random bytes, 3-byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId([u8; 12]);

static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

impl DocumentId {
    pub fn new() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let unique = PROCESS_UNIQUE.get_or_init(|| {
            let random = uuid::Uuid::new_v4();
            let mut bytes = [0u8; 5];
            bytes.copy_from_slice(&random.as_bytes()[..5]);
            bytes
        });
        let counter = COUNTER
            .get_or_init(|| {
                let random = uuid::Uuid::new_v4();
                let b = random.as_bytes();
                AtomicU32::new(u32::from_be_bytes([0, b[5], b[6], b[7]]))
            })
            .fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(unique);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DocumentId {
    type Err = FitCheckError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || FitCheckError::InvalidIdError {
            value: s.to_string(),
        };
        if s.len() != 24 {
            return Err(invalid());
        }
        let decoded = hex::decode(s).map_err(|_| invalid())?;
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Known fields are coerced from loosely typed documents: numbers and booleans
/// become text, a numeric string becomes the rating, `null` becomes the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub body_part: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub equipment: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub level: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub rating: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub rating_description: String,
    #[serde(rename = "gifUrl", default, deserialize_with = "lenient_text")]
    pub gif_url: String,
    #[serde(rename = "searchedGifs", default, deserialize_with = "lenient_list")]
    pub searched_gifs: Vec<String>,
    /// Fields posted by clients that the catalog does not know about.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn scalar_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            tracing::warn!("Ignoring non-scalar exercise field value");
            String::new()
        }
        scalar => scalar_text(scalar).unwrap_or_default(),
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    let number = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) if s.trim().is_empty() => Some(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Null => Some(0.0),
        _ => None,
    };
    Ok(number.unwrap_or_else(|| {
        tracing::warn!("Ignoring non-numeric exercise rating: {}", value);
        0.0
    }))
}

/// A single string counts as a one-element list.
fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        serde_json::Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

impl Exercise {
    /// 只有標題的空白練習，搜尋新增時使用
    pub fn blank(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_gifs(mut self, urls: Vec<String>) -> Self {
        self.gif_url = urls.first().cloned().unwrap_or_default();
        self.searched_gifs = urls;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercise_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<MuscleGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuscleGroup {
    pub title: String,
    pub exercises: Vec<RoutineExercise>,
}

/// `table` rows are `[set, reps, weight]`, kept as the strings the CSV carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub title: String,
    pub table: Vec<[String; 3]>,
}

/// Body accepted by `POST /routines` and `PUT /routines/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercise_ids: Vec<String>,
}

impl From<RoutineInput> for Routine {
    fn from(input: RoutineInput) -> Self {
        Self {
            id: None,
            name: input.name,
            description: input.description,
            exercise_ids: input.exercise_ids,
            groups: Vec::new(),
        }
    }
}

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Db,
    GoogleUpdate,
    GoogleInsert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub source: SearchSource,
    pub exercise: Exercise,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_hex_round_trip() {
        let id = DocumentId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(hex.parse::<DocumentId>().unwrap(), id);
    }

    #[test]
    fn test_document_id_rejects_malformed() {
        assert!("not-an-id".parse::<DocumentId>().is_err());
        assert!("zzzzzzzzzzzzzzzzzzzzzzzz".parse::<DocumentId>().is_err());
        assert!("609e129e8c8b0c6f78f6901".parse::<DocumentId>().is_err());
        assert!("609e129e8c8b0c6f78f6901f".parse::<DocumentId>().is_ok());
    }

    #[test]
    fn test_document_ids_are_unique_within_process() {
        let a = DocumentId::new();
        let b = DocumentId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
    }

    #[test]
    fn test_exercise_keeps_unknown_fields() {
        let json = serde_json::json!({
            "title": "Push Up",
            "gifUrl": "https://gif/1",
            "coach": "sam"
        });
        let exercise: Exercise = serde_json::from_value(json).unwrap();
        assert_eq!(exercise.title, "Push Up");
        assert_eq!(exercise.gif_url, "https://gif/1");
        assert!(exercise.searched_gifs.is_empty());
        assert_eq!(exercise.extra.get("coach").unwrap(), "sam");

        let back = serde_json::to_value(&exercise).unwrap();
        assert_eq!(back["coach"], "sam");
        assert_eq!(back["type"], "");
        assert!(back.get("_id").is_none());
    }

    #[test]
    fn test_exercise_coerces_loosely_typed_fields() {
        let exercise: Exercise = serde_json::from_value(serde_json::json!({
            "title": 7,
            "rating": "4.5",
            "level": true,
            "searchedGifs": ["https://gif/1", null, 3],
            "description": null
        }))
        .unwrap();
        assert_eq!(exercise.title, "7");
        assert_eq!(exercise.rating, 4.5);
        assert_eq!(exercise.level, "true");
        assert_eq!(exercise.searched_gifs, vec!["https://gif/1", "3"]);
        assert_eq!(exercise.description, "");
        assert!(exercise.extra.is_empty());

        let exercise: Exercise = serde_json::from_value(serde_json::json!({
            "rating": null,
            "equipment": {"name": "bar"},
            "searchedGifs": "https://gif/2"
        }))
        .unwrap();
        assert_eq!(exercise.rating, 0.0);
        assert_eq!(exercise.equipment, "");
        assert_eq!(exercise.searched_gifs, vec!["https://gif/2"]);

        let exercise: Exercise =
            serde_json::from_value(serde_json::json!({ "rating": "great" })).unwrap();
        assert_eq!(exercise.rating, 0.0);
    }

    #[test]
    fn test_search_source_wire_names() {
        assert_eq!(
            serde_json::to_value(SearchSource::GoogleUpdate).unwrap(),
            "google_update"
        );
        assert_eq!(serde_json::to_value(SearchSource::Db).unwrap(), "db");
    }
}
