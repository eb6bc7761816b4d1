use crate::adapters::google::DEFAULT_SEARCH_ENDPOINT;
use crate::utils::error::{FitCheckError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_socket_addr, validate_url,
    validate_url_scheme, Validate,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_DB_NAME: &str = "fit-check-db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_FALLBACK_ROUTINES_PATH: &str = "fallback_routines.json";
/// Request body cap, which bounds CSV uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runtime settings of the HTTP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mongo_uri: Option<String>,
    pub db_name: String,
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub search_endpoint: String,
    pub bind_addr: String,
    pub fallback_routines_path: String,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mongo_uri: None,
            db_name: DEFAULT_DB_NAME.to_string(),
            google_api_key: None,
            google_cx: None,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            fallback_routines_path: DEFAULT_FALLBACK_ROUTINES_PATH.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// 空白的選填值視為未設定（例如 `.env` 中的 `GOOGLE_API_KEY=`）
    pub fn without_blank_values(mut self) -> Self {
        for value in [
            &mut self.mongo_uri,
            &mut self.google_api_key,
            &mut self.google_cx,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定，支援 `${VAR}` 環境變數替換
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        let settings: Self = toml::from_str(&processed).map_err(|e| FitCheckError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })?;
        Ok(settings.without_blank_values())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        validate_socket_addr("bind_addr", &self.bind_addr)
    }

    pub fn search_enabled(&self) -> bool {
        self.google_api_key.is_some() && self.google_cx.is_some()
    }
}

fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| FitCheckError::ConfigError {
        message: e.to_string(),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_socket_addr("bind_addr", &self.bind_addr)?;
        validate_url("search_endpoint", &self.search_endpoint)?;
        validate_non_empty_string("db_name", &self.db_name)?;
        validate_path("fallback_routines_path", &self.fallback_routines_path)?;
        if self.max_upload_bytes == 0 {
            return Err(FitCheckError::InvalidConfigValueError {
                field: "max_upload_bytes".to_string(),
                value: "0".to_string(),
                reason: "Upload limit must be positive".to_string(),
            });
        }
        if let Some(uri) = &self.mongo_uri {
            validate_url_scheme("mongo_uri", uri, &["mongodb", "mongodb+srv"])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.socket_addr().unwrap().port(), 8000);
        assert!(!settings.search_enabled());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
mongo_uri = "mongodb://mongo:27017"
bind_addr = "127.0.0.1:9000"
"#,
        )
        .unwrap();

        assert_eq!(settings.mongo_uri.as_deref(), Some("mongodb://mongo:27017"));
        assert_eq!(settings.db_name, DEFAULT_DB_NAME);
        assert_eq!(settings.socket_addr().unwrap().port(), 9000);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FIT_CHECK_TEST_CX", "engine-42");

        let settings = Settings::from_toml_str(r#"google_cx = "${FIT_CHECK_TEST_CX}""#).unwrap();
        assert_eq!(settings.google_cx.as_deref(), Some("engine-42"));

        std::env::remove_var("FIT_CHECK_TEST_CX");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let settings = Settings {
            mongo_uri: Some("http://mongo:27017".to_string()),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            bind_addr: "nowhere".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_blank_optional_values_are_unset() {
        let settings = Settings::from_toml_str(
            r#"
mongo_uri = ""
google_api_key = "  "
google_cx = "engine-42"
"#,
        )
        .unwrap();

        assert_eq!(settings.mongo_uri, None);
        assert_eq!(settings.google_api_key, None);
        assert_eq!(settings.google_cx.as_deref(), Some("engine-42"));
        assert!(!settings.search_enabled());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_upload_limit_is_invalid() {
        let settings = Settings {
            max_upload_bytes: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert_eq!(Settings::default().max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_settings_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"db_name = \"from-file\"\n")
            .unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.db_name, "from-file");
    }
}
