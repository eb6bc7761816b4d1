use crate::config::settings::Settings;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "fit-check")]
#[command(about = "Exercise catalog HTTP service")]
pub struct ServeArgs {
    /// Optional TOML settings file; flags and environment override it
    #[arg(short, long)]
    pub config: Option<String>,

    /// Env file applied before reading environment variables
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    pub env_file: String,

    #[arg(long, env = "MONGO_URI")]
    pub mongo_uri: Option<String>,

    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_CX")]
    pub google_cx: Option<String>,

    #[arg(long, env = "GOOGLE_SEARCH_ENDPOINT")]
    pub search_endpoint: Option<String>,

    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    #[arg(long, env = "FALLBACK_ROUTINES_PATH")]
    pub fallback_routines_path: Option<String>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ServeArgs {
    /// 合併設定檔與命令列參數，命令列優先
    pub fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if self.mongo_uri.is_some() {
            settings.mongo_uri = self.mongo_uri;
        }
        if self.google_api_key.is_some() {
            settings.google_api_key = self.google_api_key;
        }
        if self.google_cx.is_some() {
            settings.google_cx = self.google_cx;
        }
        if let Some(db_name) = self.db_name {
            settings.db_name = db_name;
        }
        if let Some(endpoint) = self.search_endpoint {
            settings.search_endpoint = endpoint;
        }
        if let Some(bind_addr) = self.bind_addr {
            settings.bind_addr = bind_addr;
        }
        if let Some(path) = self.fallback_routines_path {
            settings.fallback_routines_path = path;
        }
        if let Some(limit) = self.max_upload_bytes {
            settings.max_upload_bytes = limit;
        }

        Ok(settings.without_blank_values())
    }
}
