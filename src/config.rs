use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Prompt sent with the photographs when none is configured.
pub const DEFAULT_ASSESSMENT_PROMPT: &str = "\
あなたは解体工事の現場調査を支援する専門家です。添付された建物の写真を分析し、以下の形式で日本語で回答してください。
見出しは「番号. 見出し」の形式で書き、箇条書きは「- 」で始めてください。

1. 建物概要
構造: (木造・鉄骨造・RC造など)
種類: (戸建住宅・店舗・倉庫など)
延床面積: (推定値)
階数: (推定値)

2. 解体工事の概要
想定される工法、重機の搬入経路、足場や養生の必要性を記載してください。

3. 概算費用
坪単価と総額の目安を記載してください。

写真から読み取れる注意点・追加費用のリスク
- アスベスト、地中埋設物、残置物、近隣環境など、追加費用につながるリスクを箇条書きで記載してください。";

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Gemini
    pub gemini_api_key: Option<String>,
    pub gemini_api_base_url: String,
    pub gemini_model: String,
    pub gemini_timeout_seconds: u64,
    pub assessment_prompt: String,

    // Redis (history persistence)
    pub redis_url: String,
    pub history_storage_key: String,
    pub history_max_entries: usize,

    // Uploads
    pub max_images_per_assessment: usize,
    pub max_upload_bytes: usize,

    // Chat
    pub chat_context_chars: usize,
    pub chat_max_sessions: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Gemini: a missing key disables assessment and chat, it is not fatal
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let gemini_api_base_url = env::var("GEMINI_API_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let gemini_timeout_seconds = parse_var("GEMINI_TIMEOUT_SECONDS")?.unwrap_or(120); // 2 minutes default for LLM calls
        let assessment_prompt = env::var("ASSESSMENT_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ASSESSMENT_PROMPT.to_string());

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
        let history_storage_key = env::var("HISTORY_STORAGE_KEY")
            .unwrap_or_else(|_| "demolitionEstimationHistory".to_string());
        let history_max_entries = parse_var("HISTORY_MAX_ENTRIES")?.unwrap_or(20);

        // Uploads
        let max_images_per_assessment = parse_var("MAX_IMAGES_PER_ASSESSMENT")?.unwrap_or(10);
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES")?.unwrap_or(25 * 1024 * 1024);

        // Chat
        let chat_context_chars = parse_var("CHAT_CONTEXT_CHARS")?.unwrap_or(1500);
        let chat_max_sessions = parse_var("CHAT_MAX_SESSIONS")?.unwrap_or(100);

        Ok(Settings {
            env,
            server_addr,
            cors_allow_origins,
            gemini_api_key,
            gemini_api_base_url,
            gemini_model,
            gemini_timeout_seconds,
            assessment_prompt,
            redis_url,
            history_storage_key,
            history_max_entries,
            max_images_per_assessment,
            max_upload_bytes,
            chat_context_chars,
            chat_max_sessions,
        })
    }
}

/// Read an optional numeric variable; a present but malformed value is an error.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a number", name)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
impl Settings {
    /// Settings for tests: no model key, defaults everywhere else.
    pub fn for_tests() -> Self {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            cors_allow_origins: vec!["http://localhost:5173".to_string()],
            gemini_api_key: None,
            gemini_api_base_url: "http://127.0.0.1:9".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_timeout_seconds: 5,
            assessment_prompt: DEFAULT_ASSESSMENT_PROMPT.to_string(),
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            history_storage_key: "demolitionEstimationHistory".to_string(),
            history_max_entries: 20,
            max_images_per_assessment: 10,
            max_upload_bytes: 25 * 1024 * 1024,
            chat_context_chars: 1500,
            chat_max_sessions: 100,
        }
    }
}
