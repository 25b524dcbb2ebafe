use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;
pub const MIN_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_SESSION_TITLE: &str = "Nouvelle conversation";
pub const DEFAULT_LITERACY_LEVEL: &str = "Niveau 2 (Grand Public)";
pub const LITERACY_LEVELS: [&str; 5] = [
    "Niveau 1 (ELI5)",
    "Niveau 2 (Grand Public)",
    "Niveau 3 (Initié)",
    "Niveau 4 (Avancé)",
    "Niveau 5 (Expert)",
];

#[derive(Debug, Clone)]
pub struct HealthApiClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl HealthApiClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthApiClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiClientError {
    #[error("medscan_api_base_url_missing")]
    BaseUrlMissing,
    #[error("medscan_api_invalid_path")]
    InvalidPath,
    #[error("medscan_api_request_failed:{message}")]
    Request { message: String },
    #[error("medscan_api_read_failed:{message}")]
    Read { message: String },
    #[error("medscan_api_http_{status}:{body}")]
    Http {
        status: StatusCode,
        detail: Option<String>,
        body: String,
    },
    #[error("medscan_api_json_decode_failed:{message}")]
    Decode { message: String },
}

impl ApiClientError {
    /// True when the request never produced a usable response.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Read { .. })
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Http {
                detail: Some(detail),
                ..
            } => Some(detail.as_str()),
            _ => None,
        }
    }

    /// Message suitable for a blocking notice. Prefers the server `detail`.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        match self {
            Self::BaseUrlMissing | Self::InvalidPath => "Requête invalide.".to_string(),
            Self::Request { .. } | Self::Read { .. } => "Erreur de connexion.".to_string(),
            Self::Http { status, .. } => format!("Erreur du serveur ({}).", status.as_u16()),
            Self::Decode { .. } => "Réponse du serveur illisible.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default = "default_session_title", deserialize_with = "title_or_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

/// Profile options sent alongside every chat turn and upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub language: String,
    pub literacy_level: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: 30,
            language: "Français".to_string(),
            literacy_level: DEFAULT_LITERACY_LEVEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub fairness_metrics: Option<FairnessMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    pub complexity_score: f64,
    pub toxicity_score: f64,
    pub bias_detected: bool,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationEntry {
    #[serde(rename = "nom", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub dosage: Option<String>,
    #[serde(rename = "posologie", default, deserialize_with = "lenient_text")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meds_data: Vec<MedicationEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub session_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub profile: UserProfile,
}

#[async_trait]
pub trait HealthApi: Send + Sync {
    async fn new_session(&self) -> Result<String, ApiClientError>;
    async fn history(&self) -> Result<Vec<SessionSummary>, ApiClientError>;
    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiClientError>;
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiClientError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), ApiClientError>;
    async fn delete_all_sessions(&self) -> Result<(), ApiClientError>;
    async fn upload(&self, request: UploadRequest) -> Result<ScanResult, ApiClientError>;
}

impl HealthApiClient {
    pub fn new(config: HealthApiClientConfig) -> Result<Self, ApiClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(MIN_TIMEOUT_MS)),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    #[must_use]
    pub fn new_session_path() -> &'static str {
        "/api/new_session"
    }

    #[must_use]
    pub fn history_path() -> &'static str {
        "/api/history"
    }

    #[must_use]
    pub fn chat_path() -> &'static str {
        "/api/chat"
    }

    #[must_use]
    pub fn upload_path() -> &'static str {
        "/api/upload"
    }

    #[must_use]
    pub fn delete_all_sessions_path() -> &'static str {
        "/api/delete_all_sessions"
    }

    pub fn messages_path(session_id: &str) -> Result<String, ApiClientError> {
        Ok(format!("/api/messages/{}", path_segment(session_id)?))
    }

    pub fn session_path(session_id: &str) -> Result<String, ApiClientError> {
        Ok(format!("/api/session/{}", path_segment(session_id)?))
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T, ApiClientError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ApiClientError::InvalidPath)?;
        let response = self.send(self.http.get(url.as_str()), "GET", path).await?;
        decode_json_response(response).await
    }

    pub async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, ApiClientError>
    where
        Req: Serialize + ?Sized,
        Res: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ApiClientError::InvalidPath)?;
        let response = self
            .send(self.http.post(url.as_str()).json(payload), "POST", path)
            .await?;
        decode_json_response(response).await
    }

    async fn post_without_body<Res>(&self, path: &str) -> Result<Res, ApiClientError>
    where
        Res: for<'de> Deserialize<'de>,
    {
        let url = self.endpoint(path).ok_or(ApiClientError::InvalidPath)?;
        let response = self.send(self.http.post(url.as_str()), "POST", path).await?;
        decode_json_response(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiClientError> {
        let url = self.endpoint(path).ok_or(ApiClientError::InvalidPath)?;
        let response = self
            .send(self.http.delete(url.as_str()), "DELETE", path)
            .await?;
        let status = response.status();
        let bytes = read_body(response).await?;
        if !status.is_success() {
            return Err(format_http_error(status, &bytes));
        }
        Ok(())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        method: &'static str,
        path: &str,
    ) -> Result<reqwest::Response, ApiClientError> {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        tracing::debug!(method, path, request_id = %request_id, "medscan api request");
        request
            .header("x-request-id", request_id)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|error| ApiClientError::Request {
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl HealthApi for HealthApiClient {
    async fn new_session(&self) -> Result<String, ApiClientError> {
        let response: NewSessionResponse = self.post_without_body(Self::new_session_path()).await?;
        non_empty_string(response.session_id).ok_or_else(|| ApiClientError::Decode {
            message: "empty session_id".to_string(),
        })
    }

    async fn history(&self) -> Result<Vec<SessionSummary>, ApiClientError> {
        self.get_json(Self::history_path()).await
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiClientError> {
        self.get_json(Self::messages_path(session_id)?.as_str())
            .await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiClientError> {
        self.post_json(Self::chat_path(), request).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiClientError> {
        self.delete(Self::session_path(session_id)?.as_str()).await
    }

    async fn delete_all_sessions(&self) -> Result<(), ApiClientError> {
        self.delete(Self::delete_all_sessions_path()).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<ScanResult, ApiClientError> {
        let path = Self::upload_path();
        let url = self.endpoint(path).ok_or(ApiClientError::InvalidPath)?;
        let file_part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(request.content_type.as_str())
            .map_err(|error| ApiClientError::Request {
                message: error.to_string(),
            })?;
        let form = Form::new()
            .part("file", file_part)
            .text("session_id", request.session_id)
            .text("age", request.profile.age.to_string())
            .text("language", request.profile.language);
        let response = self
            .send(self.http.post(url.as_str()).multipart(form), "POST", path)
            .await?;
        decode_json_response(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetailBody {
    detail: serde_json::Value,
}

pub fn format_http_error(status: StatusCode, body: &[u8]) -> ApiClientError {
    let detail = serde_json::from_slice::<ErrorDetailBody>(body)
        .ok()
        .and_then(|parsed| match parsed.detail {
            serde_json::Value::String(text) => non_empty_string(text),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });
    let body = non_empty_string(String::from_utf8_lossy(body).to_string())
        .unwrap_or_else(|| "<empty>".to_string());
    ApiClientError::Http {
        status,
        detail,
        body,
    }
}

fn normalize_base_url(base_url: &str) -> Result<String, ApiClientError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(ApiClientError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn path_segment(session_id: &str) -> Result<&str, ApiClientError> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '?', '#']) {
        return Err(ApiClientError::InvalidPath);
    }
    Ok(trimmed)
}

async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, ApiClientError> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|error| ApiClientError::Read {
            message: error.to_string(),
        })
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, ApiClientError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    let bytes = read_body(response).await?;

    if !status.is_success() {
        return Err(format_http_error(status, &bytes));
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| ApiClientError::Decode {
        message: error.to_string(),
    })
}

fn non_empty_string(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn default_session_title() -> String {
    DEFAULT_SESSION_TITLE.to_string()
}

fn title_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(non_empty_string)
        .unwrap_or_else(default_session_title))
}

// Vision output is model-generated; numbers and nulls show up where strings are expected.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => non_empty_string(text),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
