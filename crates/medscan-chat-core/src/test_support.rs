use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use medscan_api_client::{
    ApiClientError, ChatMessage, ChatRequest, ChatResponse, DEFAULT_SESSION_TITLE,
    FairnessMetrics, HealthApi, MessageRole, ScanResult, SessionSummary, UploadRequest,
};
use reqwest::StatusCode;
use tokio::sync::{Mutex, Notify};

use crate::prompt::UserPrompt;

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    sessions: Vec<(String, Vec<ChatMessage>)>,
    next_id: u64,
    pub(crate) calls: Vec<String>,
    pub(crate) chat_requests: Vec<ChatRequest>,
    pub(crate) uploads: Vec<UploadRequest>,
    pub(crate) fail_new_session: bool,
    pub(crate) fail_history: bool,
    pub(crate) fail_messages: bool,
    pub(crate) fail_chat: bool,
    pub(crate) fail_delete: Option<ApiClientError>,
    pub(crate) fail_upload: Option<ApiClientError>,
    pub(crate) reply: String,
    pub(crate) metrics: Option<FairnessMetrics>,
    pub(crate) scan_result: ScanResult,
}

impl FakeBackend {
    pub(crate) fn seed_session(&mut self, id: &str, messages: Vec<ChatMessage>) {
        self.sessions.push((id.to_string(), messages));
    }

    pub(crate) fn session_mut(&mut self, id: &str) -> Option<&mut Vec<ChatMessage>> {
        self.sessions
            .iter_mut()
            .find(|(session_id, _)| session_id == id)
            .map(|(_, messages)| messages)
    }
}

/// In-memory backend that records every call. `gate_chat` parks chat calls
/// until the test releases them, to force interleavings.
#[derive(Debug, Default)]
pub(crate) struct FakeHealthApi {
    pub(crate) backend: Mutex<FakeBackend>,
    gate_chat: AtomicBool,
    pub(crate) chat_started: Notify,
    pub(crate) chat_release: Notify,
}

impl FakeHealthApi {
    pub(crate) fn new() -> Self {
        let backend = FakeBackend {
            reply: "Bonjour, comment puis-je vous aider ?".to_string(),
            ..FakeBackend::default()
        };
        Self {
            backend: Mutex::new(backend),
            ..Self::default()
        }
    }

    pub(crate) fn gate_chat(&self) {
        self.gate_chat.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.backend.lock().await.calls.clone()
    }

    pub(crate) async fn clear_calls(&self) {
        self.backend.lock().await.calls.clear();
    }
}

pub(crate) fn message(role: MessageRole, content: &str) -> ChatMessage {
    ChatMessage {
        role,
        content: content.to_string(),
    }
}

fn server_error(detail: &str) -> ApiClientError {
    ApiClientError::Http {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: Some(detail.to_string()),
        body: format!("{{\"detail\":\"{detail}\"}}"),
    }
}

fn unreachable_backend() -> ApiClientError {
    ApiClientError::Request {
        message: "connection refused".to_string(),
    }
}

#[async_trait]
impl HealthApi for FakeHealthApi {
    async fn new_session(&self) -> Result<String, ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push("new_session".to_string());
        if backend.fail_new_session {
            return Err(unreachable_backend());
        }
        backend.next_id += 1;
        let id = format!("session-{}", backend.next_id);
        backend.sessions.push((id.clone(), Vec::new()));
        Ok(id)
    }

    async fn history(&self) -> Result<Vec<SessionSummary>, ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push("history".to_string());
        if backend.fail_history {
            return Err(unreachable_backend());
        }
        Ok(backend
            .sessions
            .iter()
            .rev()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(id, messages)| SessionSummary {
                id: id.clone(),
                title: messages
                    .iter()
                    .find(|message| message.role == MessageRole::User)
                    .map_or_else(|| DEFAULT_SESSION_TITLE.to_string(), |m| m.content.clone()),
                timestamp: None,
            })
            .collect())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push(format!("messages:{session_id}"));
        if backend.fail_messages {
            return Err(server_error("Erreur interne"));
        }
        Ok(backend
            .session_mut(session_id)
            .map(|messages| messages.clone())
            .unwrap_or_default())
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiClientError> {
        {
            let mut backend = self.backend.lock().await;
            backend.calls.push(format!("chat:{}", request.session_id));
            backend.chat_requests.push(request.clone());
        }
        if self.gate_chat.load(Ordering::SeqCst) {
            self.chat_started.notify_one();
            self.chat_release.notified().await;
        }
        let mut backend = self.backend.lock().await;
        if backend.fail_chat {
            return Err(unreachable_backend());
        }
        let reply = backend.reply.clone();
        let metrics = backend.metrics.clone();
        let Some(messages) = backend.session_mut(&request.session_id) else {
            return Err(server_error("Session introuvable"));
        };
        messages.push(message(MessageRole::User, &request.message));
        messages.push(message(MessageRole::Assistant, &reply));
        Ok(ChatResponse {
            response: reply,
            fairness_metrics: metrics,
        })
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push(format!("delete_session:{session_id}"));
        if let Some(error) = backend.fail_delete.clone() {
            return Err(error);
        }
        backend.sessions.retain(|(id, _)| id != session_id);
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push("delete_all_sessions".to_string());
        backend.sessions.clear();
        Ok(())
    }

    async fn upload(&self, request: UploadRequest) -> Result<ScanResult, ApiClientError> {
        let mut backend = self.backend.lock().await;
        backend.calls.push(format!("upload:{}", request.session_id));
        let session_id = request.session_id.clone();
        backend.uploads.push(request);
        if let Some(error) = backend.fail_upload.take() {
            return Err(error);
        }
        let result = backend.scan_result.clone();
        if let Some(messages) = backend.session_mut(&session_id) {
            messages.push(message(MessageRole::Assistant, &result.explanation));
        }
        Ok(result)
    }
}

/// Answers every confirmation with a fixed value and records what was asked.
#[derive(Debug)]
pub(crate) struct RecordingPrompt {
    answer: AtomicBool,
    questions: StdMutex<Vec<String>>,
    notices: StdMutex<Vec<String>>,
}

impl RecordingPrompt {
    pub(crate) fn accepting() -> Self {
        Self {
            answer: AtomicBool::new(true),
            questions: StdMutex::new(Vec::new()),
            notices: StdMutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing() -> Self {
        let prompt = Self::accepting();
        prompt.answer.store(false, Ordering::SeqCst);
        prompt
    }

    pub(crate) fn questions(&self) -> Vec<String> {
        self.questions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UserPrompt for RecordingPrompt {
    fn confirm(&self, question: &str) -> bool {
        self.questions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(question.to_string());
        self.answer.load(Ordering::SeqCst)
    }

    fn notify(&self, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
