use std::sync::Arc;

use medscan_api_client::{
    ApiClientError, ChatMessage, ChatRequest, HealthApi, MessageRole, UserProfile,
};

use crate::constants::{
    CONFIRM_DELETE_ALL_SESSIONS, CONFIRM_DELETE_SESSION, NO_ACTIVE_SESSION_NOTICE,
    SESSION_CREATE_FAILED_NOTICE,
};
use crate::error::ControllerError;
use crate::prompt::UserPrompt;
use crate::render::{
    assistant_message, connection_error, empty_state, fairness_card, history_panel,
    thinking_placeholder, transcript_nodes, user_message,
};
use crate::reveal::{RevealHandle, RevealMode, start_reveal};
use crate::state::{SharedViewState, ViewState};
use crate::surface::{ChatNodeKind, ChatSurface, NodeId, Tab, UiAction};
use crate::upload::reset_scan_panel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerOptions {
    pub reveal: RevealMode,
}

/// Whether an async result was written to the view or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    Applied,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Cancelled,
    Deleted { recreated_session: Option<String> },
}

#[derive(Debug)]
pub enum SendOutcome {
    /// Blank input; nothing was rendered or sent.
    Ignored,
    Delivered { reveal: Option<RevealHandle> },
    /// The reply arrived after the user moved to another session.
    Stale,
    /// The request failed; the placeholder now shows the connection error.
    Failed { error: ApiClientError },
}

pub struct SessionController<A: HealthApi + ?Sized> {
    api: Arc<A>,
    prompt: Arc<dyn UserPrompt>,
    state: SharedViewState,
    options: ControllerOptions,
}

impl<A: HealthApi + ?Sized> Clone for SessionController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            prompt: Arc::clone(&self.prompt),
            state: Arc::clone(&self.state),
            options: self.options,
        }
    }
}

impl<A: HealthApi + ?Sized> SessionController<A> {
    pub fn new(api: Arc<A>, prompt: Arc<dyn UserPrompt>, options: ControllerOptions) -> Self {
        Self {
            api,
            prompt,
            state: SharedViewState::default(),
            options,
        }
    }

    pub(crate) fn api(&self) -> &A {
        &self.api
    }

    pub(crate) fn shared(&self) -> &SharedViewState {
        &self.state
    }

    pub async fn snapshot(&self) -> ChatSurface {
        self.state.lock().await.surface.clone()
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.state.lock().await.current_session_id.clone()
    }

    /// True while any typewriter reveal still owns a node.
    pub async fn is_revealing(&self) -> bool {
        !self.state.lock().await.reveals.is_empty()
    }

    pub async fn switch_tab(&self, tab: Tab) {
        self.state.lock().await.surface.active_tab = tab;
    }

    pub async fn set_composer(&self, text: &str) {
        self.state.lock().await.surface.composer = text.to_string();
    }

    /// Loads the sidebar, then opens a fresh session. Failures are only logged.
    pub async fn initialize(&self) {
        self.refresh_history().await;
        if let Err(error) = self.create_session().await {
            tracing::warn!(error = %error, "initial session creation failed");
        }
    }

    pub async fn create_session(&self) -> Result<String, ControllerError> {
        let session_id = self.api.new_session().await?;
        let mut state = self.state.lock().await;
        state.current_session_id = Some(session_id.clone());
        let generation = state.bump_view();
        state.surface.clear_chat();
        state.surface.append(empty_state());
        state.surface.history.clear_highlight();
        reset_scan_panel(&mut state);
        state.surface.active_tab = Tab::Chat;
        tracing::info!(session_id = %session_id, generation, "session created");
        Ok(session_id)
    }

    pub async fn select_session(&self, session_id: &str) -> Result<ViewUpdate, ControllerError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.current_session_id = Some(session_id.to_string());
            state.surface.active_tab = Tab::Chat;
            state.bump_view()
        };
        self.refresh_history().await;
        let messages = match self.api.messages(session_id).await {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(session_id, generation, error = %error, "loading transcript failed");
                self.fail_transcript(generation, &error).await;
                return Err(error.into());
            }
        };
        Ok(self.apply_transcript(generation, &messages).await)
    }

    /// Leaves the selected session showing a connection error instead of the
    /// previous transcript, so sends and the view agree. Selecting again retries.
    async fn fail_transcript(&self, generation: u64, error: &ApiClientError) {
        {
            let mut state = self.state.lock().await;
            if state.view_generation != generation {
                return;
            }
            state.surface.clear_chat();
            state.surface.append(connection_error());
            state.surface.scroll_to_bottom();
        }
        if !error.is_transport() {
            self.notice(&error.user_message()).await;
        }
    }

    /// Re-reads the active transcript without starting a new view generation.
    pub(crate) async fn reload_transcript(&self) -> Result<ViewUpdate, ControllerError> {
        let (session_id, generation) = {
            let state = self.state.lock().await;
            let Some(session_id) = state.current_session_id.clone() else {
                return Err(ControllerError::NoActiveSession);
            };
            (session_id, state.view_generation)
        };
        let messages = self.api.messages(&session_id).await?;
        Ok(self.apply_transcript(generation, &messages).await)
    }

    async fn apply_transcript(&self, generation: u64, messages: &[ChatMessage]) -> ViewUpdate {
        let mut state = self.state.lock().await;
        if state.view_generation != generation {
            tracing::debug!(generation, current = state.view_generation, "stale transcript dropped");
            return ViewUpdate::Stale;
        }
        state.surface.clear_chat();
        for node in transcript_nodes(messages) {
            state.surface.append(node);
        }
        state.surface.scroll_to_bottom();
        ViewUpdate::Applied
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<DeleteOutcome, ControllerError> {
        if !self.prompt.confirm(CONFIRM_DELETE_SESSION) {
            return Ok(DeleteOutcome::Cancelled);
        }
        if let Err(error) = self.api.delete_session(session_id).await {
            tracing::warn!(session_id, error = %error, "delete session failed");
            self.notice(&error.user_message()).await;
            return Err(error.into());
        }
        let was_active =
            self.state.lock().await.current_session_id.as_deref() == Some(session_id);
        let recreated_session = if was_active {
            Some(self.replace_active_session().await?)
        } else {
            None
        };
        self.refresh_history().await;
        Ok(DeleteOutcome::Deleted { recreated_session })
    }

    pub async fn delete_all_sessions(&self) -> Result<DeleteOutcome, ControllerError> {
        if !self.prompt.confirm(CONFIRM_DELETE_ALL_SESSIONS) {
            return Ok(DeleteOutcome::Cancelled);
        }
        if let Err(error) = self.api.delete_all_sessions().await {
            tracing::warn!(error = %error, "delete all sessions failed");
            self.notice(&error.user_message()).await;
            return Err(error.into());
        }
        let session_id = self.replace_active_session().await?;
        self.refresh_history().await;
        Ok(DeleteOutcome::Deleted {
            recreated_session: Some(session_id),
        })
    }

    async fn replace_active_session(&self) -> Result<String, ControllerError> {
        match self.create_session().await {
            Ok(session_id) => Ok(session_id),
            Err(error) => {
                tracing::warn!(error = %error, "replacement session creation failed");
                self.notice(SESSION_CREATE_FAILED_NOTICE).await;
                self.refresh_history().await;
                Err(error)
            }
        }
    }

    /// Rebuilds the sidebar. Only the most recently issued refresh may write.
    pub async fn refresh_history(&self) {
        let generation = self.state.lock().await.bump_history();
        let sessions = match self.api.history().await {
            Ok(sessions) => sessions,
            Err(error) => {
                tracing::warn!(generation, error = %error, "history refresh failed");
                return;
            }
        };
        let mut state = self.state.lock().await;
        if state.history_generation != generation {
            tracing::debug!(generation, "stale history dropped");
            return;
        }
        let panel = history_panel(&sessions, state.current_session_id.as_deref());
        state.surface.history = panel;
    }

    pub async fn send_message(
        &self,
        text: &str,
        profile: &UserProfile,
    ) -> Result<SendOutcome, ControllerError> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let pending = {
            let mut state = self.state.lock().await;
            state.current_session_id.clone().map(|session_id| {
                let placeholder = render_pending_turn(&mut state, message);
                (session_id, state.view_generation, placeholder)
            })
        };
        let Some((session_id, generation, placeholder)) = pending else {
            self.notice(NO_ACTIVE_SESSION_NOTICE).await;
            return Err(ControllerError::NoActiveSession);
        };

        let request = ChatRequest {
            session_id: session_id.clone(),
            message: message.to_string(),
            profile: profile.clone(),
        };
        let response = match self.api.chat(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(session_id = %session_id, error = %error, "chat request failed");
                let mut state = self.state.lock().await;
                if state.view_generation == generation {
                    let placeholder = restore_pending_turn(&mut state, placeholder, message);
                    state.surface.replace(placeholder, connection_error());
                }
                return Ok(SendOutcome::Failed { error });
            }
        };

        let reveal = {
            let mut state = self.state.lock().await;
            if state.view_generation != generation {
                tracing::debug!(session_id = %session_id, generation, "stale chat reply dropped");
                return Ok(SendOutcome::Stale);
            }
            if state.surface.node(placeholder).is_none()
                && ends_with_turn(&state.surface, message, &response.response)
            {
                tracing::debug!(session_id = %session_id, "reply already in reloaded transcript");
                None
            } else {
                let placeholder = restore_pending_turn(&mut state, placeholder, message);
                if let Some(metrics) = &response.fairness_metrics {
                    state.surface.insert_after(placeholder, fairness_card(metrics));
                }
                self.present_reply(&mut state, placeholder, &response.response)?
            }
        };
        self.refresh_history().await;
        Ok(SendOutcome::Delivered { reveal })
    }

    fn present_reply(
        &self,
        state: &mut ViewState,
        node: NodeId,
        reply: &str,
    ) -> Result<Option<RevealHandle>, ControllerError> {
        match self.options.reveal {
            RevealMode::Instant => {
                state.surface.replace(node, assistant_message(reply));
                state.surface.scroll_to_bottom();
                Ok(None)
            }
            RevealMode::Typewriter { interval } => {
                start_reveal(&self.state, state, node, reply, interval).map(Some)
            }
        }
    }

    /// Single entry point for actions bound to rendered elements.
    pub async fn dispatch(
        &self,
        action: UiAction,
        profile: &UserProfile,
    ) -> Result<(), ControllerError> {
        match action {
            UiAction::NewSession => {
                if let Err(error) = self.create_session().await {
                    self.notice(SESSION_CREATE_FAILED_NOTICE).await;
                    return Err(error);
                }
                self.refresh_history().await;
            }
            UiAction::SelectSession(session_id) => {
                self.select_session(&session_id).await?;
            }
            UiAction::DeleteSession(session_id) => {
                self.delete_session(&session_id).await?;
            }
            UiAction::DeleteAllSessions => {
                self.delete_all_sessions().await?;
            }
            UiAction::SwitchTab(tab) => self.switch_tab(tab).await,
            UiAction::Analyze => {
                self.analyze(profile).await?;
            }
            UiAction::ResetScan => self.reset_scan().await,
        }
        Ok(())
    }

    pub(crate) async fn notice(&self, message: &str) {
        self.state.lock().await.notice(message);
        self.prompt.notify(message);
    }
}

/// Optimistic half of a chat turn: the user's text and a thinking placeholder.
fn render_pending_turn(state: &mut ViewState, message: &str) -> NodeId {
    let greeting: Vec<NodeId> = state
        .surface
        .chat_nodes()
        .iter()
        .filter(|node| matches!(node.kind, ChatNodeKind::EmptyState { .. }))
        .map(|node| node.id)
        .collect();
    for id in greeting {
        state.surface.remove(id);
    }
    state.surface.append(user_message(message));
    state.surface.composer.clear();
    let placeholder = state.surface.append(thinking_placeholder());
    state.surface.scroll_to_bottom();
    placeholder
}

/// A transcript reload in the same view can wipe the pending turn; put it
/// back at the end so the reply still lands next to its question.
fn restore_pending_turn(state: &mut ViewState, placeholder: NodeId, message: &str) -> NodeId {
    if state.surface.node(placeholder).is_some() {
        return placeholder;
    }
    state.surface.append(user_message(message));
    state.surface.append(thinking_placeholder())
}

fn ends_with_turn(surface: &ChatSurface, message: &str, reply: &str) -> bool {
    let tail: Vec<(MessageRole, &str)> = surface
        .chat_nodes()
        .iter()
        .filter_map(|node| match &node.kind {
            ChatNodeKind::Message { role, body } => Some((*role, body.source())),
            _ => None,
        })
        .rev()
        .take(2)
        .collect();
    tail == [(MessageRole::Assistant, reply), (MessageRole::User, message)]
}
