//! Client-side session and view state for the MedScan health assistant.
//!
//! The controller owns the active session and a retained [`ChatSurface`]; render
//! primitives build surface nodes and the reveal effect animates assistant replies.

mod constants;
mod controller;
mod error;
mod markdown;
mod prompt;
mod render;
mod reveal;
mod state;
mod surface;
mod upload;

#[cfg(test)]
mod test_support;

pub use constants::*;
pub use controller::{
    ControllerOptions, DeleteOutcome, SendOutcome, SessionController, ViewUpdate,
};
pub use error::ControllerError;
pub use markdown::{escape_html, plain_text_html, render_markdown};
pub use prompt::UserPrompt;
pub use render::{
    assistant_message, assistant_revealing, connection_error, empty_state, fairness_card,
    history_panel, history_rows, is_uncertain_name, keyword_list, medication_cards,
    scan_preview, scan_result_view, thinking_placeholder, transcript_nodes, user_message,
};
pub use reveal::{DEFAULT_REVEAL_INTERVAL, RevealHandle, RevealMode, RevealOutcome};
pub use surface::{
    ChatNode, ChatNodeKind, ChatSurface, FairnessCard, HistoryPanel, HistoryRow, KeywordList,
    MAX_NOTICES, MedicationCard, MessageBody, NodeId, RowTarget, ScanPanel, ScanPhase, ScanPreview,
    ScanResultView, Tab, UiAction,
};
pub use upload::SelectedFile;

pub use medscan_api_client::{
    ApiClientError, ChatMessage, FairnessMetrics, HealthApi, MessageRole, ScanResult,
    SessionSummary, UserProfile,
};
