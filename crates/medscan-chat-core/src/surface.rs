use std::fmt;

use medscan_api_client::MessageRole;

use crate::constants::{DELETE_ALL_LABEL, DOCUMENT_PREVIEW_ICON};
use crate::markdown::{escape_html, plain_text_html};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Chat,
    Scan,
}

impl Tab {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Scan => "scan",
        }
    }
}

/// Actions bound to rendered elements when they are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    NewSession,
    SelectSession(String),
    DeleteSession(String),
    DeleteAllSessions,
    SwitchTab(Tab),
    Analyze,
    ResetScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Plain(String),
    Rich { source: String, html: String },
    Revealing { source: String, shown: String },
}

impl MessageBody {
    #[must_use]
    pub fn html(&self) -> String {
        match self {
            Self::Plain(text) => plain_text_html(text),
            Self::Rich { html, .. } => html.clone(),
            Self::Revealing { shown, .. } => plain_text_html(shown),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Rich { source, .. } | Self::Revealing { source, .. } => source,
        }
    }

    #[must_use]
    pub fn is_revealing(&self) -> bool {
        matches!(self, Self::Revealing { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FairnessCard {
    pub complexity_score: f64,
    pub toxicity_score: f64,
    pub bias_detected: bool,
    pub reasoning: String,
    pub complexity_flagged: bool,
    pub toxicity_flagged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatNodeKind {
    EmptyState { text: String },
    Message { role: MessageRole, body: MessageBody },
    Thinking { text: String },
    ConnectionError { text: String },
    FairnessCard(FairnessCard),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatNode {
    pub id: NodeId,
    pub kind: ChatNodeKind,
}

impl ChatNode {
    #[must_use]
    pub fn to_html(&self) -> String {
        match &self.kind {
            ChatNodeKind::EmptyState { text } => {
                format!("<div class=\"empty-state\">{}</div>", escape_html(text))
            }
            ChatNodeKind::Message { role, body } => {
                let class = match role {
                    MessageRole::User => "user",
                    MessageRole::Assistant | MessageRole::System => "bot",
                };
                format!(
                    "<div class=\"message {class}\" id=\"{}\">{}</div>",
                    self.id,
                    body.html()
                )
            }
            ChatNodeKind::Thinking { text } | ChatNodeKind::ConnectionError { text } => format!(
                "<div class=\"message thinking\" id=\"{}\">{}</div>",
                self.id,
                escape_html(text)
            ),
            ChatNodeKind::FairnessCard(card) => {
                let bias = if card.bias_detected { "oui" } else { "non" };
                format!(
                    "<div class=\"fairness-card\"><span class=\"metric{}\">Complexité {:.1}/10</span>\
                     <span class=\"metric{}\">Toxicité {:.1}/10</span>\
                     <span class=\"metric{}\">Biais : {bias}</span><p>{}</p></div>",
                    if card.complexity_flagged { " flagged" } else { "" },
                    card.complexity_score,
                    if card.toxicity_flagged { " flagged" } else { "" },
                    card.toxicity_score,
                    if card.bias_detected { " flagged" } else { "" },
                    escape_html(&card.reasoning)
                )
            }
        }
    }
}

/// Which part of a history row received the click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTarget {
    Title,
    DeleteIcon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub session_id: String,
    pub title: String,
    pub active: bool,
    pub select: UiAction,
    pub delete: UiAction,
}

impl HistoryRow {
    /// Exactly one action per click: the delete icon never also selects the row.
    #[must_use]
    pub fn action_for(&self, target: RowTarget) -> &UiAction {
        match target {
            RowTarget::Title => &self.select,
            RowTarget::DeleteIcon => &self.delete,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPanel {
    pub rows: Vec<HistoryRow>,
    pub delete_all: Option<UiAction>,
}

impl HistoryPanel {
    pub fn clear_highlight(&mut self) {
        for row in &mut self.rows {
            row.active = false;
        }
    }

    #[must_use]
    pub fn active_row(&self) -> Option<&HistoryRow> {
        self.rows.iter().find(|row| row.active)
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = String::from("<div class=\"history-list\">");
        for row in &self.rows {
            html.push_str(&format!(
                "<div class=\"history-item{}\" data-session-id=\"{}\"><span>{}</span><i class=\"delete-icon\"></i></div>",
                if row.active { " active" } else { "" },
                escape_html(&row.session_id),
                escape_html(&row.title)
            ));
        }
        if self.delete_all.is_some() {
            html.push_str(&format!(
                "<button class=\"delete-all\">{DELETE_ALL_LABEL}</button>"
            ));
        }
        html.push_str("</div>");
        html
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    #[default]
    Ready,
    FileChosen,
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPreview {
    Image { file_name: String, data_url: String },
    Document { file_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicationCard {
    pub name: String,
    pub dosage: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordList {
    Chips(Vec<String>),
    Empty { placeholder: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResultView {
    pub explanation_source: String,
    pub explanation_html: String,
    pub medications: Vec<MedicationCard>,
    pub keywords: KeywordList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPanel {
    pub phase: ScanPhase,
    pub file_label: Option<String>,
    pub upload_visible: bool,
    pub analyze_visible: bool,
    pub preview: Option<ScanPreview>,
    pub result: Option<ScanResultView>,
    pub post_actions: Vec<UiAction>,
}

impl Default for ScanPanel {
    fn default() -> Self {
        Self {
            phase: ScanPhase::Ready,
            file_label: None,
            upload_visible: true,
            analyze_visible: false,
            preview: None,
            result: None,
            post_actions: Vec::new(),
        }
    }
}

impl ScanPanel {
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut html = String::from("<section class=\"scan-panel\">");
        if self.upload_visible {
            html.push_str("<div class=\"upload-zone\">");
            if let Some(label) = &self.file_label {
                html.push_str(&format!(
                    "<span class=\"file-name\">{}</span>",
                    escape_html(label)
                ));
            }
            if self.analyze_visible {
                html.push_str("<button class=\"analyze\">Analyser</button>");
            }
            html.push_str("</div>");
        }
        match &self.preview {
            Some(ScanPreview::Image {
                file_name,
                data_url,
            }) => html.push_str(&format!(
                "<img class=\"preview\" alt=\"{}\" src=\"{}\">",
                escape_html(file_name),
                escape_html(data_url)
            )),
            Some(ScanPreview::Document { file_name }) => html.push_str(&format!(
                "<div class=\"preview doc\">{DOCUMENT_PREVIEW_ICON} {}</div>",
                escape_html(file_name)
            )),
            None => {}
        }
        if self.phase == ScanPhase::Loading {
            html.push_str("<div class=\"scan-loader\"></div>");
        }
        if let Some(result) = &self.result {
            html.push_str(&format!(
                "<div class=\"scan-explanation\">{}</div>",
                result.explanation_html
            ));
            for card in &result.medications {
                html.push_str(&format!(
                    "<div class=\"med-card\"><h4>{}</h4><p>{}</p><p>{}</p></div>",
                    escape_html(&card.name),
                    escape_html(&card.dosage),
                    escape_html(&card.instructions)
                ));
            }
            match &result.keywords {
                KeywordList::Chips(chips) => {
                    for chip in chips {
                        html.push_str(&format!(
                            "<span class=\"chip\">{}</span>",
                            escape_html(chip)
                        ));
                    }
                }
                KeywordList::Empty { placeholder } => html.push_str(&format!(
                    "<span class=\"chip empty\">{}</span>",
                    escape_html(placeholder)
                )),
            }
        }
        html.push_str("</section>");
        html
    }
}

pub const MAX_NOTICES: usize = 32;

/// Retained render surface for the single chat screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSurface {
    chat: Vec<ChatNode>,
    next_node_id: u64,
    scroll_requests: u64,
    notices: Vec<String>,
    pub history: HistoryPanel,
    pub scan: ScanPanel,
    pub active_tab: Tab,
    pub composer: String,
}

impl ChatSurface {
    #[must_use]
    pub fn chat_nodes(&self) -> &[ChatNode] {
        &self.chat
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ChatNode> {
        self.chat.iter().find(|node| node.id == id)
    }

    pub(crate) fn node_kind_mut(&mut self, id: NodeId) -> Option<&mut ChatNodeKind> {
        self.chat
            .iter_mut()
            .find(|node| node.id == id)
            .map(|node| &mut node.kind)
    }

    pub fn append(&mut self, kind: ChatNodeKind) -> NodeId {
        let id = self.allocate_id();
        self.chat.push(ChatNode { id, kind });
        id
    }

    pub fn insert_after(&mut self, anchor: NodeId, kind: ChatNodeKind) -> Option<NodeId> {
        let index = self.chat.iter().position(|node| node.id == anchor)?;
        let id = self.allocate_id();
        self.chat.insert(index + 1, ChatNode { id, kind });
        Some(id)
    }

    /// Swaps a node's content while keeping its id and position.
    pub fn replace(&mut self, id: NodeId, kind: ChatNodeKind) -> bool {
        match self.node_kind_mut(id) {
            Some(existing) => {
                *existing = kind;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        let before = self.chat.len();
        self.chat.retain(|node| node.id != id);
        self.chat.len() != before
    }

    pub fn clear_chat(&mut self) {
        self.chat.clear();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_requests = self.scroll_requests.saturating_add(1);
    }

    #[must_use]
    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }

    /// Records a notice, keeping only the most recent `MAX_NOTICES`.
    pub fn push_notice(&mut self, message: impl Into<String>) {
        if self.notices.len() >= MAX_NOTICES {
            let overflow = self.notices.len() + 1 - MAX_NOTICES;
            self.notices.drain(..overflow);
        }
        self.notices.push(message.into());
    }

    #[must_use]
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    #[must_use]
    pub fn chat_html(&self) -> String {
        self.chat.iter().map(ChatNode::to_html).collect()
    }

    #[must_use]
    pub fn to_html(&self) -> String {
        let (chat_class, scan_class) = match self.active_tab {
            Tab::Chat => (" active-view", ""),
            Tab::Scan => ("", " active-view"),
        };
        format!(
            "<aside class=\"sidebar\">{}</aside>\
             <main id=\"chat-view\" class=\"view{chat_class}\"><div id=\"chatBody\">{}</div></main>\
             <main id=\"scan-view\" class=\"view{scan_class}\">{}</main>",
            self.history.to_html(),
            self.chat_html(),
            self.scan.to_html()
        )
    }

    fn allocate_id(&mut self) -> NodeId {
        self.next_node_id = self.next_node_id.saturating_add(1);
        NodeId(self.next_node_id)
    }
}
