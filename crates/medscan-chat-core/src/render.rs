use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use medscan_api_client::{
    ChatMessage, FairnessMetrics, MedicationEntry, MessageRole, ScanResult, SessionSummary,
};

use crate::constants::{
    COMPLEXITY_TARGET, CONNECTION_ERROR_TEXT, EMPTY_STATE_TEXT, NO_KEYWORDS_TEXT,
    THINKING_TEXT, TOXICITY_THRESHOLD, UNCERTAIN_MARKER,
};
use crate::markdown::render_markdown;
use crate::surface::{
    ChatNodeKind, FairnessCard, HistoryPanel, HistoryRow, KeywordList, MedicationCard,
    MessageBody, ScanPreview, ScanResultView, UiAction,
};
use crate::upload::SelectedFile;

#[must_use]
pub fn user_message(text: &str) -> ChatNodeKind {
    ChatNodeKind::Message {
        role: MessageRole::User,
        body: MessageBody::Plain(text.to_string()),
    }
}

#[must_use]
pub fn assistant_message(text: &str) -> ChatNodeKind {
    ChatNodeKind::Message {
        role: MessageRole::Assistant,
        body: MessageBody::Rich {
            source: text.to_string(),
            html: render_markdown(text),
        },
    }
}

/// Assistant node at the start of a typewriter reveal: source known, nothing shown.
#[must_use]
pub fn assistant_revealing(text: &str) -> ChatNodeKind {
    ChatNodeKind::Message {
        role: MessageRole::Assistant,
        body: MessageBody::Revealing {
            source: text.to_string(),
            shown: String::new(),
        },
    }
}

#[must_use]
pub fn thinking_placeholder() -> ChatNodeKind {
    ChatNodeKind::Thinking {
        text: THINKING_TEXT.to_string(),
    }
}

#[must_use]
pub fn connection_error() -> ChatNodeKind {
    ChatNodeKind::ConnectionError {
        text: CONNECTION_ERROR_TEXT.to_string(),
    }
}

#[must_use]
pub fn empty_state() -> ChatNodeKind {
    ChatNodeKind::EmptyState {
        text: EMPTY_STATE_TEXT.to_string(),
    }
}

#[must_use]
pub fn fairness_card(metrics: &FairnessMetrics) -> ChatNodeKind {
    ChatNodeKind::FairnessCard(FairnessCard {
        complexity_score: metrics.complexity_score,
        toxicity_score: metrics.toxicity_score,
        bias_detected: metrics.bias_detected,
        reasoning: metrics.reasoning.clone(),
        complexity_flagged: metrics.complexity_score >= COMPLEXITY_TARGET,
        toxicity_flagged: metrics.toxicity_score > TOXICITY_THRESHOLD,
    })
}

/// Chat body for a stored transcript. System turns are hidden; an empty
/// transcript shows the greeting instead.
#[must_use]
pub fn transcript_nodes(messages: &[ChatMessage]) -> Vec<ChatNodeKind> {
    let nodes: Vec<ChatNodeKind> = messages
        .iter()
        .filter_map(|message| match message.role {
            MessageRole::User => Some(user_message(&message.content)),
            MessageRole::Assistant => Some(assistant_message(&message.content)),
            MessageRole::System => None,
        })
        .collect();
    if nodes.is_empty() {
        vec![empty_state()]
    } else {
        nodes
    }
}

#[must_use]
pub fn history_rows(sessions: &[SessionSummary], active_id: Option<&str>) -> Vec<HistoryRow> {
    sessions
        .iter()
        .map(|session| HistoryRow {
            session_id: session.id.clone(),
            title: session.title.clone(),
            active: active_id == Some(session.id.as_str()),
            select: UiAction::SelectSession(session.id.clone()),
            delete: UiAction::DeleteSession(session.id.clone()),
        })
        .collect()
}

#[must_use]
pub fn history_panel(sessions: &[SessionSummary], active_id: Option<&str>) -> HistoryPanel {
    let rows = history_rows(sessions, active_id);
    let delete_all = (!rows.is_empty()).then_some(UiAction::DeleteAllSessions);
    HistoryPanel { rows, delete_all }
}

#[must_use]
pub fn is_uncertain_name(name: Option<&str>) -> bool {
    match name.map(str::trim) {
        None | Some("") => true,
        Some(name) => name.to_uppercase().contains(UNCERTAIN_MARKER),
    }
}

#[must_use]
pub fn medication_cards(entries: &[MedicationEntry]) -> Vec<MedicationCard> {
    entries
        .iter()
        .filter(|entry| !is_uncertain_name(entry.name.as_deref()))
        .map(|entry| MedicationCard {
            name: entry.name.clone().unwrap_or_default().trim().to_string(),
            dosage: entry.dosage.clone().unwrap_or_default(),
            instructions: entry.instructions.clone().unwrap_or_default(),
        })
        .collect()
}

#[must_use]
pub fn keyword_list(keywords: &[String]) -> KeywordList {
    let chips: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(ToString::to_string)
        .collect();
    if chips.is_empty() {
        KeywordList::Empty {
            placeholder: NO_KEYWORDS_TEXT.to_string(),
        }
    } else {
        KeywordList::Chips(chips)
    }
}

#[must_use]
pub fn scan_result_view(result: &ScanResult) -> ScanResultView {
    ScanResultView {
        explanation_source: result.explanation.clone(),
        explanation_html: render_markdown(&result.explanation),
        medications: medication_cards(&result.meds_data),
        keywords: keyword_list(&result.keywords),
    }
}

/// Images are inlined as a `data:` URL; every other type gets a document tile.
#[must_use]
pub fn scan_preview(file: &SelectedFile) -> ScanPreview {
    if file.is_image() {
        ScanPreview::Image {
            file_name: file.file_name.clone(),
            data_url: format!(
                "data:{};base64,{}",
                file.content_type,
                STANDARD.encode(&file.bytes)
            ),
        }
    } else {
        ScanPreview::Document {
            file_name: file.file_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: Option<&str>) -> MedicationEntry {
        MedicationEntry {
            name: name.map(ToString::to_string),
            dosage: Some("500 mg".to_string()),
            instructions: None,
        }
    }

    #[test]
    fn card_omitted_only_for_missing_or_uncertain_names() {
        let entries = vec![
            entry(Some("Doliprane")),
            entry(None),
            entry(Some("   ")),
            entry(Some("incertain")),
            entry(Some("Nom INCERTAIN (flou)")),
            entry(Some("Amoxicilline")),
        ];
        let cards = medication_cards(&entries);
        let names: Vec<&str> = cards.iter().map(|card| card.name.as_str()).collect();
        assert_eq!(names, vec!["Doliprane", "Amoxicilline"]);
        assert_eq!(cards[0].dosage, "500 mg");
        assert_eq!(cards[0].instructions, "");
    }

    #[test]
    fn transcript_skips_system_turns_and_falls_back_to_greeting() {
        let system_only = vec![ChatMessage {
            role: MessageRole::System,
            content: "prompt".to_string(),
        }];
        assert_eq!(transcript_nodes(&system_only), vec![empty_state()]);

        let mixed = vec![
            ChatMessage {
                role: MessageRole::System,
                content: "prompt".to_string(),
            },
            ChatMessage {
                role: MessageRole::User,
                content: "J'ai mal".to_string(),
            },
            ChatMessage {
                role: MessageRole::Assistant,
                content: "**Repos**".to_string(),
            },
        ];
        let nodes = transcript_nodes(&mixed);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], user_message("J'ai mal"));
        assert_eq!(nodes[1], assistant_message("**Repos**"));
    }

    #[test]
    fn user_text_is_never_parsed_as_markdown() {
        let ChatNodeKind::Message { body, .. } = user_message("**a**\n<b>") else {
            panic!("expected message node");
        };
        assert_eq!(body.html(), "**a**<br>&lt;b&gt;");
    }

    #[test]
    fn fairness_thresholds() {
        let ChatNodeKind::FairnessCard(card) = fairness_card(&FairnessMetrics {
            complexity_score: 5.0,
            toxicity_score: 3.0,
            bias_detected: false,
            reasoning: "ok".to_string(),
        }) else {
            panic!("expected fairness card");
        };
        assert!(card.complexity_flagged);
        assert!(!card.toxicity_flagged);
    }

    #[test]
    fn history_rows_bind_their_own_actions() {
        let sessions = vec![
            SessionSummary {
                id: "a".to_string(),
                title: "Premier".to_string(),
                timestamp: None,
            },
            SessionSummary {
                id: "b".to_string(),
                title: "Second".to_string(),
                timestamp: None,
            },
        ];
        let panel = history_panel(&sessions, Some("b"));
        assert_eq!(panel.delete_all, Some(UiAction::DeleteAllSessions));
        assert!(!panel.rows[0].active);
        assert!(panel.rows[1].active);
        assert_eq!(panel.rows[0].delete, UiAction::DeleteSession("a".to_string()));

        let empty = history_panel(&[], Some("b"));
        assert!(empty.rows.is_empty());
        assert_eq!(empty.delete_all, None);
    }

    #[test]
    fn keywords_placeholder_when_nothing_usable() {
        assert_eq!(
            keyword_list(&[" ".to_string()]),
            KeywordList::Empty {
                placeholder: NO_KEYWORDS_TEXT.to_string()
            }
        );
        assert_eq!(
            keyword_list(&["fièvre".to_string()]),
            KeywordList::Chips(vec!["fièvre".to_string()])
        );
    }

    #[test]
    fn image_preview_is_a_data_url() {
        let file = SelectedFile::new("boite.png", vec![1, 2, 3]);
        assert_eq!(
            scan_preview(&file),
            ScanPreview::Image {
                file_name: "boite.png".to_string(),
                data_url: "data:image/png;base64,AQID".to_string(),
            }
        );
    }
}
