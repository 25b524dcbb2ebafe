use std::io::{self, BufRead, Write};

use medscan_chat_core::{
    ChatNode, ChatNodeKind, ChatSurface, FairnessCard, HistoryPanel, KeywordList, MessageBody,
    MessageRole, ScanPanel, ScanPhase, ScanPreview, Tab, UiAction, UserPrompt,
};

/// Confirmations and notices on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl UserPrompt for TerminalPrompt {
    fn confirm(&self, question: &str) -> bool {
        print!("{question} [o/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(error) => {
                tracing::warn!(error = %error, "reading confirmation failed");
                false
            }
        }
    }

    fn notify(&self, message: &str) {
        println!("⚠ {message}");
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "o" | "oui" | "y" | "yes"
    )
}

pub fn render_node(node: &ChatNode) -> String {
    match &node.kind {
        ChatNodeKind::EmptyState { text } => text.clone(),
        ChatNodeKind::Message { role, body } => {
            let label = match role {
                MessageRole::User => "Vous",
                MessageRole::Assistant | MessageRole::System => "Assistant",
            };
            format!("{label} > {}", message_text(body))
        }
        ChatNodeKind::Thinking { text } => format!("… {text}"),
        ChatNodeKind::ConnectionError { text } => format!("✗ {text}"),
        ChatNodeKind::FairnessCard(card) => render_fairness(card),
    }
}

fn message_text(body: &MessageBody) -> &str {
    match body {
        MessageBody::Plain(text) => text,
        MessageBody::Rich { source, .. } => source,
        MessageBody::Revealing { shown, .. } => shown,
    }
}

fn render_fairness(card: &FairnessCard) -> String {
    let flag = |flagged: bool| if flagged { " ⚠" } else { "" };
    let mut line = format!(
        "  [équité] complexité {:.1}/10{} · toxicité {:.1}/10{} · biais : {}",
        card.complexity_score,
        flag(card.complexity_flagged),
        card.toxicity_score,
        flag(card.toxicity_flagged),
        if card.bias_detected { "oui ⚠" } else { "non" }
    );
    if !card.reasoning.trim().is_empty() {
        line.push_str(&format!("\n  {}", card.reasoning.trim()));
    }
    line
}

pub fn render_chat(surface: &ChatSurface) -> String {
    surface
        .chat_nodes()
        .iter()
        .map(render_node)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(panel: &HistoryPanel) -> String {
    if panel.rows.is_empty() {
        return "Aucune conversation enregistrée.".to_string();
    }
    let mut lines: Vec<String> = panel
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            format!(
                "{} {:>2}. {}  ({})",
                if row.active { "*" } else { " " },
                index + 1,
                row.title,
                row.session_id
            )
        })
        .collect();
    if panel.delete_all == Some(UiAction::DeleteAllSessions) {
        lines.push("    /delete-all pour tout effacer".to_string());
    }
    lines.join("\n")
}

pub fn render_scan(panel: &ScanPanel) -> String {
    let mut lines = Vec::new();
    match panel.phase {
        ScanPhase::Ready => lines.push("Choisissez un document avec /file <chemin>.".to_string()),
        ScanPhase::FileChosen => lines.push(format!(
            "Document : {} (lancer /analyze)",
            panel.file_label.as_deref().unwrap_or_default()
        )),
        ScanPhase::Loading => lines.push("Analyse en cours...".to_string()),
        ScanPhase::Complete => {}
    }
    match &panel.preview {
        Some(ScanPreview::Image { file_name, .. }) => lines.push(format!("🖼 {file_name}")),
        Some(ScanPreview::Document { file_name }) => lines.push(format!("📄 {file_name}")),
        None => {}
    }
    if let Some(result) = &panel.result {
        lines.push(result.explanation_source.clone());
        for card in &result.medications {
            lines.push(format!(
                "  💊 {} | {} | {}",
                card.name, card.dosage, card.instructions
            ));
        }
        match &result.keywords {
            KeywordList::Chips(chips) => lines.push(format!("  Mots-clés : {}", chips.join(", "))),
            KeywordList::Empty { placeholder } => lines.push(format!("  {placeholder}")),
        }
    }
    if !panel.post_actions.is_empty() {
        lines.push("/scan-reset pour une nouvelle analyse, /tab chat pour poser une question".to_string());
    }
    lines.join("\n")
}

/// Projects whichever tab is active.
pub fn render_surface(surface: &ChatSurface) -> String {
    match surface.active_tab {
        Tab::Chat => render_chat(surface),
        Tab::Scan => render_scan(&surface.scan),
    }
}

/// Part of `text` beyond the first `printed` characters.
pub fn unseen_suffix(text: &str, printed: usize) -> &str {
    text.char_indices()
        .nth(printed)
        .map_or("", |(offset, _)| &text[offset..])
}

#[cfg(test)]
mod tests {
    use medscan_chat_core::{
        FairnessMetrics, SessionSummary, assistant_message, fairness_card, history_panel,
        user_message,
    };

    use super::*;

    #[test]
    fn chat_projection_labels_speakers() {
        let mut surface = ChatSurface::default();
        surface.append(user_message("Bonjour"));
        surface.append(assistant_message("**Repos** conseillé"));
        surface.append(fairness_card(&FairnessMetrics {
            complexity_score: 6.0,
            toxicity_score: 0.0,
            bias_detected: false,
            reasoning: String::new(),
        }));

        let text = render_chat(&surface);
        assert_eq!(
            text,
            "Vous > Bonjour\nAssistant > **Repos** conseillé\n  [équité] complexité 6.0/10 ⚠ · toxicité 0.0/10 · biais : non"
        );
    }

    #[test]
    fn history_projection_numbers_rows_and_marks_active() {
        let sessions = vec![
            SessionSummary {
                id: "a".to_string(),
                title: "Migraine".to_string(),
                timestamp: None,
            },
            SessionSummary {
                id: "b".to_string(),
                title: "Ordonnance".to_string(),
                timestamp: None,
            },
        ];
        let text = render_history(&history_panel(&sessions, Some("b")));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   1. Migraine  (a)");
        assert_eq!(lines[1], "*  2. Ordonnance  (b)");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn unseen_suffix_counts_characters_not_bytes() {
        assert_eq!(unseen_suffix("éèà", 1), "èà");
        assert_eq!(unseen_suffix("abc", 3), "");
        assert_eq!(unseen_suffix("", 0), "");
    }

    #[test]
    fn confirmation_accepts_french_and_english() {
        assert!(is_yes("o\n"));
        assert!(is_yes(" Oui "));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("non"));
    }
}
