use std::path::PathBuf;

use medscan_api_client::{LITERACY_LEVELS, UserProfile};
use medscan_chat_core::Tab;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRef {
    /// 1-based position in the printed history list.
    Index(usize),
    Id(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub age: Option<u32>,
    pub language: Option<String>,
    pub literacy_level: Option<String>,
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut UserProfile) {
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(language) = &self.language {
            profile.language.clone_from(language);
        }
        if let Some(level) = &self.literacy_level {
            profile.literacy_level.clone_from(level);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Send(String),
    NewSession,
    History,
    Open(SessionRef),
    Delete(SessionRef),
    DeleteAll,
    File(PathBuf),
    Analyze,
    ScanReset,
    Tab(Tab),
    Profile(ProfileUpdate),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("unknown tab `{0}`, expected chat or scan")]
    InvalidTab(String),
    #[error("invalid profile setting `{0}`")]
    InvalidProfile(String),
}

pub const HELP: &str = "\
Commandes :
  <texte>              envoyer un message (terminer une ligne par \\ pour continuer)
  /new                 nouvelle conversation
  /history             afficher l'historique
  /open <n|id>         ouvrir une conversation
  /delete <n|id>       supprimer une conversation
  /delete-all          supprimer toutes les conversations
  /file <chemin>       choisir un document à analyser
  /analyze             analyser le document choisi
  /scan-reset          nouvelle analyse
  /tab chat|scan       changer d'onglet
  /profile age=45 language=English level=3
  /help                cette aide
  /quit                quitter";

/// Parses one logical input line. Blank input yields `None`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(ShellCommand::Send(line.trim().to_string())));
    };
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let command = match name {
        "new" => ShellCommand::NewSession,
        "history" | "h" => ShellCommand::History,
        "open" => ShellCommand::Open(session_ref("open", argument)?),
        "delete" => ShellCommand::Delete(session_ref("delete", argument)?),
        "delete-all" => ShellCommand::DeleteAll,
        "file" => {
            if argument.is_empty() {
                return Err(CommandError::MissingArgument("file"));
            }
            ShellCommand::File(PathBuf::from(argument))
        }
        "analyze" => ShellCommand::Analyze,
        "scan-reset" => ShellCommand::ScanReset,
        "tab" => match argument {
            "chat" => ShellCommand::Tab(Tab::Chat),
            "scan" => ShellCommand::Tab(Tab::Scan),
            "" => return Err(CommandError::MissingArgument("tab")),
            other => return Err(CommandError::InvalidTab(other.to_string())),
        },
        "profile" => ShellCommand::Profile(parse_profile(argument)?),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn session_ref(command: &'static str, argument: &str) -> Result<SessionRef, CommandError> {
    if argument.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    Ok(match argument.parse::<usize>() {
        Ok(index) if index > 0 => SessionRef::Index(index),
        _ => SessionRef::Id(argument.to_string()),
    })
}

/// `key=value` pairs; words without `=` extend the previous value, so
/// `level=Niveau 3 (Initié)` needs no quoting.
fn parse_profile(argument: &str) -> Result<ProfileUpdate, CommandError> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for word in argument.split_whitespace() {
        if let Some((key, value)) = word.split_once('=') {
            pairs.push((key.to_ascii_lowercase(), value.to_string()));
        } else if let Some((_, value)) = pairs.last_mut() {
            value.push(' ');
            value.push_str(word);
        } else {
            return Err(CommandError::InvalidProfile(word.to_string()));
        }
    }
    if pairs.is_empty() {
        return Err(CommandError::MissingArgument("profile"));
    }

    let mut update = ProfileUpdate::default();
    for (key, value) in pairs {
        match key.as_str() {
            "age" => {
                update.age = Some(
                    value
                        .parse()
                        .map_err(|_| CommandError::InvalidProfile(format!("age={value}")))?,
                );
            }
            "language" | "lang" => update.language = Some(value),
            "level" | "literacy" | "literacy_level" => {
                update.literacy_level = Some(literacy_level(&value));
            }
            _ => return Err(CommandError::InvalidProfile(format!("{key}={value}"))),
        }
    }
    Ok(update)
}

/// `1`..`5` select a known level; any other text is passed through.
fn literacy_level(value: &str) -> String {
    value
        .parse::<usize>()
        .ok()
        .and_then(|level| level.checked_sub(1))
        .and_then(|index| LITERACY_LEVELS.get(index))
        .map_or_else(|| value.to_string(), |level| (*level).to_string())
}

/// Joins physical lines ending in `\` into one message.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn push(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(head) = line.strip_suffix('\\') {
            self.pending.push_str(head);
            self.pending.push('\n');
            return None;
        }
        self.pending.push_str(line);
        Some(std::mem::take(&mut self.pending))
    }

    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_command("  J'ai de la fièvre  "),
            Ok(Some(ShellCommand::Send("J'ai de la fièvre".to_string())))
        );
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn session_references_accept_index_or_id() {
        assert_eq!(
            parse_command("/open 2"),
            Ok(Some(ShellCommand::Open(SessionRef::Index(2))))
        );
        assert_eq!(
            parse_command("/delete 5f2c-aa"),
            Ok(Some(ShellCommand::Delete(SessionRef::Id("5f2c-aa".to_string()))))
        );
        assert_eq!(
            parse_command("/open 0"),
            Ok(Some(ShellCommand::Open(SessionRef::Id("0".to_string()))))
        );
        assert_eq!(
            parse_command("/open"),
            Err(CommandError::MissingArgument("open"))
        );
    }

    #[test]
    fn tabs_and_unknown_commands() {
        assert_eq!(
            parse_command("/tab scan"),
            Ok(Some(ShellCommand::Tab(Tab::Scan)))
        );
        assert_eq!(
            parse_command("/tab settings"),
            Err(CommandError::InvalidTab("settings".to_string()))
        );
        assert_eq!(
            parse_command("/frobnicate"),
            Err(CommandError::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn profile_values_may_contain_spaces() {
        let Ok(Some(ShellCommand::Profile(update))) =
            parse_command("/profile age=45 level=Niveau 3 (Initié) lang=English")
        else {
            panic!("expected profile command");
        };
        assert_eq!(update.age, Some(45));
        assert_eq!(update.literacy_level.as_deref(), Some("Niveau 3 (Initié)"));
        assert_eq!(update.language.as_deref(), Some("English"));

        let mut profile = UserProfile::default();
        update.apply(&mut profile);
        assert_eq!(profile.age, 45);
        assert_eq!(profile.language, "English");
    }

    #[test]
    fn numeric_level_selects_known_label() {
        let Ok(Some(ShellCommand::Profile(update))) = parse_command("/profile level=5") else {
            panic!("expected profile command");
        };
        assert_eq!(update.literacy_level.as_deref(), Some("Niveau 5 (Expert)"));
        assert_eq!(
            parse_command("/profile age=old"),
            Err(CommandError::InvalidProfile("age=old".to_string()))
        );
        assert_eq!(
            parse_command("/profile height=180"),
            Err(CommandError::InvalidProfile("height=180".to_string()))
        );
    }

    #[test]
    fn trailing_backslash_continues_the_message() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push("Bonjour,\\\n"), None);
        assert!(buffer.is_continuing());
        assert_eq!(buffer.push("j'ai une question"), Some("Bonjour,\nj'ai une question".to_string()));
        assert!(!buffer.is_continuing());
        assert_eq!(buffer.push("/quit"), Some("/quit".to_string()));
    }
}
