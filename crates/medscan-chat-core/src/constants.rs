pub const EMPTY_STATE_TEXT: &str = "👋 Bonjour ! Je suis votre assistant santé.";
pub const THINKING_TEXT: &str = "Le modèle réfléchit...";
pub const CONNECTION_ERROR_TEXT: &str = "Erreur de connexion.";

pub const CONFIRM_DELETE_SESSION: &str = "Supprimer cette conversation ?";
pub const CONFIRM_DELETE_ALL_SESSIONS: &str = "Supprimer toutes les conversations ?";
pub const DELETE_ALL_LABEL: &str = "Tout effacer";

pub const NO_ACTIVE_SESSION_NOTICE: &str = "Aucune session active.";
pub const NO_FILE_SELECTED_NOTICE: &str = "Veuillez sélectionner un fichier.";
pub const ANALYSIS_FAILED_NOTICE: &str = "Erreur lors de l'analyse";
pub const SESSION_CREATE_FAILED_NOTICE: &str = "Impossible de créer une nouvelle conversation.";

pub const NO_KEYWORDS_TEXT: &str = "Aucun mot-clé détecté.";
pub const DOCUMENT_PREVIEW_ICON: &str = "📄";

/// Marker the vision pipeline writes into fields it could not read.
pub const UNCERTAIN_MARKER: &str = "INCERTAIN";

/// Toxicity above this (out of 10) is flagged on the fairness card.
pub const TOXICITY_THRESHOLD: f64 = 3.0;
/// Patient-facing replies should stay below this complexity (out of 10).
pub const COMPLEXITY_TARGET: f64 = 5.0;
