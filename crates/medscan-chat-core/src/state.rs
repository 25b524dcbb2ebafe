use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::surface::{ChatSurface, NodeId};
use crate::upload::SelectedFile;

pub(crate) type SharedViewState = Arc<Mutex<ViewState>>;

/// Everything the controller mutates. Async results carry the generation they
/// were issued under and are dropped when it no longer matches.
#[derive(Debug, Default)]
pub(crate) struct ViewState {
    pub(crate) current_session_id: Option<String>,
    pub(crate) surface: ChatSurface,
    pub(crate) selected_file: Option<SelectedFile>,
    pub(crate) view_generation: u64,
    pub(crate) history_generation: u64,
    pub(crate) scan_generation: u64,
    pub(crate) reveals: HashSet<NodeId>,
}

impl ViewState {
    pub(crate) fn bump_view(&mut self) -> u64 {
        self.view_generation = self.view_generation.wrapping_add(1);
        self.view_generation
    }

    pub(crate) fn bump_history(&mut self) -> u64 {
        self.history_generation = self.history_generation.wrapping_add(1);
        self.history_generation
    }

    pub(crate) fn bump_scan(&mut self) -> u64 {
        self.scan_generation = self.scan_generation.wrapping_add(1);
        self.scan_generation
    }

    pub(crate) fn notice(&mut self, message: &str) {
        self.surface.push_notice(message);
    }
}
