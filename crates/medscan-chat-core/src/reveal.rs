use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::ControllerError;
use crate::markdown::render_markdown;
use crate::render::assistant_revealing;
use crate::state::{SharedViewState, ViewState};
use crate::surface::{ChatNodeKind, MessageBody, NodeId};

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(15);

/// How assistant replies appear in the chat body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    Instant,
    Typewriter { interval: Duration },
}

impl Default for RevealMode {
    fn default() -> Self {
        Self::Typewriter {
            interval: DEFAULT_REVEAL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed,
    /// The view moved on or the node was removed before the reveal finished.
    Superseded,
}

#[derive(Debug)]
pub struct RevealHandle {
    node: NodeId,
    task: JoinHandle<RevealOutcome>,
}

impl RevealHandle {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> RevealOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(node = %self.node, error = %error, "reveal task aborted");
                RevealOutcome::Superseded
            }
        }
    }
}

/// Puts `node` into the revealing state and spawns the task that types
/// `source` into it. Refused while another reveal owns the same node.
pub(crate) fn start_reveal(
    shared: &SharedViewState,
    state: &mut ViewState,
    node: NodeId,
    source: &str,
    interval: Duration,
) -> Result<RevealHandle, ControllerError> {
    if state.reveals.contains(&node) {
        return Err(ControllerError::RevealInProgress(node));
    }
    if !state.surface.replace(node, assistant_revealing(source)) {
        return Ok(RevealHandle {
            node,
            task: tokio::spawn(async { RevealOutcome::Superseded }),
        });
    }
    state.reveals.insert(node);
    let generation = state.view_generation;
    let task = tokio::spawn(run_reveal(
        shared.clone(),
        node,
        source.to_string(),
        generation,
        interval,
    ));
    Ok(RevealHandle { node, task })
}

async fn run_reveal(
    shared: SharedViewState,
    node: NodeId,
    source: String,
    generation: u64,
    interval: Duration,
) -> RevealOutcome {
    for ch in source.chars() {
        tokio::time::sleep(interval).await;
        let mut state = shared.lock().await;
        if state.view_generation != generation {
            return abandon(&mut state, node, generation);
        }
        let advanced = match state.surface.node_kind_mut(node) {
            Some(ChatNodeKind::Message {
                body: MessageBody::Revealing { shown, .. },
                ..
            }) => {
                shown.push(ch);
                true
            }
            _ => false,
        };
        if !advanced {
            return abandon(&mut state, node, generation);
        }
        state.surface.scroll_to_bottom();
    }

    let mut state = shared.lock().await;
    if state.view_generation != generation {
        return abandon(&mut state, node, generation);
    }
    let html = render_markdown(&source);
    let finished = match state.surface.node_kind_mut(node) {
        Some(ChatNodeKind::Message { body, .. }) if body.is_revealing() => {
            *body = MessageBody::Rich { source, html };
            true
        }
        _ => false,
    };
    if !finished {
        return abandon(&mut state, node, generation);
    }
    state.reveals.remove(&node);
    state.surface.scroll_to_bottom();
    RevealOutcome::Completed
}

fn abandon(state: &mut ViewState, node: NodeId, generation: u64) -> RevealOutcome {
    state.reveals.remove(&node);
    tracing::debug!(node = %node, generation, "reveal superseded");
    RevealOutcome::Superseded
}
