use medscan_api_client::ApiClientError;
use thiserror::Error;

use crate::surface::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("medscan_no_active_session")]
    NoActiveSession,
    #[error("medscan_no_file_selected")]
    NoFileSelected,
    #[error("medscan_reveal_in_progress:{0}")]
    RevealInProgress(NodeId),
    #[error(transparent)]
    Api(#[from] ApiClientError),
}

impl ControllerError {
    #[must_use]
    pub fn api(&self) -> Option<&ApiClientError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }
}
