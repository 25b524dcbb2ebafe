use std::path::Path;

use medscan_api_client::{HealthApi, UploadRequest, UserProfile};

use crate::constants::{ANALYSIS_FAILED_NOTICE, NO_ACTIVE_SESSION_NOTICE, NO_FILE_SELECTED_NOTICE};
use crate::controller::{SessionController, ViewUpdate};
use crate::error::ControllerError;
use crate::render::{scan_preview, scan_result_view};
use crate::state::ViewState;
use crate::surface::{ScanPanel, ScanPhase, Tab, UiAction};

/// A file picked for analysis, held in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "document".to_string(), |name| name.to_string_lossy().into_owned());
        Ok(Self::new(file_name, bytes))
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

pub(crate) fn reset_scan_panel(state: &mut ViewState) {
    state.bump_scan();
    state.selected_file = None;
    state.surface.scan = ScanPanel::default();
}

impl<A: HealthApi + ?Sized> SessionController<A> {
    pub async fn select_file(&self, file: Option<SelectedFile>) {
        let mut state = self.shared().lock().await;
        let scan = &mut state.surface.scan;
        match &file {
            Some(file) => {
                scan.phase = ScanPhase::FileChosen;
                scan.file_label = Some(file.file_name.clone());
                scan.analyze_visible = true;
            }
            None => {
                scan.phase = ScanPhase::Ready;
                scan.file_label = None;
                scan.analyze_visible = false;
            }
        }
        state.selected_file = file;
    }

    pub async fn analyze(&self, profile: &UserProfile) -> Result<ViewUpdate, ControllerError> {
        let prepared = {
            let mut state = self.shared().lock().await;
            match (state.current_session_id.clone(), state.selected_file.clone()) {
                (None, _) => Err(ControllerError::NoActiveSession),
                (Some(_), None) => Err(ControllerError::NoFileSelected),
                (Some(session_id), Some(file)) => {
                    let generation = state.bump_scan();
                    let scan = &mut state.surface.scan;
                    scan.phase = ScanPhase::Loading;
                    scan.upload_visible = false;
                    scan.analyze_visible = false;
                    scan.preview = Some(scan_preview(&file));
                    scan.result = None;
                    scan.post_actions.clear();
                    Ok((session_id, file, generation))
                }
            }
        };
        let (session_id, file, generation) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                let notice = match error {
                    ControllerError::NoActiveSession => NO_ACTIVE_SESSION_NOTICE,
                    _ => NO_FILE_SELECTED_NOTICE,
                };
                self.notice(notice).await;
                return Err(error);
            }
        };

        tracing::info!(
            session_id = %session_id,
            file_name = %file.file_name,
            content_type = %file.content_type,
            generation,
            "uploading document for analysis"
        );
        let request = UploadRequest {
            session_id,
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes,
            profile: profile.clone(),
        };
        let result = match self.api().upload(request).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(generation, error = %error, "document analysis failed");
                let notice = error
                    .detail()
                    .map_or_else(|| ANALYSIS_FAILED_NOTICE.to_string(), ToString::to_string);
                {
                    let mut state = self.shared().lock().await;
                    if state.scan_generation == generation {
                        reset_scan_panel(&mut state);
                    }
                }
                self.notice(&notice).await;
                return Err(error.into());
            }
        };

        {
            let mut state = self.shared().lock().await;
            if state.scan_generation != generation {
                tracing::debug!(generation, "stale scan result dropped");
                return Ok(ViewUpdate::Stale);
            }
            let scan = &mut state.surface.scan;
            scan.phase = ScanPhase::Complete;
            scan.result = Some(scan_result_view(&result));
            scan.post_actions = vec![UiAction::ResetScan, UiAction::SwitchTab(Tab::Chat)];
        }

        if let Err(error) = self.reload_transcript().await {
            tracing::warn!(error = %error, "transcript reload after analysis failed");
        }
        Ok(ViewUpdate::Applied)
    }

    pub async fn reset_scan(&self) {
        reset_scan_panel(&mut *self.shared().lock().await);
    }
}
