//! Tracking-session readiness.

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::CancelToken;

/// Lifecycle of the external AR session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    None,
    /// The platform cannot run a tracking session at all.
    Unsupported,
    CheckingAvailability,
    NeedsInstall,
    Installing,
    Ready,
    SessionInitializing,
    /// Tracking is running; capture and detection may start.
    SessionTracking,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("tracking is not supported on this platform")]
    Unsupported,
    #[error("session state publisher went away before tracking started")]
    Closed,
    #[error("cancelled while waiting for the session")]
    Cancelled,
}

/// Suspend until the session reports [`SessionState::SessionTracking`].
pub async fn wait_until_tracking(
    states: &mut watch::Receiver<SessionState>,
    cancel: &CancelToken,
) -> Result<(), SessionError> {
    let state = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SessionError::Cancelled),
        res = states.wait_for(|s| {
            matches!(s, SessionState::SessionTracking | SessionState::Unsupported)
        }) => *res.map_err(|_| SessionError::Closed)?,
    };

    match state {
        SessionState::Unsupported => Err(SessionError::Unsupported),
        _ => {
            info!("session is tracking");
            Ok(())
        }
    }
}
