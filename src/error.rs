use thiserror::Error;

use crate::xr_monitor::{ControllerId, ModeId, OutputId};

/// Malformed resource data reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XrBuildError {
    #[error("mode id {0} reported more than once")]
    DuplicateMode(ModeId),
    #[error("controller id {0} reported more than once")]
    DuplicateController(ControllerId),
    #[error("output id {0} reported more than once")]
    DuplicateOutput(OutputId),
}

/// Errors that can occur when using the monitor manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XrMonitorManagerError {
    /// Failed to reach the X server or it lacks RandR
    #[error("connection failed: {0}")]
    ConnectionError(String),
    /// A read request failed, the refresh was aborted
    #[error("query failed: {0}")]
    QueryError(String),
    /// The server reported an inconsistent resource graph
    #[error("inconsistent topology: {0}")]
    TopologyError(#[from] XrBuildError),
    /// The write carried a stale config timestamp
    #[error("configuration of controller {controller} is outdated, refresh and retry")]
    ConfigConflictError { controller: ControllerId },
    /// The server refused the requested mode/output combination
    #[error("controller {controller} rejected the configuration: {reason}")]
    ConfigRejectedError {
        controller: ControllerId,
        reason: String,
    },
    #[error("no free controller available")]
    NoFreeControllerError,
    #[error("no controller drives output '{output}'")]
    NoMatchingControllerError { output: String },
    #[error("output '{output}' does not support {label}")]
    UnknownResolutionError { output: String, label: String },
    #[error("no output at index {index}")]
    UnknownOutputError { index: usize },
    #[error("output '{output}' advertises no modes")]
    NoSupportedModesError { output: String },
}

impl XrMonitorManagerError {
    /// Precondition failures detected before anything is sent to the server
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NoFreeControllerError
                | Self::NoMatchingControllerError { .. }
                | Self::UnknownResolutionError { .. }
                | Self::UnknownOutputError { .. }
                | Self::NoSupportedModesError { .. }
        )
    }
}
