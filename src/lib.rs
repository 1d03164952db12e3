mod builder;
mod client;
pub mod config;
mod error;
mod listener;
pub mod mock;
mod reconciler;
mod state;
mod xr_monitor;

pub use builder::{XrRawResources, build};
pub use client::{
    RandrBackend, RandrClient, RandrEventSource, XrConfigRequest, XrControllerInfo,
    XrOutputInfo, XrResources,
};
pub use error::{XrBuildError, XrMonitorManagerError};
pub use listener::{XrChangeEvent, XrChangeEventSource, XrEventListener};
pub use reconciler::{plan_activate, plan_deactivate, plan_set_resolution};
pub use state::{ActionKind, XrMonitorAction, XrMonitorEvent, XrMonitorManager};
pub use xr_monitor::{
    ConfigTimestamp, ControllerId, ModeId, OutputId, XrConnection, XrController,
    XrMode, XrOutput, XrOutputView, XrPosition, XrResolution, XrTopology,
};
