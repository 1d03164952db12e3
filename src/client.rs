use std::{fmt::Display, sync::Arc, time::Duration};

use tracing::debug;
use x11rb::{
    connection::{Connection, RequestConnection},
    errors::ReplyError,
    protocol::{
        Event,
        randr::{self, ConnectionExt as _},
        xproto::Window,
    },
    rust_connection::RustConnection,
};

use crate::error::XrMonitorManagerError;
use crate::listener::{XrChangeEvent, XrChangeEventSource};
use crate::xr_monitor::{
    ConfigTimestamp, ControllerId, ModeId, OutputId, XrConnection, XrMode,
    XrPosition, XrResolution,
};

/// RandR 1.2 introduced the CRTC/output requests everything here relies on
const MIN_RANDR_VERSION: (u32, u32) = (1, 2);

/// Reply of the screen resources request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrResources {
    pub modes: Vec<XrMode>,
    pub controllers: Vec<ControllerId>,
    pub outputs: Vec<OutputId>,
    pub config_timestamp: ConfigTimestamp,
}

/// Reply of the controller (CRTC) info request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XrControllerInfo {
    /// `None` when the controller is idle
    pub mode: Option<ModeId>,
    pub position: XrPosition,
    pub outputs: Vec<OutputId>,
}

/// Reply of the output info request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrOutputInfo {
    pub connection: XrConnection,
    /// Supported mode ids, in server order
    pub modes: Vec<ModeId>,
    pub controller: Option<ControllerId>,
    pub name: String,
}

/// A single controller write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrConfigRequest {
    pub controller: ControllerId,
    /// Config timestamp of the snapshot the write was planned against
    pub timestamp: ConfigTimestamp,
    pub position: XrPosition,
    /// `None` releases the controller
    pub mode: Option<ModeId>,
    pub outputs: Vec<OutputId>,
}

/// Read and write requests against a RandR capable server
pub trait RandrBackend {
    /// Modes, controllers, outputs and the current config timestamp
    fn fetch_resources(&self) -> Result<XrResources, XrMonitorManagerError>;

    /// Mode, position and bound outputs of one controller
    fn fetch_controller_info(
        &self,
        id: ControllerId,
        timestamp: ConfigTimestamp,
    ) -> Result<XrControllerInfo, XrMonitorManagerError>;

    /// Name, connection state, supported modes and controller of one output
    fn fetch_output_info(
        &self,
        id: OutputId,
    ) -> Result<XrOutputInfo, XrMonitorManagerError>;

    /// Returns the server timestamp of the change
    ///
    /// # Errors
    ///
    /// `ConfigConflictError` when `request.timestamp` is stale,
    /// `ConfigRejectedError` when the hardware refuses the combination.
    fn apply_config(
        &self,
        request: &XrConfigRequest,
    ) -> Result<ConfigTimestamp, XrMonitorManagerError>;
}

/// RandR client over an x11rb connection
///
/// The connection is reference counted so the event listener can block on
/// it from its own thread while requests are issued from the session.
pub struct RandrClient {
    conn: Arc<RustConnection>,
    root: Window,
}

impl RandrClient {
    /// Connect to the X server and check the RandR extension
    ///
    /// # Arguments
    ///
    /// * `display` - Display name such as `":0"`, `None` uses `$DISPLAY`
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the server is unreachable, the screen
    /// does not exist or RandR is missing or too old.
    pub fn connect(display: Option<&str>) -> Result<Self, XrMonitorManagerError> {
        let (conn, screen_num) = x11rb::connect(display).map_err(connection_err)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| {
                XrMonitorManagerError::ConnectionError(format!(
                    "screen {} not found",
                    screen_num
                ))
            })?;

        conn.extension_information(randr::X11_EXTENSION_NAME)
            .map_err(connection_err)?
            .ok_or_else(|| {
                XrMonitorManagerError::ConnectionError(
                    "RandR extension unavailable".into(),
                )
            })?;

        let version = conn
            .randr_query_version(1, 5)
            .map_err(connection_err)?
            .reply()
            .map_err(connection_err)?;
        if (version.major_version, version.minor_version) < MIN_RANDR_VERSION {
            return Err(XrMonitorManagerError::ConnectionError(format!(
                "RandR {}.{} is too old, need {}.{}",
                version.major_version,
                version.minor_version,
                MIN_RANDR_VERSION.0,
                MIN_RANDR_VERSION.1,
            )));
        }
        debug!(
            root,
            "RandR {}.{} available", version.major_version, version.minor_version
        );

        Ok(Self {
            conn: Arc::new(conn),
            root,
        })
    }

    /// Change notifications for the same connection and root window
    pub fn event_source(&self) -> RandrEventSource {
        RandrEventSource {
            conn: Arc::clone(&self.conn),
            root: self.root,
        }
    }
}

impl RandrBackend for RandrClient {
    fn fetch_resources(&self) -> Result<XrResources, XrMonitorManagerError> {
        debug!(root = self.root, "get screen resources");
        let reply = self
            .conn
            .randr_get_screen_resources(self.root)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;

        Ok(XrResources {
            modes: reply
                .modes
                .iter()
                .map(|m| XrMode {
                    id: m.id,
                    resolution: XrResolution {
                        width: m.width,
                        height: m.height,
                    },
                })
                .collect(),
            controllers: reply.crtcs,
            outputs: reply.outputs,
            config_timestamp: reply.config_timestamp,
        })
    }

    fn fetch_controller_info(
        &self,
        id: ControllerId,
        timestamp: ConfigTimestamp,
    ) -> Result<XrControllerInfo, XrMonitorManagerError> {
        debug!(crtc = id, timestamp, "get crtc info");
        let reply = self
            .conn
            .randr_get_crtc_info(id, timestamp)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;

        Ok(XrControllerInfo {
            mode: non_null(reply.mode),
            position: XrPosition {
                x: reply.x,
                y: reply.y,
            },
            outputs: reply.outputs,
        })
    }

    fn fetch_output_info(
        &self,
        id: OutputId,
    ) -> Result<XrOutputInfo, XrMonitorManagerError> {
        debug!(output = id, "get output info");
        let reply = self
            .conn
            .randr_get_output_info(id, x11rb::CURRENT_TIME)
            .map_err(query_err)?
            .reply()
            .map_err(query_err)?;

        Ok(XrOutputInfo {
            connection: XrConnection::from_randr(reply.connection),
            modes: reply.modes,
            controller: non_null(reply.crtc),
            name: String::from_utf8_lossy(&reply.name).into_owned(),
        })
    }

    fn apply_config(
        &self,
        request: &XrConfigRequest,
    ) -> Result<ConfigTimestamp, XrMonitorManagerError> {
        debug!(?request, "set crtc config");
        let controller = request.controller;
        let reply = self
            .conn
            .randr_set_crtc_config(
                controller,
                x11rb::CURRENT_TIME,
                request.timestamp,
                request.position.x,
                request.position.y,
                request.mode.unwrap_or(x11rb::NONE),
                randr::Rotation::ROTATE0,
                &request.outputs,
            )
            .map_err(query_err)?
            .reply()
            .map_err(|e| match e {
                ReplyError::X11Error(err) => {
                    XrMonitorManagerError::ConfigRejectedError {
                        controller,
                        reason: format!("{:?}", err.error_kind),
                    }
                }
                ReplyError::ConnectionError(err) => query_err(err),
            })?;

        match reply.status {
            randr::SetConfig::SUCCESS => Ok(reply.timestamp),
            randr::SetConfig::INVALID_CONFIG_TIME | randr::SetConfig::INVALID_TIME => {
                Err(XrMonitorManagerError::ConfigConflictError { controller })
            }
            status => Err(XrMonitorManagerError::ConfigRejectedError {
                controller,
                reason: format!("server returned {:?}", status),
            }),
        }
    }
}

/// Screen change notifications on a shared connection
pub struct RandrEventSource {
    conn: Arc<RustConnection>,
    root: Window,
}

impl XrChangeEventSource for RandrEventSource {
    fn subscribe(&self) -> Result<(), XrMonitorManagerError> {
        let mask = randr::NotifyMask::SCREEN_CHANGE
            | randr::NotifyMask::CRTC_CHANGE
            | randr::NotifyMask::OUTPUT_CHANGE;
        self.conn
            .randr_select_input(self.root, mask)
            .map_err(query_err)?
            .check()
            .map_err(query_err)
    }

    fn next_change_event(
        &self,
        timeout: Duration,
    ) -> Result<Option<XrChangeEvent>, XrMonitorManagerError> {
        if let Some(event) = self.conn.poll_for_event().map_err(query_err)? {
            return Ok(Some(decode_event(event)));
        }

        let mut poll_fd = [rustix::event::PollFd::new(
            self.conn.stream(),
            rustix::event::PollFlags::IN,
        )];
        let timeout = rustix::time::Timespec {
            tv_sec: timeout.as_secs() as _,
            tv_nsec: timeout.subsec_nanos() as _,
        };
        let _ = rustix::event::poll(&mut poll_fd, Some(&timeout));

        Ok(self.conn.poll_for_event().map_err(query_err)?.map(decode_event))
    }
}

fn decode_event(event: Event) -> XrChangeEvent {
    match event {
        Event::RandrScreenChangeNotify(_) => XrChangeEvent::ScreenChanged,
        Event::RandrNotify(notify) => match notify.sub_code {
            randr::Notify::CRTC_CHANGE => XrChangeEvent::CrtcChanged,
            randr::Notify::OUTPUT_CHANGE => XrChangeEvent::OutputChanged,
            _ => XrChangeEvent::Other,
        },
        _ => XrChangeEvent::Other,
    }
}

// RandR uses 0 for "no mode" and "no crtc"
fn non_null(id: u32) -> Option<u32> {
    (id != x11rb::NONE).then_some(id)
}

fn connection_err(e: impl Display) -> XrMonitorManagerError {
    XrMonitorManagerError::ConnectionError(e.to_string())
}

fn query_err(e: impl Display) -> XrMonitorManagerError {
    XrMonitorManagerError::QueryError(e.to_string())
}
