//! In-memory stand-ins for the X server.
//!
//! [`MockRandrServer`] keeps a mutable resource graph and applies accepted
//! writes to it, so a refresh after a write observes the change the way a
//! real server would. [`MockChangeEventSource`] replays a scripted sequence
//! of notifications. Both are always compiled so integration tests and demos
//! can run without a display.

use std::{
    cell::RefCell,
    collections::VecDeque,
    sync::Mutex,
    thread,
    time::Duration,
};

use crate::client::{
    RandrBackend, XrConfigRequest, XrControllerInfo, XrOutputInfo, XrResources,
};
use crate::error::XrMonitorManagerError;
use crate::listener::{XrChangeEvent, XrChangeEventSource};
use crate::xr_monitor::{
    ConfigTimestamp, ControllerId, ModeId, OutputId, XrConnection, XrMode,
    XrPosition, XrResolution,
};

#[derive(Debug, Default)]
struct MockState {
    modes: Vec<XrMode>,
    controllers: Vec<(ControllerId, XrControllerInfo)>,
    outputs: Vec<(OutputId, XrOutputInfo)>,
    config_timestamp: ConfigTimestamp,
    timestamp: ConfigTimestamp,
    requests: Vec<XrConfigRequest>,
    fail_queries: bool,
    reject_configs: bool,
}

/// A fake RandR server
#[derive(Debug)]
pub struct MockRandrServer {
    state: RefCell<MockState>,
}

impl Default for MockRandrServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRandrServer {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState {
                config_timestamp: 1,
                ..Default::default()
            }),
        }
    }

    /// Two outputs, one lit, one waiting for a controller
    ///
    /// Modes 1 = 1920x1080 and 2 = 1280x720. Controller 10 drives "DP-1"
    /// (output 100) in mode 1, controller 11 is free. "HDMI-1" (output 101)
    /// supports mode 2 and is unbound.
    pub fn dual_head() -> Self {
        Self::new()
            .with_mode(1, 1920, 1080)
            .with_mode(2, 1280, 720)
            .with_controller(10, Some(1), XrPosition::default(), vec![100])
            .with_controller(11, None, XrPosition::default(), vec![])
            .with_output(100, "DP-1", XrConnection::Connected, vec![1, 2], Some(10))
            .with_output(101, "HDMI-1", XrConnection::Connected, vec![2], None)
    }

    pub fn with_mode(self, id: ModeId, width: u16, height: u16) -> Self {
        self.state.borrow_mut().modes.push(XrMode {
            id,
            resolution: XrResolution { width, height },
        });
        self
    }

    pub fn with_controller(
        self,
        id: ControllerId,
        mode: Option<ModeId>,
        position: XrPosition,
        outputs: Vec<OutputId>,
    ) -> Self {
        self.state.borrow_mut().controllers.push((
            id,
            XrControllerInfo {
                mode,
                position,
                outputs,
            },
        ));
        self
    }

    pub fn with_output(
        self,
        id: OutputId,
        name: &str,
        connection: XrConnection,
        modes: Vec<ModeId>,
        controller: Option<ControllerId>,
    ) -> Self {
        self.state.borrow_mut().outputs.push((
            id,
            XrOutputInfo {
                connection,
                modes,
                controller,
                name: name.to_owned(),
            },
        ));
        self
    }

    /// Every write received, accepted or not
    pub fn requests(&self) -> Vec<XrConfigRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn config_timestamp(&self) -> ConfigTimestamp {
        self.state.borrow().config_timestamp
    }

    /// Behave as if a hotplug changed the configuration behind our back
    pub fn simulate_reconfigure(&self) {
        self.state.borrow_mut().config_timestamp += 1;
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.state.borrow_mut().fail_queries = fail;
    }

    pub fn set_reject_configs(&self, reject: bool) {
        self.state.borrow_mut().reject_configs = reject;
    }

    fn check_queries(&self) -> Result<(), XrMonitorManagerError> {
        if self.state.borrow().fail_queries {
            return Err(XrMonitorManagerError::QueryError(
                "connection reset by peer".into(),
            ));
        }
        Ok(())
    }
}

impl RandrBackend for MockRandrServer {
    fn fetch_resources(&self) -> Result<XrResources, XrMonitorManagerError> {
        self.check_queries()?;
        let state = self.state.borrow();
        Ok(XrResources {
            modes: state.modes.clone(),
            controllers: state.controllers.iter().map(|(id, _)| *id).collect(),
            outputs: state.outputs.iter().map(|(id, _)| *id).collect(),
            config_timestamp: state.config_timestamp,
        })
    }

    fn fetch_controller_info(
        &self,
        id: ControllerId,
        _timestamp: ConfigTimestamp,
    ) -> Result<XrControllerInfo, XrMonitorManagerError> {
        self.check_queries()?;
        self.state
            .borrow()
            .controllers
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| XrMonitorManagerError::QueryError(format!("BadCrtc {}", id)))
    }

    fn fetch_output_info(
        &self,
        id: OutputId,
    ) -> Result<XrOutputInfo, XrMonitorManagerError> {
        self.check_queries()?;
        self.state
            .borrow()
            .outputs
            .iter()
            .find(|(oid, _)| *oid == id)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| XrMonitorManagerError::QueryError(format!("BadOutput {}", id)))
    }

    fn apply_config(
        &self,
        request: &XrConfigRequest,
    ) -> Result<ConfigTimestamp, XrMonitorManagerError> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());
        let controller = request.controller;
        let rejected = |reason: &str| XrMonitorManagerError::ConfigRejectedError {
            controller,
            reason: reason.to_owned(),
        };

        if request.timestamp != state.config_timestamp {
            return Err(XrMonitorManagerError::ConfigConflictError { controller });
        }
        if state.reject_configs {
            return Err(rejected("Failed"));
        }
        if let Some(mode) = request.mode {
            if state.modes.iter().all(|m| m.id != mode) {
                return Err(rejected("BadMatch"));
            }
            let unsupported = request.outputs.iter().any(|id| {
                state
                    .outputs
                    .iter()
                    .find(|(oid, _)| oid == id)
                    .is_none_or(|(_, info)| !info.modes.contains(&mode))
            });
            if unsupported {
                return Err(rejected("BadMatch"));
            }
        }

        let Some(index) = state.controllers.iter().position(|(id, _)| *id == controller) else {
            return Err(rejected("BadCrtc"));
        };
        let previous = std::mem::replace(
            &mut state.controllers[index].1,
            XrControllerInfo {
                mode: request.mode,
                position: request.position,
                outputs: request.outputs.clone(),
            },
        );

        for (id, info) in state.outputs.iter_mut() {
            if request.outputs.contains(id) {
                info.controller = Some(controller);
            } else if previous.outputs.contains(id) {
                info.controller = None;
            }
        }

        state.timestamp += 1;
        Ok(state.timestamp)
    }
}

/// Replays scripted notifications, then stays quiet
pub struct MockChangeEventSource {
    subscribe_fails: bool,
    script: Mutex<VecDeque<Result<XrChangeEvent, XrMonitorManagerError>>>,
}

impl MockChangeEventSource {
    pub fn new(script: Vec<Result<XrChangeEvent, XrMonitorManagerError>>) -> Self {
        Self {
            subscribe_fails: false,
            script: Mutex::new(script.into()),
        }
    }

    pub fn failing_subscribe() -> Self {
        Self {
            subscribe_fails: true,
            script: Mutex::new(VecDeque::new()),
        }
    }
}

impl XrChangeEventSource for MockChangeEventSource {
    fn subscribe(&self) -> Result<(), XrMonitorManagerError> {
        if self.subscribe_fails {
            return Err(XrMonitorManagerError::QueryError("BadAccess".into()));
        }
        Ok(())
    }

    fn next_change_event(
        &self,
        timeout: Duration,
    ) -> Result<Option<XrChangeEvent>, XrMonitorManagerError> {
        let next = self
            .script
            .lock()
            .map_err(|e| XrMonitorManagerError::QueryError(e.to_string()))?
            .pop_front();
        match next {
            Some(event) => event.map(Some),
            None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
