use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::builder::{self, XrRawResources};
use crate::client::RandrBackend;
use crate::error::XrMonitorManagerError;
use crate::reconciler;
use crate::xr_monitor::XrTopology;

/// The kind of action that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Refresh,
    Activate,
    Deactivate,
    SetResolution,
}

/// Actions that can be sent to the monitor manager
///
/// Indexes refer to the snapshot the operator was looking at:
/// `Activate` indexes `offline_outputs`, the others `active_outputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XrMonitorAction {
    /// Re-read the topology from the server
    Refresh,
    /// Turn an offline output on
    Activate { index: usize },
    /// Turn an active output off
    Deactivate { index: usize },
    /// Switch an active output to another resolution
    SetResolution {
        index: usize,
        /// Resolution label, e.g. "1280x720"
        label: String,
    },
}

impl XrMonitorAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Refresh => ActionKind::Refresh,
            Self::Activate { .. } => ActionKind::Activate,
            Self::Deactivate { .. } => ActionKind::Deactivate,
            Self::SetResolution { .. } => ActionKind::SetResolution,
        }
    }
}

/// Outcome of an action, ready to be rendered
#[derive(Debug, Clone)]
pub enum XrMonitorEvent {
    /// A fresh snapshot replaced the previous one
    Updated(Arc<XrTopology>),
    /// The action failed, the previous snapshot is still current
    ActionFailed {
        action: ActionKind,
        error: XrMonitorManagerError,
    },
}

/// Owns the protocol backend and the current topology snapshot
///
/// All reads and writes go through here, from the thread that owns the
/// manager. Snapshots are replaced wholesale after every successful write.
pub struct XrMonitorManager<B> {
    backend: B,
    topology: Arc<XrTopology>,
}

impl<B: RandrBackend> XrMonitorManager<B> {
    /// Create a manager holding an empty snapshot
    ///
    /// Call [`refresh`](Self::refresh) to read the server state.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use xrx_monitors::{RandrClient, XrMonitorManager};
    ///
    /// let client = RandrClient::connect(None).unwrap();
    /// let mut manager = XrMonitorManager::new(client);
    /// let topology = manager.refresh().unwrap();
    /// ```
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            topology: Arc::new(XrTopology::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The current snapshot
    pub fn topology(&self) -> Arc<XrTopology> {
        Arc::clone(&self.topology)
    }

    /// Re-read and rebuild the topology
    ///
    /// # Errors
    ///
    /// Returns `QueryError` or `TopologyError`; the previous snapshot stays
    /// current in that case.
    pub fn refresh(&mut self) -> Result<Arc<XrTopology>, XrMonitorManagerError> {
        let topology = builder::build(self.fetch()?)?;
        debug!(
            timestamp = topology.config_timestamp,
            modes = topology.modes.len(),
            controllers = topology.controllers.len(),
            active = topology.active_outputs.len(),
            offline = topology.offline_outputs.len(),
            "topology refreshed"
        );
        self.topology = Arc::new(topology);
        Ok(self.topology())
    }

    fn fetch(&self) -> Result<XrRawResources, XrMonitorManagerError> {
        let resources = self.backend.fetch_resources()?;
        let controllers = resources
            .controllers
            .iter()
            .map(|&id| {
                self.backend
                    .fetch_controller_info(id, resources.config_timestamp)
                    .map(|info| (id, info))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = resources
            .outputs
            .iter()
            .map(|&id| self.backend.fetch_output_info(id).map(|info| (id, info)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(XrRawResources {
            config_timestamp: resources.config_timestamp,
            modes: resources.modes,
            controllers,
            outputs,
        })
    }

    /// Carry out an action and return the snapshot that follows it
    ///
    /// Local precondition failures never reach the server. A write is always
    /// followed by a full refresh.
    pub fn apply_action(
        &mut self,
        action: &XrMonitorAction,
    ) -> Result<Arc<XrTopology>, XrMonitorManagerError> {
        let request = match action {
            XrMonitorAction::Refresh => return self.refresh(),
            XrMonitorAction::Activate { index } => {
                reconciler::plan_activate(&self.topology, *index)?
            }
            XrMonitorAction::Deactivate { index } => {
                reconciler::plan_deactivate(&self.topology, *index)?
            }
            XrMonitorAction::SetResolution { index, label } => {
                reconciler::plan_set_resolution(&self.topology, *index, label)?
            }
        };

        let timestamp = self.backend.apply_config(&request)?;
        info!(
            controller = request.controller,
            mode = ?request.mode,
            x = request.position.x,
            y = request.position.y,
            timestamp,
            "{:?} applied",
            action.kind()
        );
        self.refresh()
    }

    /// Like [`apply_action`](Self::apply_action), with failures turned into
    /// an event for the operator
    pub fn handle_action(&mut self, action: XrMonitorAction) -> XrMonitorEvent {
        match self.apply_action(&action) {
            Ok(topology) => XrMonitorEvent::Updated(topology),
            Err(error) => {
                warn!("{:?} failed: {error}", action.kind());
                XrMonitorEvent::ActionFailed {
                    action: action.kind(),
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRandrServer;

    #[test]
    fn new_manager_starts_with_an_empty_snapshot() {
        let manager = XrMonitorManager::new(MockRandrServer::dual_head());
        assert_eq!(*manager.topology(), XrTopology::default());
    }

    #[test]
    fn failed_refresh_keeps_the_previous_snapshot() {
        let mut manager = XrMonitorManager::new(MockRandrServer::dual_head());
        let before = manager.refresh().unwrap();

        manager.backend().set_fail_queries(true);
        let event = manager.handle_action(XrMonitorAction::Refresh);

        assert!(matches!(
            event,
            XrMonitorEvent::ActionFailed {
                action: ActionKind::Refresh,
                error: XrMonitorManagerError::QueryError(_),
            }
        ));
        assert!(Arc::ptr_eq(&before, &manager.topology()));
    }

    #[test]
    fn failed_refresh_after_a_write_keeps_the_previous_snapshot() {
        let mut manager = XrMonitorManager::new(MockRandrServer::dual_head());
        let before = manager.refresh().unwrap();

        manager.backend().set_fail_queries(true);
        let event = manager.handle_action(XrMonitorAction::Activate { index: 0 });

        assert!(matches!(
            event,
            XrMonitorEvent::ActionFailed {
                action: ActionKind::Activate,
                error: XrMonitorManagerError::QueryError(_),
            }
        ));
        assert_eq!(manager.backend().requests().len(), 1);
        assert!(Arc::ptr_eq(&before, &manager.topology()));
    }

    #[test]
    fn rejected_config_is_reported_and_snapshot_kept() {
        let mut manager = XrMonitorManager::new(MockRandrServer::dual_head());
        let before = manager.refresh().unwrap();

        manager.backend().set_reject_configs(true);
        let event = manager.handle_action(XrMonitorAction::SetResolution {
            index: 0,
            label: "1280x720".into(),
        });

        match event {
            XrMonitorEvent::ActionFailed { action, error } => {
                assert_eq!(action, ActionKind::SetResolution);
                assert!(matches!(
                    error,
                    XrMonitorManagerError::ConfigRejectedError { controller: 10, .. }
                ));
                assert!(!error.is_local());
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(Arc::ptr_eq(&before, &manager.topology()));
    }

    #[test]
    fn local_failures_never_reach_the_server() {
        let mut manager = XrMonitorManager::new(MockRandrServer::dual_head());
        manager.refresh().unwrap();

        let err = manager
            .apply_action(&XrMonitorAction::SetResolution {
                index: 0,
                label: "3840x2160".into(),
            })
            .unwrap_err();

        assert!(err.is_local());
        assert!(manager.backend().requests().is_empty());
    }
}
