use std::collections::HashSet;

use tracing::debug;

use crate::client::{XrControllerInfo, XrOutputInfo};
use crate::error::XrBuildError;
use crate::xr_monitor::{
    ConfigTimestamp, ControllerId, OutputId, XrConnection, XrController, XrMode,
    XrOutput, XrTopology,
};

/// Everything one refresh read from the server, in server order
#[derive(Debug, Clone, Default)]
pub struct XrRawResources {
    pub config_timestamp: ConfigTimestamp,
    pub modes: Vec<XrMode>,
    pub controllers: Vec<(ControllerId, XrControllerInfo)>,
    pub outputs: Vec<(OutputId, XrOutputInfo)>,
}

/// Resolve raw replies into a topology snapshot
///
/// Disconnected outputs only show up in `output_refs`. Connected outputs
/// without a current mode, or without any supported mode, are offline.
///
/// # Errors
///
/// Fails when the server reports the same mode, controller or output id
/// twice.
pub fn build(raw: XrRawResources) -> Result<XrTopology, XrBuildError> {
    let mut seen = HashSet::new();
    for mode in &raw.modes {
        if !seen.insert(mode.id) {
            return Err(XrBuildError::DuplicateMode(mode.id));
        }
    }
    let modes = raw.modes;
    let find_mode = |id| modes.iter().find(|m: &&XrMode| m.id == id).copied();

    let mut seen = HashSet::new();
    let mut controllers = Vec::with_capacity(raw.controllers.len());
    for (id, info) in raw.controllers {
        if !seen.insert(id) {
            return Err(XrBuildError::DuplicateController(id));
        }
        // an unknown mode id is an idle controller
        controllers.push(XrController {
            id,
            mode: info.mode.and_then(find_mode),
            position: info.position,
            outputs: info.outputs,
        });
    }

    let mut seen = HashSet::new();
    let mut output_refs = Vec::with_capacity(raw.outputs.len());
    let mut active_outputs = Vec::new();
    let mut offline_outputs = Vec::new();
    for (id, info) in raw.outputs {
        if !seen.insert(id) {
            return Err(XrBuildError::DuplicateOutput(id));
        }
        output_refs.push(id);

        if info.connection != XrConnection::Connected {
            debug!(output = id, name = %info.name, "skipping disconnected output");
            continue;
        }

        let mut supported: Vec<XrMode> = Vec::with_capacity(info.modes.len());
        for mode in info.modes.iter().filter_map(|&m| find_mode(m)) {
            if supported.iter().all(|s| s.resolution != mode.resolution) {
                supported.push(mode);
            }
        }

        let current_mode = info
            .controller
            .and_then(|c| controllers.iter().find(|ctrl| ctrl.id == c))
            .and_then(|ctrl| ctrl.mode);

        let output = XrOutput {
            id,
            name: info.name,
            connection: info.connection,
            controller: info.controller,
            current_mode,
            modes: supported,
        };

        if output.modes.is_empty() || output.current_mode.is_none() {
            offline_outputs.push(output);
        } else {
            active_outputs.push(output);
        }
    }

    Ok(XrTopology {
        modes,
        controllers,
        active_outputs,
        offline_outputs,
        output_refs,
        config_timestamp: raw.config_timestamp,
    })
}
