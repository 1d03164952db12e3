use crate::client::XrConfigRequest;
use crate::error::XrMonitorManagerError;
use crate::xr_monitor::{XrOutput, XrPosition, XrTopology};

/// Plan turning on the offline output at `index`
///
/// Takes the first free controller, places the output right of everything
/// currently scanned out and starts it in its first supported mode.
pub fn plan_activate(
    topology: &XrTopology,
    index: usize,
) -> Result<XrConfigRequest, XrMonitorManagerError> {
    let output = offline_output(topology, index)?;
    let controller = topology
        .first_free_controller()
        .ok_or(XrMonitorManagerError::NoFreeControllerError)?;
    let mode = output.modes.first().ok_or_else(|| {
        XrMonitorManagerError::NoSupportedModesError {
            output: output.name.clone(),
        }
    })?;

    // the server rejects offsets beyond the screen anyway
    let x = i16::try_from(topology.occupied_width()).unwrap_or(i16::MAX);

    Ok(XrConfigRequest {
        controller: controller.id,
        timestamp: topology.config_timestamp,
        position: XrPosition { x, y: 0 },
        mode: Some(mode.id),
        outputs: vec![output.id],
    })
}

/// Plan releasing the controller that drives the active output at `index`
pub fn plan_deactivate(
    topology: &XrTopology,
    index: usize,
) -> Result<XrConfigRequest, XrMonitorManagerError> {
    let output = active_output(topology, index)?;
    let no_match = || XrMonitorManagerError::NoMatchingControllerError {
        output: output.name.clone(),
    };
    let current = output.current_mode.ok_or_else(no_match)?;

    let bound = output
        .controller
        .and_then(|id| topology.controller(id))
        .filter(|c| c.mode == Some(current));
    let controller = bound
        .or_else(|| {
            topology
                .controllers
                .iter()
                .find(|c| c.mode.map(|m| m.id) == Some(current.id))
        })
        .ok_or_else(no_match)?;

    Ok(XrConfigRequest {
        controller: controller.id,
        timestamp: topology.config_timestamp,
        position: XrPosition::default(),
        mode: None,
        outputs: Vec::new(),
    })
}

/// Plan switching the active output at `index` to the mode labelled `label`
///
/// The bound controller keeps its position and output bindings.
pub fn plan_set_resolution(
    topology: &XrTopology,
    index: usize,
    label: &str,
) -> Result<XrConfigRequest, XrMonitorManagerError> {
    let output = active_output(topology, index)?;
    let mode = output.find_mode(label).ok_or_else(|| {
        XrMonitorManagerError::UnknownResolutionError {
            output: output.name.clone(),
            label: label.to_owned(),
        }
    })?;
    let controller = output
        .controller
        .and_then(|id| topology.controller(id))
        .ok_or_else(|| XrMonitorManagerError::NoMatchingControllerError {
            output: output.name.clone(),
        })?;

    Ok(XrConfigRequest {
        controller: controller.id,
        timestamp: topology.config_timestamp,
        position: controller.position,
        mode: Some(mode.id),
        outputs: controller.outputs.clone(),
    })
}

fn active_output(
    topology: &XrTopology,
    index: usize,
) -> Result<&XrOutput, XrMonitorManagerError> {
    topology
        .active_outputs
        .get(index)
        .ok_or(XrMonitorManagerError::UnknownOutputError { index })
}

fn offline_output(
    topology: &XrTopology,
    index: usize,
) -> Result<&XrOutput, XrMonitorManagerError> {
    topology
        .offline_outputs
        .get(index)
        .ok_or(XrMonitorManagerError::UnknownOutputError { index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr_monitor::{
        XrConnection, XrController, XrMode, XrResolution,
    };

    const A: XrMode = XrMode {
        id: 1,
        resolution: XrResolution {
            width: 1920,
            height: 1080,
        },
    };
    const B: XrMode = XrMode {
        id: 2,
        resolution: XrResolution {
            width: 1280,
            height: 720,
        },
    };

    fn topology() -> XrTopology {
        XrTopology {
            modes: vec![A, B],
            controllers: vec![
                XrController {
                    id: 10,
                    mode: Some(A),
                    position: XrPosition::default(),
                    outputs: vec![100],
                },
                XrController {
                    id: 11,
                    mode: None,
                    position: XrPosition::default(),
                    outputs: vec![],
                },
            ],
            active_outputs: vec![XrOutput {
                id: 100,
                name: "DP-1".into(),
                connection: XrConnection::Connected,
                controller: Some(10),
                current_mode: Some(A),
                modes: vec![A, B],
            }],
            offline_outputs: vec![XrOutput {
                id: 101,
                name: "HDMI-1".into(),
                connection: XrConnection::Connected,
                controller: None,
                current_mode: None,
                modes: vec![B],
            }],
            output_refs: vec![100, 101],
            config_timestamp: 42,
        }
    }

    #[test]
    fn activate_uses_free_controller_right_of_existing_outputs() {
        let request = plan_activate(&topology(), 0).unwrap();
        assert_eq!(
            request,
            XrConfigRequest {
                controller: 11,
                timestamp: 42,
                position: XrPosition { x: 1920, y: 0 },
                mode: Some(B.id),
                outputs: vec![101],
            }
        );
    }

    #[test]
    fn activate_without_free_controller_fails() {
        let mut topology = topology();
        topology.controllers.truncate(1);
        assert_eq!(
            plan_activate(&topology, 0),
            Err(XrMonitorManagerError::NoFreeControllerError)
        );
    }

    #[test]
    fn activate_modeless_output_fails() {
        let mut topology = topology();
        topology.offline_outputs[0].modes.clear();
        assert!(matches!(
            plan_activate(&topology, 0),
            Err(XrMonitorManagerError::NoSupportedModesError { .. })
        ));
    }

    #[test]
    fn deactivate_releases_the_bound_controller() {
        let request = plan_deactivate(&topology(), 0).unwrap();
        assert_eq!(request.controller, 10);
        assert_eq!(request.mode, None);
        assert!(request.outputs.is_empty());
        assert_eq!(request.timestamp, 42);
    }

    #[test]
    fn deactivate_falls_back_to_a_controller_with_the_same_mode() {
        let mut topology = topology();
        topology.active_outputs[0].controller = Some(77);
        let request = plan_deactivate(&topology, 0).unwrap();
        assert_eq!(request.controller, 10);
    }

    #[test]
    fn deactivate_without_matching_controller_fails() {
        let mut topology = topology();
        topology.controllers[0].mode = Some(B);
        assert_eq!(
            plan_deactivate(&topology, 0),
            Err(XrMonitorManagerError::NoMatchingControllerError {
                output: "DP-1".into()
            })
        );
    }

    #[test]
    fn set_resolution_keeps_position_and_bindings() {
        let mut topology = topology();
        topology.controllers[0].position = XrPosition { x: 0, y: 300 };
        let request = plan_set_resolution(&topology, 0, "1280x720").unwrap();
        assert_eq!(request.controller, 10);
        assert_eq!(request.mode, Some(B.id));
        assert_eq!(request.position, XrPosition { x: 0, y: 300 });
        assert_eq!(request.outputs, vec![100]);
    }

    #[test]
    fn set_unknown_resolution_fails() {
        assert_eq!(
            plan_set_resolution(&topology(), 0, "640x480"),
            Err(XrMonitorManagerError::UnknownResolutionError {
                output: "DP-1".into(),
                label: "640x480".into(),
            })
        );
    }

    #[test]
    fn out_of_range_index_fails() {
        assert_eq!(
            plan_deactivate(&topology(), 3),
            Err(XrMonitorManagerError::UnknownOutputError { index: 3 })
        );
        assert_eq!(
            plan_activate(&topology(), 1),
            Err(XrMonitorManagerError::UnknownOutputError { index: 1 })
        );
    }
}
