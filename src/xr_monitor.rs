use x11rb::protocol::randr;

/// Server-assigned identity of a RandR mode
pub type ModeId = u32;
/// Server-assigned identity of a RandR CRTC (controller)
pub type ControllerId = u32;
/// Server-assigned identity of a RandR output
pub type OutputId = u32;
/// Opaque configuration version token issued by the server
pub type ConfigTimestamp = u32;

/// Connection state of a physical output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrConnection {
    Connected,
    Disconnected,
    Unknown,
}

impl XrConnection {
    pub(crate) fn from_randr(c: randr::Connection) -> Self {
        match c {
            randr::Connection::CONNECTED => Self::Connected,
            randr::Connection::DISCONNECTED => Self::Disconnected,
            _ => Self::Unknown,
        }
    }
}

/// Represents the resolution of a mode
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct XrResolution {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
}

impl XrResolution {
    /// Label shown to the operator, e.g. `1920x1080`
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Represents the position of a controller in the virtual screen
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct XrPosition {
    /// X coordinate
    pub x: i16,
    /// Y coordinate
    pub y: i16,
}

/// A hardware-advertised mode. Never mutated once built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XrMode {
    /// RandR mode id
    pub id: ModeId,
    /// Screen resolution
    pub resolution: XrResolution,
}

impl XrMode {
    /// Resolution label of this mode
    pub fn label(&self) -> String {
        self.resolution.label()
    }
}

/// A CRTC: the scanout engine driving zero or more outputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XrController {
    /// RandR CRTC id
    pub id: ControllerId,
    /// Mode currently driving the controller, `None` when idle
    pub mode: Option<XrMode>,
    /// Offset in the virtual screen
    pub position: XrPosition,
    /// Outputs this controller scans out to
    pub outputs: Vec<OutputId>,
}

impl XrController {
    /// A controller without a mode is available for activation
    pub fn is_free(&self) -> bool {
        self.mode.is_none()
    }
}

/// Represents a connected output (physical connector)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XrOutput {
    /// RandR output id
    pub id: OutputId,
    /// Connector name (e.g., "DP-1", "HDMI-1")
    pub name: String,
    /// Connection state reported by the server
    pub connection: XrConnection,
    /// Controller the output is bound to, if any
    pub controller: Option<ControllerId>,
    /// Mode of the bound controller
    pub current_mode: Option<XrMode>,
    /// Supported modes, one per resolution, in server order
    pub modes: Vec<XrMode>,
}

impl XrOutput {
    /// Labels of the supported resolutions, duplicates already removed
    pub fn resolution_labels(&self) -> Vec<String> {
        self.modes.iter().map(XrMode::label).collect()
    }

    /// Label of the current mode, `None` when the output is off
    pub fn selected_label(&self) -> Option<String> {
        self.current_mode.as_ref().map(XrMode::label)
    }

    /// Supported mode matching a resolution label
    pub fn find_mode(&self, label: &str) -> Option<&XrMode> {
        self.modes.iter().find(|m| m.label() == label)
    }
}

/// What the shell renders for an active output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XrOutputView {
    /// Output name such as `DP-1`
    pub name: String,
    /// Resolution labels in list order
    pub resolutions: Vec<String>,
    /// Label of the current resolution
    pub selected: Option<String>,
    /// Top-left corner of the bound controller
    pub position: XrPosition,
    /// Whether a display is attached
    pub connected: bool,
    /// The first active output is the primary one
    pub primary: bool,
}

/// One consistent view of the server's display configuration
///
/// A snapshot is never patched. Every change is a server write followed by
/// a fresh read that replaces the whole value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XrTopology {
    /// All modes known to the server, in server order
    pub modes: Vec<XrMode>,
    /// All controllers, in server order
    pub controllers: Vec<XrController>,
    /// Connected outputs with a resolved current mode
    pub active_outputs: Vec<XrOutput>,
    /// Connected outputs without a current mode, candidates for activation
    pub offline_outputs: Vec<XrOutput>,
    /// Every output id the server reported, disconnected ones included
    pub output_refs: Vec<OutputId>,
    /// Timestamp to echo on every write against this snapshot
    pub config_timestamp: ConfigTimestamp,
}

impl XrTopology {
    /// Look up a mode by id
    pub fn mode(&self, id: ModeId) -> Option<&XrMode> {
        self.modes.iter().find(|m| m.id == id)
    }

    /// Look up a controller by id
    pub fn controller(&self, id: ControllerId) -> Option<&XrController> {
        self.controllers.iter().find(|c| c.id == id)
    }

    /// First controller without a mode, in server order
    pub fn first_free_controller(&self) -> Option<&XrController> {
        self.controllers.iter().find(|c| c.is_free())
    }

    /// Summed width of every mode currently scanned out
    pub fn occupied_width(&self) -> u32 {
        self.controllers
            .iter()
            .filter_map(|c| c.mode)
            .map(|m| u32::from(m.resolution.width))
            .sum()
    }

    /// Render views of the active outputs, in order
    pub fn active_views(&self) -> Vec<XrOutputView> {
        self.active_outputs
            .iter()
            .enumerate()
            .map(|(i, output)| XrOutputView {
                name: output.name.clone(),
                resolutions: output.resolution_labels(),
                selected: output.selected_label(),
                position: output
                    .controller
                    .and_then(|id| self.controller(id))
                    .map(|c| c.position)
                    .unwrap_or_default(),
                connected: output.connection == XrConnection::Connected,
                primary: i == 0,
            })
            .collect()
    }

    /// Names of the outputs that can be activated, in order
    pub fn offline_names(&self) -> Vec<String> {
        self.offline_outputs.iter().map(|o| o.name.clone()).collect()
    }
}
