// Use-case level messages exchanged between windows, the relay and the host.

use crate::domain::input::{Joystick, Key, PointerEvent};
use crate::domain::math::Vec3;
use crate::domain::object::{ObjectId, ObjectKind, PropsPatch, SceneObject};
use crate::domain::ports::{DirEntry, WindowSpec};
use crate::domain::quality::QualityPreset;
use crate::domain::window::WindowRect;
use crate::domain::FsError;

/// Object replication events, shared by the local bus and the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEvent {
    Add { object: SceneObject },
    Move { id: ObjectId, position: Vec3 },
    Update { id: ObjectId, properties: PropsPatch },
    Remove { id: ObjectId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    Object(ObjectEvent),
    /// Asks every peer to re-broadcast its owned objects.
    ObjectRequest,
    WindowAnnounce { label: String, bounds: WindowRect },
    WindowUpdate { label: String, bounds: WindowRect },
    WindowClose { label: String },
}

/// A bus message tagged with the label of the window that published it.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEnvelope {
    pub sender: String,
    pub message: BusMessage,
}

/// Messages the client sends to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutbound {
    Connect { code: String },
    Heartbeat { code: String },
    MergeRequest { from_code: String, to_code: String },
    Object { code: String, event: ObjectEvent },
}

/// Messages the relay sends to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayInbound {
    Connected { code: String },
    ConnectError { message: String },
    MergeObjects { from_code: String, objects: Vec<SceneObject> },
    MergeError { message: String },
    UniverseMerged { code: String },
    UniverseDisconnected { code: String },
    Object { code: String, event: ObjectEvent },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient, non-blocking user notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Requests for the relay transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayCommand {
    Open,
    Send(RelayOutbound),
    Close,
}

/// Requests for the host windowing shell.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    RequestPointerCapture,
    ReleasePointerCapture,
    OpenPath(String),
    CreateWindow(WindowSpec),
}

/// Side effects produced by a session, executed outside the window loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Publish(BusEnvelope),
    Relay(RelayCommand),
    Host(HostRequest),
    /// List `path` and feed the result back as `WindowInput::DirectoryListed`.
    LoadDirectory(String),
    /// List the parent of `from`, or `root` when `from` is a filesystem
    /// root. Fed back as `WindowInput::DirectoryListed`.
    LoadParent { from: String, root: String },
    /// Show the native directory picker and feed the result back.
    PickDirectory,
    Notify(Notice),
}

/// Transport-level relay events fed back into the window loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayTransportEvent {
    Opened,
    Message(RelayInbound),
    Closed { reason: String },
}

/// Everything a window loop consumes, in arrival order.
#[derive(Debug, Clone)]
pub enum WindowInput {
    Bus(BusEnvelope),
    Bounds(WindowRect),
    KeyDown(Key),
    KeyUp(Key),
    Pointer(PointerEvent),
    Joystick(Option<Joystick>),
    Tap,
    CaptureChanged(bool),
    /// An external modal opened (true) or closed (false).
    Modal(bool),
    AddObject(ObjectKind),
    RemoveObject(ObjectId),
    UpdateObject { id: ObjectId, patch: PropsPatch },
    ToggleViewMode,
    SetQuality(QualityPreset),
    OpenWindow,
    LoadCity(String),
    PickCity,
    DirectoryPicked(Result<String, FsError>),
    DirectoryListed { path: String, result: Result<Vec<DirEntry>, FsError> },
    RelayConnect,
    RelayDisconnect,
    RequestMerge(String),
    Relay(RelayTransportEvent),
}
