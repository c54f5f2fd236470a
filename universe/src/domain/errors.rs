// Domain-level errors. None of these are fatal to a window.

use crate::domain::object::ObjectId;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The local window does not own the object it tried to mutate.
    NotOwner(ObjectId),
    UnknownObject(ObjectId),
    AlreadyExists(ObjectId),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotOwner(id) => write!(f, "object {id} is not owned by this window"),
            SyncError::UnknownObject(id) => write!(f, "unknown object {id}"),
            SyncError::AlreadyExists(id) => write!(f, "object {id} already exists"),
        }
    }
}

impl std::error::Error for SyncError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    NotConnected,
    AlreadyConnected,
    InvalidCode(String),
    SelfMerge,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::NotConnected => write!(f, "not connected to the relay"),
            RelayError::AlreadyConnected => write!(f, "already connected to the relay"),
            RelayError::InvalidCode(code) => write!(f, "invalid join code {code:?}"),
            RelayError::SelfMerge => write!(f, "cannot merge with your own universe"),
        }
    }
}

impl std::error::Error for RelayError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    NotFound(String),
    Unreadable { path: String, reason: String },
    Cancelled,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound(path) => write!(f, "{path} not found"),
            FsError::Unreadable { path, reason } => write!(f, "cannot read {path}: {reason}"),
            FsError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for FsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Unsupported(&'static str),
    Failed(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Unsupported(what) => write!(f, "host does not support {what}"),
            HostError::Failed(reason) => write!(f, "host call failed: {reason}"),
        }
    }
}

impl std::error::Error for HostError {}
