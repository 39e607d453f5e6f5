use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle state of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    #[default]
    Uninitialized = 0,
    Initializing = 1,
    Initialized = 2,
    Starting = 3,
    Started = 4,
    Stopping = 5,
    Stopped = 6,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Starting => write!(f, "starting"),
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Rejected lifecycle transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    #[error("the scheduler is being initialized")]
    Initializing,

    #[error("the scheduler is being started")]
    Starting,

    #[error("the scheduler is being stopped")]
    Stopping,

    #[error("the scheduler has already been initialized")]
    AlreadyInitialized,

    #[error("the scheduler has not been initialized")]
    NotInitialized,

    #[error("the scheduler has been started")]
    AlreadyStarted,

    #[error("the scheduler has not been started")]
    NotStarted,

    #[error("unsupported wanted status for check: {0}")]
    Unsupported(Status),
}

/// Check whether a scheduler in `current` may move to `wanted`.
///
/// Only the transient states (`Initializing`, `Starting`, `Stopping`) can be
/// requested. While a transient state is active nothing else can be.
pub fn check_status(current: Status, wanted: Status) -> Result<(), StatusError> {
    match current {
        Status::Initializing => return Err(StatusError::Initializing),
        Status::Starting => return Err(StatusError::Starting),
        Status::Stopping => return Err(StatusError::Stopping),
        _ => {}
    }

    match wanted {
        Status::Initializing => match current {
            // Re-initializing needs a stop in between
            Status::Initialized => Err(StatusError::AlreadyInitialized),
            Status::Started => Err(StatusError::AlreadyStarted),
            _ => Ok(()),
        },
        Status::Starting => match current {
            Status::Uninitialized => Err(StatusError::NotInitialized),
            Status::Started => Err(StatusError::AlreadyStarted),
            _ => Ok(()),
        },
        Status::Stopping => match current {
            Status::Started => Ok(()),
            _ => Err(StatusError::NotStarted),
        },
        other => Err(StatusError::Unsupported(other)),
    }
}
