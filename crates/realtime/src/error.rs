//! Tracking service errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = anyhow::Result<T, Error>;

/// Domain level error type returned by the reporter and viewer.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// The caller supplied missing or malformed input.
    #[error("code: bad_request, description: {0}")]
    BadRequest(String),

    /// Credentials were missing or did not match.
    #[error("code: unauthorized, description: {0}")]
    Unauthorized(String),

    /// The requested resource could not be found.
    #[error("code: not_found, description: {0}")]
    NotFound(String),

    /// The resource exists but is not in a state that allows the operation.
    #[error("code: conflict, description: {0}")]
    Conflict(String),

    /// A transient I/O failure. Retrying on the next tick is expected.
    #[error("code: unavailable, description: {0}")]
    Unavailable(String),

    /// The device refused access to a capability (e.g. position).
    #[error("code: permission_denied, description: {0}")]
    PermissionDenied(String),
}

impl Error {
    /// Returns the stable error code associated with the variant.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::PermissionDenied(_) => "permission_denied",
        }
    }

    /// Whether the failure should be surfaced to the user rather than retried.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::BadRequest(_)
                | Self::Unauthorized(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
                | Self::PermissionDenied(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        let chain = err.chain().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");

        // if type is Error, return it with the newly added context
        if let Some(inner) = err.downcast_ref::<Self>() {
            tracing::debug!("Error: {err}, caused by: {inner}");

            return match inner {
                Self::BadRequest(_) => Self::BadRequest(chain),
                Self::Unauthorized(_) => Self::Unauthorized(chain),
                Self::NotFound(_) => Self::NotFound(chain),
                Self::Conflict(_) => Self::Conflict(chain),
                Self::Unavailable(_) => Self::Unavailable(chain),
                Self::PermissionDenied(_) => Self::PermissionDenied(chain),
            };
        }

        // collaborator failures without a domain error are transient I/O
        Self::Unavailable(chain)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[macro_export]
macro_rules! bad_request {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::BadRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::BadRequest(format!($err))
    };
}

#[macro_export]
macro_rules! not_found {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::NotFound(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::NotFound(format!($err))
    };
}

#[macro_export]
macro_rules! conflict {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Conflict(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::Conflict(format!($err))
    };
}
