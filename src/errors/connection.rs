// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the resilient connection facade.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ResolutionError;

/// Boxed error used where the concrete type belongs to a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Transport-level failure classes that may trigger a reconnect.
///
/// Which of these actually trigger recovery is configured per facade; the
/// default set is [`ConnectionErrorKind::DEFAULT_RECONNECT_SET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// The host name did not resolve (`ENOTFOUND`).
    HostNotFound,
    /// The peer actively refused the connection (`ECONNREFUSED`).
    ConnectionRefused,
    /// The connection was reset by the peer (`ECONNRESET`).
    ConnectionReset,
    /// The connection was aborted locally (`ECONNABORTED`).
    ConnectionAborted,
    /// No route to the host (`EHOSTUNREACH`).
    HostUnreachable,
    /// The network is unreachable (`ENETUNREACH`).
    NetworkUnreachable,
    /// The socket is not connected (`ENOTCONN`).
    NotConnected,
    /// The connection attempt timed out (`ETIMEDOUT`).
    TimedOut,
}

impl ConnectionErrorKind {
    /// Classes that trigger a reconnect unless configured otherwise.
    pub const DEFAULT_RECONNECT_SET: [ConnectionErrorKind; 2] = [
        ConnectionErrorKind::HostNotFound,
        ConnectionErrorKind::ConnectionRefused,
    ];

    /// Conventional POSIX-style code for this class.
    pub fn code(&self) -> &'static str {
        match self {
            ConnectionErrorKind::HostNotFound => "ENOTFOUND",
            ConnectionErrorKind::ConnectionRefused => "ECONNREFUSED",
            ConnectionErrorKind::ConnectionReset => "ECONNRESET",
            ConnectionErrorKind::ConnectionAborted => "ECONNABORTED",
            ConnectionErrorKind::HostUnreachable => "EHOSTUNREACH",
            ConnectionErrorKind::NetworkUnreachable => "ENETUNREACH",
            ConnectionErrorKind::NotConnected => "ENOTCONN",
            ConnectionErrorKind::TimedOut => "ETIMEDOUT",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by [`ResilientClient::call`](crate::ResilientClient::call).
///
/// The operation error is carried verbatim: either the original failure was
/// not connection-class, or the single retry after reconnecting failed too.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError<E>
where
    E: std::error::Error + 'static,
{
    /// The risky operation failed and no (further) recovery applies.
    #[error(transparent)]
    Operation(E),

    /// Re-resolving the service address failed during recovery.
    #[error("Reconnect failed while resolving the service address")]
    Resolution(#[source] ResolutionError),

    /// Rebuilding the underlying client failed during recovery.
    #[error("Reconnect failed while building a client for service '{service}'")]
    Build {
        /// The logical service name
        service: String,
        /// The factory error
        #[source]
        source: BoxError,
    },
}

impl<E> ReconnectError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns the operation error if that is what this is.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ReconnectError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the failure happened while recovering rather than in the operation.
    pub fn is_recovery_failure(&self) -> bool {
        !matches!(self, ReconnectError::Operation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(ConnectionErrorKind::HostNotFound.to_string(), "ENOTFOUND");
        assert_eq!(
            ConnectionErrorKind::ConnectionRefused.to_string(),
            "ECONNREFUSED"
        );
    }

    #[test]
    fn test_default_set_codes() {
        let codes: Vec<_> = ConnectionErrorKind::DEFAULT_RECONNECT_SET
            .iter()
            .map(|k| k.code())
            .collect();
        assert_eq!(codes, vec!["ENOTFOUND", "ECONNREFUSED"]);
    }

    #[test]
    fn test_operation_error_is_transparent() {
        let err: ReconnectError<std::io::Error> =
            ReconnectError::Operation(std::io::Error::other("syntax error at or near"));
        assert_eq!(err.to_string(), "syntax error at or near");
        assert!(!err.is_recovery_failure());
        assert!(err.into_operation_error().is_some());
    }

    #[test]
    fn test_build_error_is_recovery_failure() {
        let err: ReconnectError<std::io::Error> = ReconnectError::Build {
            service: "db".to_string(),
            source: "bad port".into(),
        };
        assert!(err.is_recovery_failure());
        assert!(err.into_operation_error().is_none());
    }
}
