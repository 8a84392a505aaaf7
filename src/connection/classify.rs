// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Connection-class error detection

use std::error::Error;
use std::io;

use crate::errors::ConnectionErrorKind;

/// Messages resolvers and HTTP stacks use for a host name that did not resolve
const LOOKUP_FAILURE_MARKERS: [&str; 4] = [
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "dns error",
];

/// Classifies `error` by walking its `source()` chain.
///
/// The first `std::io::Error` with a connection-class kind decides the
/// result. Host lookup failures carry no dedicated `io::ErrorKind`, so an
/// `io::Error` whose message names one is reported as
/// [`ConnectionErrorKind::HostNotFound`]. Messages of other error types are
/// never inspected.
pub fn classify_error(error: &(dyn Error + 'static)) -> Option<ConnectionErrorKind> {
    let mut next = Some(error);

    while let Some(current) = next {
        if let Some(io_error) = current.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io_kind(io_error.kind()) {
                return Some(kind);
            }
            if is_lookup_failure(io_error) {
                return Some(ConnectionErrorKind::HostNotFound);
            }
        }
        next = current.source();
    }

    None
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<ConnectionErrorKind> {
    match kind {
        io::ErrorKind::ConnectionRefused => Some(ConnectionErrorKind::ConnectionRefused),
        io::ErrorKind::ConnectionReset => Some(ConnectionErrorKind::ConnectionReset),
        io::ErrorKind::ConnectionAborted => Some(ConnectionErrorKind::ConnectionAborted),
        io::ErrorKind::HostUnreachable => Some(ConnectionErrorKind::HostUnreachable),
        io::ErrorKind::NetworkUnreachable => Some(ConnectionErrorKind::NetworkUnreachable),
        io::ErrorKind::NotConnected => Some(ConnectionErrorKind::NotConnected),
        io::ErrorKind::TimedOut => Some(ConnectionErrorKind::TimedOut),
        _ => None,
    }
}

fn is_lookup_failure(error: &io::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    LOOKUP_FAILURE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
