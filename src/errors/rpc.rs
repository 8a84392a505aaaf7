// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the JSON-RPC node client.

use alloy_transport::TransportError;

use super::ReconnectError;

/// Errors produced while talking to a JSON-RPC node through a resilient client.
///
/// # Examples
///
/// ```rust
/// use chainshield::NodeRpcError;
///
/// let error = NodeRpcError::InvalidQuantity {
///     method: "eth_blockNumber".to_string(),
///     value: "\"latest\"".to_string(),
/// };
/// println!("Error: {}", error);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NodeRpcError {
    /// The node call failed, including after any reconnect.
    #[error("RPC call {method} failed")]
    Call {
        /// The JSON-RPC method
        method: String,
        /// The facade error
        #[source]
        source: ReconnectError<TransportError>,
    },

    /// The node answered with something that is not a hex quantity.
    #[error("RPC call {method} returned {value}, expected a hex quantity")]
    InvalidQuantity {
        /// The JSON-RPC method
        method: String,
        /// The raw response value
        value: String,
    },

    /// A node URL could not be built from the resolved address.
    #[error("Invalid node endpoint {endpoint}")]
    InvalidEndpoint {
        /// The URL that failed to parse
        endpoint: String,
        /// The parse error
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_quantity_display() {
        let error = NodeRpcError::InvalidQuantity {
            method: "eth_blockNumber".to_string(),
            value: "null".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "RPC call eth_blockNumber returned null, expected a hex quantity"
        );
    }
}
