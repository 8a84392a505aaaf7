// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Managed JSON-RPC node client built on Alloy
//!
//! [`NodeRpcClient`] exposes raw JSON-RPC requests as its guarded operation,
//! so a [`ResilientClient<NodeRpcClient>`] follows a node that moves between
//! addresses. [`BlockEpochSource`] derives an epoch number from the node's
//! head block for the [`EpochPoller`](crate::EpochPoller).

use std::borrow::Cow;
use std::fmt;

use alloy_json_rpc::RpcError;
use alloy_network::AnyNetwork;
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::ClientBuilder;
use alloy_transport::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use url::Url;

use super::{classify_error, ClientFactory, ManagedClient, ResilientClient};
use crate::discovery::ResolvedAddress;
use crate::errors::{BoxError, ConfigError, ConnectionErrorKind, NodeRpcError};
use crate::poller::PositionSource;

/// A raw JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCall {
    /// Method name, e.g. `eth_blockNumber`
    pub method: String,
    /// Positional parameters
    pub params: Value,
}

impl RpcCall {
    /// Creates a request with positional parameters
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Creates a request with an empty parameter list
    pub fn without_params(method: impl Into<String>) -> Self {
        Self::new(method, Value::Array(Vec::new()))
    }
}

/// JSON-RPC node client over HTTP
#[derive(Clone)]
pub struct NodeRpcClient {
    provider: RootProvider<AnyNetwork>,
    url: Url,
}

impl NodeRpcClient {
    /// Creates a client for `url`
    ///
    /// No connection is made until the first request.
    pub fn new(url: Url) -> Self {
        let client = ClientBuilder::default().http(url.clone());
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .network::<AnyNetwork>()
            .connect_client(client);

        Self { provider, url }
    }

    /// The node URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The underlying Alloy provider, for typed calls
    pub fn provider(&self) -> &RootProvider<AnyNetwork> {
        &self.provider
    }
}

impl fmt::Debug for NodeRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRpcClient").field("url", &self.url.as_str()).finish()
    }
}

#[async_trait]
impl ManagedClient for NodeRpcClient {
    type Request = RpcCall;
    type Response = Value;
    type Error = TransportError;

    const OPERATION: &'static str = "rpc_request";

    async fn call(&self, request: &RpcCall) -> Result<Value, TransportError> {
        trace!(method = %request.method, url = %self.url, "RPC request");
        self.provider
            .raw_request::<Value, Value>(Cow::Owned(request.method.clone()), request.params.clone())
            .await
    }

    fn classify(error: &TransportError) -> Option<ConnectionErrorKind> {
        match error {
            RpcError::Transport(TransportErrorKind::BackendGone) => {
                Some(ConnectionErrorKind::ConnectionReset)
            }
            RpcError::Transport(TransportErrorKind::Custom(source)) => classify_error(&**source),
            _ => classify_error(error),
        }
    }
}

/// Builds [`NodeRpcClient`]s from resolved addresses
///
/// The URL is `scheme://host:port/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRpcFactory {
    scheme: &'static str,
    path: String,
}

impl NodeRpcFactory {
    /// Plain HTTP endpoints
    pub fn http() -> Self {
        Self {
            scheme: "http",
            path: String::new(),
        }
    }

    /// HTTPS endpoints
    pub fn https() -> Self {
        Self {
            scheme: "https",
            path: String::new(),
        }
    }

    /// Appends a path to every endpoint URL
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// The URL a client for `address` will use
    pub fn url_for(&self, address: &ResolvedAddress) -> Result<Url, NodeRpcError> {
        let path = self.path.trim_start_matches('/');
        let endpoint = format!("{}://{}/{}", self.scheme, address.authority(), path);
        Url::parse(&endpoint).map_err(|source| NodeRpcError::InvalidEndpoint { endpoint, source })
    }
}

impl ClientFactory<NodeRpcClient> for NodeRpcFactory {
    fn build(&self, address: &ResolvedAddress) -> Result<NodeRpcClient, BoxError> {
        Ok(NodeRpcClient::new(self.url_for(address)?))
    }
}

/// Derives the current epoch from the node's head block
///
/// `epoch = eth_blockNumber / epoch_length`
#[derive(Debug, Clone)]
pub struct BlockEpochSource {
    client: ResilientClient<NodeRpcClient>,
    epoch_length: u64,
}

impl BlockEpochSource {
    /// Creates a source with epochs of `epoch_length` blocks
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `epoch_length` is zero.
    pub fn new(client: ResilientClient<NodeRpcClient>, epoch_length: u64) -> Result<Self, ConfigError> {
        if epoch_length == 0 {
            return Err(ConfigError::invalid("epoch_length", "must be greater than zero"));
        }
        Ok(Self {
            client,
            epoch_length,
        })
    }

    /// Fetches the head block number
    pub async fn block_number(&self) -> Result<u64, NodeRpcError> {
        let method = "eth_blockNumber";
        let value = self
            .client
            .call(&RpcCall::without_params(method))
            .await
            .map_err(|source| NodeRpcError::Call {
                method: method.to_string(),
                source,
            })?;
        parse_quantity(method, &value)
    }
}

#[async_trait]
impl PositionSource for BlockEpochSource {
    async fn current_position(&self) -> Result<u64, BoxError> {
        Ok(self.block_number().await? / self.epoch_length)
    }
}

/// Parses a JSON-RPC hex quantity such as `"0x1b4"`
fn parse_quantity(method: &str, value: &Value) -> Result<u64, NodeRpcError> {
    let invalid = || NodeRpcError::InvalidQuantity {
        method: method.to_string(),
        value: value.to_string(),
    };

    let digits = value
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .ok_or_else(invalid)?;
    u64::from_str_radix(digits, 16).map_err(|_| invalid())
}
