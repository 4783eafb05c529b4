// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Typed stream families built on [`BinanceStream`].
//!
//! Each family pairs a stream definition with the matching handler and
//! exposes the handler's receiving channels. The symbol (or listen key) is
//! bound through a setter before `run`, which finalizes the lazy path.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    common::{
        enums::{BinanceEndpointFamily, SecurityKind},
        models::StreamDefinition,
        time::TimeHandler,
    },
    config::{ReconnectPolicy, WsConnOptions},
    websocket::{
        error::BinanceWsError,
        handler::{MarketStreamHandler, UserDataChannels, UserDataStreamHandler},
        messages::{AggTradeEvent, DepthDiffEvent},
        stream::BinanceStream,
    },
};

pub(crate) fn spot_market_stream() -> StreamDefinition {
    StreamDefinition {
        scheme: "wss",
        host: BinanceEndpointFamily::Api.ws_host(),
        family: BinanceEndpointFamily::Api,
        security: SecurityKind::None,
        update_speed_ms: 0,
    }
}

pub(crate) fn spot_depth_diff_definition() -> StreamDefinition {
    StreamDefinition {
        update_speed_ms: 100,
        ..spot_market_stream()
    }
}

pub(crate) fn futures_market_stream() -> StreamDefinition {
    StreamDefinition {
        scheme: "wss",
        host: BinanceEndpointFamily::Fapi.ws_host(),
        family: BinanceEndpointFamily::Fapi,
        security: SecurityKind::None,
        update_speed_ms: 0,
    }
}

/// Aggregate-trade stream (`/ws/<symbol>@aggTrade`), spot or futures.
#[allow(missing_debug_implementations)]
pub struct AggTradeStream {
    stream: Arc<BinanceStream<MarketStreamHandler<AggTradeEvent>>>,
    /// Decoded events, in wire order.
    pub events: mpsc::Receiver<AggTradeEvent>,
    /// Connection and handler errors, transient and terminal.
    pub errors: mpsc::Receiver<BinanceWsError>,
}

impl AggTradeStream {
    /// Creates a stream from an explicit definition; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(
        definition: StreamDefinition,
        clock: Arc<dyn TimeHandler>,
        conn_options: WsConnOptions,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        let (handler, events, errors) = MarketStreamHandler::new();
        let stream = Arc::new(BinanceStream::new(
            definition,
            Arc::new(handler),
            clock,
            conn_options,
            reconnect_policy,
        ));
        Self {
            stream,
            events,
            errors,
        }
    }

    /// Binds the symbol; finalizes the stream path.
    pub fn set_symbol(&self, symbol: &str) {
        let symbol = symbol.to_lowercase();
        self.stream
            .set_path_fn(move || format!("/ws/{symbol}@aggTrade"));
    }

    /// Returns the underlying stream, e.g. to adjust the reconnect policy.
    #[must_use]
    pub fn stream(&self) -> &Arc<BinanceStream<MarketStreamHandler<AggTradeEvent>>> {
        &self.stream
    }

    /// Runs the stream until termination; see [`BinanceStream::run`].
    pub async fn run(&self, token: CancellationToken) {
        self.stream.run(token).await;
    }
}

/// Partial-depth diff stream (`/ws/<symbol>@depth@<ms>ms`).
#[allow(missing_debug_implementations)]
pub struct DepthDiffStream {
    stream: Arc<BinanceStream<MarketStreamHandler<DepthDiffEvent>>>,
    /// Decoded events, in wire order.
    pub events: mpsc::Receiver<DepthDiffEvent>,
    /// Connection and handler errors, transient and terminal.
    pub errors: mpsc::Receiver<BinanceWsError>,
}

impl DepthDiffStream {
    /// Creates a stream from an explicit definition; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(
        definition: StreamDefinition,
        clock: Arc<dyn TimeHandler>,
        conn_options: WsConnOptions,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        let (handler, events, errors) = MarketStreamHandler::new();
        let stream = Arc::new(BinanceStream::new(
            definition,
            Arc::new(handler),
            clock,
            conn_options,
            reconnect_policy,
        ));
        Self {
            stream,
            events,
            errors,
        }
    }

    /// Binds the symbol; finalizes the stream path with the definition's
    /// update cadence (`@depth` when real-time).
    pub fn set_symbol(&self, symbol: &str) {
        let symbol = symbol.to_lowercase();
        let speed_ms = self.stream_definition_speed();
        self.stream.set_path_fn(move || {
            if speed_ms == 0 {
                format!("/ws/{symbol}@depth")
            } else {
                format!("/ws/{symbol}@depth@{speed_ms}ms")
            }
        });
    }

    fn stream_definition_speed(&self) -> u64 {
        self.stream.definition().update_speed_ms
    }

    /// Returns the underlying stream, e.g. to adjust the reconnect policy.
    #[must_use]
    pub fn stream(&self) -> &Arc<BinanceStream<MarketStreamHandler<DepthDiffEvent>>> {
        &self.stream
    }

    /// Runs the stream until termination; see [`BinanceStream::run`].
    pub async fn run(&self, token: CancellationToken) {
        self.stream.run(token).await;
    }
}

/// User-data stream (`/ws/<listen-key>`), fanning account, balance, and
/// order events out to typed channels.
#[allow(missing_debug_implementations)]
pub struct UserDataStream {
    stream: Arc<BinanceStream<UserDataStreamHandler>>,
    /// The handler's typed receiving channels.
    pub channels: UserDataChannels,
}

impl UserDataStream {
    /// Creates a stream from an explicit definition; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(
        definition: StreamDefinition,
        clock: Arc<dyn TimeHandler>,
        conn_options: WsConnOptions,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        let (handler, channels) = UserDataStreamHandler::new();
        let stream = Arc::new(BinanceStream::new(
            definition,
            Arc::new(handler),
            clock,
            conn_options,
            reconnect_policy,
        ));
        Self { stream, channels }
    }

    /// Binds the listen key issued by
    /// [`crate::services::CreateListenKeyService`]; finalizes the stream
    /// path.
    pub fn set_listen_key(&self, listen_key: &str) {
        let listen_key = listen_key.to_string();
        self.stream.set_path_fn(move || format!("/ws/{listen_key}"));
    }

    /// Returns the underlying stream, e.g. to adjust the reconnect policy.
    #[must_use]
    pub fn stream(&self) -> &Arc<BinanceStream<UserDataStreamHandler>> {
        &self.stream
    }

    /// Runs the stream until termination; see [`BinanceStream::run`].
    pub async fn run(&self, token: CancellationToken) {
        self.stream.run(token).await;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_definitions_point_at_family_hosts() {
        assert_eq!(spot_market_stream().host, "stream.binance.com:9443");
        assert_eq!(futures_market_stream().host, "fstream.binance.com");
        assert_eq!(spot_depth_diff_definition().update_speed_ms, 100);
        assert_eq!(spot_market_stream().scheme, "wss");
    }
}
