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

//! The client facade: wires the shared clock, rate-limit manager, and REST
//! pipeline, and hands out typed services and streams.

use std::sync::Arc;

use crate::{
    common::{credential::Credentials, time::ServerClock},
    config::BinanceClientConfig,
    http::BinanceRestClient,
    ratelimit::RateLimitManager,
    services::{
        definitions, CloseListenKeyService, CreateListenKeyService, DepthSnapshotService,
        KeepAliveListenKeyService, PingService, ServerTimeService,
    },
    sync::{ServerTimeSynchronizer, SyncHandles, SyncOptions},
    websocket::streams::{
        futures_market_stream, spot_depth_diff_definition, spot_market_stream, AggTradeStream,
        DepthDiffStream, UserDataStream,
    },
};

/// Entry point for interacting with Binance.
///
/// One client owns one clock offset, one rate-limit manager, and one HTTP
/// connection pool; every service and stream created from it shares them.
/// Streams share nothing with each other beyond these immutable handles.
#[derive(Clone, Debug)]
pub struct BinanceClient {
    clock: Arc<ServerClock>,
    limits: Arc<RateLimitManager>,
    rest: Arc<BinanceRestClient>,
    config: BinanceClientConfig,
}

impl BinanceClient {
    /// Creates a new client.
    ///
    /// Credentials are optional for public-only use; provide both parts or
    /// neither.
    ///
    /// # Errors
    ///
    /// Returns an error when only one credential part is provided, or when
    /// the HTTP client fails to build.
    pub fn new(
        api_key: Option<String>,
        api_secret: Option<String>,
        config: BinanceClientConfig,
    ) -> anyhow::Result<Self> {
        let credentials = match (api_key, api_secret) {
            (Some(key), Some(secret)) => Some(Credentials::new(key, secret)),
            (None, None) => None,
            _ => anyhow::bail!("both `api_key` and `api_secret` must be provided together"),
        };

        let clock = Arc::new(ServerClock::new());
        let limits = Arc::new(RateLimitManager::new(clock.clone(), &config.rate_limits));
        let rest = Arc::new(BinanceRestClient::new(
            clock.clone(),
            limits.clone(),
            credentials,
            config.recv_window_ms,
            config.request_timeout,
        )?);

        Ok(Self {
            clock,
            limits,
            rest,
            config,
        })
    }

    /// Returns the shared clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<ServerClock> {
        &self.clock
    }

    /// Returns the shared rate-limit manager.
    #[must_use]
    pub fn rate_limits(&self) -> &Arc<RateLimitManager> {
        &self.limits
    }

    /// Returns the shared REST client.
    #[must_use]
    pub fn rest(&self) -> &Arc<BinanceRestClient> {
        &self.rest
    }

    // -- Services -------------------------------------------------------

    #[must_use]
    pub fn spot_ping_service(&self) -> PingService {
        PingService::new(self.rest.clone(), definitions::spot_ping())
    }

    #[must_use]
    pub fn futures_ping_service(&self) -> PingService {
        PingService::new(self.rest.clone(), definitions::futures_ping())
    }

    #[must_use]
    pub fn spot_server_time_service(&self) -> ServerTimeService {
        ServerTimeService::new(self.rest.clone(), definitions::spot_server_time())
    }

    #[must_use]
    pub fn futures_server_time_service(&self) -> ServerTimeService {
        ServerTimeService::new(self.rest.clone(), definitions::futures_server_time())
    }

    #[must_use]
    pub fn spot_depth_snapshot_service(&self) -> DepthSnapshotService {
        DepthSnapshotService::new(self.rest.clone(), definitions::spot_depth())
    }

    #[must_use]
    pub fn spot_create_listen_key_service(&self) -> CreateListenKeyService {
        CreateListenKeyService::new(self.rest.clone(), definitions::spot_create_listen_key())
    }

    #[must_use]
    pub fn spot_keepalive_listen_key_service(&self) -> KeepAliveListenKeyService {
        KeepAliveListenKeyService::new(self.rest.clone(), definitions::spot_keepalive_listen_key())
    }

    #[must_use]
    pub fn spot_close_listen_key_service(&self) -> CloseListenKeyService {
        CloseListenKeyService::new(self.rest.clone(), definitions::spot_close_listen_key())
    }

    #[must_use]
    pub fn margin_create_listen_key_service(&self) -> CreateListenKeyService {
        CreateListenKeyService::new(self.rest.clone(), definitions::margin_create_listen_key())
    }

    #[must_use]
    pub fn margin_keepalive_listen_key_service(&self) -> KeepAliveListenKeyService {
        KeepAliveListenKeyService::new(
            self.rest.clone(),
            definitions::margin_keepalive_listen_key(),
        )
    }

    #[must_use]
    pub fn margin_close_listen_key_service(&self) -> CloseListenKeyService {
        CloseListenKeyService::new(self.rest.clone(), definitions::margin_close_listen_key())
    }

    // -- Streams --------------------------------------------------------

    /// Spot aggregate-trade stream; bind a symbol with `set_symbol` before
    /// running.
    #[must_use]
    pub fn spot_agg_trade_stream(&self) -> AggTradeStream {
        AggTradeStream::new(
            spot_market_stream(),
            self.clock.clone(),
            self.config.ws_conn_options,
            self.config.reconnect_policy,
        )
    }

    /// Futures aggregate-trade stream.
    #[must_use]
    pub fn futures_agg_trade_stream(&self) -> AggTradeStream {
        AggTradeStream::new(
            futures_market_stream(),
            self.clock.clone(),
            self.config.ws_conn_options,
            self.config.reconnect_policy,
        )
    }

    /// Spot partial-depth diff stream at 100 ms cadence.
    #[must_use]
    pub fn spot_depth_diff_stream(&self) -> DepthDiffStream {
        DepthDiffStream::new(
            spot_depth_diff_definition(),
            self.clock.clone(),
            self.config.ws_conn_options,
            self.config.reconnect_policy,
        )
    }

    /// User-data stream; bind a listen key with `set_listen_key` before
    /// running.
    #[must_use]
    pub fn user_data_stream(&self) -> UserDataStream {
        UserDataStream::new(
            spot_market_stream(),
            self.clock.clone(),
            self.config.ws_conn_options,
            self.config.reconnect_policy,
        )
    }

    // -- Synchronization --------------------------------------------------

    /// Builds a server-time synchronizer probing the spot endpoint.
    ///
    /// Spawn its `run` as a task; the returned handles deliver the one-shot
    /// `synced` signal and the terminal error, if any.
    #[must_use]
    pub fn server_time_synchronizer(
        &self,
        options: SyncOptions,
    ) -> (ServerTimeSynchronizer, SyncHandles) {
        ServerTimeSynchronizer::new(
            self.clock.clone(),
            self.spot_server_time_service(),
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::time::TimeHandler;

    #[rstest]
    fn test_public_client_builds_without_credentials() {
        let client = BinanceClient::new(None, None, BinanceClientConfig::default())
            .expect("builds");
        assert_eq!(client.clock().offset(), 0);
    }

    #[rstest]
    fn test_partial_credentials_are_rejected() {
        let result = BinanceClient::new(
            Some("key".to_string()),
            None,
            BinanceClientConfig::default(),
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn test_services_share_the_clock() {
        let client = BinanceClient::new(None, None, BinanceClientConfig::default())
            .expect("builds");

        client.clock().set_offset(-42);
        assert_eq!(client.rest().time_handler().offset(), -42);
    }
}
