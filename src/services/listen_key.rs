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

//! Listen-key services for user-data streams.
//!
//! A listen key authorizes a user-data WebSocket subscription. The server
//! invalidates keys that are not kept alive (roughly every 30 minutes), so a
//! long-lived user-data stream pairs [`CreateListenKeyService`] with a
//! periodic [`KeepAliveListenKeyService`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    common::models::{ServiceCall, ServiceDefinition},
    http::{
        error::{BinanceHttpError, BinanceHttpResult},
        models::ListenKeyMsg,
        query::Params,
        BinanceRestClient,
    },
};

/// Creates a new listen key (`POST .../userDataStream`).
#[derive(Debug)]
pub struct CreateListenKeyService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
}

impl CreateListenKeyService {
    /// Creates a service from an explicit descriptor; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(rest: Arc<BinanceRestClient>, definition: ServiceDefinition) -> Self {
        Self {
            call: ServiceCall::new(definition.clone()),
            definition,
            rest,
        }
    }

    /// Returns the invocation record of the most recent `send`.
    #[must_use]
    pub fn call(&self) -> &ServiceCall {
        &self.call
    }

    /// Performs the request and returns the issued listen key.
    ///
    /// # Errors
    ///
    /// Returns an error when the pipeline rejects or the body cannot be
    /// decoded.
    pub async fn send(&mut self, token: &CancellationToken) -> BinanceHttpResult<String> {
        self.call = ServiceCall::new(self.definition.clone());
        let body = self
            .rest
            .dispatch(token, &mut self.call, Params::new())
            .await?;

        let msg: ListenKeyMsg = serde_json::from_slice(&body)?;
        Ok(msg.listen_key)
    }
}

/// Extends the validity of a listen key (`PUT .../userDataStream`).
#[derive(Debug)]
pub struct KeepAliveListenKeyService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
    listen_key: Option<String>,
}

impl KeepAliveListenKeyService {
    /// Creates a service from an explicit descriptor; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(rest: Arc<BinanceRestClient>, definition: ServiceDefinition) -> Self {
        Self {
            call: ServiceCall::new(definition.clone()),
            definition,
            rest,
            listen_key: None,
        }
    }

    /// Sets the listen key to keep alive.
    pub fn listen_key(&mut self, listen_key: impl Into<String>) -> &mut Self {
        self.listen_key = Some(listen_key.into());
        self
    }

    /// Returns the invocation record of the most recent `send`.
    #[must_use]
    pub fn call(&self) -> &ServiceCall {
        &self.call
    }

    /// Performs the request.
    ///
    /// # Errors
    ///
    /// Returns [`BinanceHttpError::Validation`] when no listen key was set,
    /// or the pipeline error otherwise.
    pub async fn send(&mut self, token: &CancellationToken) -> BinanceHttpResult<()> {
        let listen_key = self.listen_key.clone().ok_or_else(|| {
            BinanceHttpError::Validation("listenKey is required".to_string())
        })?;

        let mut params = Params::new();
        params.insert("listenKey", listen_key);

        self.call = ServiceCall::new(self.definition.clone());
        self.rest.dispatch(token, &mut self.call, params).await?;
        Ok(())
    }
}

/// Closes a listen key (`DELETE .../userDataStream`).
#[derive(Debug)]
pub struct CloseListenKeyService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
    listen_key: Option<String>,
}

impl CloseListenKeyService {
    /// Creates a service from an explicit descriptor; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(rest: Arc<BinanceRestClient>, definition: ServiceDefinition) -> Self {
        Self {
            call: ServiceCall::new(definition.clone()),
            definition,
            rest,
            listen_key: None,
        }
    }

    /// Sets the listen key to close.
    pub fn listen_key(&mut self, listen_key: impl Into<String>) -> &mut Self {
        self.listen_key = Some(listen_key.into());
        self
    }

    /// Returns the invocation record of the most recent `send`.
    #[must_use]
    pub fn call(&self) -> &ServiceCall {
        &self.call
    }

    /// Performs the request.
    ///
    /// # Errors
    ///
    /// Returns [`BinanceHttpError::Validation`] when no listen key was set,
    /// or the pipeline error otherwise.
    pub async fn send(&mut self, token: &CancellationToken) -> BinanceHttpResult<()> {
        let listen_key = self.listen_key.clone().ok_or_else(|| {
            BinanceHttpError::Validation("listenKey is required".to_string())
        })?;

        let mut params = Params::new();
        params.insert("listenKey", listen_key);

        self.call = ServiceCall::new(self.definition.clone());
        self.rest.dispatch(token, &mut self.call, params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        common::time::testing::FrozenClock,
        ratelimit::RateLimitManager,
        services::definitions::{spot_close_listen_key, spot_keepalive_listen_key},
    };

    fn test_rest() -> Arc<BinanceRestClient> {
        let clock = Arc::new(FrozenClock::at(0));
        let limits = Arc::new(RateLimitManager::new(clock.clone(), &[]));
        Arc::new(BinanceRestClient::new(clock, limits, None, 5_000, None).expect("client builds"))
    }

    fn assert_listen_key_required(err: BinanceHttpError) {
        match err {
            BinanceHttpError::Validation(msg) => assert!(msg.contains("listenKey")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[rstest]
    fn test_keepalive_setter_stores_key() {
        let mut service = KeepAliveListenKeyService::new(test_rest(), spot_keepalive_listen_key());
        service.listen_key("abc123");

        assert_eq!(service.listen_key.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_keepalive_without_listen_key_is_rejected() {
        let mut service = KeepAliveListenKeyService::new(test_rest(), spot_keepalive_listen_key());

        let err = service
            .send(&CancellationToken::new())
            .await
            .expect_err("listen key missing");
        assert_listen_key_required(err);
        // Nothing was dispatched.
        assert_eq!(service.call().status_code, 0);
    }

    #[tokio::test]
    async fn test_close_without_listen_key_is_rejected() {
        let mut service = CloseListenKeyService::new(test_rest(), spot_close_listen_key());

        let err = service
            .send(&CancellationToken::new())
            .await
            .expect_err("listen key missing");
        assert_listen_key_required(err);
        assert_eq!(service.call().status_code, 0);
    }
}
