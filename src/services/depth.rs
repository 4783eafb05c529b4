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

//! Order-book depth snapshot, used to seed books that consume the diff
//! stream.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    common::models::{ServiceCall, ServiceDefinition},
    http::{
        error::{BinanceHttpError, BinanceHttpResult},
        models::DepthSnapshotMsg,
        query::Params,
        BinanceRestClient,
    },
};

/// Fetches an order-book snapshot (`GET /api/v3/depth`).
#[derive(Debug)]
pub struct DepthSnapshotService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
    symbol: Option<String>,
    limit: Option<u32>,
}

impl DepthSnapshotService {
    /// Creates a service from an explicit descriptor; normally obtained via
    /// [`crate::client::BinanceClient`].
    #[must_use]
    pub fn new(rest: Arc<BinanceRestClient>, definition: ServiceDefinition) -> Self {
        Self {
            call: ServiceCall::new(definition.clone()),
            definition,
            rest,
            symbol: None,
            limit: None,
        }
    }

    /// Sets the symbol, e.g. `BTCUSDT`.
    pub fn symbol(&mut self, symbol: impl Into<String>) -> &mut Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Sets the number of levels per side (default 100 on the server).
    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
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
    /// Returns [`BinanceHttpError::Validation`] when no symbol was set, or
    /// the pipeline error otherwise.
    pub async fn send(
        &mut self,
        token: &CancellationToken,
    ) -> BinanceHttpResult<DepthSnapshotMsg> {
        let symbol = self
            .symbol
            .clone()
            .ok_or_else(|| BinanceHttpError::Validation("symbol is required".to_string()))?;

        let mut params = Params::new();
        params.insert("symbol", symbol);
        if let Some(limit) = self.limit {
            params.insert("limit", limit.to_string());
        }

        self.call = ServiceCall::new(self.definition.clone());
        let body = self.rest.dispatch(token, &mut self.call, params).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
