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

//! The server-time service.
//!
//! Besides answering "what time does the exchange think it is", the response
//! carries the four timestamps the clock synchronizer needs to estimate the
//! offset and round-trip time of the probe.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    common::{
        models::{ServiceCall, ServiceDefinition},
        time::{LocalNanos, ServerNanos},
    },
    http::{error::BinanceHttpResult, models::ServerTimeMsg, query::Params, BinanceRestClient},
};

/// Result of one server-time probe.
#[derive(Copy, Clone, Debug)]
pub struct ServerTimeResponse {
    /// The server's reported time, normalized to nanoseconds.
    pub ts_server_time: ServerNanos,
    /// Local time just before dispatch.
    pub ts_local_sent: LocalNanos,
    /// Local time just after the response arrived.
    pub ts_local_recv: LocalNanos,
}

/// Fetches the exchange server time (`/api/v3/time`, `/fapi/v1/time`).
#[derive(Debug)]
pub struct ServerTimeService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
}

impl ServerTimeService {
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

    /// Performs the request.
    ///
    /// # Errors
    ///
    /// Returns an error when the pipeline rejects or the body cannot be
    /// decoded.
    pub async fn send(
        &mut self,
        token: &CancellationToken,
    ) -> BinanceHttpResult<ServerTimeResponse> {
        self.call = ServiceCall::new(self.definition.clone());
        let body = self
            .rest
            .dispatch(token, &mut self.call, Params::new())
            .await?;

        let msg: ServerTimeMsg = serde_json::from_slice(&body)?;
        Ok(ServerTimeResponse {
            ts_server_time: ServerNanos::from_wire(msg.server_time),
            ts_local_sent: self.call.ts_local_sent,
            ts_local_recv: self.call.ts_local_recv,
        })
    }
}
