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

//! Connectivity ping.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    common::models::{ServiceCall, ServiceDefinition},
    http::{error::BinanceHttpResult, query::Params, BinanceRestClient},
};

/// Tests connectivity to the REST API (`/api/v3/ping`, `/fapi/v1/ping`).
#[derive(Debug)]
pub struct PingService {
    definition: ServiceDefinition,
    call: ServiceCall,
    rest: Arc<BinanceRestClient>,
}

impl PingService {
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

    /// Performs the request; the body is an empty JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error when the pipeline rejects the request.
    pub async fn send(&mut self, token: &CancellationToken) -> BinanceHttpResult<()> {
        self.call = ServiceCall::new(self.definition.clone());
        self.rest
            .dispatch(token, &mut self.call, Params::new())
            .await?;
        Ok(())
    }
}
