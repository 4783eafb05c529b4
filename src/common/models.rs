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

//! Service and stream descriptors plus the per-request invocation record.

use reqwest::Method;

use crate::common::{
    enums::{BinanceEndpointFamily, BinanceRateLimitInterval, BinanceRateLimitKind, SecurityKind},
    time::{LocalNanos, ServerNanos},
};

/// Static description of a REST endpoint: everything needed to build,
/// secure, and account for a request. Produced by the service tables and
/// constant for the life of the process.
#[derive(Clone, Debug)]
pub struct ServiceDefinition {
    /// URL scheme, `https` in production, `http` against test servers.
    pub scheme: &'static str,
    pub method: Method,
    pub host: &'static str,
    pub path: &'static str,
    pub family: BinanceEndpointFamily,
    pub security: SecurityKind,
    /// Weight charged against the family's IP counters.
    pub weight_ip: i64,
    /// Weight charged against the family's UID (order count) counters.
    pub weight_uid: i64,
    /// Weight charged against the family's RAW counters; zero for every
    /// built-in descriptor.
    pub weight_raw: i64,
}

impl ServiceDefinition {
    /// Returns the weight this descriptor charges against `kind` counters.
    #[must_use]
    pub const fn weight_for(&self, kind: BinanceRateLimitKind) -> i64 {
        match kind {
            BinanceRateLimitKind::Ip => self.weight_ip,
            BinanceRateLimitKind::Uid => self.weight_uid,
            BinanceRateLimitKind::Raw => self.weight_raw,
        }
    }
}

/// A single server-reported rate-limit count parsed from response headers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RateLimitUpdate {
    pub family: BinanceEndpointFamily,
    pub kind: BinanceRateLimitKind,
    pub interval: BinanceRateLimitInterval,
    pub interval_num: i64,
    /// Weight consumed in the interval the response belongs to.
    pub count: i64,
}

impl RateLimitUpdate {
    /// The canonical interval width in seconds.
    #[must_use]
    pub const fn interval_secs(&self) -> i64 {
        self.interval.seconds() * self.interval_num
    }
}

/// Everything of interest in a Binance response header block.
#[derive(Clone, Debug)]
pub struct ResponseHeader {
    /// The `Server` header value.
    pub server: String,
    /// The `Date` header, parsed per RFC 1123.
    pub ts_server: ServerNanos,
    /// Rate-limit counts in header order.
    pub rate_limit_updates: Vec<RateLimitUpdate>,
    /// `Retry-After` in whole seconds, present on 418/429 responses.
    pub retry_after_secs: Option<i64>,
}

/// Per-request record owned by the pipeline: the descriptor it was built
/// from, the four dispatch/receive timestamps, the parsed response header,
/// and the final status code. Created at dispatch and populated through
/// completion; the timestamps are recorded even when admission fails so the
/// attempt remains diagnosable.
#[derive(Clone, Debug)]
pub struct ServiceCall {
    pub definition: ServiceDefinition,
    pub ts_local_sent: LocalNanos,
    pub ts_server_sent: ServerNanos,
    pub ts_local_recv: LocalNanos,
    pub ts_server_recv: ServerNanos,
    pub response_header: Option<ResponseHeader>,
    pub status_code: u16,
}

impl ServiceCall {
    #[must_use]
    pub fn new(definition: ServiceDefinition) -> Self {
        Self {
            definition,
            ts_local_sent: LocalNanos::default(),
            ts_server_sent: ServerNanos::default(),
            ts_local_recv: LocalNanos::default(),
            ts_server_recv: ServerNanos::default(),
            response_header: None,
            status_code: 0,
        }
    }
}

/// Static description of a WebSocket stream endpoint.
///
/// The path is not part of the definition: stream paths carry symbols or
/// listen keys bound after construction, so the stream pairs a definition
/// with a lazily-set path producer.
#[derive(Clone, Debug)]
pub struct StreamDefinition {
    pub scheme: &'static str,
    pub host: &'static str,
    pub family: BinanceEndpointFamily,
    pub security: SecurityKind,
    /// Nominal update cadence in milliseconds; zero means real-time.
    pub update_speed_ms: u64,
}
