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

//! Rate-limit accounting.
//!
//! Binance enforces limits per endpoint family (`api`, `sapi`, `fapi`), per
//! kind (`REQUEST_WEIGHT`, `ORDERS`, `RAW_REQUESTS`), and per interval. One
//! [`counter::RateLimitCounter`] tracks a single such combination; the
//! [`manager::RateLimitManager`] owns the counter set, performs
//! all-or-nothing admission before dispatch, and reconciles consumed weight
//! from response headers afterwards.

pub mod counter;
pub mod manager;

use serde::{Deserialize, Serialize};

use crate::common::enums::{
    BinanceEndpointFamily, BinanceRateLimitInterval, BinanceRateLimitKind,
};

pub use counter::RateLimitCounter;
pub use manager::RateLimitManager;

/// Identifies one rate-limit counter: the (family, kind, interval) triple.
///
/// Intervals are canonicalized to seconds at construction so that a
/// `1 MINUTE` header and a `60 SECOND` configuration address the same
/// counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub family: BinanceEndpointFamily,
    pub kind: BinanceRateLimitKind,
    pub interval_secs: i64,
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{} sec", self.family, self.kind, self.interval_secs)
    }
}

/// A configured rate limit used to seed the manager at client construction.
///
/// Mirrors the shape of the `rateLimits` entries in the exchange-info
/// payload so documented limits can be copied in directly.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct RateLimit {
    pub family: BinanceEndpointFamily,
    pub kind: BinanceRateLimitKind,
    pub interval: BinanceRateLimitInterval,
    pub interval_num: i64,
    /// Maximum weight per interval; `-1` means unbounded.
    pub limit: i64,
}

impl RateLimit {
    /// The counter key this limit addresses.
    #[must_use]
    pub const fn key(&self) -> RateLimitKey {
        RateLimitKey {
            family: self.family,
            kind: self.kind,
            interval_secs: self.interval.seconds() * self.interval_num,
        }
    }
}
