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

//! Enumeration types for endpoint families, rate-limit kinds, and security.

use serde::{Deserialize, Serialize};

use crate::common::consts;

/// Binance endpoint family.
///
/// Families partition endpoints that share a rate-limit shard and a base
/// host: spot (`api`), margin (`sapi`), and USD-M futures (`fapi`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinanceEndpointFamily {
    /// Spot endpoints (api.binance.com, `/api/*`).
    #[default]
    Api,
    /// Margin endpoints (api.binance.com, `/sapi/*`).
    Sapi,
    /// USD-M futures endpoints (fapi.binance.com, `/fapi/*`).
    Fapi,
}

impl BinanceEndpointFamily {
    /// Returns the lowercase family tag used in logs and rate-limit keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Sapi => "sapi",
            Self::Fapi => "fapi",
        }
    }

    /// Returns the REST host for this family.
    #[must_use]
    pub const fn rest_host(self) -> &'static str {
        match self {
            Self::Api | Self::Sapi => consts::BINANCE_API_HOST,
            Self::Fapi => consts::BINANCE_FAPI_HOST,
        }
    }

    /// Returns the market-data WebSocket host for this family.
    #[must_use]
    pub const fn ws_host(self) -> &'static str {
        match self {
            Self::Api | Self::Sapi => consts::BINANCE_WS_HOST,
            Self::Fapi => consts::BINANCE_FUTURES_WS_HOST,
        }
    }
}

impl std::fmt::Display for BinanceEndpointFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rate-limit kind, matching the server's `rateLimitType` vocabulary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinanceRateLimitKind {
    /// Request weight accounted per IP (`REQUEST_WEIGHT`).
    #[serde(rename = "REQUEST_WEIGHT")]
    Ip,
    /// Order count accounted per account (`ORDERS`).
    #[serde(rename = "ORDERS")]
    Uid,
    /// Raw request count (`RAW_REQUESTS`); observed from server reports,
    /// weight zero at admission unless a descriptor declares otherwise.
    #[serde(rename = "RAW_REQUESTS")]
    Raw,
}

impl BinanceRateLimitKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "REQUEST_WEIGHT",
            Self::Uid => "ORDERS",
            Self::Raw => "RAW_REQUESTS",
        }
    }
}

impl std::fmt::Display for BinanceRateLimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rate-limit interval unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinanceRateLimitInterval {
    Second,
    Minute,
    Day,
}

impl BinanceRateLimitInterval {
    /// Seconds in one unit of this interval.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Day => 86_400,
        }
    }

    /// Parses the single-letter suffix used in rate-limit header names.
    #[must_use]
    pub fn from_unit_letter(letter: char) -> Option<Self> {
        match letter {
            's' => Some(Self::Second),
            'm' => Some(Self::Minute),
            'd' => Some(Self::Day),
            _ => None,
        }
    }
}

/// Security mode of a service endpoint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityKind {
    /// Public endpoint, no headers or signature.
    #[default]
    None,
    /// Requires the `X-MBX-APIKEY` header (user streams, market data).
    ApiKey,
    /// Requires the API key header plus a signed query (trade, user data).
    Signed,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BinanceEndpointFamily::Api, "api", "api.binance.com")]
    #[case(BinanceEndpointFamily::Sapi, "sapi", "api.binance.com")]
    #[case(BinanceEndpointFamily::Fapi, "fapi", "fapi.binance.com")]
    fn test_family_hosts(
        #[case] family: BinanceEndpointFamily,
        #[case] tag: &str,
        #[case] host: &str,
    ) {
        assert_eq!(family.as_str(), tag);
        assert_eq!(family.rest_host(), host);
    }

    #[rstest]
    #[case('s', Some(BinanceRateLimitInterval::Second))]
    #[case('m', Some(BinanceRateLimitInterval::Minute))]
    #[case('d', Some(BinanceRateLimitInterval::Day))]
    #[case('h', None)]
    #[case('x', None)]
    fn test_interval_unit_letters(
        #[case] letter: char,
        #[case] expected: Option<BinanceRateLimitInterval>,
    ) {
        assert_eq!(BinanceRateLimitInterval::from_unit_letter(letter), expected);
    }

    #[rstest]
    fn test_interval_seconds() {
        assert_eq!(BinanceRateLimitInterval::Second.seconds(), 1);
        assert_eq!(BinanceRateLimitInterval::Minute.seconds(), 60);
        assert_eq!(BinanceRateLimitInterval::Day.seconds(), 86_400);
    }

    #[rstest]
    fn test_rate_limit_kind_serde_matches_server_vocabulary() {
        let kind: BinanceRateLimitKind =
            serde_json::from_str(r#""REQUEST_WEIGHT""#).expect("valid kind");
        assert_eq!(kind, BinanceRateLimitKind::Ip);
        assert_eq!(
            serde_json::to_string(&BinanceRateLimitKind::Raw).expect("serializes"),
            r#""RAW_REQUESTS""#
        );
    }
}
