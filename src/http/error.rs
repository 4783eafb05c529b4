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

//! HTTP error taxonomy.
//!
//! The retry-after family is produced in two places: locally by the rate-limit
//! counters when an admission would exceed a limit, and by the pipeline when
//! the server answers 418 or 429. The `producer` field distinguishes the two.

use thiserror::Error;

use crate::common::time::LocalNanos;

/// A request was rejected (locally or by the server) and may be retried at
/// the indicated time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryAfterError {
    /// HTTP status code, zero when the error was generated locally.
    pub status_code: u16,
    /// Server error code from the response body, zero when unavailable.
    pub error_code: i64,
    pub message: String,
    /// Who produced the error: `"marlin-binance"` or `"server"`.
    pub producer: &'static str,
    /// Local time at which the request may be retried.
    pub retry_time_local: LocalNanos,
    /// Whole seconds until `retry_time_local`.
    pub retry_after_secs: i64,
}

/// The server rejected the request as malformed or unauthorized (400/401).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadRequestError {
    pub status_code: u16,
    /// Server error code, e.g. -1121 for an invalid symbol.
    pub error_code: i64,
    pub message: String,
}

/// Binance HTTP client error type.
#[derive(Clone, Debug, Error)]
pub enum BinanceHttpError {
    /// Request would exceed a rate limit, or the server demanded a backoff.
    #[error("retry after {} s (at {} local, producer: {})", .0.retry_after_secs, .0.retry_time_local, .0.producer)]
    RetryAfter(RetryAfterError),
    /// Bad request (400) or unauthorized (401).
    #[error("bad request {} (code: {}, msg: {})", .0.status_code, .0.error_code, .0.message)]
    BadRequest(BadRequestError),
    /// A status code outside the documented contract.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// Missing API credentials for an authenticated request.
    #[error("missing API credentials")]
    MissingCredentials,
    /// Request could not be built.
    #[error("validation error: {0}")]
    Validation(String),
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),
    /// Request timed out.
    #[error("timeout: {0}")]
    Timeout(String),
    /// Request was canceled by the caller.
    #[error("canceled: {0}")]
    Canceled(String),
    /// The response violated the header contract (missing `Server`/`Date`,
    /// malformed rate-limit header).
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// An internal invariant was violated; not recoverable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for BinanceHttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<anyhow::Error> for BinanceHttpError {
    fn from(err: anyhow::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<reqwest::Error> for BinanceHttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Result type for Binance HTTP operations.
pub type BinanceHttpResult<T> = Result<T, BinanceHttpError>;
