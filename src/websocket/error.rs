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

//! WebSocket error types.
//!
//! Connection errors carry enough context for a consumer to follow a
//! reconnection episode from the outside: which attempt this is, how many
//! early disconnects have accumulated, and whether the stream will try
//! again (`is_transient`) or has given up.

use thiserror::Error;

/// Context published with every connection-level stream error.
#[derive(Clone, Debug)]
pub struct ConnectionErrorContext {
    /// Description of the underlying failure.
    pub cause: String,
    /// Human-readable classification, e.g. `"websocket closed"`.
    pub reason: String,
    /// Consecutive sessions that ended before `min_conn_duration`.
    pub consec_early_disconnects: usize,
    pub max_consec_early_disconnects: usize,
    /// Dial attempts made in the current reconnection round.
    pub reconnect_attempts: usize,
    pub max_reconnect_attempts: usize,
    /// Whether the stream will keep trying. The final error of a stream is
    /// always non-transient.
    pub is_transient: bool,
}

/// A validation error raised by a stream handler.
#[derive(Clone, Debug)]
pub struct HandlerError {
    /// Description of the underlying failure.
    pub cause: String,
    pub reason: String,
    /// Fatal errors terminate the stream; non-fatal ones are forwarded to
    /// `on_error` and the stream continues.
    pub is_fatal: bool,
}

impl HandlerError {
    #[must_use]
    pub fn fatal(cause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            reason: reason.into(),
            is_fatal: true,
        }
    }

    #[must_use]
    pub fn warning(cause: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            reason: reason.into(),
            is_fatal: false,
        }
    }
}

/// Binance WebSocket error type.
#[derive(Clone, Debug, Error)]
pub enum BinanceWsError {
    /// Connection-level failure, transient or terminal.
    #[error("connection error ({}): {} (attempt {}/{}, early disconnects {}/{}, transient: {})",
        .0.reason, .0.cause, .0.reconnect_attempts, .0.max_reconnect_attempts,
        .0.consec_early_disconnects, .0.max_consec_early_disconnects, .0.is_transient)]
    Connection(ConnectionErrorContext),
    /// Handler validation failure.
    #[error("handler error ({}): {} (fatal: {})", .0.reason, .0.cause, .0.is_fatal)]
    Handler(HandlerError),
    /// JSON serialization error while sending a stream request.
    #[error("JSON error: {0}")]
    Json(String),
    /// General client error.
    #[error("client error: {0}")]
    ClientError(String),
}

/// Result type for Binance WebSocket operations.
pub type BinanceWsResult<T> = Result<T, BinanceWsError>;
