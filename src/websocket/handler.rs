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

//! The stream handler contract and the built-in handler implementations.
//!
//! The contract is strictly one-way: the stream calls into the handler; the
//! handler never calls back into the stream. Handlers must not block, so
//! delivery channels are bounded and a full channel drops the message with a
//! warning rather than stalling the dispatch loop.

use tokio::sync::mpsc;

use crate::{
    common::time::{LocalNanos, ServerNanos},
    websocket::{
        error::{BinanceWsError, HandlerError},
        messages::{
            AccountPositionEvent, BalanceUpdateEvent, EventMeta, EventTag, ExecutionReportEvent,
            StreamEvent, WsRequest,
        },
    },
};

/// Capacity of handler delivery channels.
const CHANNEL_CAPACITY: usize = 256;

/// Capability set a stream calls into.
///
/// `on_recv` returning a fatal [`HandlerError`] terminates the stream; a
/// non-fatal one is forwarded through `on_error` and the stream continues.
pub trait StreamHandler: Send + Sync {
    /// Validates an outgoing request before it is enqueued.
    fn on_send(&self, request: &dyn WsRequest) -> Option<HandlerError>;

    /// Handles one raw message with its delivery timestamps.
    fn on_recv(
        &self,
        msg: &[u8],
        ts_local: LocalNanos,
        ts_server: ServerNanos,
    ) -> Option<HandlerError>;

    /// Receives connection and handler errors, transient and terminal.
    fn on_error(&self, error: BinanceWsError);
}

fn deliver<T>(tx: &mpsc::Sender<T>, value: T, what: &str) {
    if tx.try_send(value).is_err() {
        tracing::warn!(channel = what, "channel full or closed, dropping message");
    }
}

/// Generic handler for market-data streams: decodes every message into one
/// event type and forwards it on a bounded channel.
#[derive(Debug)]
pub struct MarketStreamHandler<E: StreamEvent> {
    event_tx: mpsc::Sender<E>,
    error_tx: mpsc::Sender<BinanceWsError>,
}

impl<E: StreamEvent> MarketStreamHandler<E> {
    /// Creates the handler plus the receiving ends of its channels.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<E>, mpsc::Receiver<BinanceWsError>) {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { event_tx, error_tx }, event_rx, error_rx)
    }
}

impl<E: StreamEvent> StreamHandler for MarketStreamHandler<E> {
    fn on_send(&self, _request: &dyn WsRequest) -> Option<HandlerError> {
        // Market streams are receive-only; sends are accepted but pointless.
        tracing::warn!("market stream handler does not process outgoing requests");
        None
    }

    fn on_recv(
        &self,
        msg: &[u8],
        ts_local: LocalNanos,
        ts_server: ServerNanos,
    ) -> Option<HandlerError> {
        let mut event: E = match serde_json::from_slice(msg) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    msg = %String::from_utf8_lossy(msg),
                    "failed to decode stream event",
                );
                return Some(HandlerError::fatal(e.to_string(), "failed to decode event"));
            }
        };

        event.set_meta(EventMeta {
            ts_local_recv: ts_local,
            ts_server_recv: ts_server,
        });
        deliver(&self.event_tx, event, "events");
        None
    }

    fn on_error(&self, error: BinanceWsError) {
        deliver(&self.error_tx, error, "errors");
    }
}

/// Handler for spot/margin user-data streams: routes events to one of three
/// typed channels by the `e` tag.
#[derive(Debug)]
pub struct UserDataStreamHandler {
    account_tx: mpsc::Sender<AccountPositionEvent>,
    balance_tx: mpsc::Sender<BalanceUpdateEvent>,
    execution_tx: mpsc::Sender<ExecutionReportEvent>,
    error_tx: mpsc::Sender<BinanceWsError>,
}

/// Receiving ends of a [`UserDataStreamHandler`]'s channels.
#[derive(Debug)]
pub struct UserDataChannels {
    pub accounts: mpsc::Receiver<AccountPositionEvent>,
    pub balances: mpsc::Receiver<BalanceUpdateEvent>,
    pub executions: mpsc::Receiver<ExecutionReportEvent>,
    pub errors: mpsc::Receiver<BinanceWsError>,
}

impl UserDataStreamHandler {
    /// Creates the handler plus the receiving ends of its channels.
    #[must_use]
    pub fn new() -> (Self, UserDataChannels) {
        let (account_tx, accounts) = mpsc::channel(CHANNEL_CAPACITY);
        let (balance_tx, balances) = mpsc::channel(CHANNEL_CAPACITY);
        let (execution_tx, executions) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);

        (
            Self {
                account_tx,
                balance_tx,
                execution_tx,
                error_tx,
            },
            UserDataChannels {
                accounts,
                balances,
                executions,
                errors,
            },
        )
    }

    fn route<E: StreamEvent>(
        msg: &[u8],
        meta: EventMeta,
        tx: &mpsc::Sender<E>,
        what: &str,
    ) -> Option<HandlerError> {
        match serde_json::from_slice::<E>(msg) {
            Ok(mut event) => {
                event.set_meta(meta);
                deliver(tx, event, what);
                None
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    msg = %String::from_utf8_lossy(msg),
                    "failed to decode user data event",
                );
                Some(HandlerError::fatal(e.to_string(), "failed to decode event"))
            }
        }
    }
}

impl StreamHandler for UserDataStreamHandler {
    fn on_send(&self, _request: &dyn WsRequest) -> Option<HandlerError> {
        tracing::warn!("user data stream handler does not process outgoing requests");
        None
    }

    fn on_recv(
        &self,
        msg: &[u8],
        ts_local: LocalNanos,
        ts_server: ServerNanos,
    ) -> Option<HandlerError> {
        let tag: EventTag = match serde_json::from_slice(msg) {
            Ok(tag) => tag,
            Err(e) => {
                return Some(HandlerError::fatal(
                    e.to_string(),
                    "failed to parse event type",
                ));
            }
        };

        let meta = EventMeta {
            ts_local_recv: ts_local,
            ts_server_recv: ts_server,
        };

        match tag.event_type.as_str() {
            "outboundAccountPosition" => Self::route(msg, meta, &self.account_tx, "accounts"),
            "balanceUpdate" => Self::route(msg, meta, &self.balance_tx, "balances"),
            "executionReport" => Self::route(msg, meta, &self.execution_tx, "executions"),
            other => Some(HandlerError::fatal(
                format!("unknown event type: {other}"),
                "unknown event type",
            )),
        }
    }

    fn on_error(&self, error: BinanceWsError) {
        deliver(&self.error_tx, error, "errors");
    }
}
