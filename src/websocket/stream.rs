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

//! The WebSocket stream lifecycle.
//!
//! A stream owns exactly one connection at a time and moves through five
//! states: idle, connecting, live (pumps running), reconnecting (backoff
//! between dials), and terminated. The initial dial is never retried; once
//! live, recoverable failures re-dial under the reconnect policy while an
//! early-disconnect counter guards against connections that keep dying
//! young. Cancellation terminates from any state, discarding messages still
//! queued.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use serde::Serialize;
use tokio::{sync::mpsc, time::Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::{
    common::{models::StreamDefinition, time::TimeHandler},
    config::{ReconnectPolicy, WsConnOptions},
    websocket::{
        error::{BinanceWsError, ConnectionErrorContext, HandlerError},
        handler::StreamHandler,
        messages::WsRequest,
        pump::{PumpError, WsConnection, WsPump},
    },
};

type PathFn = Box<dyn Fn() -> String + Send + Sync>;

/// How a live session ended.
enum SessionEnd {
    /// The caller canceled; terminate without classification.
    Canceled,
    /// The handler rejected a message fatally.
    FatalHandler(HandlerError),
    /// A pump died; classify and maybe reconnect.
    Pump(PumpError),
}

/// A single WebSocket stream bound to one endpoint definition and one
/// handler.
///
/// The stream is driven by [`Self::run`], typically spawned as a task while
/// the caller holds on to the handler's receiving channels. Requests go out
/// through [`Self::send`], which is only effective while the stream is live.
#[allow(missing_debug_implementations)] // the path producer is an opaque closure
pub struct BinanceStream<H: StreamHandler> {
    definition: StreamDefinition,
    handler: Arc<H>,
    clock: Arc<dyn TimeHandler>,
    conn_options: WsConnOptions,
    reconnect_policy: Mutex<ReconnectPolicy>,
    path_fn: Mutex<Option<PathFn>>,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    is_running: AtomicBool,
}

impl<H: StreamHandler> BinanceStream<H> {
    #[must_use]
    pub fn new(
        definition: StreamDefinition,
        handler: Arc<H>,
        clock: Arc<dyn TimeHandler>,
        conn_options: WsConnOptions,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            definition,
            handler,
            clock,
            conn_options,
            reconnect_policy: Mutex::new(reconnect_policy),
            path_fn: Mutex::new(None),
            outbound: Mutex::new(None),
            is_running: AtomicBool::new(false),
        }
    }

    /// Returns the handler this stream delivers into.
    #[must_use]
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Returns the stream definition.
    #[must_use]
    pub fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    /// Returns whether [`Self::run`] is currently active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Sets the path producer, binding dynamic path parameters (symbol,
    /// listen key). Must be called before [`Self::run`].
    pub fn set_path_fn(&self, f: impl Fn() -> String + Send + Sync + 'static) {
        if self.is_running() {
            tracing::warn!("cannot set path producer while stream is running");
            return;
        }
        *self.path_fn.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(f));
    }

    /// Replaces the reconnect policy. Must be called before [`Self::run`].
    pub fn set_reconnect_policy(&self, policy: ReconnectPolicy) {
        if self.is_running() {
            tracing::warn!("cannot set reconnect policy while stream is running");
            return;
        }
        *self
            .reconnect_policy
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = policy;
    }

    /// Serializes `request` and enqueues it on the outbound queue.
    ///
    /// Only effective while the stream is live; outside that state the
    /// request is dropped with a warning. The enqueue is non-blocking: a
    /// full outbound queue also drops the request.
    pub fn send<R>(&self, request: &R)
    where
        R: WsRequest + Serialize,
    {
        if !self.is_running() {
            tracing::warn!("stream is not running, dropping request");
            return;
        }

        let outbound = self
            .outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(tx) = outbound else {
            tracing::warn!("stream is reconnecting, dropping request");
            return;
        };

        if let Some(err) = self.handler.on_send(request) {
            let is_fatal = err.is_fatal;
            self.handler.on_error(BinanceWsError::Handler(err));
            if is_fatal {
                return;
            }
        }

        match serde_json::to_string(request) {
            Ok(payload) => {
                if tx.try_send(Message::Text(payload.into())).is_err() {
                    tracing::warn!("outbound queue full, dropping request");
                }
            }
            Err(e) => self.handler.on_error(BinanceWsError::Json(e.to_string())),
        }
    }

    /// Runs the stream until cancellation, a fatal error, or reconnect
    /// exhaustion. All errors, transient and terminal, are published through
    /// the handler's `on_error`; the final error of a stream is always
    /// non-transient.
    pub async fn run(&self, token: CancellationToken) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            tracing::warn!("stream is already running");
            return;
        }
        let _guard = RunningGuard(&self.is_running);

        let url = {
            let path_fn = self.path_fn.lock().unwrap_or_else(|e| e.into_inner());
            match path_fn.as_ref() {
                Some(f) => format!(
                    "{}://{}{}",
                    self.definition.scheme,
                    self.definition.host,
                    f()
                ),
                None => {
                    self.publish(
                        "path producer not set".to_string(),
                        "failed to build stream URL",
                        0,
                        0,
                        false,
                    );
                    return;
                }
            }
        };

        // The initial dial is never retried.
        let mut conn: WsConnection = match connect_async(url.as_str()).await {
            Ok((conn, _response)) => conn,
            Err(e) => {
                self.publish(e.to_string(), "failed to connect", 0, 0, false);
                return;
            }
        };
        tracing::debug!(url = %url, "connected");

        let policy = *self
            .reconnect_policy
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut consec_early_disconnects = 0usize;

        loop {
            let pump_token = token.child_token();
            let mut pump = WsPump::spawn(conn, self.conn_options, pump_token.clone());
            *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(pump.write_tx.clone());
            let session_start = Instant::now();

            let outcome = self.dispatch(&mut pump, &token).await;

            *self.outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
            pump_token.cancel();

            match outcome {
                SessionEnd::Canceled => {
                    tracing::debug!("canceled, terminating stream");
                    return;
                }
                SessionEnd::FatalHandler(err) => {
                    self.handler.on_error(BinanceWsError::Handler(err));
                    return;
                }
                SessionEnd::Pump(err) => {
                    if session_start.elapsed() < policy.min_conn_duration {
                        consec_early_disconnects += 1;
                    } else {
                        consec_early_disconnects = 0;
                    }

                    if !self.handle_conn_error(&err, consec_early_disconnects, &policy) {
                        return;
                    }

                    match self
                        .redial(&url, consec_early_disconnects, &policy, &token)
                        .await
                    {
                        Some(new_conn) => conn = new_conn,
                        None => return,
                    }
                }
            }
        }
    }

    /// The dispatch loop of one live session: selects among cancellation,
    /// pump errors, and decoded messages. Messages still queued when
    /// cancellation arrives are discarded, not delivered.
    async fn dispatch(&self, pump: &mut WsPump, token: &CancellationToken) -> SessionEnd {
        let read_rx = &mut pump.read_rx;
        let err_rx = &mut pump.err_rx;
        let mut canceled = false;
        let mut read_closed = false;

        loop {
            tokio::select! {
                () = token.cancelled(), if !canceled => {
                    // Keep draining until the pumps wind down; the write pump
                    // sends the close frame, the read pump surfaces the end
                    // of the connection within the pong wait.
                    canceled = true;
                }
                maybe_err = err_rx.recv() => {
                    let err = maybe_err.unwrap_or(PumpError::PeerClosed(
                        "error channel closed".to_string(),
                    ));
                    if canceled {
                        return SessionEnd::Canceled;
                    }
                    return SessionEnd::Pump(err);
                }
                maybe_msg = read_rx.recv(), if !read_closed => {
                    let Some(msg) = maybe_msg else {
                        read_closed = true;
                        continue;
                    };
                    if canceled {
                        continue;
                    }

                    let ts_local = self.clock.local_now();
                    let ts_server = self.clock.server_now();
                    if let Some(err) = self.handler.on_recv(&msg, ts_local, ts_server) {
                        if err.is_fatal {
                            return SessionEnd::FatalHandler(err);
                        }
                        self.handler.on_error(BinanceWsError::Handler(err));
                    }
                }
            }
        }
    }

    /// Classifies a pump error and decides whether to reconnect. The error
    /// itself is always published; refusals (non-transient cause, policy
    /// disabled, early-disconnect cap) publish a second, terminal context.
    fn handle_conn_error(
        &self,
        err: &PumpError,
        consec_early_disconnects: usize,
        policy: &ReconnectPolicy,
    ) -> bool {
        let (is_transient, reason) = classify(err);
        let cause = format!("{err:?}");

        if !is_transient {
            self.publish(cause, reason, consec_early_disconnects, 0, false);
            return false;
        }

        if !policy.enabled {
            self.publish(
                cause,
                "reconnect policy disabled",
                consec_early_disconnects,
                0,
                false,
            );
            return false;
        }

        self.publish(cause.clone(), reason, consec_early_disconnects, 0, true);

        if consec_early_disconnects >= policy.max_consec_early_disconnects {
            self.publish(
                cause,
                "maxConsecEarlyDisconnects reached",
                consec_early_disconnects,
                0,
                false,
            );
            return false;
        }

        true
    }

    /// Re-dials under the exponential backoff policy. Every failed attempt
    /// publishes a transient context; the final failure (or cancellation)
    /// publishes a non-transient one and returns `None`.
    async fn redial(
        &self,
        url: &str,
        consec_early_disconnects: usize,
        policy: &ReconnectPolicy,
        token: &CancellationToken,
    ) -> Option<WsConnection> {
        let mut interval = policy.backoff.initial_interval;

        for attempt in 1..=policy.max_attempts {
            match connect_async(url).await {
                Ok((conn, _response)) => {
                    tracing::debug!(attempt, "reconnected");
                    return Some(conn);
                }
                Err(e) => {
                    if attempt == policy.max_attempts {
                        self.publish(
                            e.to_string(),
                            "failed to reconnect",
                            consec_early_disconnects,
                            attempt,
                            false,
                        );
                        return None;
                    }

                    self.publish(
                        e.to_string(),
                        &format!("failed to reconnect, trying again in {interval:?}"),
                        consec_early_disconnects,
                        attempt,
                        true,
                    );

                    tokio::select! {
                        () = token.cancelled() => {
                            self.publish(
                                e.to_string(),
                                "canceled while reconnecting",
                                consec_early_disconnects,
                                attempt,
                                false,
                            );
                            return None;
                        }
                        () = tokio::time::sleep(interval) => {}
                    }
                    interval = policy.backoff.next_interval(interval);
                }
            }
        }

        None
    }

    fn publish(
        &self,
        cause: String,
        reason: &str,
        consec_early_disconnects: usize,
        reconnect_attempts: usize,
        is_transient: bool,
    ) {
        let policy = *self
            .reconnect_policy
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        self.handler
            .on_error(BinanceWsError::Connection(ConnectionErrorContext {
                cause,
                reason: reason.to_string(),
                consec_early_disconnects,
                max_consec_early_disconnects: policy.max_consec_early_disconnects,
                reconnect_attempts,
                max_reconnect_attempts: policy.max_attempts,
                is_transient,
            }));
    }
}

/// Clears the running flag when `run` exits by any path.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Whether the error is in principle recoverable, plus its classification.
///
/// A peer-initiated close (or an abrupt drop) and a read timeout are
/// transient; anything else is unknown territory and terminal.
fn classify(err: &PumpError) -> (bool, &'static str) {
    match err {
        PumpError::PeerClosed(_) => (true, "websocket closed"),
        PumpError::ReadTimeout => (true, "timeout"),
        PumpError::Transport(_) => (false, "unknown error"),
    }
}
