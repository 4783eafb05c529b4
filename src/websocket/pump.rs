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

//! The I/O pump pair for one WebSocket connection.
//!
//! The connection is split once: the read pump owns the stream half, the
//! write pump owns the sink half, so writing to the socket is single-writer
//! by construction.
//!
//! The read pump applies a per-frame deadline of `pong_wait`; any received
//! frame (including the pong answering our ping) re-arms it. Peer pings are
//! answered through the write queue. The write pump multiplexes application
//! messages, a `ping_period` ticker, and the cancellation token, bounding
//! every socket write by `write_wait`; on cancellation it attempts a normal
//! close frame before exiting.
//!
//! When the write pump dies on a write failure it exits silently: no more
//! pings go out, so the read pump hits its deadline within `pong_wait` and
//! surfaces the failure on the error channel.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{interval_at, timeout, Instant},
};
use tokio_tungstenite::{
    tungstenite::{
        error::ProtocolError,
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;

use crate::config::WsConnOptions;

/// Capacity of the read and write queues.
pub(crate) const QUEUE_CAPACITY: usize = 256;

pub(crate) type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsConnection, Message>;
type WsSource = SplitStream<WsConnection>;

/// Failure that ended a pump session.
#[derive(Clone, Debug)]
pub(crate) enum PumpError {
    /// The peer sent a close frame, or dropped the connection.
    PeerClosed(String),
    /// No frame arrived within the pong wait.
    ReadTimeout,
    /// The underlying transport failed in an unclassified way.
    Transport(String),
}

/// Handles to a running pump pair.
#[derive(Debug)]
pub(crate) struct WsPump {
    pub read_rx: mpsc::Receiver<Vec<u8>>,
    pub err_rx: mpsc::Receiver<PumpError>,
    pub write_tx: mpsc::Sender<Message>,
}

impl WsPump {
    /// Splits `conn` and spawns the read and write pump tasks.
    pub fn spawn(conn: WsConnection, options: WsConnOptions, token: CancellationToken) -> Self {
        let (sink, source) = conn.split();
        let (read_tx, read_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (write_tx, write_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(1);

        tokio::spawn(read_pump(
            source,
            read_tx,
            write_tx.clone(),
            err_tx,
            options.pong_wait,
        ));
        tokio::spawn(write_pump(sink, write_rx, token, options));

        Self {
            read_rx,
            err_rx,
            write_tx,
        }
    }
}

async fn read_pump(
    mut source: WsSource,
    read_tx: mpsc::Sender<Vec<u8>>,
    write_tx: mpsc::Sender<Message>,
    err_tx: mpsc::Sender<PumpError>,
    pong_wait: Duration,
) {
    let error = loop {
        let frame = match timeout(pong_wait, source.next()).await {
            Err(_) => break PumpError::ReadTimeout,
            Ok(None) => break PumpError::PeerClosed("stream ended".to_string()),
            Ok(Some(Err(e))) => break classify_transport(e),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                if read_tx.send(text.as_bytes().to_vec()).await.is_err() {
                    // Receiver gone: the stream is tearing down.
                    return;
                }
            }
            Message::Binary(data) => {
                if read_tx.send(data.to_vec()).await.is_err() {
                    return;
                }
            }
            Message::Ping(payload) => {
                tracing::trace!("ping from peer");
                let _ = write_tx.try_send(Message::Pong(payload));
            }
            Message::Pong(_) => tracing::trace!("pong"),
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{}: {}", u16::from(f.code), f.reason.as_str()))
                    .unwrap_or_else(|| "close frame".to_string());
                break PumpError::PeerClosed(reason);
            }
            Message::Frame(_) => {}
        }
    };

    tracing::debug!(?error, "exiting read pump");
    let _ = err_tx.try_send(error);
}

fn classify_transport(error: WsError) -> PumpError {
    match &error {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            PumpError::PeerClosed(error.to_string())
        }
        WsError::Io(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ) =>
        {
            PumpError::PeerClosed(error.to_string())
        }
        _ => PumpError::Transport(error.to_string()),
    }
}

async fn write_pump(
    mut sink: WsSink,
    mut write_rx: mpsc::Receiver<Message>,
    token: CancellationToken,
    options: WsConnOptions,
) {
    let mut ping_ticker = interval_at(
        Instant::now() + options.ping_period,
        options.ping_period,
    );

    loop {
        tokio::select! {
            maybe_msg = write_rx.recv() => {
                let Some(msg) = maybe_msg else {
                    tracing::trace!("write queue closed, exiting write pump");
                    return;
                };
                if write_with_deadline(&mut sink, msg, options.write_wait).await.is_err() {
                    tracing::warn!("socket write failed, exiting write pump");
                    return;
                }
            }
            _ = ping_ticker.tick() => {
                if write_with_deadline(&mut sink, Message::Ping(Bytes::new()), options.write_wait)
                    .await
                    .is_err()
                {
                    tracing::warn!("ping write failed, exiting write pump");
                    return;
                }
                tracing::trace!("ping");
            }
            () = token.cancelled() => {
                tracing::debug!("canceled, sending close frame and exiting write pump");
                let close = Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                }));
                if write_with_deadline(&mut sink, close, options.write_wait).await.is_err() {
                    tracing::debug!("close frame write failed");
                }
                return;
            }
        }
    }
}

async fn write_with_deadline(
    sink: &mut WsSink,
    msg: Message,
    write_wait: Duration,
) -> Result<(), ()> {
    match timeout(write_wait, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "error writing to websocket");
            Err(())
        }
        Err(_) => {
            tracing::debug!("write deadline exceeded");
            Err(())
        }
    }
}
