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

//! Server-time synchronization.
//!
//! The synchronizer periodically probes the server-time endpoint through the
//! request pipeline and estimates the clock offset NTP-style from the four
//! probe timestamps:
//!
//! ```text
//! offset = ((t1 - t0) + (t2 - t3)) / 2      t0 = local send
//! rtt    = t3 - t0                           t1 = t2 = server time
//!                                            t3 = local receive
//! ```
//!
//! Samples feed a fixed window with an RTT outlier filter (a sample whose
//! rtt exceeds the window's median by more than a factor is rejected; a
//! congested path inflates the apparent offset). Nothing is published until
//! the window is full; the first publication fires the `synced` signal
//! exactly once. The probe cadence warms up from a tight initial interval
//! toward a steady state so sync is reached quickly at startup without
//! hammering the endpoint forever after.

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    common::time::{ServerClock, TimeHandler},
    http::error::BinanceHttpError,
    services::{ServerTimeResponse, ServerTimeService},
};

fn mean(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() / values.len() as i64)
}

fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2)
    } else {
        Some(sorted[mid])
    }
}

/// Ring of paired (offset, rtt) samples with an RTT outlier filter.
#[derive(Debug)]
pub struct OffsetWindow {
    window_size: usize,
    rtt_outlier_factor: f64,
    offsets: Vec<i64>,
    rtts: Vec<i64>,
    count: usize,
}

impl OffsetWindow {
    #[must_use]
    pub fn new(window_size: usize, rtt_outlier_factor: f64) -> Self {
        Self {
            window_size,
            rtt_outlier_factor,
            offsets: vec![0; window_size],
            rtts: vec![0; window_size],
            count: 0,
        }
    }

    /// Feeds one sample and returns the window's mean offset once the
    /// window is full. A rejected outlier leaves the window untouched but
    /// still reports the current mean.
    pub fn update(&mut self, offset: i64, rtt: i64) -> Option<i64> {
        self.add(offset, rtt);
        self.mean_offset()
    }

    fn add(&mut self, offset: i64, rtt: i64) {
        let filled = self.count.min(self.window_size);
        let median_rtt = median(&self.rtts[..filled]).unwrap_or(0);

        if median_rtt > 0 && rtt as f64 > median_rtt as f64 * self.rtt_outlier_factor {
            tracing::debug!(
                rtt_ms = rtt / 1_000_000,
                median_rtt_ms = median_rtt / 1_000_000,
                factor = self.rtt_outlier_factor,
                "rejected outlier round trip time",
            );
            return;
        }

        let slot = self.count % self.window_size;
        self.offsets[slot] = offset;
        self.rtts[slot] = rtt;
        self.count += 1;
    }

    fn mean_offset(&self) -> Option<i64> {
        if self.count < self.window_size {
            return None;
        }
        mean(&self.offsets)
    }
}

/// Probe cadence: starts at `initial`, multiplies up each probe, and levels
/// off at `steady`.
#[derive(Debug)]
pub struct WarmupSchedule {
    current_ms: u64,
    initial_ms: u64,
    steady_ms: u64,
    multiplier: f64,
}

impl WarmupSchedule {
    #[must_use]
    pub fn new(initial_ms: u64, steady_ms: u64, multiplier: f64) -> Self {
        Self {
            current_ms: 0,
            initial_ms,
            steady_ms,
            multiplier,
        }
    }

    /// The wait before the next probe.
    pub fn next_interval(&mut self) -> Duration {
        self.current_ms = if self.current_ms == 0 {
            self.initial_ms
        } else if self.current_ms >= self.steady_ms {
            self.steady_ms
        } else {
            self.steady_ms
                .min((self.current_ms as f64 * self.multiplier) as u64)
        };
        Duration::from_millis(self.current_ms)
    }
}

/// Tuning for [`ServerTimeSynchronizer`].
#[derive(Copy, Clone, Debug)]
pub struct SyncOptions {
    pub window_size: usize,
    pub rtt_outlier_factor: f64,
    pub warmup_initial_ms: u64,
    pub warmup_steady_ms: u64,
    pub warmup_multiplier: f64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            window_size: 10,
            rtt_outlier_factor: 1.2,
            warmup_initial_ms: 25,
            warmup_steady_ms: 5_000,
            warmup_multiplier: 1.2,
        }
    }
}

/// Handles returned to the caller of
/// [`crate::client::BinanceClient::server_time_synchronizer`].
#[derive(Debug)]
pub struct SyncHandles {
    /// Resolves once, at first publication of an offset.
    pub synced: oneshot::Receiver<()>,
    /// Receives the terminal error, if the synchronizer dies.
    pub errors: mpsc::Receiver<BinanceHttpError>,
}

/// Periodically probes server time and updates the shared clock offset.
///
/// Run once; if it terminates on an error, build a fresh one. Channels are
/// closed by sender drop on exit, so consumers observe termination last.
#[derive(Debug)]
pub struct ServerTimeSynchronizer {
    clock: Arc<ServerClock>,
    service: ServerTimeService,
    window: OffsetWindow,
    warmup: WarmupSchedule,
    synced_tx: Option<oneshot::Sender<()>>,
    error_tx: mpsc::Sender<BinanceHttpError>,
}

impl ServerTimeSynchronizer {
    #[must_use]
    pub fn new(
        clock: Arc<ServerClock>,
        service: ServerTimeService,
        options: SyncOptions,
    ) -> (Self, SyncHandles) {
        let (synced_tx, synced) = oneshot::channel();
        let (error_tx, errors) = mpsc::channel(1);

        (
            Self {
                clock,
                service,
                window: OffsetWindow::new(options.window_size, options.rtt_outlier_factor),
                warmup: WarmupSchedule::new(
                    options.warmup_initial_ms,
                    options.warmup_steady_ms,
                    options.warmup_multiplier,
                ),
                synced_tx: Some(synced_tx),
                error_tx,
            },
            SyncHandles { synced, errors },
        )
    }

    /// Runs until cancellation or a non-transient error.
    ///
    /// A retry-after error (local admission or server 418/429) defers the
    /// next probe to the indicated retry time; any other error is terminal
    /// and is surfaced on the error channel.
    pub async fn run(mut self, token: CancellationToken) {
        let mut deferred: Option<Duration> = None;

        loop {
            let interval = deferred.take().unwrap_or_else(|| self.warmup.next_interval());
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("canceled, stopping server time synchronization");
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }

            match self.service.send(&token).await {
                Ok(response) => self.apply(&response),
                Err(BinanceHttpError::RetryAfter(err)) => {
                    let wait_ns = err
                        .retry_time_local
                        .nanos_since(self.clock.local_now())
                        .max(0);
                    tracing::warn!(
                        retry_after_secs = err.retry_after_secs,
                        producer = err.producer,
                        "server time probe throttled, deferring",
                    );
                    deferred = Some(Duration::from_nanos(wait_ns as u64));
                }
                Err(BinanceHttpError::Canceled(_)) => return,
                Err(err) => {
                    tracing::error!(error = %err, "server time synchronization failed");
                    let _ = self.error_tx.try_send(err);
                    return;
                }
            }
        }
    }

    fn apply(&mut self, response: &ServerTimeResponse) {
        let t0 = response.ts_local_sent.as_nanos();
        let t1 = response.ts_server_time.as_nanos();
        let t3 = response.ts_local_recv.as_nanos();

        let offset = ((t1 - t0) + (t1 - t3)) / 2;
        let rtt = t3 - t0;

        let Some(mean_offset) = self.window.update(offset, rtt) else {
            tracing::trace!("not synced with server time yet");
            return;
        };

        // The clock stores `local - server`; the measured offset is
        // `server - local`.
        self.clock.set_offset(-mean_offset);

        if let Some(tx) = self.synced_tx.take() {
            let _ = tx.send(());
            tracing::info!(
                offset_us = mean_offset / 1_000,
                "synced with server time",
            );
        }

        tracing::debug!(
            mean_offset_us = mean_offset / 1_000,
            offset_us = offset / 1_000,
            rtt_us = rtt / 1_000,
            "updated server time offset",
        );
    }
}
