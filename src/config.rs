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

//! Client configuration.

use std::time::Duration;

use crate::{
    common::enums::{BinanceEndpointFamily, BinanceRateLimitInterval, BinanceRateLimitKind},
    ratelimit::RateLimit,
};

/// Exponential backoff parameters for stream reconnection.
#[derive(Copy, Clone, Debug)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl BackoffPolicy {
    /// The interval following `current`, clamped to `max_interval`.
    #[must_use]
    pub fn next_interval(&self, current: Duration) -> Duration {
        self.max_interval.min(current.mul_f64(self.multiplier))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Stream reconnection policy.
///
/// A session that ends before `min_conn_duration` counts as an early
/// disconnect; `max_consec_early_disconnects` such sessions in a row stop
/// further reconnection.
#[derive(Copy, Clone, Debug)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// Dial attempts per reconnection round before giving up.
    pub max_attempts: usize,
    pub backoff: BackoffPolicy,
    pub min_conn_duration: Duration,
    pub max_consec_early_disconnects: usize,
}

impl Default for ReconnectPolicy {
    /// Reconnection is off by default; streams surface the first failure.
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 0,
            backoff: BackoffPolicy::default(),
            min_conn_duration: Duration::ZERO,
            max_consec_early_disconnects: 0,
        }
    }
}

/// WebSocket connection tuning.
#[derive(Copy, Clone, Debug)]
pub struct WsConnOptions {
    /// Deadline for a single socket write.
    pub write_wait: Duration,
    /// Read deadline; a connection idle this long is considered dead.
    pub pong_wait: Duration,
    /// Interval between outgoing pings; keep below `pong_wait`.
    pub ping_period: Duration,
}

impl Default for WsConnOptions {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(5);
        Self {
            write_wait: Duration::from_secs(3),
            pong_wait,
            // Ping at 80% of the pong deadline.
            ping_period: pong_wait.mul_f64(0.8),
        }
    }
}

/// Configuration for [`crate::client::BinanceClient`].
#[derive(Clone, Debug)]
pub struct BinanceClientConfig {
    /// `recvWindow` appended to signed requests, in milliseconds.
    pub recv_window_ms: u64,
    /// Timeout applied to every REST request; `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Rate limits seeded at construction. Limits the server reports that
    /// are not listed here are tracked as unbounded counters.
    pub rate_limits: Vec<RateLimit>,
    pub ws_conn_options: WsConnOptions,
    /// Reconnect policy applied to streams unless overridden per stream.
    pub reconnect_policy: ReconnectPolicy,
}

impl Default for BinanceClientConfig {
    fn default() -> Self {
        Self {
            recv_window_ms: 5_000,
            request_timeout: Some(Duration::from_secs(60)),
            rate_limits: vec![RateLimit {
                family: BinanceEndpointFamily::Api,
                kind: BinanceRateLimitKind::Ip,
                interval: BinanceRateLimitInterval::Minute,
                interval_num: 1,
                limit: 6_000,
            }],
            ws_conn_options: WsConnOptions::default(),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_backoff_clamps_at_max() {
        let policy = BackoffPolicy {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            multiplier: 2.0,
        };

        let mut interval = policy.initial_interval;
        let mut intervals = Vec::new();
        for _ in 0..6 {
            intervals.push(interval);
            interval = policy.next_interval(interval);
        }

        assert_eq!(
            intervals,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
    }

    #[rstest]
    fn test_default_config_seeds_spot_ip_limit() {
        let config = BinanceClientConfig::default();
        assert_eq!(config.recv_window_ms, 5_000);
        assert_eq!(config.rate_limits.len(), 1);
        assert_eq!(config.rate_limits[0].limit, 6_000);
        assert_eq!(config.rate_limits[0].key().interval_secs, 60);
        assert!(!config.reconnect_policy.enabled);
    }

    #[rstest]
    fn test_ping_period_stays_below_pong_wait() {
        let options = WsConnOptions::default();
        assert!(options.ping_period < options.pong_wait);
    }
}
