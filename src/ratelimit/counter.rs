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

//! A single rate-limit counter.
//!
//! The server accumulates weight over fixed intervals and resets at each
//! interval boundary; exceeding a limit draws a 418 or 429 with a
//! `Retry-After`. A counter therefore tracks two quantities:
//!
//! - `used`: weight consumed in the current interval, taken from response
//!   headers (the server's count is the source of truth).
//! - `pending`: weight reserved for requests in flight.
//!
//! Admission projects `used + pending + incoming` against the limit without
//! mutating state on rejection. Reconciliation only moves `used` forward in
//! time: an update for an older interval is discarded, a newer interval
//! replaces both the interval and the count, and within the same interval
//! the count is monotonically non-decreasing.
//!
//! Every operation runs under one mutex with a short critical section that
//! never touches the network; the lock is not scoped more narrowly because
//! the order of operations matters.

use std::sync::{Arc, Mutex};

use crate::{
    common::{
        consts::LOCAL_ERROR_PRODUCER,
        time::{ServerNanos, TimeHandler, NANOS_PER_SEC},
    },
    http::error::RetryAfterError,
    ratelimit::RateLimitKey,
};

#[derive(Debug, Default)]
struct CounterState {
    used: i64,
    pending: i64,
    curr_interval: i64,
}

/// Tracks pending and consumed weight for one (family, kind, interval)
/// combination.
#[derive(Debug)]
pub struct RateLimitCounter {
    clock: Arc<dyn TimeHandler>,
    key: RateLimitKey,
    /// Maximum weight per interval; `-1` means unbounded.
    limit: i64,
    state: Mutex<CounterState>,
}

impl RateLimitCounter {
    #[must_use]
    pub fn new(clock: Arc<dyn TimeHandler>, key: RateLimitKey, limit: i64) -> Self {
        Self {
            clock,
            key,
            limit,
            state: Mutex::new(CounterState::default()),
        }
    }

    #[must_use]
    pub const fn key(&self) -> RateLimitKey {
        self.key
    }

    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    const fn interval_nanos(&self) -> i64 {
        self.key.interval_secs * NANOS_PER_SEC
    }

    /// The interval a server timestamp falls in, counted from the epoch.
    const fn interval_of(&self, ts: ServerNanos) -> i64 {
        ts.as_nanos() / self.interval_nanos()
    }

    /// The first nanosecond of the given interval.
    const fn interval_start(&self, interval: i64) -> ServerNanos {
        ServerNanos::from_nanos(interval * self.interval_nanos())
    }

    /// Reserves `weight` for an in-flight request.
    ///
    /// Projects `used + pending + weight` against the limit; when the
    /// projection overflows, no state changes and the returned error carries
    /// the first nanosecond of the next interval as the retry time. When the
    /// clock has already moved past the interval `used` refers to, the
    /// projection treats `used` as zero without touching `curr_interval`
    /// (only [`Self::set_used`] advances it).
    ///
    /// # Errors
    ///
    /// Returns a [`RetryAfterError`] when admitting `weight` would exceed
    /// the limit in the current interval.
    pub fn increment_pending(&self, weight: i64) -> Result<(), RetryAfterError> {
        if weight == 0 {
            return Ok(());
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if self.limit == -1 {
            state.pending += weight;
            return Ok(());
        }

        let now = self.clock.server_now();
        let interval_now = self.interval_of(now);
        let used = if interval_now > state.curr_interval {
            0
        } else {
            state.used
        };

        let projected = used + state.pending + weight;
        if projected > self.limit {
            let err = self.rejection(interval_now, projected);
            tracing::warn!(
                counter = %self.key,
                projected,
                limit = self.limit,
                retry_after_secs = err.retry_after_secs,
                "rate limit admission rejected",
            );
            return Err(err);
        }

        if projected > self.limit * 3 / 4 {
            tracing::debug!(
                counter = %self.key,
                projected,
                limit = self.limit,
                "projected count approaches limit",
            );
        }

        state.pending += weight;
        Ok(())
    }

    /// Releases `weight` previously reserved with [`Self::increment_pending`].
    ///
    /// A negative result means the bookkeeping went wrong somewhere; the
    /// count is corrected to zero and logged loudly. This also fires once
    /// when a lazily created counter sees the release of a reservation made
    /// before it existed.
    pub fn decrement_pending(&self, weight: i64) {
        if weight == 0 {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending -= weight;

        if state.pending < 0 {
            tracing::error!(
                counter = %self.key,
                pending = state.pending,
                weight,
                "pending count fell below zero, correcting to 0",
            );
            state.pending = 0;
        }
    }

    /// Reconciles `used` from a server-reported count.
    ///
    /// `ts_server` is the server timestamp of the response carrying the
    /// count. An update for an interval older than `curr_interval` is
    /// discarded; a newer interval replaces `curr_interval` and `used`; the
    /// same interval takes the maximum, since concurrent responses can
    /// arrive out of order while the server's own count never decreases.
    pub fn set_used(&self, count: i64, ts_server: ServerNanos) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let interval_resp = self.interval_of(ts_server);

        if interval_resp < state.curr_interval {
            tracing::debug!(
                counter = %self.key,
                interval_resp,
                curr_interval = state.curr_interval,
                "discarding stale rate limit update",
            );
            return;
        }

        if self.limit != -1 && count > self.limit * 3 / 4 {
            tracing::debug!(
                counter = %self.key,
                count,
                limit = self.limit,
                "used count approaches limit",
            );
        }

        if interval_resp > state.curr_interval {
            state.curr_interval = interval_resp;
            state.used = count;
            return;
        }

        if count > state.used {
            state.used = count;
        }
    }

    fn rejection(&self, interval_now: i64, projected: i64) -> RetryAfterError {
        let tss_retry = self.interval_start(interval_now + 1);
        let tsl_retry = self.clock.server_to_local(tss_retry);
        let retry_after_secs = tsl_retry.nanos_since(self.clock.local_now()) / NANOS_PER_SEC;

        RetryAfterError {
            status_code: 0,
            error_code: 0,
            message: format!("request would exceed limit ({projected}/{})", self.limit),
            producer: LOCAL_ERROR_PRODUCER,
            retry_time_local: tsl_retry,
            retry_after_secs,
        }
    }

    pub(crate) fn pending(&self) -> i64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending
    }

    pub(crate) fn used(&self) -> i64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).used
    }

    pub(crate) fn curr_interval(&self) -> i64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .curr_interval
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::{
        enums::{BinanceEndpointFamily, BinanceRateLimitKind},
        time::testing::FrozenClock,
    };

    fn ip_counter(clock: Arc<FrozenClock>, interval_secs: i64, limit: i64) -> RateLimitCounter {
        let key = RateLimitKey {
            family: BinanceEndpointFamily::Api,
            kind: BinanceRateLimitKind::Ip,
            interval_secs,
        };
        RateLimitCounter::new(clock, key, limit)
    }

    #[rstest]
    fn test_increment_and_decrement_pending() {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock, 60, 6_000);

        counter.increment_pending(3).expect("within limit");
        assert_eq!(counter.pending(), 3);

        counter.decrement_pending(2);
        assert_eq!(counter.pending(), 1);
    }

    #[rstest]
    fn test_zero_weight_is_a_noop() {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock, 60, 5);

        counter.increment_pending(0).expect("zero weight");
        counter.decrement_pending(0);
        assert_eq!(counter.pending(), 0);
    }

    #[rstest]
    fn test_decrement_below_zero_corrects_in_place() {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock, 60, 6_000);

        counter.decrement_pending(5);
        assert_eq!(counter.pending(), 0);
    }

    // Scenario: counter (API, IP, 60s, limit=5), weight 6 at t=1700080339e9.
    // The next interval starts at 1700080380e9, 41 seconds out.
    #[rstest]
    fn test_rejection_carries_retry_time() {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock, 60, 5);

        let err = counter.increment_pending(6).expect_err("over limit");
        assert_eq!(err.status_code, 0);
        assert_eq!(err.producer, LOCAL_ERROR_PRODUCER);
        assert_eq!(err.retry_after_secs, 41);
        assert_eq!(
            err.retry_time_local.as_nanos(),
            1_700_080_380 * NANOS_PER_SEC
        );

        // Rejection must not modify state.
        assert_eq!(counter.pending(), 0);
        assert_eq!(counter.used(), 0);
    }

    #[rstest]
    fn test_rejection_retry_time_respects_offset() {
        // Server runs 2 seconds ahead of local time.
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        clock.set_offset(-2 * NANOS_PER_SEC);
        let counter = ip_counter(clock, 60, 5);

        let err = counter.increment_pending(6).expect_err("over limit");
        // Server time is 1700080341; the next interval still starts at
        // 1700080380 server time, which is 1700080378 local time.
        assert_eq!(
            err.retry_time_local.as_nanos(),
            1_700_080_378 * NANOS_PER_SEC
        );
        assert_eq!(err.retry_after_secs, 39);
    }

    #[rstest]
    #[case(5, 5, true)] // exactly at the boundary succeeds
    #[case(5, 6, false)] // one over fails
    #[case(6_000, 30, true)]
    #[case(-1, 2_000, true)] // unbounded always accepts
    fn test_admission_boundary(#[case] limit: i64, #[case] weight: i64, #[case] admitted: bool) {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock, 60, limit);

        let result = counter.increment_pending(weight);
        assert_eq!(result.is_ok(), admitted);
        assert_eq!(counter.pending(), if admitted { weight } else { 0 });
    }

    #[rstest]
    fn test_projection_resets_used_after_rollover_without_mutating_interval() {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        let counter = ip_counter(clock.clone(), 60, 10);

        // Fill the current interval close to the limit.
        counter.set_used(9, ServerNanos::from_secs(1_700_080_339));
        let interval_before = counter.curr_interval();
        assert!(counter.increment_pending(2).is_err());

        // Move the clock into the next interval: the stale `used` no longer
        // counts against the projection, but reconciliation still owns the
        // interval cursor.
        clock.set_local(1_700_080_381 * NANOS_PER_SEC);
        counter.increment_pending(2).expect("fresh interval");
        assert_eq!(counter.curr_interval(), interval_before);
        assert_eq!(counter.used(), 9);
        assert_eq!(counter.pending(), 2);
    }

    #[rstest]
    fn test_set_used_is_monotonic_within_interval() {
        let clock = Arc::new(FrozenClock::at(0));
        let counter = ip_counter(clock, 60, 6_000);

        let t0 = ServerNanos::from_secs(1_700_080_339); // 19 s into the minute
        let t1 = ServerNanos::from_secs(1_700_080_380); // start of next minute

        counter.set_used(300, t0);
        assert_eq!(counter.used(), 300);

        // A smaller count in the same interval is ignored.
        counter.set_used(5, t0);
        assert_eq!(counter.used(), 300);

        // A later interval replaces count and cursor.
        counter.set_used(5, t1);
        assert_eq!(counter.used(), 5);
        assert_eq!(counter.curr_interval(), t1.as_nanos() / (60 * NANOS_PER_SEC));

        // Updates for the older interval are discarded outright.
        counter.set_used(200, t0);
        assert_eq!(counter.used(), 5);

        counter.set_used(300, t1);
        assert_eq!(counter.used(), 300);
    }

    // Scenario: seven concurrent reconciliations over five distinct
    // intervals; the largest timestamp carries count 17 and must win.
    #[rstest]
    fn test_concurrent_reconciliation_across_intervals() {
        let clock = Arc::new(FrozenClock::at(0));
        let counter = Arc::new(ip_counter(clock, 60, 6_000));

        let base = 1_700_080_320_i64; // an interval boundary
        let updates = [
            (base + 10, 40),
            (base + 59, 50),
            (base + 61, 3),
            (base + 130, 7),
            (base + 185, 11),
            (base + 245, 17), // the largest timestamp must win
            (base + 200, 5),
        ];

        let handles: Vec<_> = updates
            .into_iter()
            .map(|(secs, count)| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    counter.set_used(count, ServerNanos::from_secs(secs));
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("reconciliation thread panicked");
        }

        assert_eq!(counter.curr_interval(), (base + 245) / 60);
        assert_eq!(counter.used(), 17);
    }
}
