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

//! The rate-limit manager: admission control and post-response
//! reconciliation across the counter set.
//!
//! A request must be witnessed by every counter of its family whose kind it
//! carries weight for. Admission is all-or-nothing: if any counter rejects,
//! the increments already made are rolled back in reverse order, preserving
//! `sum(pending) == sum(in-flight weights)`.

use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::{
    common::{
        enums::{BinanceEndpointFamily, BinanceRateLimitKind},
        models::{RateLimitUpdate, ServiceDefinition},
        time::{ServerNanos, TimeHandler},
    },
    http::error::RetryAfterError,
    ratelimit::{RateLimit, RateLimitCounter, RateLimitKey},
};

/// The weight kinds a service descriptor is charged against, in admission
/// order. Rollback walks the reverse.
const ADMISSION_KINDS: [BinanceRateLimitKind; 3] = [
    BinanceRateLimitKind::Ip,
    BinanceRateLimitKind::Uid,
    BinanceRateLimitKind::Raw,
];

/// Owns the rate-limit counters across all families, kinds, and intervals.
///
/// The registry mutex guards only insert and lookup; per-counter mutation
/// happens inside the counter under its own lock.
#[derive(Debug)]
pub struct RateLimitManager {
    clock: Arc<dyn TimeHandler>,
    counters: Mutex<AHashMap<RateLimitKey, Arc<RateLimitCounter>>>,
}

impl RateLimitManager {
    /// Creates a manager seeded with the configured limits.
    #[must_use]
    pub fn new(clock: Arc<dyn TimeHandler>, limits: &[RateLimit]) -> Self {
        let manager = Self {
            clock,
            counters: Mutex::new(AHashMap::new()),
        };
        for limit in limits {
            manager.insert_counter(limit.key(), limit.limit);
        }
        manager
    }

    fn insert_counter(&self, key: RateLimitKey, limit: i64) -> Arc<RateLimitCounter> {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let clock = Arc::clone(&self.clock);
        Arc::clone(
            counters
                .entry(key)
                .or_insert_with(|| Arc::new(RateLimitCounter::new(clock, key, limit))),
        )
    }

    /// All counters for the given family and kind.
    fn counters_for(
        &self,
        family: BinanceEndpointFamily,
        kind: BinanceRateLimitKind,
    ) -> Vec<Arc<RateLimitCounter>> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters
            .iter()
            .filter(|(key, _)| key.family == family && key.kind == kind)
            .map(|(_, counter)| Arc::clone(counter))
            .collect()
    }

    /// The counter for `key`, lazily created as unbounded when the server
    /// reports a limit this manager was never configured with. An unbounded
    /// counter tracks the server's counts but never rejects an admission.
    fn counter_or_unbounded(&self, key: RateLimitKey) -> Arc<RateLimitCounter> {
        {
            let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(counter) = counters.get(&key) {
                return Arc::clone(counter);
            }
        }
        tracing::warn!(
            counter = %key,
            "rate limit update for unknown key, creating unbounded counter",
        );
        self.insert_counter(key, -1)
    }

    /// Reserves the descriptor's weights on every applicable counter.
    ///
    /// # Errors
    ///
    /// Returns the first counter's [`RetryAfterError`] when any reservation
    /// would exceed a limit; reservations made before the failure are rolled
    /// back, leaving all counters bit-identical to their prior state.
    pub fn register_pending(
        &self,
        definition: &ServiceDefinition,
    ) -> Result<(), RetryAfterError> {
        tracing::debug!(
            family = %definition.family,
            weight_ip = definition.weight_ip,
            weight_uid = definition.weight_uid,
            path = definition.path,
            "registering pending request",
        );

        let mut reserved: Vec<(Arc<RateLimitCounter>, i64)> = Vec::new();

        for kind in ADMISSION_KINDS {
            let weight = definition.weight_for(kind);
            for counter in self.counters_for(definition.family, kind) {
                if let Err(err) = counter.increment_pending(weight) {
                    for (counter, weight) in reserved.iter().rev() {
                        counter.decrement_pending(*weight);
                    }
                    return Err(err);
                }
                reserved.push((counter, weight));
            }
        }

        Ok(())
    }

    /// Releases the descriptor's weights on every applicable counter.
    ///
    /// Symmetric to [`Self::register_pending`]; called exactly once per
    /// successful registration, on every completion path.
    pub fn unregister_pending(&self, definition: &ServiceDefinition) {
        for kind in ADMISSION_KINDS {
            let weight = definition.weight_for(kind);
            for counter in self.counters_for(definition.family, kind) {
                counter.decrement_pending(weight);
            }
        }
    }

    /// Applies server-reported counts to the matching counters.
    ///
    /// `ts_server` is the server timestamp of the response that carried the
    /// updates (the `Date` header); it decides which interval each count
    /// belongs to.
    pub fn reconcile(&self, updates: &[RateLimitUpdate], ts_server: ServerNanos) {
        for update in updates {
            let key = RateLimitKey {
                family: update.family,
                kind: update.kind,
                interval_secs: update.interval_secs(),
            };
            self.counter_or_unbounded(key).set_used(update.count, ts_server);
        }
    }

    #[cfg(test)]
    pub(crate) fn counter(&self, key: RateLimitKey) -> Option<Arc<RateLimitCounter>> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(&key).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::{
        enums::{BinanceRateLimitInterval, SecurityKind},
        time::{testing::FrozenClock, NANOS_PER_SEC},
    };

    fn limit(
        kind: BinanceRateLimitKind,
        interval: BinanceRateLimitInterval,
        interval_num: i64,
        cap: i64,
    ) -> RateLimit {
        RateLimit {
            family: BinanceEndpointFamily::Api,
            kind,
            interval,
            interval_num,
            limit: cap,
        }
    }

    fn definition(weight_ip: i64, weight_uid: i64) -> ServiceDefinition {
        ServiceDefinition {
            scheme: "https",
            method: reqwest::Method::GET,
            host: "api.binance.com",
            path: "/api/v3/depth",
            family: BinanceEndpointFamily::Api,
            security: SecurityKind::None,
            weight_ip,
            weight_uid,
            weight_raw: 0,
        }
    }

    fn manager_with(limits: &[RateLimit]) -> RateLimitManager {
        let clock = Arc::new(FrozenClock::at(1_700_080_339 * NANOS_PER_SEC));
        RateLimitManager::new(clock, limits)
    }

    fn key(kind: BinanceRateLimitKind, interval_secs: i64) -> RateLimitKey {
        RateLimitKey {
            family: BinanceEndpointFamily::Api,
            kind,
            interval_secs,
        }
    }

    #[rstest]
    fn test_register_and_unregister_round_trip() {
        let manager = manager_with(&[
            limit(BinanceRateLimitKind::Ip, BinanceRateLimitInterval::Minute, 1, 6_000),
            limit(BinanceRateLimitKind::Uid, BinanceRateLimitInterval::Second, 10, 50),
        ]);
        let def = definition(5, 1);

        manager.register_pending(&def).expect("admitted");
        let ip = manager.counter(key(BinanceRateLimitKind::Ip, 60)).expect("seeded");
        let uid = manager.counter(key(BinanceRateLimitKind::Uid, 10)).expect("seeded");
        assert_eq!(ip.pending(), 5);
        assert_eq!(uid.pending(), 1);

        manager.unregister_pending(&def);
        assert_eq!(ip.pending(), 0);
        assert_eq!(uid.pending(), 0);
    }

    #[rstest]
    fn test_failed_admission_rolls_back_prior_reservations() {
        // IP limit is generous, the UID limit rejects: the IP reservation
        // made first must be rolled back.
        let manager = manager_with(&[
            limit(BinanceRateLimitKind::Ip, BinanceRateLimitInterval::Minute, 1, 6_000),
            limit(BinanceRateLimitKind::Uid, BinanceRateLimitInterval::Second, 10, 2),
        ]);
        let def = definition(5, 3);

        let err = manager.register_pending(&def).expect_err("uid rejects");
        assert_eq!(err.status_code, 0);

        let ip = manager.counter(key(BinanceRateLimitKind::Ip, 60)).expect("seeded");
        let uid = manager.counter(key(BinanceRateLimitKind::Uid, 10)).expect("seeded");
        assert_eq!(ip.pending(), 0);
        assert_eq!(uid.pending(), 0);
        assert_eq!(ip.used(), 0);
        assert_eq!(ip.curr_interval(), 0);
    }

    #[rstest]
    fn test_admission_spans_all_counters_of_a_kind() {
        // Two IP counters (1m and 1d) must both witness the request.
        let manager = manager_with(&[
            limit(BinanceRateLimitKind::Ip, BinanceRateLimitInterval::Minute, 1, 6_000),
            limit(BinanceRateLimitKind::Ip, BinanceRateLimitInterval::Day, 1, 100_000),
        ]);
        let def = definition(7, 0);

        manager.register_pending(&def).expect("admitted");
        let minute = manager.counter(key(BinanceRateLimitKind::Ip, 60)).expect("seeded");
        let day = manager.counter(key(BinanceRateLimitKind::Ip, 86_400)).expect("seeded");
        assert_eq!(minute.pending(), 7);
        assert_eq!(day.pending(), 7);
    }

    // Scenario: a reconciliation update arrives for a key the manager does
    // not know. An unbounded counter is created, tracks the count, and
    // never rejects admissions.
    #[rstest]
    fn test_unknown_update_creates_unbounded_counter() {
        let manager = manager_with(&[limit(
            BinanceRateLimitKind::Ip,
            BinanceRateLimitInterval::Minute,
            1,
            6_000,
        )]);

        let update = RateLimitUpdate {
            family: BinanceEndpointFamily::Api,
            kind: BinanceRateLimitKind::Raw,
            interval: BinanceRateLimitInterval::Second,
            interval_num: 3_600,
            count: 123,
        };
        manager.reconcile(&[update], ServerNanos::from_secs(1_700_080_339));

        let raw = manager
            .counter(key(BinanceRateLimitKind::Raw, 3_600))
            .expect("lazily created");
        assert_eq!(raw.limit(), -1);
        assert_eq!(raw.used(), 123);
        raw.increment_pending(1_000_000).expect("unbounded accepts anything");
    }

    #[rstest]
    fn test_reconcile_is_idempotent_for_identical_inputs() {
        let manager = manager_with(&[limit(
            BinanceRateLimitKind::Ip,
            BinanceRateLimitInterval::Minute,
            1,
            6_000,
        )]);

        let update = RateLimitUpdate {
            family: BinanceEndpointFamily::Api,
            kind: BinanceRateLimitKind::Ip,
            interval: BinanceRateLimitInterval::Minute,
            interval_num: 1,
            count: 42,
        };
        let ts = ServerNanos::from_secs(1_700_080_339);

        manager.reconcile(&[update], ts);
        manager.reconcile(&[update], ts);

        let ip = manager.counter(key(BinanceRateLimitKind::Ip, 60)).expect("seeded");
        assert_eq!(ip.used(), 42);
    }

    #[rstest]
    fn test_concurrent_registrations_never_exceed_limit() {
        let manager = Arc::new(manager_with(&[limit(
            BinanceRateLimitKind::Ip,
            BinanceRateLimitInterval::Minute,
            1,
            10,
        )]));
        let def = definition(3, 0);

        // Ten threads race weight-3 registrations against a limit of 10; at
        // most three may hold reservations at once.
        let admitted: usize = (0..10)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let def = def.clone();
                std::thread::spawn(move || manager.register_pending(&def).is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().expect("registration thread panicked")))
            .sum();

        assert!(admitted <= 3, "admitted {admitted} registrations of weight 3");
        let ip = manager.counter(key(BinanceRateLimitKind::Ip, 60)).expect("seeded");
        assert_eq!(ip.pending() as usize, admitted * 3);
    }
}
