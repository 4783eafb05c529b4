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

//! Nanosecond timestamps tagged as local or server time, and the shared clock
//! that converts between the two domains.
//!
//! All timestamps in the crate are integer nanoseconds since the Unix epoch.
//! [`LocalNanos`] and [`ServerNanos`] are distinct types so that a local
//! timestamp can never silently flow into a server-time computation; the only
//! way to cross domains is through a [`TimeHandler`].
//!
//! The offset convention is `server = local - offset`. The synchronizer
//! measures the NTP-style offset `server - local` and stores its negation,
//! so a positive measured offset (server ahead) is stored as a negative
//! value here.

use std::{
    fmt,
    sync::atomic::{AtomicI64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

pub const NANOS_PER_SEC: i64 = 1_000_000_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_MICRO: i64 = 1_000;

/// Scales a non-negative wire integer to nanoseconds by its decimal width.
///
/// Binance payloads carry epoch timestamps at second, millisecond,
/// microsecond, or nanosecond granularity depending on the endpoint. The
/// digit count disambiguates: up to 10 digits is seconds, 11-13 millis,
/// 14-16 micros, anything wider is already nanos.
#[must_use]
pub fn nanos_from_wire(value: i64) -> i64 {
    debug_assert!(value >= 0, "wire timestamps are non-negative");
    match value {
        v if v < 10_000_000_000 => v.saturating_mul(NANOS_PER_SEC),
        v if v < 10_000_000_000_000 => v.saturating_mul(NANOS_PER_MILLI),
        v if v < 10_000_000_000_000_000 => v.saturating_mul(NANOS_PER_MICRO),
        v => v,
    }
}

/// A nanosecond timestamp in the local clock domain.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LocalNanos(i64);

/// A nanosecond timestamp in the server clock domain.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServerNanos(i64);

macro_rules! impl_nanos {
    ($ty:ident) => {
        impl $ty {
            #[must_use]
            pub const fn from_nanos(nanos: i64) -> Self {
                Self(nanos)
            }

            #[must_use]
            pub const fn from_micros(micros: i64) -> Self {
                Self(micros * NANOS_PER_MICRO)
            }

            #[must_use]
            pub const fn from_millis(millis: i64) -> Self {
                Self(millis * NANOS_PER_MILLI)
            }

            #[must_use]
            pub const fn from_secs(secs: i64) -> Self {
                Self(secs * NANOS_PER_SEC)
            }

            /// Normalizes a wire integer of unknown granularity to nanoseconds.
            #[must_use]
            pub fn from_wire(value: i64) -> Self {
                Self(nanos_from_wire(value))
            }

            #[must_use]
            pub const fn as_nanos(self) -> i64 {
                self.0
            }

            /// Truncating conversion to milliseconds.
            #[must_use]
            pub const fn as_millis(self) -> i64 {
                self.0 / NANOS_PER_MILLI
            }

            /// Truncating conversion to whole seconds.
            #[must_use]
            pub const fn as_secs(self) -> i64 {
                self.0 / NANOS_PER_SEC
            }

            /// Signed distance to `earlier` in nanoseconds.
            #[must_use]
            pub const fn nanos_since(self, earlier: Self) -> i64 {
                self.0 - earlier.0
            }

            #[must_use]
            pub const fn add_nanos(self, nanos: i64) -> Self {
                Self(self.0 + nanos)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_nanos!(LocalNanos);
impl_nanos!(ServerNanos);

/// Clock operations required by the rate limiter, the request pipeline, and
/// the stream dispatch loop.
///
/// Production code uses [`ServerClock`]; tests substitute a handler with a
/// manually advanced local time.
pub trait TimeHandler: Send + Sync + fmt::Debug {
    /// The platform wall clock, in nanoseconds.
    fn local_now(&self) -> LocalNanos;

    /// The current offset in nanoseconds (`server = local - offset`).
    fn offset(&self) -> i64;

    /// The current time in the server clock domain.
    fn server_now(&self) -> ServerNanos {
        self.local_to_server(self.local_now())
    }

    fn local_to_server(&self, ts: LocalNanos) -> ServerNanos {
        ServerNanos::from_nanos(ts.as_nanos() - self.offset())
    }

    fn server_to_local(&self, ts: ServerNanos) -> LocalNanos {
        LocalNanos::from_nanos(ts.as_nanos() + self.offset())
    }
}

/// The shared clock: a single atomic offset read on every request and every
/// stream message, written once per synchronizer cycle.
///
/// Loads and stores are single-word atomics, so a reader observes either the
/// pre- or post-update offset, never a torn value.
#[derive(Debug, Default)]
pub struct ServerClock {
    offset_ns: AtomicI64,
}

impl ServerClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            offset_ns: AtomicI64::new(0),
        }
    }

    pub fn set_offset(&self, offset_ns: i64) {
        self.offset_ns.store(offset_ns, Ordering::Relaxed);
    }
}

impl TimeHandler for ServerClock {
    fn local_now(&self) -> LocalNanos {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        LocalNanos::from_nanos(nanos)
    }

    fn offset(&self) -> i64 {
        self.offset_ns.load(Ordering::Relaxed)
    }
}


#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{testing::FrozenClock, *};

    #[rstest]
    #[case(1_700_000_000, 1_700_000_000 * NANOS_PER_SEC)] // seconds
    #[case(1_700_000_000_000, 1_700_000_000_000 * NANOS_PER_MILLI)] // millis
    #[case(1_700_000_000_000_000, 1_700_000_000_000_000 * NANOS_PER_MICRO)] // micros
    #[case(1_700_000_000_000_000_000, 1_700_000_000_000_000_000)] // nanos
    #[case(0, 0)]
    fn test_nanos_from_wire(#[case] input: i64, #[case] expected: i64) {
        assert_eq!(nanos_from_wire(input), expected);
    }

    #[rstest]
    fn test_conversions_round_trip() {
        let clock = FrozenClock::at(1_700_080_339 * NANOS_PER_SEC);
        clock.set_offset(-500 * NANOS_PER_MICRO);

        let tsl = clock.local_now();
        let tss = clock.local_to_server(tsl);
        assert_eq!(tss.as_nanos(), tsl.as_nanos() + 500 * NANOS_PER_MICRO);
        assert_eq!(clock.server_to_local(tss), tsl);

        let tss = ServerNanos::from_millis(1_700_000_000_123);
        assert_eq!(clock.local_to_server(clock.server_to_local(tss)), tss);
    }

    #[rstest]
    fn test_server_now_applies_offset() {
        let clock = FrozenClock::at(1_000 * NANOS_PER_SEC);
        clock.set_offset(-3 * NANOS_PER_SEC);

        // Server is three seconds ahead of local time.
        assert_eq!(clock.server_now().as_secs(), 1_003);
    }

    #[rstest]
    fn test_server_clock_offset_accessors() {
        let clock = ServerClock::new();
        assert_eq!(clock.offset(), 0);

        clock.set_offset(42);
        assert_eq!(clock.offset(), 42);

        clock.set_offset(-17);
        assert_eq!(clock.offset(), -17);
    }

    #[rstest]
    fn test_millis_truncation() {
        let ts = ServerNanos::from_nanos(1_999_999);
        assert_eq!(ts.as_millis(), 1);
        assert_eq!(ts.as_secs(), 0);
    }
}
