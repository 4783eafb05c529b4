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

//! Client runtime for the [Binance](https://binance.com) exchange.
//!
//! The crate provides the machinery that sits between application code and the
//! exchange's REST and WebSocket surfaces:
//!
//! - **Rate-limit accounting**: per (endpoint-family, limit-kind, interval)
//!   counters that admit or reject requests before dispatch and reconcile
//!   consumed weight from the `X-MBX-*` / `X-SAPI-*` response headers.
//! - **Request pipeline**: URL construction, HMAC-SHA256 signing, dispatch,
//!   header parsing, and status-code classification into a typed error set.
//! - **Streams**: a single-connection WebSocket lifecycle with read/write
//!   pumps, heartbeats, cancellation, and bounded exponential-backoff
//!   reconnection.
//! - **Server-time synchronization**: periodic probes feeding an RTT-filtered
//!   rolling mean into a shared atomic clock offset read by every subsystem.
//!
//! Entry point is [`client::BinanceClient`], which wires the shared clock, the
//! rate-limit manager, and the HTTP client, and hands out typed services and
//! streams.

pub mod client;
pub mod common;
pub mod config;
pub mod http;
pub mod ratelimit;
pub mod services;
pub mod sync;
pub mod websocket;

pub use client::BinanceClient;
pub use config::BinanceClientConfig;
