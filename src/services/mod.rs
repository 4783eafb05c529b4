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

//! Typed REST services.
//!
//! Each service owns its [`ServiceCall`] record and a handle to the shared
//! [`crate::http::BinanceRestClient`]; `send` runs the full pipeline and
//! decodes the body. Services are created through
//! [`crate::client::BinanceClient`], which picks the right descriptor for
//! the endpoint family.

pub mod definitions;
pub mod depth;
pub mod listen_key;
pub mod ping;
pub mod server_time;

pub use depth::DepthSnapshotService;
pub use listen_key::{CloseListenKeyService, CreateListenKeyService, KeepAliveListenKeyService};
pub use ping::PingService;
pub use server_time::{ServerTimeResponse, ServerTimeService};
