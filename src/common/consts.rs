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

//! Host names, header names, and other constants for the Binance surfaces.

/// Spot and margin REST host.
pub const BINANCE_API_HOST: &str = "api.binance.com";

/// USD-M futures REST host.
pub const BINANCE_FAPI_HOST: &str = "fapi.binance.com";

/// Spot and margin market-data WebSocket host.
pub const BINANCE_WS_HOST: &str = "stream.binance.com:9443";

/// USD-M futures market-data WebSocket host.
pub const BINANCE_FUTURES_WS_HOST: &str = "fstream.binance.com";

/// Header carrying the API key for `ApiKey` and `Signed` endpoints.
pub const HEADER_API_KEY: &str = "X-MBX-APIKEY";

/// User agent sent with every REST request.
pub const MARLIN_USER_AGENT: &str = concat!("marlin-binance/", env!("CARGO_PKG_VERSION"));

/// Producer tag stamped on locally generated retry-after errors.
pub const LOCAL_ERROR_PRODUCER: &str = "marlin-binance";

/// Producer tag stamped on server generated (418/429) retry-after errors.
pub const SERVER_ERROR_PRODUCER: &str = "server";
