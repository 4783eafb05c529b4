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

//! Service descriptor tables.
//!
//! One function per endpoint; weights are the documented request weights.

use reqwest::Method;

use crate::common::{
    consts::{BINANCE_API_HOST, BINANCE_FAPI_HOST},
    enums::{BinanceEndpointFamily, SecurityKind},
    models::ServiceDefinition,
};

fn api(
    method: Method,
    path: &'static str,
    security: SecurityKind,
    weight_ip: i64,
) -> ServiceDefinition {
    ServiceDefinition {
        scheme: "https",
        method,
        host: BINANCE_API_HOST,
        path,
        family: BinanceEndpointFamily::Api,
        security,
        weight_ip,
        weight_uid: 0,
        weight_raw: 0,
    }
}

fn sapi(
    method: Method,
    path: &'static str,
    security: SecurityKind,
    weight_ip: i64,
) -> ServiceDefinition {
    ServiceDefinition {
        family: BinanceEndpointFamily::Sapi,
        ..api(method, path, security, weight_ip)
    }
}

fn fapi(
    method: Method,
    path: &'static str,
    security: SecurityKind,
    weight_ip: i64,
) -> ServiceDefinition {
    ServiceDefinition {
        host: BINANCE_FAPI_HOST,
        family: BinanceEndpointFamily::Fapi,
        ..api(method, path, security, weight_ip)
    }
}

pub fn spot_ping() -> ServiceDefinition {
    api(Method::GET, "/api/v3/ping", SecurityKind::None, 1)
}

pub fn spot_server_time() -> ServiceDefinition {
    api(Method::GET, "/api/v3/time", SecurityKind::None, 1)
}

/// Depth snapshot; the weight matches the default `limit=100` tier.
pub fn spot_depth() -> ServiceDefinition {
    api(Method::GET, "/api/v3/depth", SecurityKind::None, 5)
}

pub fn spot_create_listen_key() -> ServiceDefinition {
    api(
        Method::POST,
        "/api/v3/userDataStream",
        SecurityKind::ApiKey,
        2,
    )
}

pub fn spot_keepalive_listen_key() -> ServiceDefinition {
    api(
        Method::PUT,
        "/api/v3/userDataStream",
        SecurityKind::ApiKey,
        2,
    )
}

pub fn spot_close_listen_key() -> ServiceDefinition {
    api(
        Method::DELETE,
        "/api/v3/userDataStream",
        SecurityKind::ApiKey,
        2,
    )
}

pub fn margin_create_listen_key() -> ServiceDefinition {
    sapi(
        Method::POST,
        "/sapi/v1/userDataStream",
        SecurityKind::ApiKey,
        1,
    )
}

pub fn margin_keepalive_listen_key() -> ServiceDefinition {
    sapi(
        Method::PUT,
        "/sapi/v1/userDataStream",
        SecurityKind::ApiKey,
        1,
    )
}

pub fn margin_close_listen_key() -> ServiceDefinition {
    sapi(
        Method::DELETE,
        "/sapi/v1/userDataStream",
        SecurityKind::ApiKey,
        1,
    )
}

pub fn futures_ping() -> ServiceDefinition {
    fapi(Method::GET, "/fapi/v1/ping", SecurityKind::None, 1)
}

pub fn futures_server_time() -> ServiceDefinition {
    fapi(Method::GET, "/fapi/v1/time", SecurityKind::None, 1)
}
