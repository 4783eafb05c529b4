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

//! Wire models for the REST surface.

use serde::Deserialize;

/// The `{"code":<int>,"msg":<str>}` body Binance attaches to error statuses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BinanceErrorResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// Response of the server-time endpoints (`/api/v3/time`, `/fapi/v1/time`).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeMsg {
    /// Server time in epoch milliseconds.
    pub server_time: i64,
}

/// Response of the listen-key creation endpoints.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyMsg {
    pub listen_key: String,
}

/// Response of the depth snapshot endpoint (`/api/v3/depth`).
///
/// Prices and quantities stay as wire strings; the core never does
/// arithmetic on them.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshotMsg {
    pub last_update_id: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_error_response_parses() {
        let parsed: BinanceErrorResponse =
            serde_json::from_str(r#"{"code":-1121,"msg":"Invalid symbol."}"#).expect("parses");
        assert_eq!(parsed.code, -1121);
        assert_eq!(parsed.msg, "Invalid symbol.");
    }

    #[rstest]
    fn test_error_response_fields_default_when_absent() {
        let parsed: BinanceErrorResponse = serde_json::from_str("{}").expect("parses");
        assert_eq!(parsed.code, 0);
        assert!(parsed.msg.is_empty());
    }

    #[rstest]
    fn test_server_time_parses() {
        let parsed: ServerTimeMsg =
            serde_json::from_str(r#"{"serverTime":1700000000000}"#).expect("parses");
        assert_eq!(parsed.server_time, 1_700_000_000_000);
    }

    #[rstest]
    fn test_depth_snapshot_parses() {
        let payload = r#"{
            "lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"]],
            "asks": [["4.00000200", "12.00000000"]]
        }"#;
        let parsed: DepthSnapshotMsg = serde_json::from_str(payload).expect("parses");
        assert_eq!(parsed.last_update_id, 1_027_024);
        assert_eq!(parsed.bids[0][0], "4.00000000");
        assert_eq!(parsed.asks[0][1], "12.00000000");
    }
}
