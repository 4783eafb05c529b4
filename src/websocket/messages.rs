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

//! Stream event models and the live subscription request.
//!
//! Binance stream payloads use single-letter field names; the structs here
//! decode them into something readable. Prices and quantities stay as wire
//! strings since the core never does arithmetic on them. Event times stay as
//! wire milliseconds with typed accessors.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::common::time::{LocalNanos, ServerNanos};

/// Delivery metadata attached to every decoded event.
#[derive(Copy, Clone, Debug, Default)]
pub struct EventMeta {
    /// Local time when the handler received the message.
    pub ts_local_recv: LocalNanos,
    /// Server time when the handler received the message.
    pub ts_server_recv: ServerNanos,
}

/// A decoded stream event that accepts delivery metadata.
pub trait StreamEvent: DeserializeOwned + Send + 'static {
    fn set_meta(&mut self, meta: EventMeta);
}

/// Aggregate trade event (`<symbol>@aggTrade`).
#[derive(Clone, Debug, Deserialize)]
pub struct AggTradeEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "a")]
    pub agg_trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "f")]
    pub first_trade_id: u64,
    #[serde(rename = "l")]
    pub last_trade_id: u64,
    #[serde(rename = "T")]
    pub trade_time_ms: i64,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
    #[serde(skip)]
    pub meta: EventMeta,
}

impl AggTradeEvent {
    /// Event time as server nanoseconds.
    #[must_use]
    pub fn event_time(&self) -> ServerNanos {
        ServerNanos::from_wire(self.event_time_ms)
    }
}

impl StreamEvent for AggTradeEvent {
    fn set_meta(&mut self, meta: EventMeta) {
        self.meta = meta;
    }
}

/// Order-book diff event (`<symbol>@depth[@100ms]`).
#[derive(Clone, Debug, Deserialize)]
pub struct DepthDiffEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub last_update_id: u64,
    /// Price/quantity pairs; a zero quantity removes the level.
    #[serde(rename = "b")]
    pub bids: Vec<[String; 2]>,
    #[serde(rename = "a")]
    pub asks: Vec<[String; 2]>,
    #[serde(skip)]
    pub meta: EventMeta,
}

impl StreamEvent for DepthDiffEvent {
    fn set_meta(&mut self, meta: EventMeta) {
        self.meta = meta;
    }
}

/// One asset balance inside an account position event.
#[derive(Clone, Debug, Deserialize)]
pub struct AssetBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f")]
    pub free: String,
    #[serde(rename = "l")]
    pub locked: String,
}

/// Account position event (`outboundAccountPosition`).
#[derive(Clone, Debug, Deserialize)]
pub struct AccountPositionEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "u")]
    pub last_update_ms: i64,
    #[serde(rename = "B")]
    pub balances: Vec<AssetBalance>,
    #[serde(skip)]
    pub meta: EventMeta,
}

impl StreamEvent for AccountPositionEvent {
    fn set_meta(&mut self, meta: EventMeta) {
        self.meta = meta;
    }
}

/// Balance update event (`balanceUpdate`).
#[derive(Clone, Debug, Deserialize)]
pub struct BalanceUpdateEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "a")]
    pub asset: String,
    /// Signed balance delta.
    #[serde(rename = "d")]
    pub delta: String,
    #[serde(rename = "T")]
    pub clear_time_ms: i64,
    #[serde(skip)]
    pub meta: EventMeta,
}

impl StreamEvent for BalanceUpdateEvent {
    fn set_meta(&mut self, meta: EventMeta) {
        self.meta = meta;
    }
}

/// Order update event (`executionReport`).
#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionReportEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time_ms: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "f")]
    pub time_in_force: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "x")]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub order_status: String,
    #[serde(rename = "i")]
    pub order_id: u64,
    #[serde(rename = "l")]
    pub last_executed_qty: String,
    #[serde(rename = "z")]
    pub cumulative_filled_qty: String,
    #[serde(rename = "L")]
    pub last_executed_price: String,
    #[serde(rename = "T")]
    pub transaction_time_ms: i64,
    #[serde(skip)]
    pub meta: EventMeta,
}

impl StreamEvent for ExecutionReportEvent {
    fn set_meta(&mut self, meta: EventMeta) {
        self.meta = meta;
    }
}

/// The `e` tag used to route user-data events.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct EventTag {
    #[serde(rename = "e", default)]
    pub event_type: String,
}

/// A request sent on a live stream connection.
pub trait WsRequest: Send + Sync {
    /// Correlation id echoed back by the server.
    fn id(&self) -> u64;
}

/// Live `SUBSCRIBE`/`UNSUBSCRIBE` request.
#[derive(Clone, Debug, Serialize)]
pub struct StreamRequest {
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl StreamRequest {
    #[must_use]
    pub fn subscribe(streams: Vec<String>, id: u64) -> Self {
        Self {
            method: "SUBSCRIBE".to_string(),
            params: streams,
            id,
        }
    }

    #[must_use]
    pub fn unsubscribe(streams: Vec<String>, id: u64) -> Self {
        Self {
            method: "UNSUBSCRIBE".to_string(),
            params: streams,
            id,
        }
    }
}

impl WsRequest for StreamRequest {
    fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_agg_trade_event_parses() {
        let payload = r#"{
            "e":"aggTrade","E":1672515782136,"s":"BNBBTC","a":12345,
            "p":"0.001","q":"100","f":100,"l":105,"T":1672515782136,
            "m":true,"M":true
        }"#;

        let event: AggTradeEvent = serde_json::from_str(payload).expect("parses");
        assert_eq!(event.event_type, "aggTrade");
        assert_eq!(event.symbol, "BNBBTC");
        assert_eq!(event.agg_trade_id, 12_345);
        assert_eq!(event.price, "0.001");
        assert!(event.buyer_is_maker);
        assert_eq!(event.event_time().as_millis(), 1_672_515_782_136);
    }

    #[rstest]
    fn test_depth_diff_event_parses() {
        let payload = r#"{
            "e":"depthUpdate","E":1672515782136,"s":"BNBBTC",
            "U":157,"u":160,
            "b":[["0.0024","10"]],
            "a":[["0.0026","100"],["0.0027","0"]]
        }"#;

        let event: DepthDiffEvent = serde_json::from_str(payload).expect("parses");
        assert_eq!(event.first_update_id, 157);
        assert_eq!(event.last_update_id, 160);
        assert_eq!(event.bids.len(), 1);
        assert_eq!(event.asks[1][1], "0");
    }

    #[rstest]
    fn test_execution_report_parses() {
        let payload = r#"{
            "e":"executionReport","E":1499405658658,"s":"ETHBTC",
            "c":"mUvoqJxFIILMdfAW5iGSOW","S":"BUY","o":"LIMIT","f":"GTC",
            "q":"1.00000000","p":"0.10264410","x":"NEW","X":"NEW",
            "i":4293153,"l":"0.00000000","z":"0.00000000","L":"0.00000000",
            "T":1499405658657
        }"#;

        let event: ExecutionReportEvent = serde_json::from_str(payload).expect("parses");
        assert_eq!(event.order_id, 4_293_153);
        assert_eq!(event.order_status, "NEW");
        assert_eq!(event.side, "BUY");
    }

    #[rstest]
    fn test_stream_request_serializes() {
        let request = StreamRequest::subscribe(vec!["btcusdt@aggTrade".to_string()], 7);
        let json = serde_json::to_string(&request).expect("serializes");
        assert_eq!(
            json,
            r#"{"method":"SUBSCRIBE","params":["btcusdt@aggTrade"],"id":7}"#
        );
        assert_eq!(request.id(), 7);
    }

    #[rstest]
    fn test_event_meta_attaches() {
        let mut event: BalanceUpdateEvent = serde_json::from_str(
            r#"{"e":"balanceUpdate","E":1573200697110,"a":"BTC","d":"100.0","T":1573200697068}"#,
        )
        .expect("parses");

        assert_eq!(event.meta.ts_local_recv, LocalNanos::default());
        event.set_meta(EventMeta {
            ts_local_recv: LocalNanos::from_secs(1),
            ts_server_recv: ServerNanos::from_secs(2),
        });
        assert_eq!(event.meta.ts_local_recv, LocalNanos::from_secs(1));
        assert_eq!(event.meta.ts_server_recv, ServerNanos::from_secs(2));
    }
}
