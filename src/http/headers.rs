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

//! Response-header parsing.
//!
//! Binance reports consumed rate-limit weight in headers whose names encode
//! the kind and interval, e.g. `x-mbx-used-weight-1m: 371` or
//! `x-sapi-used-uid-weight-1m: 12`. The header names are not enumerable up
//! front (the interval part varies), so parsing scans every header against
//! the four known name families.
//!
//! A malformed known rate-limit header fails the whole request: feeding a
//! half-parsed count into reconciliation would corrupt the accounting that
//! every later admission decision depends on. Absent rate-limit headers are
//! normal; not every endpoint publishes them.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::HeaderMap;

use crate::common::{
    enums::{BinanceEndpointFamily, BinanceRateLimitInterval, BinanceRateLimitKind},
    models::{RateLimitUpdate, ResponseHeader},
    time::ServerNanos,
};
use crate::http::error::{BinanceHttpError, BinanceHttpResult};

struct HeaderPatterns {
    ip_weight: Regex,
    sapi_ip_weight: Regex,
    uid_count: Regex,
    sapi_uid_weight: Regex,
}

fn patterns() -> &'static HeaderPatterns {
    static PATTERNS: OnceLock<HeaderPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HeaderPatterns {
        ip_weight: Regex::new(r"^x-mbx-used-weight-(\d+)([a-z])$").expect("valid pattern"),
        sapi_ip_weight: Regex::new(r"^x-sapi-used-ip-weight-(\d+)([a-z])$")
            .expect("valid pattern"),
        uid_count: Regex::new(r"^x-mbx-order-count-(\d+)([a-z])$").expect("valid pattern"),
        sapi_uid_weight: Regex::new(r"^x-sapi-used-uid-weight-(\d+)([a-z])$")
            .expect("valid pattern"),
    })
}

fn malformed(name: &str, detail: &str) -> BinanceHttpError {
    BinanceHttpError::UnexpectedResponse(format!("malformed header `{name}`: {detail}"))
}

/// Parses one matched rate-limit header into an update.
fn parse_rate_limit_header(
    name: &str,
    value: &str,
    captures: &regex::Captures<'_>,
    family: BinanceEndpointFamily,
    kind: BinanceRateLimitKind,
) -> BinanceHttpResult<RateLimitUpdate> {
    let count: i64 = value
        .parse()
        .map_err(|_| malformed(name, &format!("count `{value}` is not an integer")))?;

    let interval_num: i64 = captures[1]
        .parse()
        .map_err(|_| malformed(name, "interval number out of range"))?;

    let letter = captures[2]
        .chars()
        .next()
        .ok_or_else(|| malformed(name, "missing interval unit"))?;
    let interval = BinanceRateLimitInterval::from_unit_letter(letter)
        .ok_or_else(|| malformed(name, &format!("unknown interval unit `{letter}`")))?;

    Ok(RateLimitUpdate {
        family,
        kind,
        interval,
        interval_num,
        count,
    })
}

/// Parses a Binance response header block into a [`ResponseHeader`].
///
/// `family` is the endpoint family of the request the response belongs to;
/// the header names themselves do not carry it.
///
/// # Errors
///
/// Returns [`BinanceHttpError::UnexpectedResponse`] when `Server` or `Date`
/// is missing or unparseable, or when a recognized rate-limit or
/// `Retry-After` header is malformed.
pub fn parse_response_header(
    headers: &HeaderMap,
    family: BinanceEndpointFamily,
) -> BinanceHttpResult<ResponseHeader> {
    let patterns = patterns();
    let mut updates = Vec::new();

    for (name, value) in headers {
        let name = name.as_str(); // already lowercase
        let is_ip = patterns.ip_weight.captures(name).or_else(|| patterns.sapi_ip_weight.captures(name));
        let is_uid = patterns.uid_count.captures(name).or_else(|| patterns.sapi_uid_weight.captures(name));

        let (captures, kind) = match (is_ip, is_uid) {
            (Some(captures), _) => (captures, BinanceRateLimitKind::Ip),
            (_, Some(captures)) => (captures, BinanceRateLimitKind::Uid),
            (None, None) => continue,
        };

        let value = value
            .to_str()
            .map_err(|_| malformed(name, "value is not visible ASCII"))?;
        updates.push(parse_rate_limit_header(name, value, &captures, family, kind)?);
    }

    let server = headers
        .get("server")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            BinanceHttpError::UnexpectedResponse("missing `Server` header".to_string())
        })?
        .to_string();

    let date = headers
        .get("date")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BinanceHttpError::UnexpectedResponse("missing `Date` header".to_string()))?;
    let ts_server = chrono::DateTime::parse_from_rfc2822(date)
        .ok()
        .and_then(|dt| dt.timestamp_nanos_opt())
        .map(ServerNanos::from_nanos)
        .ok_or_else(|| malformed("date", &format!("`{date}` is not an RFC 1123 date")))?;

    let retry_after_secs = headers
        .get("retry-after")
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| malformed("retry-after", "not an integer number of seconds"))
        })
        .transpose()?;

    Ok(ResponseHeader {
        server,
        ts_server,
        rate_limit_updates: updates,
        retry_after_secs,
    })
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use rstest::rstest;

    use super::*;
    use crate::common::time::NANOS_PER_SEC;

    fn base_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("nginx"));
        headers.insert(
            "date",
            HeaderValue::from_static("Wed, 15 Nov 2023 20:32:19 GMT"),
        );
        headers
    }

    fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).expect("valid name"),
            HeaderValue::from_str(value).expect("valid value"),
        );
    }

    #[rstest]
    fn test_parses_weight_and_order_count_headers() {
        let mut headers = base_headers();
        insert(&mut headers, "x-mbx-used-weight-1m", "371");
        insert(&mut headers, "x-mbx-order-count-10s", "4");
        insert(&mut headers, "x-mbx-order-count-1d", "120");

        let parsed =
            parse_response_header(&headers, BinanceEndpointFamily::Api).expect("parses");

        assert_eq!(parsed.server, "nginx");
        assert_eq!(parsed.retry_after_secs, None);
        assert_eq!(parsed.rate_limit_updates.len(), 3);

        let weight = parsed
            .rate_limit_updates
            .iter()
            .find(|u| u.kind == BinanceRateLimitKind::Ip)
            .expect("ip update");
        assert_eq!(weight.count, 371);
        assert_eq!(weight.interval_secs(), 60);

        let day_orders = parsed
            .rate_limit_updates
            .iter()
            .find(|u| u.interval == BinanceRateLimitInterval::Day)
            .expect("day update");
        assert_eq!(day_orders.kind, BinanceRateLimitKind::Uid);
        assert_eq!(day_orders.count, 120);
        assert_eq!(day_orders.interval_secs(), 86_400);
    }

    #[rstest]
    fn test_parses_sapi_header_variants() {
        let mut headers = base_headers();
        insert(&mut headers, "x-sapi-used-ip-weight-1m", "12000");
        insert(&mut headers, "x-sapi-used-uid-weight-1m", "180000");

        let parsed =
            parse_response_header(&headers, BinanceEndpointFamily::Sapi).expect("parses");

        assert_eq!(parsed.rate_limit_updates.len(), 2);
        assert!(parsed
            .rate_limit_updates
            .iter()
            .all(|u| u.family == BinanceEndpointFamily::Sapi));
        assert!(parsed
            .rate_limit_updates
            .iter()
            .any(|u| u.kind == BinanceRateLimitKind::Ip && u.count == 12_000));
        assert!(parsed
            .rate_limit_updates
            .iter()
            .any(|u| u.kind == BinanceRateLimitKind::Uid && u.count == 180_000));
    }

    #[rstest]
    fn test_date_header_becomes_server_nanos() {
        let headers = base_headers();
        let parsed =
            parse_response_header(&headers, BinanceEndpointFamily::Api).expect("parses");

        // 2023-11-15T20:32:19Z
        assert_eq!(parsed.ts_server.as_nanos(), 1_700_080_339 * NANOS_PER_SEC);
    }

    #[rstest]
    fn test_retry_after_parses_as_seconds() {
        let mut headers = base_headers();
        insert(&mut headers, "retry-after", "59");

        let parsed =
            parse_response_header(&headers, BinanceEndpointFamily::Api).expect("parses");
        assert_eq!(parsed.retry_after_secs, Some(59));
    }

    #[rstest]
    #[case("x-mbx-used-weight-1m", "not-a-number")] // bad count
    #[case("x-mbx-used-weight-1h", "100")] // unit outside {s,m,d}
    #[case("x-mbx-order-count-1x", "5")] // unit outside {s,m,d}
    fn test_malformed_known_header_is_fatal(#[case] name: &str, #[case] value: &str) {
        let mut headers = base_headers();
        insert(&mut headers, name, value);

        let err = parse_response_header(&headers, BinanceEndpointFamily::Api)
            .expect_err("malformed header");
        assert!(matches!(err, BinanceHttpError::UnexpectedResponse(_)));
    }

    #[rstest]
    fn test_unrelated_headers_are_ignored() {
        let mut headers = base_headers();
        insert(&mut headers, "content-type", "application/json");
        insert(&mut headers, "x-mbx-uuid", "abc-123");

        let parsed =
            parse_response_header(&headers, BinanceEndpointFamily::Api).expect("parses");
        assert!(parsed.rate_limit_updates.is_empty());
    }

    #[rstest]
    fn test_missing_server_header_is_fatal() {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "date", "Wed, 15 Nov 2023 20:32:19 GMT");

        let err = parse_response_header(&headers, BinanceEndpointFamily::Api)
            .expect_err("missing server");
        assert!(matches!(err, BinanceHttpError::UnexpectedResponse(_)));
    }

    #[rstest]
    fn test_missing_or_bad_date_header_is_fatal() {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "server", "nginx");
        assert!(parse_response_header(&headers, BinanceEndpointFamily::Api).is_err());

        insert(&mut headers, "date", "yesterday");
        assert!(parse_response_header(&headers, BinanceEndpointFamily::Api).is_err());
    }
}
