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

//! The REST request pipeline.
//!
//! A dispatch walks a fixed sequence: build the URL and apply endpoint
//! security, record the send timestamps, reserve rate-limit weight, send the
//! request raced against the caller's cancellation token, release the
//! reservation on every completion path, parse and immediately reconcile the
//! response headers, then classify the status code into the typed error set.
//!
//! Multiple dispatches run in parallel; ordering between them is undefined,
//! but each rate-limit counter serializes admission so no concurrent set of
//! admissions can collectively exceed a limit.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::{
    common::{
        consts::{HEADER_API_KEY, MARLIN_USER_AGENT, SERVER_ERROR_PRODUCER},
        credential::Credentials,
        enums::SecurityKind,
        models::{ResponseHeader, ServiceCall, ServiceDefinition},
        time::{TimeHandler, NANOS_PER_SEC},
    },
    http::{
        error::{BadRequestError, BinanceHttpError, BinanceHttpResult, RetryAfterError},
        headers::parse_response_header,
        models::BinanceErrorResponse,
        query::Params,
    },
    ratelimit::RateLimitManager,
};

/// Dispatches signed requests to the Binance REST APIs.
///
/// Shares one `reqwest::Client`, the clock, and the rate-limit manager with
/// every service created from the same [`crate::client::BinanceClient`].
#[derive(Clone, Debug)]
pub struct BinanceRestClient {
    http: reqwest::Client,
    clock: Arc<dyn TimeHandler>,
    limits: Arc<RateLimitManager>,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
}

impl BinanceRestClient {
    /// Creates a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest::Client` fails to build.
    pub fn new(
        clock: Arc<dyn TimeHandler>,
        limits: Arc<RateLimitManager>,
        credentials: Option<Credentials>,
        recv_window_ms: u64,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(MARLIN_USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            clock,
            limits,
            credentials,
            recv_window_ms,
        })
    }

    /// Returns the shared time handler.
    #[must_use]
    pub fn time_handler(&self) -> &Arc<dyn TimeHandler> {
        &self.clock
    }

    /// Returns the shared rate-limit manager.
    #[must_use]
    pub fn rate_limits(&self) -> &Arc<RateLimitManager> {
        &self.limits
    }

    /// Dispatches one request described by `call` and returns the raw body.
    ///
    /// `call` is populated as the request progresses: send timestamps before
    /// admission, receive timestamps and the parsed header on completion,
    /// and the final status code. The send timestamps are recorded even when
    /// admission rejects, so a throttled attempt remains diagnosable.
    ///
    /// # Errors
    ///
    /// Returns the typed [`BinanceHttpError`] for admission rejections,
    /// 418/429 backoff demands, bad requests, unexpected statuses, transport
    /// failures, and cancellation.
    pub async fn dispatch(
        &self,
        token: &CancellationToken,
        call: &mut ServiceCall,
        mut params: Params,
    ) -> BinanceHttpResult<Bytes> {
        let definition = call.definition.clone();
        let (query, api_key) = self.secured_query(&definition, &mut params)?;
        let url = build_url(&definition, &query);

        call.ts_local_sent = self.clock.local_now();
        call.ts_server_sent = self.clock.server_now();

        self.limits
            .register_pending(&definition)
            .map_err(BinanceHttpError::RetryAfter)?;

        let result = self.send_request(token, &definition, url, api_key).await;

        // Pending weight is released on every path, before reconciliation,
        // so the server-reported count is never double-counted against a
        // still-held reservation.
        self.limits.unregister_pending(&definition);
        call.ts_local_recv = self.clock.local_now();
        call.ts_server_recv = self.clock.server_now();

        let response = result?;
        let header = parse_response_header(response.headers(), definition.family)?;
        self.limits
            .reconcile(&header.rate_limit_updates, header.ts_server);

        let status = response.status().as_u16();
        call.status_code = status;

        let body = tokio::select! {
            () = token.cancelled() => {
                return Err(BinanceHttpError::Canceled(
                    "canceled while reading response body".to_string(),
                ));
            }
            result = response.bytes() => result.map_err(BinanceHttpError::from)?,
        };

        let outcome = self.classify_status(status, &header, &body);
        call.response_header = Some(header);
        outcome?;

        Ok(body)
    }

    /// Applies the descriptor's security mode to `params` and returns the
    /// final query string plus the API key header value, if any.
    ///
    /// For signed endpoints, `timestamp` (server time, milliseconds) and
    /// `recvWindow` are appended in that order before signing, and the
    /// signature lands as the last parameter of the encoded query.
    pub(crate) fn secured_query<'a>(
        &'a self,
        definition: &ServiceDefinition,
        params: &mut Params,
    ) -> BinanceHttpResult<(String, Option<&'a str>)> {
        match definition.security {
            SecurityKind::None => Ok((params.encode()?, None)),
            SecurityKind::ApiKey => {
                let credentials = self.credentials()?;
                Ok((params.encode()?, Some(credentials.api_key())))
            }
            SecurityKind::Signed => {
                let credentials = self.credentials()?;
                params.insert("timestamp", self.clock.server_now().as_millis().to_string());
                params.insert("recvWindow", self.recv_window_ms.to_string());

                let encoded = params.encode()?;
                Ok((credentials.finish_query(encoded), Some(credentials.api_key())))
            }
        }
    }

    fn credentials(&self) -> BinanceHttpResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or(BinanceHttpError::MissingCredentials)
    }

    async fn send_request(
        &self,
        token: &CancellationToken,
        definition: &ServiceDefinition,
        url: String,
        api_key: Option<&str>,
    ) -> BinanceHttpResult<reqwest::Response> {
        let mut request = self.http.request(definition.method.clone(), url);
        if let Some(key) = api_key {
            request = request.header(HEADER_API_KEY, key);
        }

        tokio::select! {
            () = token.cancelled() => Err(BinanceHttpError::Canceled(
                "canceled before the response arrived".to_string(),
            )),
            result = request.send() => result.map_err(BinanceHttpError::from),
        }
    }

    fn classify_status(
        &self,
        status: u16,
        header: &ResponseHeader,
        body: &[u8],
    ) -> BinanceHttpResult<()> {
        if status == 200 {
            return Ok(());
        }

        // Best-effort error body; fields default to zero/empty on failure.
        let error_body: BinanceErrorResponse =
            serde_json::from_slice(body).unwrap_or_else(|_| {
                tracing::debug!(
                    body = %String::from_utf8_lossy(body),
                    "error response body is not a Binance error payload",
                );
                BinanceErrorResponse::default()
            });

        match status {
            418 | 429 => {
                // The header parser guarantees a server timestamp; only the
                // Retry-After header can still be missing, and without it
                // there is nothing sane to tell the caller.
                let retry_after = header.retry_after_secs.ok_or_else(|| {
                    BinanceHttpError::Internal(format!(
                        "status {status} without a Retry-After header"
                    ))
                })?;

                let tss_retry = header.ts_server.add_nanos(retry_after * NANOS_PER_SEC);
                let retry_time_local = self.clock.server_to_local(tss_retry);
                let retry_after_secs =
                    retry_time_local.nanos_since(self.clock.local_now()) / NANOS_PER_SEC;

                Err(BinanceHttpError::RetryAfter(RetryAfterError {
                    status_code: status,
                    error_code: error_body.code,
                    message: error_body.msg,
                    producer: SERVER_ERROR_PRODUCER,
                    retry_time_local,
                    retry_after_secs,
                }))
            }
            400 | 401 => Err(BinanceHttpError::BadRequest(BadRequestError {
                status_code: status,
                error_code: error_body.code,
                message: error_body.msg,
            })),
            _ => {
                tracing::error!(status, "unexpected status code");
                Err(BinanceHttpError::UnexpectedStatus {
                    status,
                    body: String::from_utf8_lossy(body).to_string(),
                })
            }
        }
    }
}

fn build_url(definition: &ServiceDefinition, query: &str) -> String {
    let mut url = format!(
        "{}://{}{}",
        definition.scheme, definition.host, definition.path
    );
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::{
        enums::BinanceEndpointFamily,
        models::RateLimitUpdate,
        time::{testing::FrozenClock, LocalNanos, ServerNanos},
    };

    fn frozen_clock() -> Arc<FrozenClock> {
        Arc::new(FrozenClock::at(1_700_000_000 * NANOS_PER_SEC))
    }

    fn test_client(clock: Arc<FrozenClock>, credentials: Option<Credentials>) -> BinanceRestClient {
        let limits = Arc::new(RateLimitManager::new(clock.clone(), &[]));
        BinanceRestClient::new(clock, limits, credentials, 5_000, None)
            .expect("client builds")
    }

    fn definition(security: SecurityKind) -> ServiceDefinition {
        ServiceDefinition {
            scheme: "https",
            method: reqwest::Method::POST,
            host: "api.binance.com",
            path: "/api/v3/order",
            family: BinanceEndpointFamily::Api,
            security,
            weight_ip: 1,
            weight_uid: 1,
            weight_raw: 0,
        }
    }

    fn order_params() -> Params {
        let mut params = Params::new();
        params
            .insert("symbol", "BTCUSDT")
            .insert("side", "BUY")
            .insert("type", "MARKET")
            .insert("quantity", "1");
        params
    }

    #[rstest]
    fn test_build_url() {
        let def = definition(SecurityKind::None);
        assert_eq!(
            build_url(&def, ""),
            "https://api.binance.com/api/v3/order"
        );
        assert_eq!(
            build_url(&def, "symbol=BTCUSDT"),
            "https://api.binance.com/api/v3/order?symbol=BTCUSDT"
        );
    }

    // Scenario: the signing step appends `timestamp` then `recvWindow`
    // before computing the HMAC, and the signature lands last.
    #[rstest]
    fn test_signed_query_canonical_order() {
        let clock = frozen_clock();
        let credentials = Credentials::new("k", "s");
        let client = test_client(clock, Some(credentials.clone()));
        let def = definition(SecurityKind::Signed);

        let (query, api_key) = client
            .secured_query(&def, &mut order_params())
            .expect("signs");

        let unsigned =
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=1&timestamp=1700000000000&recvWindow=5000";
        let expected = format!("{unsigned}&signature={}", credentials.signature_for(unsigned));
        assert_eq!(query, expected);
        assert_eq!(api_key, Some("k"));

        // Deterministic over identical inputs.
        let (again, _) = client
            .secured_query(&def, &mut order_params())
            .expect("signs");
        assert_eq!(query, again);
    }

    #[rstest]
    fn test_signed_query_without_credentials_fails() {
        let client = test_client(frozen_clock(), None);
        let err = client
            .secured_query(&definition(SecurityKind::Signed), &mut Params::new())
            .expect_err("no credentials");
        assert!(matches!(err, BinanceHttpError::MissingCredentials));
    }

    #[rstest]
    fn test_api_key_security_sets_header_only() {
        let credentials = Credentials::new("key", "secret");
        let client = test_client(frozen_clock(), Some(credentials));

        let (query, api_key) = client
            .secured_query(&definition(SecurityKind::ApiKey), &mut order_params())
            .expect("encodes");
        assert_eq!(query, "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=1");
        assert_eq!(api_key, Some("key"));
    }

    fn header_with_retry(retry_after_secs: Option<i64>) -> ResponseHeader {
        ResponseHeader {
            server: "nginx".to_string(),
            ts_server: ServerNanos::from_secs(1_700_000_100),
            rate_limit_updates: Vec::<RateLimitUpdate>::new(),
            retry_after_secs,
        }
    }

    #[rstest]
    fn test_classify_418_builds_retry_after() {
        let clock = frozen_clock();
        let client = test_client(clock, None);
        let header = header_with_retry(Some(30));

        let err = client
            .classify_status(418, &header, br#"{"code":-1003,"msg":"Way too much request weight used."}"#)
            .expect_err("teapot");

        match err {
            BinanceHttpError::RetryAfter(e) => {
                assert_eq!(e.status_code, 418);
                assert_eq!(e.error_code, -1003);
                assert_eq!(e.producer, SERVER_ERROR_PRODUCER);
                assert_eq!(
                    e.retry_time_local,
                    LocalNanos::from_secs(1_700_000_130)
                );
                assert_eq!(e.retry_after_secs, 130);
            }
            other => panic!("expected RetryAfter, got {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_429_without_retry_after_is_internal() {
        let client = test_client(frozen_clock(), None);
        let err = client
            .classify_status(429, &header_with_retry(None), b"")
            .expect_err("missing header");
        assert!(matches!(err, BinanceHttpError::Internal(_)));
    }

    #[rstest]
    #[case(400)]
    #[case(401)]
    fn test_classify_bad_request(#[case] status: u16) {
        let client = test_client(frozen_clock(), None);
        let err = client
            .classify_status(
                status,
                &header_with_retry(None),
                br#"{"code":-1121,"msg":"Invalid symbol."}"#,
            )
            .expect_err("bad request");

        match err {
            BinanceHttpError::BadRequest(e) => {
                assert_eq!(e.status_code, status);
                assert_eq!(e.error_code, -1121);
                assert_eq!(e.message, "Invalid symbol.");
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_bad_request_with_unparseable_body_defaults_fields() {
        let client = test_client(frozen_clock(), None);
        let err = client
            .classify_status(400, &header_with_retry(None), b"<html>nope</html>")
            .expect_err("bad request");

        match err {
            BinanceHttpError::BadRequest(e) => {
                assert_eq!(e.error_code, 0);
                assert!(e.message.is_empty());
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[rstest]
    fn test_classify_unexpected_status() {
        let client = test_client(frozen_clock(), None);
        let err = client
            .classify_status(500, &header_with_retry(None), b"Internal Server Error")
            .expect_err("unexpected");

        match err {
            BinanceHttpError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal Server Error");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }
}
