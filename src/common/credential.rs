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

//! Request authentication for `SIGNED` and `API-KEY` endpoints.
//!
//! Binance authenticates a signed request by an HMAC-SHA256 digest of the
//! final encoded query string, appended as the trailing `signature`
//! parameter. The pipeline encodes the query (with `timestamp` and
//! `recvWindow` already in place), then hands it to
//! [`Credentials::finish_query`] to seal it. The secret is held in memory
//! that is zeroed on drop; the key is interned, since it rides on every
//! authenticated request.

use std::fmt;

use aws_lc_rs::hmac;
use ustr::Ustr;
use zeroize::Zeroizing;

/// API key and secret for authenticated endpoints.
#[derive(Clone)]
pub struct Credentials {
    key: Ustr,
    secret: Zeroizing<Vec<u8>>,
}

impl Credentials {
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let key: String = api_key.into();
        Self {
            key: Ustr::from(&key),
            secret: Zeroizing::new(api_secret.into().into_bytes()),
        }
    }

    /// The API key, sent as the `X-MBX-APIKEY` header.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.key.as_str()
    }

    /// Lowercase hex HMAC-SHA256 digest of `query` under the API secret.
    #[must_use]
    pub fn signature_for(&self, query: &str) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.secret);
        hex::encode(hmac::sign(&key, query.as_bytes()))
    }

    /// Seals an encoded query by appending its `signature` as the last
    /// parameter. `encoded` must be the exact byte sequence the server will
    /// verify, so any re-encoding after this step invalidates the result.
    #[must_use]
    pub fn finish_query(&self, encoded: String) -> String {
        let signature = self.signature_for(&encoded);
        format!("{encoded}&signature={signature}")
    }
}

// The secret never appears in logs or error chains.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials(key={}, secret=***)", self.key)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    // Vectors from https://github.com/binance/binance-signature-examples
    fn example_credentials() -> Credentials {
        Credentials::new(
            "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        )
    }

    #[rstest]
    #[case(
        "timestamp=1578963600000",
        "d84e6641b1e328e7b418fff030caed655c266299c9355e36ce801ed14631eed4"
    )]
    #[case(
        "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559",
        "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
    )]
    fn test_signature_matches_published_vectors(#[case] query: &str, #[case] expected: &str) {
        assert_eq!(example_credentials().signature_for(query), expected);
    }

    #[rstest]
    fn test_finish_query_appends_signature_last() {
        let credentials = example_credentials();
        let sealed = credentials.finish_query("timestamp=1578963600000".to_string());

        assert_eq!(
            sealed,
            "timestamp=1578963600000&signature=d84e6641b1e328e7b418fff030caed655c266299c9355e36ce801ed14631eed4"
        );
        // Sealing the same query twice yields the same bytes; a different
        // query yields a different trailer.
        assert_eq!(
            sealed,
            credentials.finish_query("timestamp=1578963600000".to_string())
        );
        assert_ne!(
            sealed,
            credentials.finish_query("timestamp=1578963600001".to_string())
        );
    }

    #[rstest]
    fn test_debug_never_shows_the_secret() {
        let credentials = Credentials::new("public-key", "very-secret");
        let printed = format!("{credentials:?}");

        assert!(printed.contains("public-key"));
        assert!(!printed.contains("very-secret"));
    }
}
