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

//! Query parameters for REST requests.
//!
//! Parameters keep insertion order: the signature over a signed query is
//! computed on the encoded string, so the encoding must be stable and the
//! `timestamp`/`recvWindow`/`signature` triple must land at the end in that
//! canonical order. A sorted map would silently reorder them.

use serde::Serialize;

use crate::http::error::{BinanceHttpError, BinanceHttpResult};

/// An insertion-ordered list of query parameters.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Params(Vec<(String, String)>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, keeping insertion order.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Percent-encodes the parameters into a query string.
    ///
    /// # Errors
    ///
    /// Returns [`BinanceHttpError::Validation`] when a parameter cannot be
    /// encoded.
    pub fn encode(&self) -> BinanceHttpResult<String> {
        serde_urlencoded::to_string(&self.0)
            .map_err(|e| BinanceHttpError::Validation(e.to_string()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_encode_preserves_insertion_order() {
        let mut params = Params::new();
        params
            .insert("symbol", "BTCUSDT")
            .insert("side", "BUY")
            .insert("type", "MARKET")
            .insert("quantity", "1");

        assert_eq!(
            params.encode().expect("encodes"),
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=1"
        );
    }

    #[rstest]
    fn test_encode_escapes_reserved_characters() {
        let mut params = Params::new();
        params.insert("note", "a b&c=d");

        assert_eq!(params.encode().expect("encodes"), "note=a+b%26c%3Dd");
    }

    #[rstest]
    fn test_empty_params_encode_to_empty_string() {
        assert_eq!(Params::new().encode().expect("encodes"), "");
        assert!(Params::new().is_empty());
    }
}
