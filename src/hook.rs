// Copyright (C) 2023 Dheatly23
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Response hook for HTTP clients.
//!
//! The hook only sees finished responses. Fetching, retries and caching
//! belong to whatever implements [`Fetch`].

use bytes::Bytes;

use crate::engine::DescramblingEngine;
use crate::error::DescrambleError;

/// Query parameter the publisher puts on scrambled image URLs.
pub const DEFAULT_MARKER: &str = "Signature";

/// A fetched HTTP response carrying an image body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ImageResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.headers.push((name.to_owned(), value)),
        }
    }
}

/// The HTTP client the hook is attached to.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<ImageResponse, FetchError>;
}

pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] FetchError),

    #[error(transparent)]
    Descramble(#[from] DescrambleError),
}

/// Replaces scrambled image bodies with their reconstruction.
#[derive(Debug, Clone)]
pub struct DescrambleHook {
    marker: String,
    engine: DescramblingEngine,
}

impl DescrambleHook {
    pub fn new(engine: DescramblingEngine) -> Self {
        Self {
            marker: DEFAULT_MARKER.to_owned(),
            engine,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Whether `url` carries the marker query parameter.
    pub fn matches(&self, url: &str) -> bool {
        let Some((_, query)) = url.split_once('?') else {
            return false;
        };
        let query = query.split('#').next().unwrap_or_default();
        query
            .split('&')
            .map(|pair| pair.split_once('=').map_or(pair, |(k, _)| k))
            .any(|k| k == self.marker)
    }

    /// Rewrites `response` if `request_url` marks it as scrambled.
    ///
    /// Unmarked URLs and non-2xx responses pass through untouched. When
    /// the key is missing or unreadable the original bytes are served.
    /// Only a body that cannot be decoded at all is an error.
    pub fn intercept(
        &self,
        request_url: &str,
        response: ImageResponse,
    ) -> Result<ImageResponse, DescrambleError> {
        if !(200..300).contains(&response.status) || !self.matches(request_url) {
            return Ok(response);
        }

        let out = match self.engine.descramble(response.body.clone()) {
            Ok(out) => out,
            Err(e) if e.is_key_error() => {
                log::warn!("serving {request_url} as is: {e}");
                return Ok(response);
            }
            Err(e) => return Err(e),
        };

        if out.is_partial() {
            log::warn!(
                "{request_url} only partially reconstructed ({} problems)",
                out.warnings.len()
            );
        }

        let mut response = response;
        response.set_header("Content-Length", out.bytes.len().to_string());
        response.set_header("Content-Type", out.format.mime_type().to_owned());
        response.body = Bytes::from(out.bytes);
        Ok(response)
    }

    /// Fetches `url` through `client` and intercepts the response.
    pub fn fetch<F: Fetch + ?Sized>(&self, client: &F, url: &str) -> Result<ImageResponse, HookError> {
        let response = client.fetch(url).map_err(HookError::Fetch)?;
        Ok(self.intercept(url, response)?)
    }
}

impl Default for DescrambleHook {
    fn default() -> Self {
        Self::new(DescramblingEngine::default())
    }
}
