//! Byte-range reads over HTTP.
//!
//! Requests are sent once. Failures and timeouts reach the caller as
//! transport errors.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::trace;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Bytes `[offset, offset + length)` of `url`. Shorter when the range
    /// runs past the end of the file.
    pub async fn fetch_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
        auth: &dyn CloudAuth,
    ) -> Result<Vec<u8>> {
        let Some(range) = range_header(offset, length) else {
            return Ok(Vec::new());
        };
        let mut headers = Vec::new();
        auth.sign_request(url, "GET", &mut headers)?;

        let req = headers
            .iter()
            .fold(self.client.get(url).header("Range", range), |req, (k, v)| {
                req.header(k.as_str(), v.as_str())
            });
        trace!(url, offset, length, "range request");
        let resp = req.send().await.map_err(|e| self.send_error(e, url))?;
        check_range_status(resp.status(), url)?;

        let body = resp.bytes().await.map_err(|e| self.send_error(e, url))?;
        Ok(body.to_vec())
    }

    fn send_error(&self, e: reqwest::Error, url: &str) -> CloudError {
        if e.is_timeout() {
            CloudError::Timeout {
                what: format!("range read of {url}"),
                secs: self.request_timeout.as_secs(),
            }
        } else {
            CloudError::Http(e)
        }
    }
}

/// `Range` header value for `length` bytes at `offset`; `None` when empty.
fn range_header(offset: u64, length: u64) -> Option<String> {
    let last = offset.checked_add(length.checked_sub(1)?)?;
    Some(format!("bytes={offset}-{last}"))
}

/// Only `206 Partial Content` is a usable answer to a range request. A
/// full-body `200` means the server ignored the range.
fn check_range_status(status: StatusCode, url: &str) -> Result<()> {
    match status {
        StatusCode::PARTIAL_CONTENT => Ok(()),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(CloudError::RangeNotSupported {
            url: url.to_string(),
        }),
        s if s.is_success() => Err(CloudError::RangeNotSupported {
            url: url.to_string(),
        }),
        s => Err(CloudError::HttpStatus {
            status: s.as_u16(),
            url: url.to_string(),
        }),
    }
}
