//! STAC Item Search over HTTP.
//!
//! Each request is sent once. A failed page fails the whole search.

use std::time::Duration;

use tracing::debug;

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacItemCollection, StacLink, StacSearchParams};

const PLANETARY_COMPUTER_ROOT: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";
const PLANETARY_COMPUTER_SIGN: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";
const EARTH_SEARCH_ROOT: &str = "https://earth-search.aws.element84.com/v1";

/// Where scenes are searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StacCatalog {
    /// Element 84 Earth Search; public COG hrefs
    EarthSearch,
    /// Microsoft Planetary Computer; hrefs need a SAS signature
    PlanetaryComputer,
    /// Any STAC API root URL
    Custom(String),
}

impl StacCatalog {
    /// `earth-search`/`es`, `planetary-computer`/`pc`, or a root URL
    pub fn from_str_or_url(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            "pc" | "planetary-computer" | "planetarycomputer" => Self::PlanetaryComputer,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    pub fn root_url(&self) -> &str {
        match self {
            Self::EarthSearch => EARTH_SEARCH_ROOT,
            Self::PlanetaryComputer => PLANETARY_COMPUTER_ROOT,
            Self::Custom(url) => url.trim_end_matches('/'),
        }
    }

    pub fn search_url(&self) -> String {
        let root = self.root_url();
        if root.ends_with("/search") {
            root.to_string()
        } else {
            format!("{root}/search")
        }
    }

    pub fn needs_signing(&self) -> bool {
        *self == Self::PlanetaryComputer
    }
}

#[derive(Debug, Clone)]
pub struct StacClientOptions {
    pub request_timeout: Duration,
    /// Items collected across pages before paging stops
    pub max_items: usize,
    /// `limit` sent when the request has none
    pub page_size: u32,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_items: 100,
            page_size: 50,
        }
    }
}

pub struct StacClient {
    catalog: StacCatalog,
    http: reqwest::Client,
    options: StacClientOptions,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("building STAC client: {e}")))?;
        Ok(Self {
            catalog,
            http,
            options,
        })
    }

    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &StacClientOptions {
        &self.options
    }

    /// First page of results for `params`.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        self.post(&self.catalog.search_url(), params).await
    }

    /// Every matching item, following `next` links until the catalog stops
    /// returning them or `max_items` is reached.
    pub async fn search_all(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let mut request = params.clone();
        request.limit.get_or_insert(self.options.page_size);

        let max = self.options.max_items;
        let mut items = Vec::new();
        let mut page = self.search(&request).await?;
        let mut pages = 1usize;
        loop {
            let next = page.next_link().cloned();
            items.append(&mut page.features);
            let Some(link) = next.filter(|_| items.len() < max) else {
                break;
            };
            page = self.follow(&link, &mut request).await?;
            pages += 1;
            if page.is_empty() {
                break;
            }
        }
        items.truncate(max);
        debug!(items = items.len(), pages, url = %self.catalog.search_url(), "STAC search done");
        Ok(items)
    }

    /// Href usable for range reads: signed on Planetary Computer, unchanged
    /// elsewhere.
    pub async fn sign_asset_href(&self, href: &str) -> Result<String> {
        if !self.catalog.needs_signing() {
            return Ok(href.to_string());
        }
        let resp = self
            .http
            .get(PLANETARY_COMPUTER_SIGN)
            .query(&[("href", href)])
            .send()
            .await
            .map_err(|e| self.send_error(e, PLANETARY_COMPUTER_SIGN))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CloudError::Auth(format!(
                "signing {href} returned HTTP {status}"
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CloudError::Auth(format!("reading sign response: {e}")))?;
        body.get("href")
            .and_then(|h| h.as_str())
            .map(str::to_string)
            .ok_or_else(|| CloudError::Auth("sign response has no href".into()))
    }

    async fn follow(
        &self,
        link: &StacLink,
        request: &mut StacSearchParams,
    ) -> Result<StacItemCollection> {
        if link.is_post() {
            *request = link.next_request(request)?;
            return self.post(&link.href, request).await;
        }
        let resp = self
            .http
            .get(&link.href)
            .send()
            .await
            .map_err(|e| self.send_error(e, &link.href))?;
        self.page(resp, &link.href).await
    }

    async fn post(&self, url: &str, body: &StacSearchParams) -> Result<StacItemCollection> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e, url))?;
        self.page(resp, url).await
    }

    async fn page(&self, resp: reqwest::Response, url: &str) -> Result<StacItemCollection> {
        let status = resp.status();
        if !status.is_success() {
            debug!(%status, url, "STAC request rejected");
            return Err(CloudError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let text = resp.text().await.map_err(|e| self.send_error(e, url))?;
        serde_json::from_str(&text)
            .map_err(|e| CloudError::Catalog(format!("{url}: {e}")))
    }

    fn send_error(&self, e: reqwest::Error, url: &str) -> CloudError {
        if e.is_timeout() {
            CloudError::Timeout {
                what: format!("request to {url}"),
                secs: self.options.request_timeout.as_secs(),
            }
        } else {
            CloudError::Http(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_and_urls() {
        assert_eq!(StacCatalog::from_str_or_url("ES"), StacCatalog::EarthSearch);
        assert_eq!(
            StacCatalog::from_str_or_url("planetary-computer"),
            StacCatalog::PlanetaryComputer
        );
        assert_eq!(
            StacCatalog::from_str_or_url(" https://stac.example.org/v1 "),
            StacCatalog::Custom("https://stac.example.org/v1".into())
        );
    }

    #[test]
    fn search_endpoint() {
        assert_eq!(
            StacCatalog::EarthSearch.search_url(),
            "https://earth-search.aws.element84.com/v1/search"
        );
        for root in [
            "https://stac.example.org/v1",
            "https://stac.example.org/v1/",
            "https://stac.example.org/v1/search",
        ] {
            assert_eq!(
                StacCatalog::Custom(root.into()).search_url(),
                "https://stac.example.org/v1/search"
            );
        }
    }

    #[test]
    fn only_planetary_computer_signs() {
        assert!(StacCatalog::PlanetaryComputer.needs_signing());
        assert!(!StacCatalog::EarthSearch.needs_signing());
        assert!(!StacCatalog::Custom(PLANETARY_COMPUTER_ROOT.into()).needs_signing());
    }

    #[tokio::test]
    async fn unsigned_catalog_keeps_href() {
        let client =
            StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default()).unwrap();
        let href = "https://sentinel-cogs.s3.us-west-2.amazonaws.com/B04.tif";
        assert_eq!(client.sign_asset_href(href).await.unwrap(), href);
    }
}
