//! HTTP client for the remote catalog API.
//!
//! The [`CatalogClient`] fetches series metadata, the paginated chapter
//! listing, and per-chapter image manifests. Catalog calls are
//! all-or-nothing: any page failure discards the pages already collected.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::types::{ChapterListing, ChapterRecord, ImageManifestEntry, SeriesInfo};

/// Connect timeout for catalog requests, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total per-request timeout for catalog requests, in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default page size for the chapter listing.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Hard ceiling on chapter-listing pages.
///
/// A liveness guard against a misbehaving or infinite remote cursor, not
/// a correctness bound: hitting it logs a warning and returns whatever
/// was collected so far.
pub const MAX_CATALOG_PAGES: usize = 100;

/// Client for the remote catalog API.
///
/// Designed to be created once per session and reused, taking advantage
/// of connection pooling.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base: Url,
}

impl CatalogClient {
    /// Creates a new catalog client rooted at `base`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(base: Url) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(concat!("mangavault/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client, base }
    }

    /// Fetches the series descriptor for a slug.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, timeout, non-success
    /// status, or an undecodable body.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn fetch_series(&self, slug: &str) -> Result<SeriesInfo, FetchError> {
        let url = self.endpoint(&format!("comic/{slug}"))?;
        self.get_json(url).await
    }

    /// Fetches the complete chapter listing for a series, page by page.
    ///
    /// Pages are 1-indexed and concatenated until a page comes back short
    /// or empty. Pagination is abandoned after [`MAX_CATALOG_PAGES`] with
    /// a warning, returning what was collected.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if any page request fails; pages already
    /// collected are discarded.
    #[instrument(skip(self), fields(series_hid = %series_hid, page_size))]
    pub async fn fetch_all_chapters(
        &self,
        series_hid: &str,
        page_size: usize,
    ) -> Result<Vec<ChapterRecord>, FetchError> {
        let mut collected = Vec::new();

        for page in 1.. {
            if page > MAX_CATALOG_PAGES {
                warn!(
                    series_hid,
                    pages = MAX_CATALOG_PAGES,
                    collected = collected.len(),
                    "chapter listing did not terminate; abandoning pagination"
                );
                break;
            }

            let mut url = self.endpoint(&format!("chapters/{series_hid}"))?;
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("limit", &page_size.to_string());

            let listing: ChapterListing = self.get_json(url).await?;
            let count = listing.chapters.len();
            debug!(page, count, "fetched chapter listing page");
            collected.extend(listing.chapters);

            if count < page_size {
                break;
            }
        }

        Ok(collected)
    }

    /// Fetches the ordered image manifest for one chapter.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, timeout, non-success
    /// status, or an undecodable body.
    #[instrument(skip(self), fields(chapter_hid = %chapter_hid))]
    pub async fn fetch_image_manifest(
        &self,
        chapter_hid: &str,
    ) -> Result<Vec<ImageManifestEntry>, FetchError> {
        let url = self.endpoint(&format!("chapter/{chapter_hid}/images"))?;
        self.get_json(url).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|_| FetchError::invalid_url(format!("{}{path}", self.base)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let url_str = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(&url_str, status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::decode(&url_str, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CatalogClient {
        CatalogClient::new(Url::parse(&format!("{}/", server.uri())).unwrap())
    }

    fn chapter_json(hid: &str, chap: &str) -> serde_json::Value {
        serde_json::json!({"hid": hid, "chap": chap, "lang": "en"})
    }

    #[tokio::test]
    async fn test_fetch_series_returns_descriptor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/comic/test-series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "comic": {
                    "hid": "s1",
                    "title": "Test Series",
                    "slug": "test-series",
                    "chapter_count": 12,
                    "cover_url": "https://covers.example/s1.jpg"
                }
            })))
            .mount(&server)
            .await;

        let info = client_for(&server).fetch_series("test-series").await.unwrap();
        assert_eq!(info.comic.hid, "s1");
        assert_eq!(info.comic.chapter_count, 12);
    }

    #[tokio::test]
    async fn test_fetch_series_non_success_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/comic/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_series("missing").await;
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_chapters_stops_on_short_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapters": [chapter_json("c1", "1"), chapter_json("c2", "2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapters": [chapter_json("c3", "3")]
            })))
            .mount(&server)
            .await;

        let chapters = client_for(&server)
            .fetch_all_chapters("s1", 2)
            .await
            .unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[2].hid, "c3");
    }

    #[tokio::test]
    async fn test_fetch_all_chapters_stops_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapters": [chapter_json("c1", "1"), chapter_json("c2", "2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"chapters": []})),
            )
            .mount(&server)
            .await;

        let chapters = client_for(&server)
            .fetch_all_chapters("s1", 2)
            .await
            .unwrap();
        assert_eq!(chapters.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_all_chapters_discards_collected_pages_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapters": [chapter_json("c1", "1"), chapter_json("c2", "2")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_all_chapters("s1", 2).await;
        assert!(matches!(
            result,
            Err(FetchError::HttpStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_chapters_honors_page_ceiling() {
        let server = MockServer::start().await;
        // Every page returns a full page: without the ceiling this would
        // never terminate.
        Mock::given(method("GET"))
            .and(path("/chapters/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "chapters": [chapter_json("cx", "1")]
            })))
            .mount(&server)
            .await;

        let chapters = client_for(&server)
            .fetch_all_chapters("s1", 1)
            .await
            .unwrap();
        assert_eq!(chapters.len(), MAX_CATALOG_PAGES);
    }

    #[tokio::test]
    async fn test_fetch_image_manifest_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chapter/c1/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"b2key": "page-1.jpg", "w": 800, "h": 1200, "s": 1024},
                {"b2key": "page-2.jpg", "w": 800, "h": 1200, "s": 2048}
            ])))
            .mount(&server)
            .await;

        let manifest = client_for(&server).fetch_image_manifest("c1").await.unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].b2key, "page-1.jpg");
        assert_eq!(manifest[1].b2key, "page-2.jpg");
    }
}
