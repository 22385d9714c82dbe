pub mod cache;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::ApiSettings;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Collections harvested from the legislation search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    StatutoryRules,
    Acts,
}

impl DataType {
    pub const ALL: [DataType; 2] = [DataType::StatutoryRules, DataType::Acts];

    /// Tag used for cache file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::StatutoryRules => "statutory_rules",
            DataType::Acts => "acts",
        }
    }

    fn in_force_type(&self) -> &'static str {
        match self {
            DataType::StatutoryRules => "sr_in_force",
            DataType::Acts => "act_in_force",
        }
    }

    fn referer_path(&self) -> &'static str {
        match self {
            DataType::StatutoryRules => "statutory-rules",
            DataType::Acts => "acts",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can produce every raw hit of a collection.
///
/// `on_progress` receives the percentage of hits collected so far.
#[async_trait]
pub trait HitSource: Send + Sync {
    async fn fetch_all(
        &self,
        data_type: DataType,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<Vec<Value>>;
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct HitsEnvelope {
    pub total: Total,
    #[serde(default)]
    pub hits: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Total {
    pub value: usize,
}

/// Failure of one page request.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("search returned HTTP {0}")]
    Status(StatusCode),
    #[error("search request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unreadable search response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl PageError {
    /// 429, 5xx and connection-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PageError::Status(status) => *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            PageError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PageError::Decode(_) => false,
        }
    }
}

/// One page of search results for a data type.
#[async_trait]
pub trait SearchPages: Send + Sync {
    async fn search_page(&self, data_type: DataType, page: usize) -> Result<SearchResponse, PageError>;
}

/// The legislation Elasticsearch endpoint over HTTP.
pub struct HttpSearch {
    client: reqwest::Client,
    settings: ApiSettings,
}

impl HttpSearch {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl SearchPages for HttpSearch {
    async fn search_page(&self, data_type: DataType, page: usize) -> Result<SearchResponse, PageError> {
        let referer = format!("{}/in-force/{}", self.settings.site_origin, data_type.referer_path());
        let response = self
            .client
            .post(&self.settings.base_url)
            .header("accept", "application/json")
            .header("accept-language", "en-US,en;q=0.9")
            .header("origin", &self.settings.site_origin)
            .header("referer", referer)
            .json(&search_payload(data_type, page, self.settings.page_size))
            .send()
            .await
            .map_err(PageError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PageError::Status(status));
        }
        response.json().await.map_err(PageError::Decode)
    }
}

/// Paginated harvesting with retry over any [`SearchPages`].
pub struct LegislationClient<P = HttpSearch> {
    pages: P,
    max_retries: u32,
    backoff_ms: u64,
}

impl LegislationClient<HttpSearch> {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let (max_retries, backoff_ms) = (settings.max_retries, settings.backoff_ms);
        Ok(Self::with_pages(HttpSearch::new(settings)?, max_retries, backoff_ms))
    }
}

impl<P: SearchPages> LegislationClient<P> {
    pub fn with_pages(pages: P, max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            pages,
            max_retries,
            backoff_ms,
        }
    }

    async fn fetch_page_with_retry(&self, data_type: DataType, page: usize) -> Result<SearchResponse> {
        let mut attempt = 0;
        loop {
            match self.pages.search_page(data_type, page).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let backoff = Duration::from_millis(self.backoff_ms * 2u64.pow(attempt));
                    warn!(
                        "Page {} of {} failed (attempt {}/{}), backing off {:.1}s: {}",
                        page,
                        data_type,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to fetch page {} of {}", page, data_type))
                }
            }
        }
    }
}

#[async_trait]
impl<P: SearchPages> HitSource for LegislationClient<P> {
    /// Pages are requested strictly in order: the total is only known after page 0.
    async fn fetch_all(
        &self,
        data_type: DataType,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut total: Option<usize> = None;
        let mut page = 0;

        while total.map_or(true, |t| all.len() < t) {
            let resp = self.fetch_page_with_retry(data_type, page).await?;
            let expected = *total.get_or_insert(resp.hits.total.value);
            if resp.hits.hits.is_empty() && all.len() < expected {
                bail!(
                    "Page {} of {} was empty after {} of {} hits",
                    page,
                    data_type,
                    all.len(),
                    expected
                );
            }
            all.extend(resp.hits.hits);
            if expected > 0 {
                on_progress((all.len().min(expected) as f64 / expected as f64) * 100.0);
            }
            page += 1;
        }

        info!("Fetched {} {} hits in {} pages", all.len(), data_type, page);
        Ok(all)
    }
}

/// Elasticsearch query for one page of in-force legislation.
fn search_payload(data_type: DataType, page: usize, page_size: usize) -> Value {
    json!({
        "query": {
            "function_score": {
                "query": {
                    "bool": {
                        "must": [{
                            "bool": {
                                "should": { "bool": { "must": { "match_all": {} } } },
                                "minimum_should_match": 1
                            }
                        }],
                        "filter": {
                            "bool": {
                                "filter": [
                                    { "terms": { "field_act_sr_status": [false] } },
                                    { "terms": { "field_node_site": [6] } },
                                    { "terms": { "type": [data_type.in_force_type()] } }
                                ]
                            }
                        }
                    }
                },
                "functions": [
                    { "filter": { "term": { "legislation_type": "act_in_force" } }, "weight": 7 },
                    { "filter": { "term": { "legislation_type": "sr_in_force" } }, "weight": 6 },
                    { "filter": { "term": { "legislation_type": "act_as_made" } }, "weight": 5 },
                    { "filter": { "term": { "legislation_type": "sr_as_made" } }, "weight": 4 },
                    {
                        "filter": [
                            { "term": { "legislation_type": "bill" } },
                            { "term": { "field_bill_parliament_current": true } }
                        ],
                        "weight": 3
                    },
                    { "filter": { "term": { "legislation_type": "repealed_act" } }, "weight": 2 },
                    { "filter": { "term": { "legislation_type": "revoked_sr" } }, "weight": 1 },
                    {
                        "filter": [
                            { "term": { "legislation_type": "bill" } },
                            { "term": { "field_bill_parliament_current": false } }
                        ],
                        "weight": 1
                    }
                ],
                "score_mode": "sum"
            }
        },
        "size": page_size,
        "from": page * page_size,
        "sort": [{ "_score": "desc" }, { "title_az": "asc" }]
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned page results in order and records which pages were asked for.
    struct ScriptedPages {
        replies: Mutex<VecDeque<Result<SearchResponse, PageError>>>,
        requested: Mutex<Vec<usize>>,
    }

    impl ScriptedPages {
        fn new(replies: Vec<Result<SearchResponse, PageError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchPages for ScriptedPages {
        async fn search_page(&self, _data_type: DataType, page: usize) -> Result<SearchResponse, PageError> {
            self.requested.lock().unwrap().push(page);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left")
        }
    }

    fn page_of(total: usize, ids: &[&str]) -> Result<SearchResponse, PageError> {
        Ok(SearchResponse {
            hits: HitsEnvelope {
                total: Total { value: total },
                hits: ids.iter().map(|id| json!({ "_id": id })).collect(),
            },
        })
    }

    fn client(replies: Vec<Result<SearchResponse, PageError>>, max_retries: u32) -> LegislationClient<ScriptedPages> {
        LegislationClient::with_pages(ScriptedPages::new(replies), max_retries, 1)
    }

    fn ids(hits: &[Value]) -> Vec<&str> {
        hits.iter().filter_map(|h| h["_id"].as_str()).collect()
    }

    #[tokio::test]
    async fn pages_in_order_until_total() {
        let c = client(
            vec![page_of(5, &["a", "b"]), page_of(5, &["c", "d"]), page_of(5, &["e"])],
            0,
        );
        let mut seen = Vec::new();
        let hits = c.fetch_all(DataType::Acts, &mut |p: f64| seen.push(p)).await.unwrap();

        assert_eq!(ids(&hits), ["a", "b", "c", "d", "e"]);
        assert_eq!(*c.pages.requested.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(seen, vec![40.0, 80.0, 100.0]);
    }

    #[tokio::test]
    async fn empty_total_needs_one_page() {
        let c = client(vec![page_of(0, &[])], 0);
        let hits = c.fetch_all(DataType::StatutoryRules, &mut |_: f64| {}).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(*c.pages.requested.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn empty_page_before_total_is_an_error() {
        let c = client(vec![page_of(5, &["a", "b"]), page_of(5, &[])], 0);
        let err = c.fetch_all(DataType::Acts, &mut |_: f64| {}).await.unwrap_err();
        assert!(err.to_string().contains("was empty after 2 of 5 hits"), "{}", err);
    }

    #[tokio::test]
    async fn unavailable_page_is_retried() {
        let c = client(
            vec![
                page_of(2, &["a"]),
                Err(PageError::Status(StatusCode::SERVICE_UNAVAILABLE)),
                Err(PageError::Status(StatusCode::TOO_MANY_REQUESTS)),
                page_of(2, &["b"]),
            ],
            3,
        );
        let hits = c.fetch_all(DataType::Acts, &mut |_: f64| {}).await.unwrap();
        assert_eq!(ids(&hits), ["a", "b"]);
        assert_eq!(*c.pages.requested.lock().unwrap(), vec![0, 1, 1, 1]);
    }

    #[tokio::test]
    async fn retries_stop_at_limit() {
        let c = client(
            vec![
                Err(PageError::Status(StatusCode::BAD_GATEWAY)),
                Err(PageError::Status(StatusCode::BAD_GATEWAY)),
                Err(PageError::Status(StatusCode::BAD_GATEWAY)),
            ],
            2,
        );
        let err = c.fetch_all(DataType::Acts, &mut |_: f64| {}).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch page 0 of acts"), "{}", err);
        assert_eq!(c.pages.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let c = client(vec![Err(PageError::Status(StatusCode::NOT_FOUND))], 3);
        assert!(c.fetch_all(DataType::Acts, &mut |_: f64| {}).await.is_err());
        assert_eq!(c.pages.requested.lock().unwrap().len(), 1);
    }

    #[test]
    fn payload_pages_and_filters_by_type() {
        let p = search_payload(DataType::Acts, 2, 40);
        assert_eq!(p["size"], 40);
        assert_eq!(p["from"], 80);
        let filters = &p["query"]["function_score"]["query"]["bool"]["filter"]["bool"]["filter"];
        assert_eq!(filters[2]["terms"]["type"][0], "act_in_force");

        let p = search_payload(DataType::StatutoryRules, 0, 40);
        assert_eq!(p["from"], 0);
        let filters = &p["query"]["function_score"]["query"]["bool"]["filter"]["bool"]["filter"];
        assert_eq!(filters[2]["terms"]["type"][0], "sr_in_force");
    }

    #[test]
    fn search_response_shape() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "took": 3,
            "hits": { "total": { "value": 81, "relation": "eq" }, "hits": [{ "_id": "a" }] }
        }))
        .unwrap();
        assert_eq!(resp.hits.total.value, 81);
        assert_eq!(resp.hits.hits.len(), 1);
    }

    #[test]
    fn data_type_tags() {
        assert_eq!(DataType::StatutoryRules.as_str(), "statutory_rules");
        assert_eq!(DataType::Acts.to_string(), "acts");
        assert_eq!(DataType::ALL.len(), 2);
    }
}
