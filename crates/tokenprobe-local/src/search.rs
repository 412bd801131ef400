use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokenprobe_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};

use crate::env;

pub const PROVIDER_NAMES: &[&str] = &["duckduckgo", "brave", "tavily"];

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Keep a cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

fn brave_api_key_from_env() -> Option<String> {
    env("TOKENPROBE_BRAVE_API_KEY").or_else(|| env("BRAVE_SEARCH_API_KEY"))
}

fn tavily_api_key_from_env() -> Option<String> {
    env("TOKENPROBE_TAVILY_API_KEY").or_else(|| env("TAVILY_API_KEY"))
}

/// Build the provider named `name` (one of [`PROVIDER_NAMES`]) from the environment.
pub fn provider_by_name(name: &str, client: reqwest::Client) -> Result<Arc<dyn SearchProvider>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "duckduckgo" | "ddg" => Ok(Arc::new(DuckDuckGoSearchProvider::from_env(client))),
        "brave" => Ok(Arc::new(BraveSearchProvider::from_env(client)?)),
        "tavily" => Ok(Arc::new(TavilySearchProvider::from_env(client)?)),
        other => Err(Error::InvalidConfig(format!(
            "unknown search provider {other:?} (expected one of: {})",
            PROVIDER_NAMES.join(", ")
        ))),
    }
}

/// Keyless provider backed by the DuckDuckGo HTML endpoint.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearchProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Clone)]
pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl DuckDuckGoSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        let endpoint = env("TOKENPROBE_DUCKDUCKGO_ENDPOINT")
            .unwrap_or_else(|| "https://html.duckduckgo.com/html/".to_string());
        Self::with_endpoint(client, endpoint)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl TavilySearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = tavily_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing TOKENPROBE_TAVILY_API_KEY (or TAVILY_API_KEY)".to_string(),
            )
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env("TOKENPROBE_TAVILY_ENDPOINT").unwrap_or_else(|| "https://api.tavily.com/search".to_string())
    }
}

impl BraveSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing TOKENPROBE_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env("TOKENPROBE_BRAVE_ENDPOINT")
            .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string())
    }
}

fn timings(t0: Instant) -> BTreeMap<String, u128> {
    let mut timings_ms = BTreeMap::new();
    timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
    timings_ms
}

// ---- duckduckgo -----------------------------------------------------------

/// Result links on the HTML endpoint go through `/l/?uddg=<target>`.
fn resolve_ddg_href(href: &str) -> Option<String> {
    let base = url::Url::parse("https://duckduckgo.com/").ok()?;
    let u = base.join(href).ok()?;
    let target = u
        .query_pairs()
        .find(|(k, _)| k == "uddg")
        .map(|(_, v)| v.into_owned());
    match target {
        Some(t) if !t.is_empty() => Some(t),
        _ if u.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) => None,
        _ => Some(u.to_string()),
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        html_scraper::Selector::parse("div.result"),
        html_scraper::Selector::parse("a.result__a"),
        html_scraper::Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for el in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        // Sponsored entries.
        if el.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(a) = el.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = a.value().attr("href").and_then(resolve_ddg_href) else {
            continue;
        };
        let title = collapse_ws(&a.text().collect::<String>());
        let snippet = el
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_ws(&s.text().collect::<String>()))
            .filter(|s| !s.is_empty());
        out.push(SearchResult {
            url,
            title: Some(title).filter(|t| !t.is_empty()),
            snippet,
            source: "duckduckgo".to_string(),
        });
    }
    out
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(&self.endpoint)
            .header(
                reqwest::header::USER_AGENT,
                "Mozilla/5.0 (X11; Linux x86_64) tokenprobe",
            )
            .query(&[("q", q.query.as_str())])
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("duckduckgo search HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| Error::Search(e.to_string()))?;
        let results = parse_duckduckgo_html(&body, q.max_results.unwrap_or(20));

        Ok(SearchResponse {
            results,
            provider: "duckduckgo".to_string(),
            timings_ms: timings(t0),
        })
    }
}

// ---- brave ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self
            .client
            .get(Self::endpoint())
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())]);
        if let Some(n) = q.max_results {
            // Brave caps `count` at 20.
            req = req.query(&[("count", n.min(20).to_string())]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
                source: "brave".to_string(),
            })
            .collect();

        Ok(SearchResponse {
            results,
            provider: "brave".to_string(),
            timings_ms: timings(t0),
        })
    }
}

// ---- tavily ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(5).min(20);
        let timeout_ms = timeout_ms_from_query(q);

        let body = serde_json::json!({
            "query": q.query,
            "max_results": max_results,
            "include_answer": false,
            "include_raw_content": false,
            "search_depth": "basic",
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("tavily search HTTP {status}")));
        }

        let parsed: TavilySearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.content,
                source: "tavily".to_string(),
            })
            .collect();

        Ok(SearchResponse {
            results,
            provider: "tavily".to_string(),
            timings_ms: timings(t0),
        })
    }
}
