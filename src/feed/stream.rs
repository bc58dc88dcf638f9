use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use url::Url;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::models::{SubscriberFilter, TenderRecord};

use super::detail::parse_detail_page;
use super::{build_client, classify_http_error, FailureKind, FeedSource, FetchFailure, FetchReport};

const PORTAL_BASE: &str = "https://zakupki.gov.ru/";

/// One entry of the notices feed, before its detail page is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Polls the portal's RSS feed. The feed itself is the cursor: an entry
/// whose detail page cannot be fetched is dropped and picked up again next
/// cycle if it is still listed.
pub struct StreamSource {
    client: Client,
    feed_url: String,
    lookback: ChronoDuration,
    detail_concurrency: usize,
}

impl StreamSource {
    pub fn new(config: &StreamConfig, timeout: std::time::Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            feed_url: config.feed_url.clone(),
            lookback: ChronoDuration::minutes(i64::from(config.lookback_minutes)),
            detail_concurrency: config.detail_concurrency.max(1),
        })
    }

    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(|e| FetchFailure {
            kind: classify_http_error(&e),
            detail: format!("GET {url}: {e}"),
        })?;

        if !response.status().is_success() {
            return Err(FetchFailure {
                kind: FailureKind::Status,
                detail: format!("GET {url}: HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchFailure {
            kind: classify_http_error(&e),
            detail: format!("reading {url}: {e}"),
        })?;
        Ok(bytes.to_vec())
    }

    async fn resolve(&self, entry: FeedEntry) -> std::result::Result<TenderRecord, FetchFailure> {
        let link = resolve_link(&self.feed_url, &entry.link).ok_or_else(|| FetchFailure {
            kind: FailureKind::Malformed,
            detail: format!("unusable link {}", entry.link),
        })?;
        let id = extract_reg_number(&link).ok_or_else(|| FetchFailure {
            kind: FailureKind::Malformed,
            detail: format!("no regNumber in link {link}"),
        })?;

        let page = self.fetch_bytes(link.as_str()).await?;
        let detail = parse_detail_page(&String::from_utf8_lossy(&page));

        Ok(TenderRecord {
            id,
            title: entry.title,
            price: detail.price,
            region: detail.region,
            url: link.into(),
            published_at: entry.published_at,
        })
    }
}

#[async_trait]
impl FeedSource for StreamSource {
    async fn fetch_candidates(&self, _filters: &[SubscriberFilter]) -> FetchReport {
        let mut report = FetchReport::default();

        let bytes = match self.fetch_bytes(&self.feed_url).await {
            Ok(bytes) => bytes,
            Err(failure) => {
                report.fail(failure.kind, failure.detail);
                return report;
            }
        };

        let entries = match parse_feed(&bytes, Utc::now(), self.lookback) {
            Ok(entries) => entries,
            Err(e) => {
                report.fail(FailureKind::Malformed, format!("feed {}: {e}", self.feed_url));
                return report;
            }
        };
        tracing::debug!("{} recent entries in feed", entries.len());

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| self.resolve(entry))
            .buffered(self.detail_concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(record) => report.records.push(record),
                Err(failure) => report.fail(failure.kind, failure.detail),
            }
        }

        report
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

/// Parse an RSS/Atom document and keep entries published within `lookback`
/// of `now`. Undated entries are kept; the tender ledger deduplicates them.
pub fn parse_feed(bytes: &[u8], now: DateTime<Utc>, lookback: ChronoDuration) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;
    let cutoff = now - lookback;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published_at = entry.published.or(entry.updated);
            if matches!(published_at, Some(ts) if ts < cutoff) {
                return None;
            }
            let link = entry.links.first().map(|l| l.href.clone())?;
            Some(FeedEntry {
                title: entry
                    .title
                    .map(|t| t.content.trim().to_string())
                    .unwrap_or_else(|| "Без названия".to_string()),
                link,
                published_at,
            })
        })
        .collect();

    Ok(entries)
}

/// Turn a feed link into an absolute URL. Relative links are joined onto
/// the feed's own URL, or the portal root if that does not parse.
pub fn resolve_link(base_url: &str, link: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(link) {
        return Some(url);
    }
    let base = Url::parse(base_url).or_else(|_| Url::parse(PORTAL_BASE)).ok()?;
    base.join(link).ok()
}

/// Pull the `regNumber` query parameter out of a notice link.
pub fn extract_reg_number(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "regNumber")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const FEED_URL: &str = "https://zakupki.gov.ru/epz/order/extendedsearch/rss.html";

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Закупки</title>
    <link>https://zakupki.gov.ru</link>
    <description>Новые извещения</description>
    <item>
      <title>Поставка ноутбуков</title>
      <link>https://zakupki.gov.ru/epz/order/notice/ea20/view/common-info.html?regNumber=0373100000126000001</link>
      <guid>0373100000126000001</guid>
      <pubDate>Sat, 17 Oct 2026 09:55:00 GMT</pubDate>
    </item>
    <item>
      <title>Ремонт кровли</title>
      <link>https://zakupki.gov.ru/epz/order/notice/ea20/view/common-info.html?regNumber=0373100000126000002</link>
      <guid>0373100000126000002</guid>
      <pubDate>Sat, 17 Oct 2026 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn keeps_only_recent_entries() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 10, 0, 0).unwrap();
        let entries = parse_feed(FEED.as_bytes(), now, ChronoDuration::minutes(20)).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Поставка ноутбуков");
        let link = resolve_link(FEED_URL, &entries[0].link).unwrap();
        assert_eq!(extract_reg_number(&link).as_deref(), Some("0373100000126000001"));
    }

    #[test]
    fn garbage_feed_is_an_error() {
        let now = Utc::now();
        assert!(parse_feed(b"not a feed", now, ChronoDuration::minutes(20)).is_err());
    }

    fn reg(link: &str) -> Option<String> {
        resolve_link(FEED_URL, link).and_then(|url| extract_reg_number(&url))
    }

    #[test]
    fn reg_number_from_absolute_and_relative_links() {
        assert_eq!(reg("https://zakupki.gov.ru/view.html?foo=1&regNumber=0123").as_deref(), Some("0123"));
        assert_eq!(reg("/epz/order/notice/view.html?regNumber=0456").as_deref(), Some("0456"));
        assert_eq!(reg("https://zakupki.gov.ru/view.html?id=1"), None);
        assert_eq!(reg("https://zakupki.gov.ru/view.html?regNumber="), None);
    }

    #[test]
    fn relative_links_resolve_against_the_feed_host() {
        let url = resolve_link("http://127.0.0.1:8080/rss.xml", "/notice/view.html?regNumber=0001").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/notice/view.html?regNumber=0001");

        let url = resolve_link("not a url", "/notice/view.html?regNumber=0001").unwrap();
        assert_eq!(url.as_str(), "https://zakupki.gov.ru/notice/view.html?regNumber=0001");
    }
}
