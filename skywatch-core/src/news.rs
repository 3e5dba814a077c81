//! Weather-related headlines for a resolved place.
//!
//! Primary source is the Google News RSS feed; when it answers but no
//! items survive parsing, a JSON mirror of the same feed is consulted.
//! News is decoration, so every failure degrades to an empty list.

use std::collections::HashSet;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::model::{Location, NewsItem};
use crate::provider::http_client;

const NEWS_BASE_URL: &str = "https://news.google.com";
const MIRROR_BASE_URL: &str = "https://api.rss2json.com";
/// Search terms appended to every place query.
const TOPIC_TERMS: &str = "weather OR storm OR rain OR heat OR flood";
/// Maximum number of headlines in a result.
const MAX_ITEMS: usize = 8;

#[derive(Debug, Clone)]
pub struct NewsFeed {
    http: Client,
    feed_base: String,
    mirror_base: String,
}

impl NewsFeed {
    pub fn new() -> Self {
        Self {
            http: http_client(),
            feed_base: NEWS_BASE_URL.to_string(),
            mirror_base: MIRROR_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(feed_base: &str, mirror_base: &str) -> Self {
        Self {
            http: http_client(),
            feed_base: feed_base.to_string(),
            mirror_base: mirror_base.to_string(),
        }
    }

    /// Weather headlines near `location`: deduplicated by link with the
    /// first occurrence winning, capped at eight. Empty on failure.
    pub async fn fetch_news(&self, location: &Location) -> Vec<NewsItem> {
        let query = build_query(location);
        debug!("fetching weather news for query {query:?}");

        let feed_url = format!(
            "{}/rss?q={}&hl=en-US&gl=US&ceid=US:en",
            self.feed_base,
            urlencoding::encode(&query)
        );

        let Some(xml) = self.fetch_text(&feed_url).await else {
            return Vec::new();
        };

        let mut items = parse_rss_items(&xml);
        if items.is_empty() {
            debug!("RSS feed yielded no items; trying the JSON mirror");
            items = self.fetch_via_mirror(&feed_url).await;
        }

        dedup_by_link(items, MAX_ITEMS)
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let res = match self.http.get(url).send().await {
            Ok(res) => res,
            Err(err) => {
                debug!("news feed request failed: {err}");
                return None;
            }
        };

        if !res.status().is_success() {
            debug!("news feed returned status {}", res.status());
            return None;
        }

        match res.text().await {
            Ok(text) => Some(text),
            Err(err) => {
                debug!("failed to read news feed body: {err}");
                None
            }
        }
    }

    async fn fetch_via_mirror(&self, feed_url: &str) -> Vec<NewsItem> {
        let url = format!(
            "{}/v1/api.json?rss_url={}",
            self.mirror_base,
            urlencoding::encode(feed_url)
        );

        let res = match self.http.get(&url).send().await {
            Ok(res) => res,
            Err(err) => {
                debug!("news mirror request failed: {err}");
                return Vec::new();
            }
        };

        if !res.status().is_success() {
            debug!("news mirror returned status {}", res.status());
            return Vec::new();
        }

        let parsed: MirrorResponse = match res.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("news mirror response did not parse: {err}");
                return Vec::new();
            }
        };

        let source = parsed.feed.and_then(|feed| feed.title);
        parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let title = item.title.filter(|t| !t.is_empty())?;
                let link = item.link.filter(|l| !l.is_empty())?;
                Some(NewsItem {
                    title,
                    link,
                    source: source.clone(),
                    published_at: item.pub_date,
                })
            })
            .collect()
    }
}

impl Default for NewsFeed {
    fn default() -> Self {
        Self::new()
    }
}

fn build_query(location: &Location) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(city) = location.city.as_deref() {
        parts.push(city);
    }
    if let Some(region) = location.region.as_deref() {
        parts.push(region);
    }
    parts.push(TOPIC_TERMS);
    parts.join(" ")
}

fn parse_rss_items(xml: &str) -> Vec<NewsItem> {
    let rss: Rss = match quick_xml::de::from_str(xml) {
        Ok(rss) => rss,
        Err(err) => {
            debug!("RSS feed did not parse: {err}");
            return Vec::new();
        }
    };

    rss.channel
        .unwrap_or_default()
        .items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.filter(|t| !t.is_empty())?;
            let link = item.link.filter(|l| !l.is_empty())?;
            Some(NewsItem {
                title,
                link,
                source: item.source.and_then(|source| source.name),
                published_at: item.pub_date,
            })
        })
        .collect()
}

/// First occurrence of a link wins; later duplicates are dropped.
fn dedup_by_link(items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.link.clone()) {
            unique.push(item);
            if unique.len() == limit {
                break;
            }
        }
    }
    unique
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Option<RssChannel>,
}

#[derive(Debug, Default, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    source: Option<RssSource>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MirrorResponse {
    #[serde(default)]
    feed: Option<MirrorFeed>,
    #[serde(default)]
    items: Vec<MirrorItem>,
}

#[derive(Debug, Deserialize)]
struct MirrorFeed {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MirrorItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}
