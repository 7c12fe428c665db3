//! Источник Ozon: забирает страницу товара и вытаскивает название и цену.
//!
//! Ozon serves fully rendered HTML to browser-looking clients, so the
//! extraction is layered: JSON-LD product data, then meta tags, then the
//! embedded page state, then a visible "1 234 ₽" as a last resort.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::source::ProductSource;
use crate::infrastructure::parsing;
use crate::shared::errors::SourceError;
use crate::shared::types::{Availability, ProductSnapshot};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

pub struct OzonSource {
    client: reqwest::Client,
    og_title: Regex,
    title_tag: Regex,
    title_suffix: Regex,
    json_ld: Regex,
    meta_price: Regex,
    state_price: Regex,
    display_price: Regex,
}

impl OzonSource {
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");

        Self {
            client,
            og_title: Regex::new(r#"(?i)<meta[^>]+property="og:title"[^>]+content="([^"]+)""#)
                .expect("regex"),
            title_tag: Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").expect("regex"),
            title_suffix: Regex::new(r"(?i)\s*[-–—|]\s*(купить|OZON|Озон|интернет-магазин).*$")
                .expect("regex"),
            json_ld: Regex::new(
                r#"(?is)<script[^>]+type="application/ld\+json"[^>]*>(.*?)</script>"#,
            )
            .expect("regex"),
            meta_price: Regex::new(
                r#"(?i)<meta[^>]+(?:property="product:price:amount"|itemprop="price"|name="price")[^>]+content="([^"]+)""#,
            )
            .expect("regex"),
            state_price: Regex::new(r#"(?i)"(?:price|cardPrice|finalPrice)"\s*:\s*(\d+(?:\.\d+)?)"#)
                .expect("regex"),
            display_price: Regex::new(r"\d[\d\s\u{a0}]*\s*₽").expect("regex"),
        }
    }

    fn extract_title(&self, html: &str) -> String {
        if let Some(captures) = self.og_title.captures(html) {
            let title = decode_entities(&captures[1]);
            if !title.trim().is_empty() {
                return title.trim().to_string();
            }
        }

        if let Some(captures) = self.title_tag.captures(html) {
            let title = decode_entities(&captures[1]);
            if !title.trim().is_empty() {
                return self.title_suffix.replace(&title, "").trim().to_string();
            }
        }

        "Неизвестный товар".to_string()
    }

    fn extract_price(&self, html: &str) -> Option<i64> {
        if let Some(price) = self.price_from_json_ld(html) {
            debug!("Price extracted from JSON-LD: {}", price);
            return Some(price);
        }
        if let Some(captures) = self.meta_price.captures(html) {
            if let Some(price) = parsing::parse_to_minor(&captures[1]) {
                debug!("Price extracted from meta: {}", price);
                return Some(price);
            }
        }
        if let Some(captures) = self.state_price.captures(html) {
            if let Some(price) = parsing::parse_to_minor(&captures[1]) {
                debug!("Price extracted from page state: {}", price);
                return Some(price);
            }
        }
        if let Some(found) = self.display_price.find(html) {
            if let Some(price) = parsing::parse_to_minor(found.as_str()) {
                debug!("Price extracted from visible text: {}", price);
                return Some(price);
            }
        }

        warn!("Could not extract price from page");
        None
    }

    fn price_from_json_ld(&self, html: &str) -> Option<i64> {
        for captures in self.json_ld.captures_iter(html) {
            let Ok(doc) = serde_json::from_str::<serde_json::Value>(&captures[1]) else {
                continue;
            };
            if doc.get("@type").and_then(|t| t.as_str()) != Some("Product") {
                continue;
            }
            let offers = doc.get("offers")?;
            let offer = if offers.is_array() { offers.get(0)? } else { offers };
            let price = offer.get("price")?;
            let price_text = match price {
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) => s.clone(),
                _ => continue,
            };
            if let Some(minor) = parsing::parse_to_minor(&price_text) {
                return Some(minor);
            }
        }
        None
    }
}

impl Default for OzonSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductSource for OzonSource {
    fn source_key(&self) -> &'static str {
        "ozon"
    }

    fn can_handle(&self, url: &str) -> bool {
        match reqwest::Url::parse(url) {
            Ok(parsed) => parsed
                .host_str()
                .map(|h| {
                    let host = h.to_lowercase();
                    host.contains("ozon.ru") || host.contains("ozon.com")
                })
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, SourceError> {
        debug!("Fetching Ozon product: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() == 403 {
            return Err(SourceError::Blocked);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        if html.contains("Доступ ограничен")
            || html.contains("доступ к запрашиваемому ресурсу ограничен")
        {
            warn!("Access blocked by antibot protection: {}", url);
            return Err(SourceError::Blocked);
        }

        let title = self.extract_title(&html);
        let price_minor = self.extract_price(&html);
        let availability = if price_minor.is_some() {
            Availability::InStock
        } else {
            Availability::Unknown
        };

        debug!(
            "Fetched Ozon product: {}, price: {:?}, availability: {:?}",
            title, price_minor, availability
        );

        Ok(ProductSnapshot {
            canonical_url: url.to_string(),
            title,
            price_minor,
            currency: "RUB".to_string(),
            availability,
            captured_at: Utc::now(),
        })
    }
}

/// Минимальный HTML-декодер для названий товаров.
fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}
