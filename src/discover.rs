//! Bulletin links on the portal's index page

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

use crate::config::Config;
use crate::fetch::Fetch;
use crate::store::SeenUrlStore;

/// Container holding the list of bulletin links
pub const LINK_LIST_SELECTOR: &str = ".listlink";

/// Result of comparing the index page with the seen-URL store
#[derive(Debug, Default)]
pub struct Discovery {
    /// Every bulletin link on the index page, in page order
    pub links: Vec<String>,
    /// Links not yet in the store
    pub new_links: BTreeSet<String>,
}

impl Discovery {
    pub fn has_update(&self) -> bool {
        !self.new_links.is_empty()
    }
}

/// Resolve a link the way the portal writes them: parent-directory segments
/// are dropped and the rest is placed under the base URL.
pub fn resolve_href(base: &Url, href: &str) -> Result<Url, url::ParseError> {
    let href = href.trim().replace("../", "");
    base.join(&href)
}

/// Absolute URLs of the anchors inside the first link-list container
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let list_selector = Selector::parse(LINK_LIST_SELECTOR).expect("valid link list selector");
    let anchor_selector = Selector::parse("a[href]").expect("valid anchor selector");

    let Some(list) = document.select(&list_selector).next() else {
        tracing::warn!(selector = LINK_LIST_SELECTOR, "no link list on index page");
        return Vec::new();
    };

    list.select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match resolve_href(base, href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!(href, error = %e, "skipping unresolvable link");
                None
            }
        })
        .collect()
}

/// Fetch the index page and diff its links against the store
pub fn discover(fetcher: &dyn Fetch, config: &Config, store: &SeenUrlStore) -> Result<Discovery> {
    let html = fetcher
        .fetch_html(&config.scraping_url)
        .with_context(|| format!("Failed to load index page {}", config.scraping_url))?;

    let links = extract_links(&html, &config.base_url);
    let new_links = store.unseen(&links);
    tracing::info!(
        discovered = links.len(),
        new = new_links.len(),
        "scanned index page"
    );

    Ok(Discovery { links, new_links })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body>
        <ul class="nav"><li><a href="../top.html">top</a></li></ul>
        <ul class="listlink">
          <li><a href="../kosodate/aki/r4_01.html">令和4年1月</a></li>
          <li><a href="../../kosodate/aki/r4_02.html">令和4年2月</a></li>
          <li><a>no href</a></li>
          <li><a href="https://other.example.jp/r4_03.html">外部</a></li>
        </ul>
        <ul class="listlink"><li><a href="ignored.html">second list</a></li></ul>
    </body></html>"#;

    fn base() -> Url {
        Url::parse("https://www.city.example.jp/").unwrap()
    }

    #[test]
    fn test_resolve_strips_parent_segments() {
        let url = resolve_href(&base(), "../../kosodate/aki/r4_02.html").unwrap();
        assert_eq!(url.as_str(), "https://www.city.example.jp/kosodate/aki/r4_02.html");
    }

    #[test]
    fn test_extract_links_from_first_list_only() {
        let links = extract_links(INDEX, &base());
        assert_eq!(
            links,
            vec![
                "https://www.city.example.jp/kosodate/aki/r4_01.html",
                "https://www.city.example.jp/kosodate/aki/r4_02.html",
                "https://other.example.jp/r4_03.html",
            ]
        );
    }

    #[test]
    fn test_missing_list_yields_nothing() {
        assert!(extract_links("<html><body><p>maintenance</p></body></html>", &base()).is_empty());
    }
}
