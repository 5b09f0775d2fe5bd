//! Bulletin pages and their PDF attachments

use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::discover::resolve_href;
use crate::fetch::{Fetch, FetchError};
use crate::period::{BulletinPeriod, ParseError};
use crate::store::SeenUrlStore;

pub const TITLE_SELECTOR: &str = "#voice > h1";
pub const PDF_LINK_SELECTOR: &str = ".pdf > a[href]";

#[derive(Debug, Error)]
pub enum BulletinError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no element matching {selector:?} on bulletin page")]
    MissingElement { selector: &'static str },
    #[error(transparent)]
    Period(#[from] ParseError),
    #[error("unresolvable PDF link {href:?}")]
    BadLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to save {}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a bulletin page tells us
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletinPage {
    pub title: String,
    pub pdf_url: String,
}

/// A bulletin PDF written to the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPdf {
    pub page_url: String,
    pub pdf_url: String,
    pub period: BulletinPeriod,
    pub path: PathBuf,
}

pub fn parse_bulletin_page(html: &str, base: &Url) -> Result<BulletinPage, BulletinError> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse(TITLE_SELECTOR).expect("valid title selector");
    let pdf_selector = Selector::parse(PDF_LINK_SELECTOR).expect("valid pdf link selector");

    let title = document
        .select(&title_selector)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .ok_or(BulletinError::MissingElement {
            selector: TITLE_SELECTOR,
        })?;

    let href = document
        .select(&pdf_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or(BulletinError::MissingElement {
            selector: PDF_LINK_SELECTOR,
        })?;
    let pdf_url = resolve_href(base, href).map_err(|source| BulletinError::BadLink {
        href: href.to_string(),
        source,
    })?;

    Ok(BulletinPage {
        title,
        pdf_url: pdf_url.to_string(),
    })
}

/// Fetch one bulletin and save its PDF as `<scratch>/<period>.pdf`.
///
/// The link is recorded in `store` as soon as its page has been fetched, so
/// a bulletin whose PDF later fails is not retried on the next run.
pub fn fetch_bulletin(
    fetcher: &dyn Fetch,
    base: &Url,
    page_url: &str,
    scratch_dir: &Path,
    store: &mut SeenUrlStore,
) -> Result<SavedPdf, BulletinError> {
    let html = fetcher.fetch_html(page_url)?;
    store.insert(page_url);

    let page = parse_bulletin_page(&html, base)?;
    let period = BulletinPeriod::from_title(&page.title)?;
    tracing::info!(url = page_url, title = %page.title, %period, "bulletin page");

    let bytes = fetcher.fetch_bytes(&page.pdf_url)?;
    let path = scratch_dir.join(format!("{}.pdf", period));
    if path.exists() {
        tracing::warn!(path = %path.display(), "overwriting PDF saved earlier in this run");
    }
    fs::write(&path, &bytes).map_err(|source| BulletinError::Save {
        path: path.clone(),
        source,
    })?;
    tracing::info!(pdf = %page.pdf_url, path = %path.display(), "saved bulletin PDF");

    Ok(SavedPdf {
        page_url: page_url.to_string(),
        pdf_url: page.pdf_url,
        period,
        path,
    })
}
