use anyhow::Result;
use chardetng::EncodingDetector;
use thiserror::Error;

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; HoikuAkiScraper/0.1)";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Source of remote documents
pub trait Fetch {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch an HTML page and decode it using the encoding sniffed from its bytes
    fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        Ok(decode_html(&self.fetch_bytes(url)?))
    }
}

pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpClient {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().map_err(request_error)?;
        tracing::debug!(url, bytes = bytes.len(), "fetched");
        Ok(bytes.to_vec())
    }
}

/// Decode page bytes without trusting the declared charset.
///
/// Municipal pages are often Shift_JIS served as something else.
pub fn decode_html(bytes: &[u8]) -> String {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::warn!(encoding = actual.name(), "replacement characters while decoding page");
    }
    text.into_owned()
}
