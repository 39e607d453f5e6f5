use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::{Map, Value};
use url::Url;

/// A fetch to be performed by a downloader
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,

    /// Target URL
    pub url: Url,

    /// Extra request headers
    pub headers: HeaderMap,

    /// Current depth in the crawl tree (0 for the seed)
    pub depth: u32,
}

impl Request {
    /// Create a GET request at the given depth
    pub fn new(url: Url, depth: u32) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            depth,
        }
    }

    /// Parse `url` and create a GET request at the given depth
    pub fn parse(url: &str, depth: u32) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, depth))
    }

    /// Same request, placed at another depth
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

/// Result of a completed download
#[derive(Debug, Clone)]
pub struct Response {
    /// URL of the request that produced this response
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Raw body
    pub body: Vec<u8>,

    /// Depth of the request that produced this response
    pub depth: u32,
}

impl Response {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Content extracted from a response. The scheduler never looks inside.
pub type Item = Map<String, Value>;

/// Output of an analyzer
#[derive(Debug, Clone)]
pub enum Data {
    /// Follow-up fetch, fed back into the request pool
    Request(Request),
    /// Extracted content, fed into the item pipeline
    Item(Item),
}

impl From<Request> for Data {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Item> for Data {
    fn from(item: Item) -> Self {
        Self::Item(item)
    }
}
