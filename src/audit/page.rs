//! Fetched-resource snapshots, the unit of auditing

use crate::url::normalize_url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Status code used when no HTTP response was received at all
///
/// Distinct from every real status code; the queue pipeline treats it as a
/// retryable network failure.
pub const NO_RESPONSE: u16 = 0;

/// Immutable snapshot of a fetched resource
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    url: Url,
    code: u16,
    headers: BTreeMap<String, String>,
    body: String,
    platforms: BTreeSet<Platform>,
    response_time: Duration,
}

impl Page {
    /// Creates a page with an empty body and no headers
    ///
    /// The URL is normalized so the page shares its identity with the same
    /// resource pushed as a URL. Non-http URLs are kept as given.
    pub fn new(url: Url, code: u16) -> Self {
        let url = normalize_url(url.as_str()).unwrap_or(url);
        Self {
            url,
            code,
            headers: BTreeMap::new(),
            body: String::new(),
            platforms: BTreeSet::new(),
            response_time: Duration::ZERO,
        }
    }

    /// Creates the sentinel page for a request that got no response
    pub fn no_response(url: Url) -> Self {
        Self::new(url, NO_RESPONSE)
    }

    /// Sets headers; names are stored lowercased
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .collect();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time = response_time;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Identity used by the sitemap and the retry ledger
    pub fn id(&self) -> &str {
        self.url.as_str()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// True when the request never produced a response
    pub fn is_no_response(&self) -> bool {
        self.code == NO_RESPONSE
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.code)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Looks up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false)
    }

    pub fn platforms(&self) -> &BTreeSet<Platform> {
        &self.platforms
    }

    pub fn response_time(&self) -> Duration {
        self.response_time
    }
}

/// Platform tags attached to pages by the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Apache,
    Nginx,
    Iis,
    Php,
    Aspx,
    Java,
    Python,
    Ruby,
}

impl Platform {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Apache,
            Self::Nginx,
            Self::Iis,
            Self::Php,
            Self::Aspx,
            Self::Java,
            Self::Python,
            Self::Ruby,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apache => "apache",
            Self::Nginx => "nginx",
            Self::Iis => "iis",
            Self::Php => "php",
            Self::Aspx => "aspx",
            Self::Java => "java",
            Self::Python => "python",
            Self::Ruby => "ruby",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Apache => "Apache HTTP Server",
            Self::Nginx => "Nginx",
            Self::Iis => "Microsoft IIS",
            Self::Php => "PHP",
            Self::Aspx => "ASP.NET",
            Self::Java => "Java servlet containers",
            Self::Python => "Python web frameworks",
            Self::Ruby => "Ruby web frameworks",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derives platform tags from response headers and the URL
pub fn fingerprint(url: &Url, headers: &BTreeMap<String, String>) -> BTreeSet<Platform> {
    let mut platforms = BTreeSet::new();

    let server = headers.get("server").map(|s| s.to_lowercase()).unwrap_or_default();
    let powered = headers
        .get("x-powered-by")
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let cookies = headers
        .get("set-cookie")
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let path = url.path().to_lowercase();

    if server.contains("apache") {
        platforms.insert(Platform::Apache);
    }
    if server.contains("nginx") {
        platforms.insert(Platform::Nginx);
    }
    if server.contains("iis") {
        platforms.insert(Platform::Iis);
    }
    if powered.contains("php") || cookies.contains("phpsessid") || path.ends_with(".php") {
        platforms.insert(Platform::Php);
    }
    if powered.contains("asp.net")
        || headers.contains_key("x-aspnet-version")
        || path.ends_with(".aspx")
    {
        platforms.insert(Platform::Aspx);
    }
    if cookies.contains("jsessionid") || path.ends_with(".jsp") || powered.contains("servlet") {
        platforms.insert(Platform::Java);
    }
    if server.contains("python") || server.contains("gunicorn") || server.contains("werkzeug") {
        platforms.insert(Platform::Python);
    }
    if powered.contains("phusion") || server.contains("puma") || cookies.contains("_rails") {
        platforms.insert(Platform::Ruby);
    }

    platforms
}
