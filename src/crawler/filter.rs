use std::collections::HashSet;
use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError, RwLock};

use regex::Regex;
use tracing::debug;
use url::{Host, Url};

use crate::errors::{Error, Result};
use crate::module::Request;

/// Second-level labels that sit under a country code (`example.co.uk`)
static SECOND_LEVEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(ac|co|com|edu|gov|ltd|me|mil|net|nic|org|plc|sch)$").ok());

/// Why a request was or was not let into the request pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    UnsupportedScheme,
    TooDeep,
    ForeignDomain,
    Duplicate,
}

impl Admission {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Accepted => "accepted",
            Self::UnsupportedScheme => "unsupported scheme",
            Self::TooDeep => "beyond max depth",
            Self::ForeignDomain => "primary domain not accepted",
            Self::Duplicate => "already seen",
        };
        f.write_str(reason)
    }
}

/// Decides which requests may enter the request pool
pub struct RequestFilter {
    /// Deepest level allowed (inclusive)
    max_depth: u32,

    /// Accepted primary domains, lowercase
    accepted_domains: RwLock<HashSet<String>>,

    /// Normalized URLs already admitted
    seen_urls: Mutex<HashSet<String>>,
}

impl RequestFilter {
    pub fn new<I, S>(max_depth: u32, accepted_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted_domains = accepted_domains
            .into_iter()
            .map(|domain| domain.as_ref().trim().to_lowercase())
            .collect();

        Self {
            max_depth,
            accepted_domains: RwLock::new(accepted_domains),
            seen_urls: Mutex::new(HashSet::new()),
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Accept another primary domain
    pub fn add_domain(&self, domain: &str) {
        self.accepted_domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.to_lowercase());
    }

    pub fn accepts_domain(&self, domain: &str) -> bool {
        self.accepted_domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&domain.to_lowercase())
    }

    /// Check a request and, when it passes, remember its URL so later
    /// copies are refused
    pub fn admit(&self, request: &Request) -> Admission {
        let url = &request.url;

        if !matches!(url.scheme(), "http" | "https") {
            debug!("Skipping URL with unsupported scheme: {}", url);
            return Admission::UnsupportedScheme;
        }

        if request.depth > self.max_depth {
            debug!(depth = request.depth, "Skipping URL beyond max depth: {}", url);
            return Admission::TooDeep;
        }

        let domain = match url.host_str().map(primary_domain) {
            Some(Ok(domain)) => domain,
            _ => {
                debug!("Skipping URL without a usable host: {}", url);
                return Admission::ForeignDomain;
            }
        };
        if !self.accepts_domain(&domain) {
            debug!("Skipping URL from non-accepted domain {}: {}", domain, url);
            return Admission::ForeignDomain;
        }

        let normalized = normalize_url(url);
        let inserted = self
            .seen_urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalized);
        if !inserted {
            debug!("Skipping already seen URL: {}", url);
            return Admission::Duplicate;
        }

        Admission::Accepted
    }

    /// Number of distinct URLs admitted so far
    pub fn seen_count(&self) -> usize {
        self.seen_urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Normalize a URL to avoid duplicates due to minor differences
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();

    // The url crate already lowercases hosts and drops default ports
    normalized.set_fragment(None);

    if let Some(query) = normalized.query() {
        if query.is_empty() {
            normalized.set_query(None);
        } else {
            let mut params: Vec<(String, String)> = normalized
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            params.sort();
            normalized.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    normalized.to_string()
}

/// Registrable domain of a host: `www.example.com` gives `example.com`,
/// `shop.example.co.uk` gives `example.co.uk`. IP addresses are their own
/// primary domain.
pub fn primary_domain(host: &str) -> Result<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        return Err(Error::illegal_parameter("empty host"));
    }
    if matches!(Host::parse(&host), Ok(Host::Ipv4(_) | Host::Ipv6(_))) {
        return Ok(host);
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return Err(Error::illegal_parameter(format!("malformed host: {}", host)));
    }

    let keep = match labels.as_slice() {
        [.., _, second, tld]
            if tld.len() == 2
                && SECOND_LEVEL.as_ref().is_some_and(|re| re.is_match(second)) =>
        {
            3
        }
        _ => 2,
    };
    let start = labels.len().saturating_sub(keep);
    Ok(labels[start..].join("."))
}
