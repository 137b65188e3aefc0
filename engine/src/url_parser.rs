use publicsuffix::{List, Psl};
use std::net::IpAddr;
use tracing::{debug, warn};
use url::{Host, ParseError, Url};

use crate::{config::Config, error::AppError};

const BUILTIN_SUFFIX_LIST: &str = include_str!("../data/public_suffix_list.dat");

/// A URL decomposed into the parts the analyzers need. Built once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub raw: String,
    /// Lower-cased scheme as typed; empty when the input had none.
    pub scheme: String,
    /// Lower-cased host without IPv6 brackets; empty when none could be extracted.
    pub hostname: String,
    /// Undecoded path text between the authority and any query or fragment.
    pub path: String,
    /// Brand label of the registered domain (`example` in `www.example.co.uk`).
    pub domain: String,
    pub suffix: String,
    pub subdomain: String,
}

impl ParsedUrl {
    /// Brand plus public suffix, the name a registry knows.
    pub fn registered_domain(&self) -> Option<String> {
        if self.domain.is_empty() || self.suffix.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.domain, self.suffix))
    }

    pub fn has_host(&self) -> bool {
        !self.hostname.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainParts {
    pub domain: String,
    pub suffix: String,
    pub subdomain: String,
}

/// Public suffix aware domain splitter.
pub struct SuffixList {
    list: List,
}

impl SuffixList {
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_text(BUILTIN_SUFFIX_LIST)
    }

    pub fn from_text(text: &str) -> Result<Self, AppError> {
        let list: List = text
            .parse()
            .map_err(|e| AppError::SuffixList(format!("failed to parse suffix list: {}", e)))?;
        Ok(Self { list })
    }

    /// Loads the list from `psl_path`, then `psl_url`, then the bundled copy.
    pub async fn load(config: &Config) -> Result<Self, AppError> {
        if let Some(path) = &config.psl_path {
            let text = tokio::fs::read_to_string(path).await?;
            debug!("Loaded public suffix list from {}", path);
            return Self::from_text(&text);
        }

        if let Some(list_url) = &config.psl_url {
            match Self::fetch(list_url).await {
                Ok(list) => return Ok(list),
                Err(e) => warn!("Public suffix list download from {} failed: {}, using bundled list", list_url, e),
            }
        }

        Self::builtin()
    }

    async fn fetch(list_url: &str) -> Result<Self, AppError> {
        let text = reqwest::get(list_url).await?.error_for_status()?.text().await?;
        debug!("Downloaded public suffix list from {}", list_url);
        Self::from_text(&text)
    }

    pub fn split(&self, host: &str) -> DomainParts {
        let host = host.trim_end_matches('.').to_lowercase();
        if host.is_empty() {
            return DomainParts::default();
        }

        if host.parse::<IpAddr>().is_ok() {
            return DomainParts {
                domain: host,
                ..Default::default()
            };
        }

        if let Some(found) = self.list.domain(host.as_bytes()) {
            let registrable = std::str::from_utf8(found.as_bytes()).unwrap_or_default();
            let suffix = std::str::from_utf8(found.suffix().as_bytes()).unwrap_or_default();
            if !registrable.is_empty() && registrable.len() > suffix.len() {
                let domain = &registrable[..registrable.len() - suffix.len() - 1];
                let subdomain = host[..host.len() - registrable.len()].trim_end_matches('.');
                return DomainParts {
                    domain: domain.to_string(),
                    suffix: suffix.to_string(),
                    subdomain: subdomain.to_string(),
                };
            }
        }

        // The host is a bare suffix (e.g. `co.uk`) or not a valid DNS name.
        if let Some(suffix) = self.list.suffix(host.as_bytes()) {
            if suffix.as_bytes() == host.as_bytes() {
                return DomainParts {
                    suffix: host,
                    ..Default::default()
                };
            }
        }

        naive_split(&host)
    }
}

fn naive_split(host: &str) -> DomainParts {
    let mut labels = host.rsplitn(3, '.');
    let suffix = labels.next().unwrap_or_default();
    match labels.next() {
        Some(domain) => DomainParts {
            domain: domain.to_string(),
            suffix: suffix.to_string(),
            subdomain: labels.next().unwrap_or_default().to_string(),
        },
        None => DomainParts {
            domain: suffix.to_string(),
            ..Default::default()
        },
    }
}

/// Decomposes `raw` into a [`ParsedUrl`]. Never fails; unusable input yields empty parts.
pub fn parse_url(raw: &str, suffixes: &SuffixList) -> ParsedUrl {
    let trimmed = raw.trim();

    let (url, scheme, structural) = match Url::parse(trimmed) {
        Ok(url) => {
            let scheme = url.scheme().to_string();
            (Some(url), scheme, trimmed.to_string())
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            let prefixed = format!("http://{}", trimmed);
            (Url::parse(&prefixed).ok(), String::new(), prefixed)
        }
        Err(e) => {
            debug!("URL {:?} is structurally unparseable: {}", raw, e);
            (None, String::new(), String::new())
        }
    };

    let hostname = match &url {
        Some(url) if url.host().is_some() => {
            raw_host(&structural).unwrap_or_else(|| host_of(url))
        }
        _ => String::new(),
    };
    let path = match &url {
        Some(url) if url.cannot_be_a_base() => url.path().to_string(),
        Some(_) => raw_path(&structural).to_string(),
        None => String::new(),
    };

    let parts = suffixes.split(&hostname);

    ParsedUrl {
        raw: raw.to_string(),
        scheme,
        hostname,
        path,
        domain: parts.domain,
        suffix: parts.suffix,
        subdomain: parts.subdomain,
    }
}

fn host_of(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => domain.to_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}

/// Host as typed in the authority: lower-cased, without userinfo, port or IPv6 brackets.
/// `None` when the input has no `//` authority to read from.
fn raw_host(input: &str) -> Option<String> {
    let rest = &input[input.find("://")? + 3..];
    let authority = &rest[..rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len())];
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    let host = if let Some(bracketed) = host_port.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        host_port.split(':').next().unwrap_or_default()
    };

    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn raw_path(input: &str) -> &str {
    let rest = match input.find("://") {
        Some(idx) => &input[idx + 3..],
        None => return "",
    };
    let start = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    let after = &rest[start..];
    let end = after.find(&['?', '#'][..]).unwrap_or(after.len());
    &after[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ParsedUrl {
        parse_url(raw, &SuffixList::builtin().unwrap())
    }

    #[test]
    fn splits_multi_label_suffix() {
        let parsed = parse("https://login.www.example.co.uk/a/b?x=1#top");
        assert_eq!(parsed.scheme, "https");
        assert_eq!(parsed.hostname, "login.www.example.co.uk");
        assert_eq!(parsed.domain, "example");
        assert_eq!(parsed.suffix, "co.uk");
        assert_eq!(parsed.subdomain, "login.www");
        assert_eq!(parsed.path, "/a/b");
        assert_eq!(parsed.registered_domain().as_deref(), Some("example.co.uk"));
    }

    #[test]
    fn free_tld_is_a_suffix() {
        let parsed = parse("http://secure-bank-login.tk/update");
        assert_eq!(parsed.domain, "secure-bank-login");
        assert_eq!(parsed.suffix, "tk");
        assert_eq!(parsed.path, "/update");
    }

    #[test]
    fn missing_scheme_still_recovers_host() {
        let parsed = parse("example.com/path/page.php");
        assert_eq!(parsed.scheme, "");
        assert_eq!(parsed.hostname, "example.com");
        assert_eq!(parsed.path, "/path/page.php");
    }

    #[test]
    fn garbage_yields_empty_parts() {
        let parsed = parse("http://");
        assert_eq!(parsed.hostname, "");
        assert_eq!(parsed.domain, "");
        assert!(parsed.registered_domain().is_none());

        let empty = parse("");
        assert!(!empty.has_host());
        assert_eq!(empty.path, "");
    }

    #[test]
    fn ip_hosts_have_no_suffix() {
        let parsed = parse("http://192.168.1.1/admin");
        assert_eq!(parsed.hostname, "192.168.1.1");
        assert_eq!(parsed.domain, "192.168.1.1");
        assert_eq!(parsed.suffix, "");

        let v6 = parse("http://[::1]:8080/");
        assert_eq!(v6.hostname, "::1");
    }

    #[test]
    fn path_keeps_raw_text() {
        let parsed = parse("http://example.com/a b/c%20d?q=1");
        assert_eq!(parsed.path, "/a b/c%20d");
        assert_eq!(parse("http://example.com").path, "");
        assert_eq!(parse("http://example.com?x=/y").path, "");
    }

    #[test]
    fn registry_second_level_suffixes() {
        let academic = parse("https://login.my-bank.ac.in/");
        assert_eq!(academic.domain, "my-bank");
        assert_eq!(academic.suffix, "ac.in");
        assert_eq!(academic.subdomain, "login");
        assert_eq!(academic.registered_domain().as_deref(), Some("my-bank.ac.in"));

        let government = parse("http://www.police.gov.in/");
        assert_eq!(government.registered_domain().as_deref(), Some("police.gov.in"));
        assert_eq!(government.subdomain, "www");

        let shop = parse("shop.example.com.pk/cart");
        assert_eq!(shop.domain, "example");
        assert_eq!(shop.suffix, "com.pk");
    }

    #[test]
    fn private_suffixes_are_honoured() {
        let parsed = parse("https://someone.github.io/repo");
        assert_eq!(parsed.domain, "someone");
        assert_eq!(parsed.suffix, "github.io");
    }

    #[test]
    fn host_text_is_taken_as_typed() {
        let unicode = parse("http://bücher.example/");
        assert_eq!(unicode.hostname, "bücher.example");

        let numeric = parse("http://0x7f.1/admin");
        assert_eq!(numeric.hostname, "0x7f.1");

        let decorated = parse("https://user:pw@Example.COM:8443/x");
        assert_eq!(decorated.hostname, "example.com");
        assert_eq!(decorated.domain, "example");
    }

    #[test]
    fn bare_suffix_host_has_no_brand() {
        let parts = SuffixList::builtin().unwrap().split("co.uk");
        assert_eq!(parts.domain, "");
        assert_eq!(parts.suffix, "co.uk");
    }
}
