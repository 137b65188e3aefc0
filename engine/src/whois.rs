use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

const IANA_SERVER: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

const CREATION_KEYS: [&str; 8] = [
    "creation date",
    "created",
    "created on",
    "registered on",
    "registered",
    "registration time",
    "registration date",
    "domain registration date",
];

const EXPIRATION_KEYS: [&str; 10] = [
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "expires",
    "expires on",
    "expire",
    "paid-till",
    "expiration time",
    "domain expiration date",
];

const DOMAIN_NAME_KEYS: [&str; 2] = ["domain name", "domain"];

#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("WHOIS lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("WHOIS connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No WHOIS server known for {0}")]
    NoServer(String),

    #[error("Nothing to look up")]
    EmptyQuery,
}

/// Fields of a WHOIS answer, kept as the raw text the server sent.
///
/// Registries may repeat a key; every value is kept in order and only the first is ever used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisRecord {
    pub creation_dates: Vec<String>,
    pub expiration_dates: Vec<String>,
    pub domain_name: Option<String>,
}

impl WhoisRecord {
    pub fn parse(text: &str) -> Self {
        let mut record = WhoisRecord::default();

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            if CREATION_KEYS.contains(&key.as_str()) {
                record.creation_dates.push(value.to_string());
            } else if EXPIRATION_KEYS.contains(&key.as_str()) {
                record.expiration_dates.push(value.to_string());
            } else if DOMAIN_NAME_KEYS.contains(&key.as_str()) && record.domain_name.is_none() {
                record.domain_name = Some(value.to_string());
            }
        }

        record
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.creation_dates.first().and_then(|d| parse_whois_date(d))
    }

    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.expiration_dates.first().and_then(|d| parse_whois_date(d))
    }

    pub fn is_registered(&self) -> bool {
        self.domain_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Parses the date notations registries commonly use. All are read as UTC.
pub fn parse_whois_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches(" GMT")
        .trim_end_matches(" (UTC)")
        .trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
        "%d-%b-%Y %H:%M:%S",
        "%d.%m.%Y %H:%M:%S",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }

    for format in [
        "%Y-%m-%d", "%d-%b-%Y", "%Y.%m.%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y", "%Y%m%d",
    ] {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[async_trait]
pub trait WhoisLookup: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<WhoisRecord, WhoisError>;
}

/// Plain port-43 client. One referral through IANA, then one registry query.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    server: Option<String>,
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(server: Option<String>, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    async fn lookup_inner(&self, domain: &str) -> Result<WhoisRecord, WhoisError> {
        let server = match &self.server {
            Some(server) => server.clone(),
            None => discover_server(domain).await?,
        };
        debug!("Querying WHOIS server {} for {}", server, domain);
        let text = query(&server, domain).await?;
        Ok(WhoisRecord::parse(&text))
    }
}

#[async_trait]
impl WhoisLookup for WhoisClient {
    async fn lookup(&self, domain: &str) -> Result<WhoisRecord, WhoisError> {
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            return Err(WhoisError::EmptyQuery);
        }
        timeout(self.timeout, self.lookup_inner(domain))
            .await
            .map_err(|_| WhoisError::Timeout(self.timeout))?
    }
}

async fn discover_server(domain: &str) -> Result<String, WhoisError> {
    let tld = domain.rsplit('.').next().unwrap_or(domain);
    let answer = query(IANA_SERVER, tld).await?;
    answer
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("refer") || key.trim().eq_ignore_ascii_case("whois"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|server| !server.is_empty())
        .ok_or_else(|| WhoisError::NoServer(tld.to_string()))
}

async fn query(server: &str, question: &str) -> Result<String, WhoisError> {
    let address = if server.contains(':') {
        server.to_string()
    } else {
        format!("{}:{}", server, WHOIS_PORT)
    };

    let mut stream = TcpStream::connect(&address).await?;
    stream.write_all(format!("{}\r\n", question).as_bytes()).await?;

    let mut buffer = Vec::new();
    stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    const VERISIGN_STYLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar Registration Expiration Date:
>>> Last update of whois database: 2024-09-01T10:00:00Z <<<
";

    #[test]
    fn parses_verisign_answer() {
        let record = WhoisRecord::parse(VERISIGN_STYLE);
        assert_eq!(record.domain_name.as_deref(), Some("EXAMPLE.COM"));
        assert!(record.is_registered());
        assert_eq!(
            record.creation_date(),
            Some(Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap())
        );
        assert_eq!(record.expiration_date().map(|d| d.year()), Some(2025));
    }

    #[test]
    fn no_match_answer_is_empty() {
        let record = WhoisRecord::parse("No match for \"NOPE-NOPE.COM\".\n");
        assert_eq!(record, WhoisRecord::default());
        assert!(!record.is_registered());
        assert!(record.creation_date().is_none());
    }

    #[test]
    fn only_the_first_of_repeated_dates_is_used() {
        let record = WhoisRecord::parse("domain: a.ru\ncreated: garbage\ncreated: 2001-02-03\n");
        assert_eq!(record.creation_dates.len(), 2);
        assert!(record.creation_date().is_none());
    }

    #[test]
    fn accepts_common_registry_date_formats() {
        for value in [
            "2020-01-02T03:04:05Z",
            "2020-01-02T03:04:05.0Z",
            "2020-01-02 03:04:05",
            "2020-01-02 03:04:05 UTC",
            "2020-01-02",
            "02-Jan-2020",
            "2020.01.02",
            "2020/01/02",
        ] {
            let parsed = parse_whois_date(value).unwrap_or_else(|| panic!("{value} not parsed"));
            assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2020, 1, 2), "{value}");
        }
        assert!(parse_whois_date("before the flood").is_none());
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_network() {
        let client = WhoisClient::new(Some("127.0.0.1:1".into()), Duration::from_secs(1));
        assert!(matches!(client.lookup("  ").await, Err(WhoisError::EmptyQuery)));
    }
}
