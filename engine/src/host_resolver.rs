use chrono::{DateTime, Utc};
use std::{net::IpAddr, sync::Arc};
use tracing::debug;

use crate::{
    types::{FeatureEntries, FeatureValue, UNAVAILABLE_DAYS},
    url_parser::ParsedUrl,
    whois::{WhoisLookup, WhoisRecord},
};

/// True for IPv4 and IPv6 literals, bracketed or not. Never errors.
pub fn is_ip_literal(host: &str) -> bool {
    let host = host.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok()
}

/// Whole days from `earlier` to `later`, rounded toward negative infinity.
pub fn whole_days(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFeatures {
    pub ip: bool,
    pub domain_age: i64,
    pub domain_registration_length: i64,
    pub whois_registered_domain: bool,
}

impl HostFeatures {
    /// Values used when WHOIS data is missing.
    pub fn unavailable(ip: bool) -> Self {
        Self {
            ip,
            domain_age: UNAVAILABLE_DAYS,
            domain_registration_length: UNAVAILABLE_DAYS,
            whois_registered_domain: false,
        }
    }

    pub fn from_record(ip: bool, record: &WhoisRecord, now: DateTime<Utc>) -> Self {
        Self {
            ip,
            domain_age: record
                .creation_date()
                .map(|created| whole_days(created, now))
                .unwrap_or(UNAVAILABLE_DAYS),
            domain_registration_length: record
                .expiration_date()
                .map(|expires| whole_days(now, expires))
                .unwrap_or(UNAVAILABLE_DAYS),
            whois_registered_domain: record.is_registered(),
        }
    }

    pub fn entries(&self) -> FeatureEntries {
        vec![
            ("ip", FeatureValue::flag(self.ip)),
            ("domain_age", FeatureValue::Int(self.domain_age)),
            (
                "domain_registration_length",
                FeatureValue::Int(self.domain_registration_length),
            ),
            (
                "whois_registered_domain",
                FeatureValue::flag(self.whois_registered_domain),
            ),
        ]
    }
}

/// IP-literal detection plus a single best-effort WHOIS lookup.
#[derive(Clone)]
pub struct HostResolver {
    whois: Arc<dyn WhoisLookup>,
}

impl HostResolver {
    pub fn new(whois: Arc<dyn WhoisLookup>) -> Self {
        Self { whois }
    }

    pub async fn resolve(&self, parsed: &ParsedUrl) -> HostFeatures {
        let ip = is_ip_literal(&parsed.hostname);
        if ip || !parsed.has_host() {
            return HostFeatures::unavailable(ip);
        }

        let target = parsed
            .registered_domain()
            .unwrap_or_else(|| parsed.hostname.clone());

        match self.whois.lookup(&target).await {
            Ok(record) => {
                let features = HostFeatures::from_record(ip, &record, Utc::now());
                if features.domain_age == UNAVAILABLE_DAYS {
                    debug!("WHOIS answer for {} has no usable creation date", target);
                }
                features
            }
            Err(e) => {
                debug!("WHOIS lookup for {} failed: {}", target, e);
                metrics::increment_counter!("whois_failures_total");
                HostFeatures::unavailable(ip)
            }
        }
    }
}
