use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::features::FeatureRecord;

/// Every feature the extractor produces, in canonical order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "google_index",
    "page_rank",
    "nb_hyperlinks",
    "www",
    "nb_qm",
    "phish_hints",
    "ratio_digits_host",
    "web_traffic",
    "longest_word_path",
    "length_words_raw",
    "safe_anchor",
    "ip",
    "domain_in_brand",
    "nb_www",
    "nb_space",
    "nb_hyphens",
    "nb_eq",
    "php",
    "net",
    "domain_in_title",
    "shortening_service",
    "shortest_word_path",
    "longest_words_raw",
    "domain_age",
    "html",
    "ratio_extHyperlinks",
    "nb_slash",
    "nb_dots",
    "ratio_intHyperlinks",
    "nb_underscore",
    "ratio_digits_url",
    "org",
    "empty_title",
    "http",
    "length_hostname",
    "length_url",
    "https",
    "nb_percent",
    "external_favicon",
    "avg_word_path",
    "domain_registration_length",
    "links_in_tags",
    "nb_redirection",
    "avg_word_host",
    "char_repeat",
    "whois_registered_domain",
    "com",
    "http_in_path",
    "login_form",
    "prefix_suffix",
    "longest_word_host",
    "nb_com",
    "statistical_report",
    "suspecious_tld",
    "avg_words_raw",
    "shortest_words_raw",
    "ratio_extErrors",
    "shortest_word_host",
    "domain_with_copyright",
    "nb_extCSS",
    "ratio_intMedia",
    "ratio_extMedia",
    "ratio_extRedirection",
];

pub const FEATURE_COUNT: usize = 63;

/// Signals whose data sources are not wired up. Always 0.
pub const PLACEHOLDER_FEATURES: [&str; 8] = [
    "google_index",
    "page_rank",
    "web_traffic",
    "statistical_report",
    "external_favicon",
    "ratio_extErrors",
    "ratio_extRedirection",
    "domain_in_title",
];

/// Sentinel for day counts that could not be derived.
pub const UNAVAILABLE_DAYS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    pub fn flag(value: bool) -> Self {
        FeatureValue::Int(value as i64)
    }

    pub fn count(value: usize) -> Self {
        FeatureValue::Int(value as i64)
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Int(v) => *v as f64,
            FeatureValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{}", v),
            FeatureValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A partial feature map produced by one analyzer.
pub type FeatureEntries = Vec<(&'static str, FeatureValue)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Benign,
    Phishing,
}

impl Label {
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            Label::Phishing
        } else {
            Label::Benign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Benign => "benign",
            Label::Phishing => "phishing",
        }
    }

    pub fn verdict(&self) -> &'static str {
        match self {
            Label::Phishing => "This is a Phishing website.",
            Label::Benign => "This is a safe website.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub request_id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturesResponse {
    pub request_id: Uuid,
    pub url: String,
    pub features: FeatureRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn feature_names_are_unique() {
        let unique: HashSet<_> = FEATURE_NAMES.iter().collect();
        assert_eq!(unique.len(), FEATURE_COUNT);
    }

    #[test]
    fn placeholders_are_known_features() {
        for name in PLACEHOLDER_FEATURES {
            assert!(FEATURE_NAMES.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn feature_value_serializes_as_plain_number() {
        let json = serde_json::to_string(&vec![FeatureValue::Int(3), FeatureValue::Float(0.5)]).unwrap();
        assert_eq!(json, "[3,0.5]");
    }

    #[test]
    fn label_maps_from_class() {
        assert_eq!(Label::from_class(1), Label::Phishing);
        assert_eq!(Label::from_class(0), Label::Benign);
        assert_eq!(Label::Phishing.verdict(), "This is a Phishing website.");
    }
}
