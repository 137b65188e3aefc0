use std::{collections::HashMap, ops::RangeInclusive};

use crate::{
    types::{FeatureEntries, FeatureValue},
    url_parser::ParsedUrl,
};

const PHISH_HINTS: [&str; 5] = ["secure", "account", "bank", "login", "update"];
const SUSPICIOUS_TLDS: [&str; 5] = [".tk", ".ml", ".ga", ".cf", ".gq"];
const SHORTENING_SERVICES: [&str; 3] = ["bit.ly", "tinyurl", "goo.gl"];

// Numeric characters that are not digits: fractions, roman and other letter numerals, and
// enclosed numbers above nine.
const NON_DIGIT_NUMERICS: [RangeInclusive<char>; 14] = [
    '\u{BC}'..='\u{BE}',
    '\u{16EE}'..='\u{16F0}',
    '\u{2150}'..='\u{2189}',
    '\u{2469}'..='\u{2473}',
    '\u{247D}'..='\u{2487}',
    '\u{2491}'..='\u{249B}',
    '\u{24EB}'..='\u{24F4}',
    '\u{24FE}'..='\u{24FE}',
    '\u{277F}'..='\u{277F}',
    '\u{3007}'..='\u{3007}',
    '\u{3021}'..='\u{3029}',
    '\u{3038}'..='\u{303A}',
    '\u{3251}'..='\u{325F}',
    '\u{32B1}'..='\u{32BF}',
];

/// Length statistics over a tokenized string.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WordStats {
    pub shortest: usize,
    pub longest: usize,
    pub total: usize,
    pub average: f64,
}

impl WordStats {
    /// Splits on every non-alphanumeric character, keeping the empty tokens between adjacent
    /// separators.
    pub fn of(text: &str) -> Self {
        let lengths: Vec<usize> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(|word| word.chars().count())
            .collect();

        if lengths.is_empty() {
            return Self::default();
        }

        let total: usize = lengths.iter().sum();
        Self {
            shortest: lengths.iter().copied().min().unwrap_or(0),
            longest: lengths.iter().copied().max().unwrap_or(0),
            total,
            average: total as f64 / lengths.len() as f64,
        }
    }
}

/// Text-only URL features. Pure: no I/O and no hidden state.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalFeatures {
    pub length_url: usize,
    pub length_hostname: usize,
    pub nb_dots: usize,
    pub nb_hyphens: usize,
    pub nb_qm: usize,
    pub nb_eq: usize,
    pub nb_underscore: usize,
    pub nb_percent: usize,
    pub nb_slash: usize,
    pub nb_space: usize,
    pub nb_www: usize,
    pub nb_com: usize,
    pub www: bool,
    pub php: bool,
    pub net: bool,
    pub org: bool,
    pub com: bool,
    pub http: bool,
    pub https: bool,
    pub http_in_path: bool,
    pub suspicious_tld: bool,
    pub shortening_service: bool,
    pub domain_in_brand: bool,
    pub prefix_suffix: bool,
    pub phish_hints: usize,
    pub ratio_digits_url: f64,
    pub ratio_digits_host: f64,
    pub char_repeat: f64,
    pub raw_words: WordStats,
    pub path_words: WordStats,
    pub host_words: WordStats,
}

impl LexicalFeatures {
    pub fn analyze(parsed: &ParsedUrl) -> Self {
        let url = parsed.raw.as_str();
        let url_lower = url.to_lowercase();
        let host = parsed.hostname.as_str();
        let path = parsed.path.as_str();

        Self {
            length_url: url.chars().count(),
            length_hostname: host.chars().count(),
            nb_dots: count_char(url, '.'),
            nb_hyphens: count_char(url, '-'),
            nb_qm: count_char(url, '?'),
            nb_eq: count_char(url, '='),
            nb_underscore: count_char(url, '_'),
            nb_percent: count_char(url, '%'),
            nb_slash: count_char(url, '/'),
            nb_space: count_char(url, ' '),
            nb_www: url_lower.matches("www").count(),
            nb_com: url_lower.matches(".com").count(),
            www: host.contains("www"),
            php: url_lower.contains(".php"),
            net: host.contains(".net"),
            org: host.contains(".org"),
            com: host.contains(".com"),
            http: parsed.scheme == "http",
            https: parsed.scheme == "https",
            http_in_path: path.contains("http"),
            suspicious_tld: SUSPICIOUS_TLDS.iter().any(|tld| host.contains(tld)),
            shortening_service: SHORTENING_SERVICES
                .iter()
                .any(|service| url_lower.contains(service)),
            domain_in_brand: !parsed.domain.is_empty() && url_lower.contains(&parsed.domain),
            prefix_suffix: parsed.domain.contains('-'),
            phish_hints: PHISH_HINTS
                .iter()
                .filter(|hint| url_lower.contains(*hint))
                .count(),
            ratio_digits_url: digit_ratio(url),
            ratio_digits_host: digit_ratio(host),
            char_repeat: char_repeat(url),
            raw_words: WordStats::of(url),
            path_words: WordStats::of(path),
            host_words: host_word_stats(host),
        }
    }

    pub fn entries(&self) -> FeatureEntries {
        use FeatureValue::Float;
        let flag = FeatureValue::flag;
        let count = FeatureValue::count;

        vec![
            ("length_url", count(self.length_url)),
            ("length_hostname", count(self.length_hostname)),
            ("nb_dots", count(self.nb_dots)),
            ("nb_hyphens", count(self.nb_hyphens)),
            ("nb_qm", count(self.nb_qm)),
            ("nb_eq", count(self.nb_eq)),
            ("nb_underscore", count(self.nb_underscore)),
            ("nb_percent", count(self.nb_percent)),
            ("nb_slash", count(self.nb_slash)),
            ("nb_space", count(self.nb_space)),
            ("nb_www", count(self.nb_www)),
            ("nb_com", count(self.nb_com)),
            ("www", flag(self.www)),
            ("php", flag(self.php)),
            ("net", flag(self.net)),
            ("org", flag(self.org)),
            ("com", flag(self.com)),
            ("http", flag(self.http)),
            ("https", flag(self.https)),
            ("http_in_path", flag(self.http_in_path)),
            ("suspecious_tld", flag(self.suspicious_tld)),
            ("shortening_service", flag(self.shortening_service)),
            ("domain_in_brand", flag(self.domain_in_brand)),
            ("prefix_suffix", flag(self.prefix_suffix)),
            ("phish_hints", count(self.phish_hints)),
            ("ratio_digits_url", Float(self.ratio_digits_url)),
            ("ratio_digits_host", Float(self.ratio_digits_host)),
            ("char_repeat", Float(self.char_repeat)),
            ("length_words_raw", count(self.raw_words.total)),
            ("shortest_words_raw", count(self.raw_words.shortest)),
            ("longest_words_raw", count(self.raw_words.longest)),
            ("avg_words_raw", Float(self.raw_words.average)),
            ("shortest_word_path", count(self.path_words.shortest)),
            ("longest_word_path", count(self.path_words.longest)),
            ("avg_word_path", Float(self.path_words.average)),
            ("shortest_word_host", count(self.host_words.shortest)),
            ("longest_word_host", count(self.host_words.longest)),
            ("avg_word_host", Float(self.host_words.average)),
        ]
    }
}

fn count_char(text: &str, needle: char) -> usize {
    text.chars().filter(|c| *c == needle).count()
}

fn digit_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let digits = text.chars().filter(|c| is_digit(*c)).count();
    digits as f64 / total as f64
}

fn is_digit(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_digit();
    }
    c.is_numeric() && !NON_DIGIT_NUMERICS.iter().any(|range| range.contains(&c))
}

fn char_repeat(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for ch in text.chars() {
        *counts.entry(ch).or_insert(0) += 1;
    }
    let highest = counts.values().copied().max().unwrap_or(0);
    highest as f64 / total as f64
}

// No hostname means no host words at all, so every host aggregate reads 0.
fn host_word_stats(host: &str) -> WordStats {
    if host.is_empty() {
        WordStats::default()
    } else {
        WordStats::of(host)
    }
}
