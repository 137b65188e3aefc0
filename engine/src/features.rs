use serde::{ser::SerializeMap, Serialize, Serializer};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, error};

use crate::{
    error::AppError,
    host_resolver::HostResolver,
    html::ContentFeatures,
    lexical::LexicalFeatures,
    probe::PageFetcher,
    types::{FeatureEntries, FeatureValue, FEATURE_NAMES, PLACEHOLDER_FEATURES},
    url_parser::{parse_url, SuffixList},
};

/// The ordered feature names the classifier expects. Frozen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn canonical() -> Self {
        Self {
            names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Accepts the classifier's declared order only if it names exactly the features this
    /// extractor produces.
    pub fn from_names<I, S>(names: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut seen = HashSet::new();
        let duplicated: Vec<String> = names
            .iter()
            .filter(|name| !seen.insert(name.as_str()))
            .cloned()
            .collect();
        let missing: Vec<String> = FEATURE_NAMES
            .iter()
            .filter(|name| !seen.contains(*name))
            .map(|name| name.to_string())
            .collect();
        let unexpected: Vec<String> = names
            .iter()
            .filter(|name| !FEATURE_NAMES.contains(&name.as_str()))
            .cloned()
            .collect();

        if !duplicated.is_empty() || !missing.is_empty() || !unexpected.is_empty() {
            return Err(AppError::SchemaMismatch {
                missing,
                unexpected,
                duplicated,
            });
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Merges partial feature maps into a record ordered by this schema.
    pub fn assemble(&self, partials: Vec<FeatureEntries>) -> Result<FeatureRecord, AppError> {
        let mut values: HashMap<&'static str, FeatureValue> = HashMap::new();
        let mut duplicated = Vec::new();

        for (name, value) in partials.into_iter().flatten() {
            if values.insert(name, value).is_some() {
                duplicated.push(name.to_string());
            }
        }

        let mut entries = Vec::with_capacity(self.names.len());
        let mut missing = Vec::new();
        for name in &self.names {
            match values.remove(name.as_str()) {
                Some(value) => entries.push((name.clone(), value)),
                None => missing.push(name.clone()),
            }
        }

        let unexpected: Vec<String> = values.into_keys().map(str::to_string).collect();

        if !duplicated.is_empty() || !missing.is_empty() || !unexpected.is_empty() {
            return Err(AppError::SchemaMismatch {
                missing,
                unexpected,
                duplicated,
            });
        }

        Ok(FeatureRecord { entries })
    }
}

/// Zero-valued signals for data sources that are not integrated.
pub fn placeholder_entries() -> FeatureEntries {
    PLACEHOLDER_FEATURES
        .iter()
        .map(|name| (*name, FeatureValue::Int(0)))
        .collect()
}

/// Ordered feature name to value mapping. Serializes as a JSON object in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureRecord {
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// The numeric vector handed to the classifier.
    pub fn to_vector(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, value)| value.as_f64()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Runs every analyzer for one URL and assembles the result.
///
/// Lexical analysis runs inline; the WHOIS lookup and the page fetch run concurrently and the
/// HTML analysis waits on the fetch. Nothing is cached between calls.
pub struct FeatureExtractor {
    suffixes: Arc<SuffixList>,
    resolver: HostResolver,
    fetcher: Arc<dyn PageFetcher>,
    schema: FeatureSchema,
}

impl FeatureExtractor {
    pub fn new(
        suffixes: Arc<SuffixList>,
        resolver: HostResolver,
        fetcher: Arc<dyn PageFetcher>,
        schema: FeatureSchema,
    ) -> Self {
        Self {
            suffixes,
            resolver,
            fetcher,
            schema,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub async fn extract(&self, url: &str) -> Result<FeatureRecord, AppError> {
        let start = Instant::now();

        let parsed = parse_url(url, &self.suffixes);
        let lexical = LexicalFeatures::analyze(&parsed);

        let (host, content) = tokio::join!(self.resolver.resolve(&parsed), async {
            let fetch = self.fetcher.fetch(url.trim()).await;
            ContentFeatures::analyze(&fetch, &parsed.hostname)
        });

        let record = self
            .schema
            .assemble(vec![
                lexical.entries(),
                host.entries(),
                content.entries(),
                placeholder_entries(),
            ])
            .map_err(|e| {
                error!("Assembled features do not match the classifier schema: {}", e);
                e
            })?;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("extraction_duration_ms", elapsed_ms);
        debug!(
            "Extracted {} features for {:?} in {:.1}ms",
            record.len(),
            url,
            elapsed_ms
        );

        Ok(record)
    }
}
