use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    classifier::{Classifier, LogisticModel},
    config::Config,
    error::{validation_error, AppError},
    features::{FeatureExtractor, FeatureRecord, FeatureSchema},
    host_resolver::HostResolver,
    probe::{HttpProbe, PageFetcher},
    types::{CheckResponse, FeaturesResponse},
    url_parser::SuffixList,
    whois::{WhoisClient, WhoisLookup},
};

/// Abuse guard only. Long URLs are a signal and must reach the extractor.
const MAX_URL_BYTES: usize = 64 * 1024;

/// Request-independent handles built once at startup. Read-only afterwards.
pub struct PhishingEngine {
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
}

impl PhishingEngine {
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        info!("Initializing phishing engine...");

        let suffixes = Arc::new(SuffixList::load(config).await?);
        let classifier: Arc<dyn Classifier> = Arc::new(LogisticModel::load(&config.model_path).await?);
        let whois: Arc<dyn WhoisLookup> = Arc::new(WhoisClient::new(
            config.whois_server.clone(),
            config.whois_timeout(),
        ));
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpProbe::new(
            config.fetch_timeout(),
            config.max_body_bytes,
            &config.user_agent,
        )?);

        let engine = Self::with_parts(suffixes, whois, fetcher, classifier)?;
        info!("Phishing engine initialized successfully");
        Ok(engine)
    }

    /// Fails when the classifier's declared inputs differ from what the extractor produces.
    pub fn with_parts(
        suffixes: Arc<SuffixList>,
        whois: Arc<dyn WhoisLookup>,
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, AppError> {
        let schema = FeatureSchema::from_names(classifier.feature_names().iter().cloned())?;
        let extractor = FeatureExtractor::new(suffixes, HostResolver::new(whois), fetcher, schema);
        Ok(Self {
            extractor,
            classifier,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.extractor.schema()
    }

    pub fn model_version(&self) -> &str {
        self.classifier.version()
    }

    pub async fn extract(&self, url: &str) -> Result<FeatureRecord, AppError> {
        validate_url(url)?;
        self.extractor.extract(url).await
    }

    pub async fn features(&self, url: &str) -> Result<FeaturesResponse, AppError> {
        let features = self.extract(url).await?;
        Ok(FeaturesResponse {
            request_id: Uuid::new_v4(),
            url: url.to_string(),
            features,
        })
    }

    /// Extracts and classifies. A failed prediction is reported in the message, not as an error.
    pub async fn check(&self, url: &str) -> Result<CheckResponse, AppError> {
        let request_id = Uuid::new_v4();
        metrics::increment_counter!("requests_total");

        let features = self.extract(url).await?;

        let (label, message) = match self.classifier.predict(&features.to_vector()) {
            Ok(label) => {
                metrics::increment_counter!("predictions_total", "label" => label.as_str());
                (Some(label), label.verdict().to_string())
            }
            Err(e) => {
                warn!("Prediction for {} failed: {}", request_id, e);
                (None, error_message(&e))
            }
        };

        info!(
            "Checked {:?} as {} ({})",
            url,
            label.map(|l| l.as_str()).unwrap_or("error"),
            request_id
        );

        Ok(CheckResponse {
            request_id,
            url: url.to_string(),
            label,
            message,
            features: Some(features),
        })
    }
}

pub fn error_message(err: &AppError) -> String {
    format!("Error processing URL: {}", err)
}

fn validate_url(url: &str) -> Result<(), AppError> {
    if url.len() > MAX_URL_BYTES {
        return Err(validation_error("URL too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        probe::FetchResult,
        types::Label,
        whois::{WhoisError, WhoisRecord},
    };
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl WhoisLookup for Offline {
        async fn lookup(&self, _domain: &str) -> Result<WhoisRecord, WhoisError> {
            Err(WhoisError::NoServer("offline".into()))
        }
    }

    #[async_trait]
    impl PageFetcher for Offline {
        async fn fetch(&self, _url: &str) -> FetchResult {
            FetchResult::failed()
        }
    }

    struct Broken(Vec<String>);

    impl Classifier for Broken {
        fn feature_names(&self) -> &[String] {
            &self.0
        }

        fn version(&self) -> &str {
            "broken"
        }

        fn predict(&self, _features: &[f64]) -> Result<Label, AppError> {
            Err(AppError::ModelInference("model unavailable".into()))
        }
    }

    fn engine_with(classifier: Arc<dyn Classifier>) -> Result<PhishingEngine, AppError> {
        PhishingEngine::with_parts(
            Arc::new(SuffixList::builtin().unwrap()),
            Arc::new(Offline),
            Arc::new(Offline),
            classifier,
        )
    }

    fn canonical_names() -> Vec<String> {
        FeatureSchema::canonical().names().to_vec()
    }

    #[test]
    fn mismatched_classifier_is_fatal_at_startup() {
        let mut names = canonical_names();
        names.pop();
        let err = engine_with(Arc::new(Broken(names))).err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn prediction_failure_becomes_error_message() {
        let engine = engine_with(Arc::new(Broken(canonical_names()))).unwrap();
        let response = engine.check("http://secure-bank-login.tk/update").await.unwrap();
        assert!(response.label.is_none());
        assert_eq!(response.message, "Error processing URL: Model inference error: model unavailable");
        assert!(response.features.is_some());
    }

    #[tokio::test]
    async fn empty_and_long_urls_are_still_extracted() {
        let engine = engine_with(Arc::new(Broken(canonical_names()))).unwrap();

        let empty = engine.extract("").await.unwrap();
        assert_eq!(empty.len(), engine.schema().len());
        assert_eq!(empty.get("ratio_digits_url").map(|v| v.as_f64()), Some(0.0));
        assert_eq!(empty.get("char_repeat").map(|v| v.as_f64()), Some(0.0));

        let long = format!("http://secure-login.example.com/{}", "a".repeat(2100));
        let record = engine.extract(&long).await.unwrap();
        assert_eq!(
            record.get("length_url").map(|v| v.as_f64()),
            Some(long.chars().count() as f64)
        );
    }

    #[tokio::test]
    async fn oversized_input_is_rejected() {
        let engine = engine_with(Arc::new(Broken(canonical_names()))).unwrap();
        let huge = "a".repeat(MAX_URL_BYTES + 1);
        assert!(matches!(engine.check(&huge).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn offline_extraction_still_yields_full_record() {
        let engine = engine_with(Arc::new(Broken(canonical_names()))).unwrap();
        let record = engine.extract("http://192.168.1.1/").await.unwrap();
        assert_eq!(record.len(), engine.schema().len());
        assert_eq!(record.get("ip").map(|v| v.as_f64()), Some(1.0));
        assert_eq!(record.get("empty_title").map(|v| v.as_f64()), Some(1.0));
    }
}
