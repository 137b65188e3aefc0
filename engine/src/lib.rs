//! URL to feature-vector extraction for phishing classification.
//!
//! A raw URL is parsed once, then analyzed lexically, through WHOIS, and through a single page
//! fetch whose HTML is inspected. The partial results are merged into a [`FeatureRecord`]
//! ordered the way the loaded classifier expects. Every data source has a fixed fallback, so a
//! record is always produced.

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod host_resolver;
pub mod html;
pub mod lexical;
pub mod probe;
pub mod routes;
pub mod types;
pub mod url_parser;
pub mod whois;

pub use engine::PhishingEngine;
pub use error::AppError;
pub use features::{FeatureRecord, FeatureSchema};
pub use types::{FeatureValue, Label};
