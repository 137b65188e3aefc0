use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{
    header::{CONTENT_TYPE, LOCATION},
    redirect, Client, Response, StatusCode, Url,
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::error::AppError;

const MAX_REDIRECTS: usize = 10;

const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Outcome of the single page fetch made for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub succeeded: bool,
    pub body: Option<String>,
    pub status: Option<u16>,
    pub redirected: bool,
}

impl FetchResult {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn page(status: u16, redirected: bool, body: String) -> Self {
        Self {
            succeeded: true,
            body: Some(body),
            status: Some(status),
            redirected,
        }
    }

    /// Mirrors HTTP client truthiness: a response counts as OK below 400.
    pub fn status_ok(&self) -> bool {
        self.status.map(|status| status < 400).unwrap_or(false)
    }

    /// Body length in characters; 0 when nothing was fetched.
    pub fn body_len(&self) -> usize {
        self.body.as_deref().map(|b| b.chars().count()).unwrap_or(0)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// One GET per call, following redirects by hand so every hop is counted. The whole chain is
/// bounded by a single timeout. Failures become [`FetchResult::failed`].
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpProbe {
    pub fn new(timeout: Duration, max_body_bytes: usize, user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_body_bytes,
        })
    }

    /// Returns the final response and the number of redirects taken to reach it.
    async fn follow(&self, url: &str) -> Result<(Response, usize), String> {
        let mut current = Url::parse(url).map_err(|e| format!("invalid url: {}", e))?;
        let mut hops = 0;

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let Some(next) = redirect_target(&response) else {
                return Ok((response, hops));
            };
            if hops == MAX_REDIRECTS {
                return Err(format!("more than {} redirects", MAX_REDIRECTS));
            }
            hops += 1;
            debug!("{} redirected to {}", current, next);
            current = next;
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<FetchResult, String> {
        let (mut response, hops) = self.follow(url).await?;

        if !is_textual(&response) {
            return Err("non-text response".to_string());
        }

        let status = response.status().as_u16();
        let encoding = charset_of(&response);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            let room = self.max_body_bytes.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if bytes.len() >= self.max_body_bytes {
                debug!("Body of {} truncated at {} bytes", url, self.max_body_bytes);
                break;
            }
        }

        let (text, _, _) = encoding.decode(&bytes);
        Ok(FetchResult::page(status, hops > 0, text.into_owned()))
    }
}

#[async_trait]
impl PageFetcher for HttpProbe {
    async fn fetch(&self, url: &str) -> FetchResult {
        let outcome = match timeout(self.timeout, self.try_fetch(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                debug!("Fetch of {} failed: {}", url, e);
                metrics::increment_counter!("fetch_failures_total");
                FetchResult::failed()
            }
        }
    }
}

fn redirect_target(response: &Response) -> Option<Url> {
    if !REDIRECT_STATUSES.contains(&response.status()) {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

fn is_textual(response: &Response) -> bool {
    let Some(content_type) = response.headers().get(CONTENT_TYPE) else {
        return true;
    };
    let content_type = content_type.to_str().unwrap_or_default().to_ascii_lowercase();
    content_type.starts_with("text/")
        || ["html", "xml", "json"]
            .iter()
            .any(|kind| content_type.contains(kind))
}

fn charset_of(response: &Response) -> &'static Encoding {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(encoding_from_content_type)
        .unwrap_or(UTF_8)
}

/// Encoding named by the `charset` parameter of a `Content-Type` value. UTF-8 is the default.
fn encoding_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}
