#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};
use phishscan_engine::{
    classifier::LogisticModel,
    probe::{FetchResult, PageFetcher},
    url_parser::SuffixList,
    whois::{WhoisError, WhoisLookup, WhoisRecord},
    PhishingEngine,
};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

pub const LOGIN_PAGE: &str = r##"<html><head><title>Account verification</title>
<link rel="stylesheet" href="/style.css"></head>
<body>
<a href="http://HOST/home">home</a>
<a href="https://elsewhere.test/">out</a>
<a href="#">#</a>
<form method="post"><input type="text" name="login"><input type="password"></form>
<footer>© Bank</footer>
</body></html>"##;

pub struct OfflineWhois;

#[async_trait]
impl WhoisLookup for OfflineWhois {
    async fn lookup(&self, _domain: &str) -> Result<WhoisRecord, WhoisError> {
        Err(WhoisError::NoServer("offline".into()))
    }
}

pub struct OfflineFetcher;

#[async_trait]
impl PageFetcher for OfflineFetcher {
    async fn fetch(&self, _url: &str) -> FetchResult {
        FetchResult::failed()
    }
}

/// Serves one fixed page for every URL.
pub struct StaticPage(pub String);

#[async_trait]
impl PageFetcher for StaticPage {
    async fn fetch(&self, _url: &str) -> FetchResult {
        FetchResult::page(200, false, self.0.clone())
    }
}

pub async fn bundled_model() -> Arc<LogisticModel> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/model.json");
    Arc::new(LogisticModel::load(path).await.expect("bundled model loads"))
}

pub async fn engine(whois: Arc<dyn WhoisLookup>, fetcher: Arc<dyn PageFetcher>) -> PhishingEngine {
    PhishingEngine::with_parts(
        Arc::new(SuffixList::builtin().expect("bundled suffix list")),
        whois,
        fetcher,
        bundled_model().await,
    )
    .expect("bundled model matches the extractor schema")
}

pub async fn offline_engine() -> PhishingEngine {
    engine(Arc::new(OfflineWhois), Arc::new(OfflineFetcher)).await
}

/// Small web site on an ephemeral port.
pub async fn spawn_site() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let host = addr.to_string();

    let app = Router::new()
        .route(
            "/",
            get(|| async { Html("<html><head><title>Example</title></head><body>hi</body></html>") }),
        )
        .route(
            "/login",
            get(move || {
                let page = LOGIN_PAGE.replace("HOST", &host);
                async move { Html(page) }
            }),
        )
        .route("/old", get(|| async { Redirect::temporary("/") }))
        .route(
            "/logo.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0x89u8, b'P', b'N', b'G']).into_response() }),
        );

    // `/loop` bounces through `/bounce` once and then serves a page, so the chain ends where it began.
    let loop_hits = Arc::new(AtomicUsize::new(0));
    let app = app
        .route(
            "/loop",
            get(move || {
                let hits = loop_hits.fetch_add(1, Ordering::SeqCst);
                async move {
                    if hits == 0 {
                        Redirect::temporary("/bounce").into_response()
                    } else {
                        Html("<html><head><title>Back</title></head></html>").into_response()
                    }
                }
            }),
        )
        .route("/bounce", get(|| async { Redirect::temporary("/loop") }))
        .route("/forever", get(|| async { Redirect::temporary("/forever") }))
        .route(
            "/latin1",
            get(|| async {
                let mut body = b"<html><head><title>Caf\xe9</title></head><body>".to_vec();
                body.extend_from_slice(b"\xa9 2024 Bank</body></html>");
                ([(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")], body).into_response()
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Port-43 style server answering every query with `answer`.
pub async fn spawn_whois(answer: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut stream = BufReader::new(stream);
                let mut query = String::new();
                if stream.read_line(&mut query).await.is_ok() {
                    let _ = stream.get_mut().write_all(answer.as_bytes()).await;
                }
            });
        }
    });
    addr
}

/// Accepts connections and never answers.
pub async fn spawn_silent_whois() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}
