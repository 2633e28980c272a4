#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use animal_scrap::cache::CacheStore;
use animal_scrap::config::Config;
use animal_scrap::fetch::ImageFetcher;
use animal_scrap::request::build_client;

pub const IMAGE_SIZE: usize = 128;
pub const BIG_IMAGE_SIZE: usize = 4096;

/// What the server saw.
#[derive(Default)]
pub struct Stats {
    pub image_hits: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub stats: Arc<Stats>,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn image_hits(&self) -> usize {
        self.stats.image_hits.load(Ordering::SeqCst)
    }
}

pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.resize(IMAGE_SIZE, 0);
    bytes
}

async fn ok_image(State(stats): State<Arc<Stats>>, UrlPath(_name): UrlPath<String>) -> impl IntoResponse {
    stats.image_hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png_bytes())
}

async fn slow_image(State(stats): State<Arc<Stats>>, UrlPath(_name): UrlPath<String>) -> impl IntoResponse {
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    stats.image_hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png_bytes())
}

async fn big_image(State(stats): State<Arc<Stats>>) -> impl IntoResponse {
    stats.image_hits.fetch_add(1, Ordering::SeqCst);
    let mut bytes = png_bytes();
    bytes.resize(BIG_IMAGE_SIZE, 0);
    ([(header::CONTENT_TYPE, "image/png")], bytes)
}

async fn tiny_image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], b"\x89PNG".to_vec())
}

async fn not_an_image() -> impl IntoResponse {
    Html("<html><body>".repeat(20))
}

async fn hanging_image() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ([(header::CONTENT_TYPE, "image/png")], png_bytes())
}

pub const LIST_PAGE: &str = r#"
<html><body>
    <table class="wikitable"><tr><th>Term</th></tr></table>
    <table class="wikitable">
        <tr><th>Animal</th><th>Young</th><th>Collateral adjective</th></tr>
        <tr><td><a href="/wiki/Dog">Dog</a></td><td>puppy</td><td>canine, warm-blooded</td></tr>
        <tr><td><a href="/wiki/Cat">Cat</a></td><td>kitten</td><td>feline<br>warm-blooded<sup>[2]</sup></td></tr>
        <tr><td>Owl</td><td>owlet</td><td>strigine</td></tr>
    </table>
</body></html>"#;

const DOG_PAGE: &str = r#"
<html><body>
    <table class="infobox biota"><tr><td><img src="/img/ok/dog.png"></td></tr></table>
</body></html>"#;

const CAT_PAGE: &str = r#"
<html><body>
    <figure typeof="mw:File/Thumb"><img src="/img/missing/cat.png"></figure>
</body></html>"#;

pub async fn start_server() -> TestServer {
    let stats = Arc::new(Stats::default());
    let app = Router::new()
        .route("/img/ok/:name", get(ok_image))
        .route("/img/slow/:name", get(slow_image))
        .route("/img/big", get(big_image))
        .route("/img/tiny", get(tiny_image))
        .route("/img/html", get(not_an_image))
        .route("/img/hang", get(hanging_image))
        .route("/wiki/List_of_animal_names", get(|| async { Html(LIST_PAGE) }))
        .route("/wiki/Dog", get(|| async { Html(DOG_PAGE) }))
        .route("/wiki/Cat", get(|| async { Html(CAT_PAGE) }))
        .with_state(Arc::clone(&stats));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        addr,
        stats,
        _handle: handle,
    }
}

pub fn fetcher_with_timeout(dir: &Path, timeout: Duration) -> ImageFetcher {
    let config = Config {
        request_timeout: timeout,
        ..Config::default()
    };
    let client = build_client(&config).unwrap();
    ImageFetcher::new(client, CacheStore::new(dir), config.min_image_bytes)
}

pub fn fetcher(dir: &Path) -> ImageFetcher {
    fetcher_with_timeout(dir, Duration::from_secs(5))
}
