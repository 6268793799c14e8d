//! Redirect integration tests
//!
//! These tests drive the redirect router end to end against in-memory
//! SQLite: active codes redirect and record a scan, unknown and inactive
//! codes return 404 and record nothing.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use qrtrack::analytics::ScanRecorder;
use qrtrack::config::{ProxyConfig, RedirectMode, TrustedProxyMode};
use qrtrack::models::{Customization, NewQrCode, QrCode};
use qrtrack::redirect;
use qrtrack::storage::{SqliteStorage, Storage};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::{Layer, ServiceExt};

const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_code(storage: &Arc<dyn Storage>, short_code: &str) -> QrCode {
    storage
        .create_qr_code(&NewQrCode {
            original_url: "https://example.com/destination".to_string(),
            short_code: short_code.to_string(),
            title: None,
            description: None,
            customization: Customization::default(),
            campaign: None,
        })
        .await
        .unwrap()
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([10, 0, 0, 7], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

fn router(storage: &Arc<dyn Storage>, proxy: ProxyConfig, mode: RedirectMode) -> Router {
    redirect::create_redirect_router(
        Arc::clone(storage),
        ScanRecorder::new(Arc::clone(storage)),
        proxy,
        mode,
    )
    .layer(TestConnectInfoLayer)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, IPHONE_UA)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_redirect_active_code_records_scan() {
    let storage = create_test_storage().await;
    let qr = create_code(&storage, "promo01").await;

    let app = router(&storage, ProxyConfig::default(), RedirectMode::Found);
    let response = app.oneshot(get("/PROMO01")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/destination"
    );

    let qr = storage.get_qr_code(qr.id).await.unwrap().unwrap();
    assert_eq!(qr.scans, 1);

    let events = storage.list_scan_events(qr.id, None).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_unique);
    assert_eq!(events[0].device.os, "iOS");
    assert_eq!(events[0].ip_address.as_deref(), Some("10.0.0.7"));

    let rollup = storage.get_rollup(qr.id).await.unwrap().unwrap();
    assert_eq!(rollup.total_scans, 1);
    assert_eq!(rollup.scans_by_device.get("mobile"), 1);
}

#[tokio::test]
async fn test_redirect_temporary_mode() {
    let storage = create_test_storage().await;
    create_code(&storage, "promo02").await;

    let app = router(&storage, ProxyConfig::default(), RedirectMode::Temporary);
    let response = app.oneshot(get("/promo02")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_redirect_inactive_code() {
    let storage = create_test_storage().await;
    let qr = create_code(&storage, "paused1").await;
    storage.set_active(qr.id, false).await.unwrap();

    let app = router(&storage, ProxyConfig::default(), RedirectMode::Found);
    let response = app.oneshot(get("/paused1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Not found");

    assert!(storage.list_scan_events(qr.id, None).await.unwrap().is_empty());
    assert!(storage.get_rollup(qr.id).await.unwrap().is_none());
    assert_eq!(storage.get_qr_code(qr.id).await.unwrap().unwrap().scans, 0);
}

#[tokio::test]
async fn test_redirect_unknown_code() {
    let storage = create_test_storage().await;

    let app = router(&storage, ProxyConfig::default(), RedirectMode::Found);
    let response = app.oneshot(get("/nothing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(storage.list_recent_scan_events(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redirect_uses_forwarded_ip_from_trusted_proxy() {
    let storage = create_test_storage().await;
    let qr = create_code(&storage, "proxy01").await;

    let proxy = ProxyConfig {
        trusted_proxy_mode: TrustedProxyMode::Standard,
        trusted_proxies: vec!["10.0.0.0/8".parse().unwrap()],
        num_trusted_proxies: None,
    };
    let app = router(&storage, proxy, RedirectMode::Found);

    let request = Request::builder()
        .uri("/proxy01")
        .header("x-forwarded-for", "203.0.113.50")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let events = storage.list_scan_events(qr.id, None).await.unwrap();
    assert_eq!(events[0].ip_address.as_deref(), Some("203.0.113.50"));
    assert_eq!(events[0].device.browser, "Unknown");
}

#[tokio::test]
async fn test_concurrent_redirects_count_every_scan() {
    let storage = create_test_storage().await;
    let qr = create_code(&storage, "rush001").await;
    let app = router(&storage, ProxyConfig::default(), RedirectMode::Found);

    let mut handles = vec![];
    for _ in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(get("/rush001")).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::FOUND);
    }

    assert_eq!(storage.get_qr_code(qr.id).await.unwrap().unwrap().scans, 20);
    let rollup = storage.get_rollup(qr.id).await.unwrap().unwrap();
    assert_eq!(rollup.total_scans, 20);
    assert!(rollup.is_consistent());
}

#[tokio::test]
async fn test_health_check() {
    let storage = create_test_storage().await;
    let app = router(&storage, ProxyConfig::default(), RedirectMode::Found);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
