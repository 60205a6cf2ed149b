//! Response cache behaviour per cache mode.

use mockito::Server;
use netkit::cache::MemoryCache;
use netkit::{CacheMode, ErrorKind, NetWorker};

const BODY: &str = r#"{"code":0,"data":"fresh"}"#;

fn cached_worker(base: &str, mode: CacheMode) -> NetWorker {
    NetWorker::builder()
        .base_url(base)
        .cache_backend(MemoryCache::new(32))
        .cache_mode(mode)
        .io_threads(1)
        .build()
        .unwrap()
}

#[tokio::test]
async fn first_cache_hits_the_network_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/news/latest")
        .with_body(BODY)
        .expect(1)
        .create_async()
        .await;
    let worker = cached_worker(&server.url(), CacheMode::FirstCache);

    for _ in 0..3 {
        let value: String = worker.execute_get("news/latest", &[]).execute().await.unwrap();
        assert_eq!(value, "fresh");
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn only_cache_miss_is_an_error() {
    let server = Server::new_async().await;
    let worker = cached_worker(&server.url(), CacheMode::FirstRemote);

    let err = worker
        .execute_get::<String>("news/latest", &[])
        .cache_mode(CacheMode::OnlyCache)
        .execute()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn only_remote_does_not_populate_the_cache() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/news/latest")
        .with_body(BODY)
        .create_async()
        .await;
    let worker = cached_worker(&server.url(), CacheMode::OnlyRemote);

    let value: String = worker.execute_get("news/latest", &[]).execute().await.unwrap();
    assert_eq!(value, "fresh");
    let miss = worker
        .execute_get::<String>("news/latest", &[])
        .cache_mode(CacheMode::OnlyCache)
        .execute()
        .await;
    assert!(miss.is_err());
}

#[tokio::test]
async fn first_remote_falls_back_when_the_server_fails() {
    let mut server = Server::new_async().await;
    let healthy = server
        .mock("GET", "/news/latest")
        .with_body(BODY)
        .create_async()
        .await;
    let worker = cached_worker(&server.url(), CacheMode::FirstRemote);

    let value: String = worker.execute_get("news/latest", &[]).execute().await.unwrap();
    assert_eq!(value, "fresh");
    healthy.remove_async().await;

    let outage = server
        .mock("GET", "/news/latest")
        .with_status(503)
        .create_async()
        .await;
    let value: String = worker.execute_get("news/latest", &[]).execute().await.unwrap();
    assert_eq!(value, "fresh");
    outage.assert_async().await;
}

#[tokio::test]
async fn first_remote_does_not_mask_client_errors() {
    let mut server = Server::new_async().await;
    let healthy = server
        .mock("GET", "/news/latest")
        .with_body(BODY)
        .create_async()
        .await;
    let worker = cached_worker(&server.url(), CacheMode::FirstRemote);
    let _: String = worker.execute_get("news/latest", &[]).execute().await.unwrap();
    healthy.remove_async().await;

    server
        .mock("GET", "/news/latest")
        .with_status(404)
        .create_async()
        .await;
    let err = worker
        .execute_get::<String>("news/latest", &[])
        .execute()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus);
}

#[tokio::test]
async fn non_get_requests_bypass_the_cache() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/news/latest")
        .with_body(BODY)
        .expect(2)
        .create_async()
        .await;
    let worker = cached_worker(&server.url(), CacheMode::FirstCache);

    for _ in 0..2 {
        let _: String = worker.execute_post("news/latest", &[]).execute().await.unwrap();
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn disk_cache_survives_a_new_client() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/sections")
        .with_body(BODY)
        .create_async()
        .await;

    let build = |mode| {
        NetWorker::builder()
            .base_url(server.url())
            .cache_dir(dir.path())
            .cache_mode(mode)
            .io_threads(1)
            .build()
            .unwrap()
    };

    let first = build(CacheMode::FirstRemote);
    let _: String = first.execute_get("sections", &[]).execute().await.unwrap();
    drop(first);

    let second = build(CacheMode::OnlyCache);
    let value: String = second.execute_get("sections", &[]).execute().await.unwrap();
    assert_eq!(value, "fresh");

    second.clear_cache().await.unwrap();
    let err = second
        .execute_get::<String>("sections", &[])
        .execute()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
}
