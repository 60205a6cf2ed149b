//! Delivery contexts: main loop versus io pool.

use mockito::Server;
use netkit::dispatch::IO_THREAD_NAME;
use netkit::{Delivery, DownloadTarget, Error, MainLoop, NetWorker};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn thread_name() -> String {
    thread::current().name().unwrap_or_default().to_string()
}

#[test]
fn enqueue_delivers_on_the_main_loop_thread() {
    let mut server = Server::new();
    server.mock("GET", "/ping").with_body("pong").create();

    let (context, mut main_loop) = MainLoop::channel(8);
    let worker = NetWorker::builder()
        .base_url(server.url())
        .cache(false)
        .io_threads(1)
        .main_context(context)
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    worker.get("ping", &[]).enqueue(move |result| {
        tx.send((thread::current().id(), result)).unwrap();
    });

    assert!(main_loop.turn());
    let (delivered_on, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(delivered_on, thread::current().id());
    assert_eq!(result.unwrap(), "pong");
}

#[test]
fn io_delivery_runs_on_a_worker_thread() {
    let mut server = Server::new();
    server.mock("GET", "/ping").with_body("pong").create();

    let (context, mut main_loop) = MainLoop::channel(8);
    let worker = NetWorker::builder()
        .base_url(server.url())
        .cache(false)
        .io_threads(1)
        .main_context(context)
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    worker
        .get("ping", &[])
        .enqueue_on(Delivery::Io, move |result| {
            tx.send((thread_name(), result)).unwrap();
        });

    let (name, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name, IO_THREAD_NAME);
    assert_eq!(result.unwrap(), "pong");
    assert_eq!(main_loop.run_pending(), 0);
}

#[test]
fn main_delivery_without_a_main_loop_falls_back_to_io() {
    let mut server = Server::new();
    server.mock("GET", "/ping").with_body("pong").create();

    let worker = NetWorker::builder()
        .base_url(server.url())
        .cache(false)
        .io_threads(1)
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    worker.get("ping", &[]).enqueue(move |result| {
        tx.send((thread_name(), result)).unwrap();
    });

    let (name, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name, IO_THREAD_NAME);
    assert!(result.is_ok());
}

#[test]
fn cancelled_call_still_delivers_once() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let (context, mut main_loop) = MainLoop::channel(8);
    let worker = NetWorker::builder()
        .base_url(format!("http://127.0.0.1:{port}"))
        .cache(false)
        .io_threads(1)
        .read_timeout(Duration::from_secs(30))
        .main_context(context)
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = worker.get("slow", &[]).enqueue(move |result| {
        tx.send(result).unwrap();
    });
    handle.cancel();

    assert!(main_loop.turn());
    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(rx.try_recv().is_err());
    drop(listener);
}

#[test]
fn download_completion_is_delivered_on_io() {
    let mut server = Server::new();
    server
        .mock("GET", "/files/a.txt")
        .with_body("file body")
        .create();
    let dir = tempfile::tempdir().unwrap();

    let worker = NetWorker::builder()
        .base_url(server.url())
        .cache(false)
        .io_threads(1)
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    worker
        .download_with("files/a.txt", DownloadTarget::new(dir.path()), move |result| {
            tx.send((thread_name(), result)).unwrap();
        })
        .unwrap();

    let (name, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name, IO_THREAD_NAME);
    let path = result.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "file body");
}
