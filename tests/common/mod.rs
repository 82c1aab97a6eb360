//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::{Bytes, BytesMut};
use hyper::body::Body as _;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use dualport::config::ServerBuilder;
use dualport::interceptors::{CallObserver, CallRecord};
use dualport::net::Listener;
use dualport::rpc::codec;
use dualport::rpc::server::{GRPC_MESSAGE, GRPC_STATUS, RPC_CONTENT_TYPE};
use dualport::{Server, ServerError, Shutdown};

/// Call observer that keeps every record.
#[derive(Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<CallRecord>>,
}

impl RecordingObserver {
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl CallObserver for RecordingObserver {
    fn observe(&self, record: &CallRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// A server running on an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn start(builder: ServerBuilder) -> TestServer {
    let server = builder.build().unwrap();
    start_server(server).await
}

pub async fn start_server(server: Server) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64).unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    TestServer { addr, shutdown, handle }
}

/// Outcome of one RPC call as seen on the wire.
#[derive(Debug)]
pub struct RpcReply {
    pub http_status: u16,
    /// `grpc-status` from a trailers-only response; `None` when the status
    /// travelled in the trailers.
    pub header_status: Option<i32>,
    pub message: Option<String>,
    pub body: Bytes,
}

impl RpcReply {
    /// Unframed reply payload.
    pub fn payload(&self) -> Bytes {
        codec::decode(&self.body).unwrap()
    }
}

pub fn rpc_client() -> reqwest::Client {
    reqwest::Client::builder().http2_prior_knowledge().build().unwrap()
}

pub async fn rpc_call(
    client: &reqwest::Client,
    server: &TestServer,
    method: &str,
    payload: &[u8],
    headers: &[(&str, &str)],
) -> RpcReply {
    let mut request = client
        .post(server.url(method))
        .header(reqwest::header::CONTENT_TYPE, RPC_CONTENT_TYPE)
        .header("te", "trailers")
        .body(codec::encode(payload));
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request.send().await.unwrap();
    assert_eq!(response.version(), reqwest::Version::HTTP_2);

    let http_status = response.status().as_u16();
    let header_status = response
        .headers()
        .get(GRPC_STATUS)
        .map(|v| v.to_str().unwrap().parse().unwrap());
    let message = response
        .headers()
        .get(GRPC_MESSAGE)
        .map(|v| codec::decode_message(v.to_str().unwrap()));
    let body = response.bytes().await.unwrap();

    RpcReply {
        http_status,
        header_status,
        message,
        body,
    }
}

pub fn observer() -> (Arc<RecordingObserver>, Arc<dyn CallObserver>) {
    let recorder = Arc::new(RecordingObserver::default());
    let observer: Arc<dyn CallObserver> = recorder.clone();
    (recorder, observer)
}

/// Full RPC response including trailers, read over a bare HTTP/2
/// connection.
#[derive(Debug)]
pub struct FramedReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub trailers: Option<HeaderMap>,
}

pub async fn rpc_call_with_trailers(
    server: &TestServer,
    method: &str,
    payload: &[u8],
) -> FramedReply {
    let tcp = TcpStream::connect(server.addr).await.unwrap();
    let (mut sender, conn) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(tcp))
            .await
            .unwrap();
    tokio::spawn(conn);

    let request = Request::builder()
        .method("POST")
        .uri(server.url(method))
        .header("content-type", RPC_CONTENT_TYPE)
        .header("te", "trailers")
        .body(Body::from(codec::encode(payload)))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let (parts, mut incoming) = response.into_parts();

    let mut body = BytesMut::new();
    let mut trailers = None;
    while let Some(frame) =
        std::future::poll_fn(|cx| Pin::new(&mut incoming).poll_frame(cx)).await
    {
        match frame.unwrap().into_data() {
            Ok(chunk) => body.extend_from_slice(&chunk),
            Err(frame) => trailers = frame.into_trailers().ok(),
        }
    }

    FramedReply {
        status: parts.status,
        headers: parts.headers,
        body: body.freeze(),
        trailers,
    }
}
