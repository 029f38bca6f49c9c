//! Shared fixtures for catscan-api integration tests
//!
//! The router runs in-process against an in-memory database, with fake
//! recognition and artifact store backends.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use catscan_api::config::ServiceConfig;
use catscan_api::services::artifact_store::{
    ArtifactStore, ArtifactStoreError, DiscardOutcome, StoredArtifact,
};
use catscan_api::services::recognition_gateway::{
    RecognitionError, RecognitionGateway, RecognitionResponse, RemoveBgArtifact,
};
use catscan_api::services::upload_validator::UploadedFile;
use catscan_api::{build_router, AppState};

pub const BOUNDARY: &str = "catscan-test-boundary";

/// Canned answer for `recognize`
#[derive(Debug, Clone)]
pub enum RecognizeReply {
    Body(Value),
    Unreachable,
}

/// Canned answer for `remove_background`
#[derive(Debug, Clone)]
pub enum RemoveBgReply {
    Artifact(RemoveBgArtifact),
    Http { status: u16, summary: String },
}

pub struct FakeGateway {
    recognize: Mutex<RecognizeReply>,
    remove_bg: Mutex<RemoveBgReply>,
    pub recognize_calls: Mutex<usize>,
    pub remove_bg_sources: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            recognize: Mutex::new(RecognizeReply::Body(one_cat_face_body())),
            remove_bg: Mutex::new(RemoveBgReply::Artifact(RemoveBgArtifact {
                id: "nobg-1".to_string(),
                url: "https://store/nobg-1.png".to_string(),
                bucket: Some("scans".to_string()),
                filename: Some("nobg-1.png".to_string()),
                hash: Some("abc123".to_string()),
                cached: false,
            })),
            recognize_calls: Mutex::new(0),
            remove_bg_sources: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_recognize(&self, reply: RecognizeReply) {
        *self.recognize.lock().unwrap() = reply;
    }

    pub fn reply_remove_bg(&self, reply: RemoveBgReply) {
        *self.remove_bg.lock().unwrap() = reply;
    }

    pub fn recognize_count(&self) -> usize {
        *self.recognize_calls.lock().unwrap()
    }
}

#[async_trait]
impl RecognitionGateway for FakeGateway {
    async fn recognize(&self, _file: &UploadedFile) -> Result<RecognitionResponse, RecognitionError> {
        *self.recognize_calls.lock().unwrap() += 1;
        let reply = self.recognize.lock().unwrap().clone();
        match reply {
            RecognizeReply::Body(body) => Ok(RecognitionResponse {
                body,
                header_request_id: None,
                latency_ms: 7,
            }),
            RecognizeReply::Unreachable => {
                Err(RecognitionError::Unreachable("connection refused".to_string()))
            }
        }
    }

    async fn remove_background(&self, source_url: &str) -> Result<RemoveBgArtifact, RecognitionError> {
        self.remove_bg_sources.lock().unwrap().push(source_url.to_string());
        let reply = self.remove_bg.lock().unwrap().clone();
        match reply {
            RemoveBgReply::Artifact(artifact) => Ok(artifact),
            RemoveBgReply::Http { status, summary } => Err(RecognitionError::RemoveBgHttp { status, summary }),
        }
    }
}

/// Records what it was asked to store or delete
#[derive(Default)]
pub struct FakeStore {
    pub uploads: Mutex<Vec<(String, Option<String>)>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload(&self, bucket: &str, file: &UploadedFile) -> Result<StoredArtifact, ArtifactStoreError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((bucket.to_string(), file.file_name.clone()));
        let id = format!("art-{}", uploads.len());
        Ok(StoredArtifact {
            url: format!("https://store/{}/{}", bucket, id),
            id,
            bucket: Some(bucket.to_string()),
            filename: file.file_name.clone(),
            original_name: file.file_name.clone(),
            mime: file.content_type.clone(),
            size: Some(file.bytes.len() as u64),
            created_at: None,
        })
    }

    async fn delete_selected(&self, ids: &[String]) -> Result<DiscardOutcome, ArtifactStoreError> {
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(DiscardOutcome {
            requested: ids.len(),
            upstream: None,
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub gateway: Arc<FakeGateway>,
    pub store: Arc<FakeStore>,
}

/// Router over an in-memory database with fake backends
pub async fn test_app() -> TestApp {
    let db = catscan_common::db::init_memory_database().await.unwrap();
    catscan_api::db::init_tables(&db).await.unwrap();

    let gateway = Arc::new(FakeGateway::new());
    let store = Arc::new(FakeStore::default());
    let state = AppState::new(db, ServiceConfig::default(), gateway.clone(), store.clone());
    let router = build_router(state.clone());

    TestApp {
        state,
        router,
        gateway,
        store,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(json_request(Method::GET, uri, user, None)).await;
        (status, body)
    }

    pub async fn post(&self, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        let (status, _, body) = self.send(json_request(Method::POST, uri, user, Some(body))).await;
        (status, body)
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(json_request(Method::DELETE, uri, None, None)).await;
        (status, body)
    }

    /// Create a session and return its id
    pub async fn create_session(&self, user: Option<&str>, body: Value) -> String {
        let (status, body) = self.post("/scan/sessions", user, body).await;
        assert_eq!(status, StatusCode::CREATED, "session create failed: {}", body);
        body["data"]["session_id"].as_str().unwrap().to_string()
    }

    /// Record a result whose details carry `labels`
    pub async fn record_labels(&self, session_id: &str, labels: &[&str]) -> Value {
        let details: Vec<Value> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| json!({"area_name": format!("area-{}", i), "label": label, "confidence_score": 0.9}))
            .collect();
        let (status, body) = self
            .post(
                &format!("/scan/sessions/{}/result", session_id),
                None,
                json!({"remarks": "auto", "details": details}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "result record failed: {}", body);
        body
    }

    pub async fn register_cat(&self, user: &str, name: &str) -> String {
        let (status, body) = self.post("/cats", Some(user), json!({"name": name})).await;
        assert_eq!(status, StatusCode::CREATED, "cat create failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// One multipart part: (field name, file name, content type, bytes)
pub type Part<'a> = (&'a str, Option<&'a str>, Option<&'a str>, Vec<u8>);

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, file_name
            ),
            None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", name),
        };
        body.extend_from_slice(disposition.as_bytes());
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_builder(uri: &str) -> axum::http::request::Builder {
    Request::builder().method(Method::POST).uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    )
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    multipart_builder(uri)
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Same form, delivered as a stream of `chunk_size` frames the way a socket would
pub fn chunked_multipart_request(uri: &str, parts: &[Part<'_>], chunk_size: usize) -> Request<Body> {
    let frames: Vec<Result<Vec<u8>, Infallible>> = multipart_body(parts)
        .chunks(chunk_size)
        .map(|frame| Ok(frame.to_vec()))
        .collect();
    multipart_builder(uri)
        .body(Body::from_stream(futures::stream::iter(frames)))
        .unwrap()
}

/// Magic bytes followed by zero padding up to `len`
pub fn padded(magic: &[u8], len: usize) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    bytes.resize(len.max(magic.len()), 0);
    bytes
}

pub fn png_bytes(len: usize) -> Vec<u8> {
    padded(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'], len)
}

pub fn jpeg_bytes(len: usize) -> Vec<u8> {
    padded(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'], len)
}

pub fn webp_bytes(len: usize) -> Vec<u8> {
    padded(b"RIFF\x00\x00\x00\x00WEBPVP8 ", len)
}

/// Recognition body for a cat with exactly one face
pub fn one_cat_face_body() -> Value {
    json!({
        "ok": true,
        "request_id": "req-fixture",
        "label": "cat",
        "cat_prob": 0.96,
        "threshold": 0.5,
        "topk": [{"label": "cat", "prob": 0.96}],
        "faces": {
            "ok": true,
            "faces_count": 1,
            "chosen_conf": 0.9,
            "box": [1.0, 2.0, 3.0, 4.0],
            "kept_confs_ge_min": [0.9],
            "preview": {"id": "p-1", "url": "https://store/p-1.jpg"},
            "roi": {"id": "r-1", "url": "https://store/r-1.jpg"}
        }
    })
}

/// Minimal valid session body with an original image
pub fn session_body() -> Value {
    json!({
        "scan_type": "face",
        "checkup_type": "quick",
        "geolocation": {"latitude": -6.2, "longitude": 106.8, "place": "Jakarta"},
        "images": {
            "original": {"id": "orig-1", "url": "https://store/orig-1.jpg"},
            "roi": {"id": "roi-1", "url": "https://store/roi-1.jpg"}
        }
    })
}
