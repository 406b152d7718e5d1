//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use lopdf::{Dictionary, Document, Object, Stream};
use tempfile::TempDir;
use tower::ServiceExt;

use pdfmerge_core::{LopdfMerger, MergeConfig, MergeEngine, PdfMergeError};
use pdfmerge_server::{router, AppState};

const BOUNDARY: &str = "----pdfmerge-test-boundary";

/// Lopdf engine that counts how often it is invoked
#[derive(Default)]
pub struct CountingEngine {
    pub calls: AtomicUsize,
}

impl CountingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MergeEngine for CountingEngine {
    fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfMergeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LopdfMerger.merge(documents)
    }
}

/// Engine that always produces zero bytes
pub struct EmptyEngine;

impl MergeEngine for EmptyEngine {
    fn merge(&self, _documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfMergeError> {
        Ok(Vec::new())
    }
}

/// A router over throwaway upload and output directories
pub struct TestApp {
    pub dir: TempDir,
    pub app: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_engine(Arc::new(LopdfMerger)).await
    }

    pub async fn with_engine(engine: Arc<dyn MergeEngine>) -> Self {
        Self::with_config(engine, |config| config).await
    }

    pub async fn with_config(
        engine: Arc<dyn MergeEngine>,
        adjust: impl FnOnce(MergeConfig) -> MergeConfig,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = adjust(MergeConfig::new(
            dir.path().join("uploads"),
            dir.path().join("downloads"),
        ));
        let state = AppState::with_engine(config, engine).await.unwrap();
        let app = router(Arc::new(state));
        Self { dir, app }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// POST /upload with one `files` part per entry
    pub async fn upload(&self, files: &[(&str, &[u8])]) -> (StatusCode, serde_json::Value) {
        let parts: Vec<Part> = files
            .iter()
            .map(|(name, data)| Part::file("files", name, data))
            .collect();
        self.send_json(multipart_request("/upload", &parts)).await
    }

    /// Upload files and return their stored names
    pub async fn upload_ok(&self, files: &[(&str, &[u8])]) -> Vec<String> {
        let (status, body) = self.upload(files).await;
        assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
        body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    /// POST /merge as a URL-encoded form
    pub async fn merge(&self, file_order: &str, output_name: &str) -> (StatusCode, serde_json::Value) {
        let body = format!(
            "fileOrder={}&outputName={}",
            form_encode(file_order),
            form_encode(output_name)
        );
        let request = Request::builder()
            .method("POST")
            .uri("/merge")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send_json(request).await
    }
}

/// JSON array of names, as the page sends it in `fileOrder`
pub fn order(names: &[&String]) -> String {
    serde_json::to_string(names).unwrap()
}

/// One multipart part
pub struct Part {
    name: String,
    file_name: Option<String>,
    data: Vec<u8>,
}

impl Part {
    pub fn file(name: &str, file_name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            data: data.to_vec(),
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            data: value.as_bytes().to_vec(),
        }
    }
}

pub fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match &part.file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Percent-encode everything outside the unreserved set
fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Create a PDF with `num_pages` pages, each carrying a `<prefix>-Page-<n>` marker
pub fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let catalog_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for page_num in 0..num_pages {
        let page_id = doc.new_object_id();
        let content_id = doc.new_object_id();

        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
            content_prefix,
            page_num + 1
        );
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())),
        );

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(pages_id));
        page_dict.set("Contents", Object::Reference(content_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        );

        doc.objects.insert(page_id, Object::Dictionary(page_dict));
        page_ids.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(num_pages as i64));
    pages_dict.set("Kids", Object::Array(page_ids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog_dict = Dictionary::new();
    catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog_dict.set("Pages", Object::Reference(pages_id));
    doc.objects
        .insert(catalog_id, Object::Dictionary(catalog_dict));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Page markers of a PDF, in page order
pub fn page_markers(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = doc.get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').unwrap() + 1;
            let end = text.find(')').unwrap();
            text[start..end].to_string()
        })
        .collect()
}

/// Number of regular files directly inside `dir`
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .count()
}
