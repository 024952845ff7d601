//! Backend HTTP client
//!
//! Blocking reqwest client used from background threads; the UI thread
//! never blocks on a request. The large-object store is abstracted as
//! [`PayloadStore`] so document and upload logic stays testable without
//! a server.

use crate::catalog::Catalog;
use crate::constants::{BACKEND_URL_ENV, DEFAULT_BACKEND_URL};
use crate::data::{wire, Value};
use crate::document::FlowDocument;
use crate::error::FlowError;
use crate::graph::DataKind;
use chrono::{DateTime, Utc};

/// External large-object collaborator: media payloads exceeding inline
/// comfort live server-side and are fetched/re-uploaded by identity.
pub trait PayloadStore {
    /// Full externalized payload for a cached field, text-encoded.
    fn fetch_full(&self, id: &str, dtype: DataKind) -> Result<String, FlowError>;

    /// Upload a JSON-encoded value blob; returns the server-assigned
    /// value descriptor.
    fn upload(
        &self,
        blob: &str,
        original_filename: &str,
        file_extension: &str,
    ) -> Result<Value, FlowError>;
}

/// HTTP client for the flow backend. Cheap to clone into background
/// threads; the inner reqwest client is reference-counted.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Base URL from FLOWPAD_BACKEND, falling back to localhost.
    pub fn from_env() -> Self {
        let base = std::env::var(BACKEND_URL_ENV)
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        Self::new(base)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket endpoint for the execution channel.
    pub fn execute_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/execute")
    }

    /// GET /all_nodes: template catalog grouped by category and
    /// sub-group.
    pub fn fetch_catalog(&self) -> Result<Catalog, FlowError> {
        let response = self
            .http
            .get(format!("{}/all_nodes", self.base_url))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlowError::Transport(e.to_string()))?;
        response
            .json::<Catalog>()
            .map_err(|e| FlowError::Transport(e.to_string()))
    }

    /// POST /autosave: best-effort persistence ping. The response only
    /// carries a saved-at acknowledgement.
    pub fn autosave(&self, document: &FlowDocument) -> Result<DateTime<Utc>, FlowError> {
        self.http
            .post(format!("{}/autosave", self.base_url))
            .json(document)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlowError::Transport(e.to_string()))?;
        Ok(Utc::now())
    }
}

impl PayloadStore for BackendClient {
    fn fetch_full(&self, id: &str, dtype: DataKind) -> Result<String, FlowError> {
        let response = self
            .http
            .get(format!("{}/full_data/{id}", self.base_url))
            .query(&[("dtype", dtype.as_str())])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlowError::Transport(e.to_string()))?;
        response
            .text()
            .map_err(|e| FlowError::Transport(e.to_string()))
    }

    fn upload(
        &self,
        blob: &str,
        original_filename: &str,
        file_extension: &str,
    ) -> Result<Value, FlowError> {
        let part = reqwest::blocking::multipart::Part::bytes(blob.as_bytes().to_vec())
            .file_name(original_filename.to_string())
            .mime_str("application/json")
            .map_err(|e| FlowError::Upload(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("original_filename", original_filename.to_string())
            .text("file_extension", file_extension.to_string());

        let response = self
            .http
            .post(format!("{}/large_file_upload", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| FlowError::Upload(e.to_string()))?;
        if !response.status().is_success() {
            return Err(FlowError::Upload(format!(
                "server returned {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .json()
            .map_err(|e| FlowError::Upload(e.to_string()))?;
        wire::from_wire(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_url_swaps_scheme() {
        let client = BackendClient::new("http://localhost:8000/");
        assert_eq!(client.execute_url(), "ws://localhost:8000/execute");
        let client = BackendClient::new("https://flows.example.com");
        assert_eq!(client.execute_url(), "wss://flows.example.com/execute");
    }
}
