//! The student REST API and the collaborator traits the rest of the crate
//! talks to. `ApiClient` implements all of them over reqwest.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::SVConfig;
use crate::payload::{
    Certificate, CertificatesEnvelope, Level, Profile, ProfileEnvelope, ProfileUpdate, Progress,
    SessionsEnvelope, UploadResponse,
};

const AUTH_HEADER: &str = "userKey";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No auth token configured")]
    MissingAuthToken,
    #[error("File path is required")]
    MissingPath,
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to download: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("Could not read {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },
}

/// Binary content returned by the download proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub async fn read(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        Ok(UploadFile {
            filename: file_name(&path.to_string_lossy(), "upload"),
            bytes,
        })
    }
}

/// Last segment of a slash separated path, or `fallback` when there is none.
pub fn file_name(path: &str, fallback: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[async_trait]
pub trait SessionSource: Send + Sync + 'static {
    /// Levels with their sessions, `None` when the API sent no collection.
    async fn fetch_sessions(&self, student_id: u64, track_id: u64) -> Result<Option<Vec<Level>>, ApiError>;
}

#[async_trait]
pub trait FileService: Send + Sync + 'static {
    async fn download(&self, path: &str) -> Result<DownloadedFile, ApiError>;

    async fn upload(&self, student_id: u64, session_id: &str, file: UploadFile) -> Result<UploadResponse, ApiError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn get_profile(&self, student_id: u64) -> Result<Option<Profile>, ApiError>;

    /// Applies `update` and returns the profile as stored afterwards.
    async fn update_profile(&self, student_id: u64, update: ProfileUpdate) -> Result<Option<Profile>, ApiError>;
}

#[async_trait]
pub trait CertificateSource: Send + Sync + 'static {
    async fn certificates(&self, student_id: u64, track_id: u64) -> Result<Vec<Certificate>, ApiError>;
}

#[async_trait]
pub trait ProgressSource: Send + Sync + 'static {
    async fn progress(&self, student_id: u64, track_id: u64) -> Result<Progress, ApiError>;
}

/// Everything the dashboard needs from the outside world.
pub trait Backend: SessionSource + FileService + ProfileStore + CertificateSource + ProgressSource {}

impl<T> Backend for T where T: SessionSource + FileService + ProfileStore + CertificateSource + ProgressSource {}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    auth_token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(config: &SVConfig) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(ApiClient {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            http,
        })
    }

    /// Absolute urls are used as they are, anything else is joined onto the base url.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn token(&self) -> Result<&str, ApiError> {
        match self.auth_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                error!("No auth token configured, skipping request");
                Err(ApiError::MissingAuthToken)
            }
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        Ok(request.header(AUTH_HEADER, self.token()?))
    }

    fn with_optional_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) if !token.is_empty() => request.header(AUTH_HEADER, token),
            _ => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {} in {:?}", status.as_u16(), response.url(), start.elapsed());
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionSource for ApiClient {
    async fn fetch_sessions(&self, student_id: u64, track_id: u64) -> Result<Option<Vec<Level>>, ApiError> {
        let request = self
            .http
            .post(self.url("students/sessions"))
            .query(&[("roundStatus", "running")])
            .json(&json!({ "student_id": student_id, "track_id": track_id }));
        let response = Self::send(self.authorized(request)?).await?;
        let envelope: SessionsEnvelope = response.json().await?;
        Ok(envelope.data.and_then(|d| d.levels))
    }
}

#[async_trait]
impl FileService for ApiClient {
    async fn download(&self, path: &str) -> Result<DownloadedFile, ApiError> {
        if path.is_empty() {
            return Err(ApiError::MissingPath);
        }
        let url = self.url(path);
        debug!("Downloading {}", url);
        let response = Self::send(self.with_optional_auth(self.http.get(&url))).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadedFile {
            filename: file_name(path.split('?').next().unwrap_or(path), "download"),
            content_type,
            bytes,
        })
    }

    async fn upload(&self, student_id: u64, session_id: &str, file: UploadFile) -> Result<UploadResponse, ApiError> {
        let form = Form::new()
            .text("student_id", student_id.to_string())
            .text("session_id", session_id.to_string())
            .part("assignment", Part::bytes(file.bytes).file_name(file.filename));
        let request = self
            .http
            .post(self.url("students/upload-assignment"))
            .multipart(form);
        let response = Self::send(self.authorized(request)?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProfileStore for ApiClient {
    async fn get_profile(&self, student_id: u64) -> Result<Option<Profile>, ApiError> {
        let request = self.http.get(self.url(&format!("accounts/students/{student_id}")));
        let response = Self::send(self.authorized(request)?).await?;
        let envelope: ProfileEnvelope = response.json().await?;
        Ok(envelope.student)
    }

    async fn update_profile(&self, student_id: u64, update: ProfileUpdate) -> Result<Option<Profile>, ApiError> {
        let token = self.token()?;
        let mut form = Form::new();
        if let Some(path) = &update.image {
            let image = UploadFile::read(path).await?;
            form = form.part("image", Part::bytes(image.bytes).file_name(image.filename));
        }
        if let Some(name) = update.name {
            form = form.text("name", name);
        }
        if let Some(birth_date) = update.birth_date {
            form = form.text("birth_date", birth_date);
        }
        let request = self
            .http
            .put(self.url(&format!("accounts/student/{student_id}")))
            .header(AUTH_HEADER, token)
            .multipart(form);
        Self::send(request).await?;
        self.get_profile(student_id).await
    }
}

#[async_trait]
impl CertificateSource for ApiClient {
    async fn certificates(&self, student_id: u64, track_id: u64) -> Result<Vec<Certificate>, ApiError> {
        let request = self
            .http
            .get(self.url("certificates"))
            .query(&[("student", student_id), ("track", track_id)]);
        let response = Self::send(self.with_optional_auth(request)).await?;
        let envelope: CertificatesEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl ProgressSource for ApiClient {
    async fn progress(&self, student_id: u64, track_id: u64) -> Result<Progress, ApiError> {
        let request = self
            .http
            .post(self.url("parents/student-track-progress"))
            .json(&json!({ "student_id": student_id, "track_id": track_id }));
        let response = Self::send(self.authorized(request)?).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str, token: Option<&str>) -> ApiClient {
        let config = SVConfig::default()
            .with_api_url(base.to_string())
            .with_auth_token(token.map(str::to_string));
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn urls_join_without_doubled_slashes() {
        let api = client("https://api.example.com/v1/", None);
        assert_eq!(api.url("/media/a.pdf"), "https://api.example.com/v1/media/a.pdf");
        assert_eq!(api.url("media/a.pdf"), "https://api.example.com/v1/media/a.pdf");
        assert_eq!(api.url("https://cdn.example.com/c.png"), "https://cdn.example.com/c.png");
    }

    #[test]
    fn file_names_come_from_the_last_segment() {
        assert_eq!(file_name("/media/assignments/task.pdf", "download"), "task.pdf");
        assert_eq!(file_name("/media/assignments/", "download"), "download");
        assert_eq!(file_name("", "download"), "download");
        assert_eq!(file_name("C:\\work\\essay.docx", "upload"), "essay.docx");
    }

    #[tokio::test]
    async fn missing_token_short_circuits_authenticated_calls() {
        // Nothing listens here, a request would fail with a transport error instead
        let api = client("http://127.0.0.1:9", None);
        assert!(matches!(
            api.fetch_sessions(8, 31).await,
            Err(ApiError::MissingAuthToken)
        ));
        assert!(matches!(
            api.upload(8, "42", UploadFile { filename: "a.txt".into(), bytes: vec![1] }).await,
            Err(ApiError::MissingAuthToken)
        ));
        assert!(matches!(
            api.update_profile(8, ProfileUpdate::default()).await,
            Err(ApiError::MissingAuthToken)
        ));
    }

    #[tokio::test]
    async fn empty_download_path_is_rejected() {
        let api = client("http://127.0.0.1:9", Some("token"));
        let err = api.download("").await.unwrap_err();
        assert_eq!(err.to_string(), "File path is required");
    }

    #[test]
    fn status_errors_read_like_the_proxy_response() {
        let err = ApiError::Status {
            status: 404,
            reason: "Not Found".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to download: 404 Not Found");
    }
}
