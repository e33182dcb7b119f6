//! Per-row downloads and uploads.
//!
//! Each transfer runs as its own tokio task and reports back through a
//! channel; the owner of the coordinator folds those events into the per-row
//! `TransferState` map by calling `poll` or `next_event`. Nothing else is
//! shared between tasks, so transfers of different rows never interfere.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info};

use crate::api::{ApiError, DownloadedFile, FileService, UploadFile, file_name};
use crate::config::SVConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Download,
    Upload,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Download => write!(f, "download"),
            TransferKind::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("A {kind} is already running for row {row_id}")]
    AlreadyInFlight { row_id: String, kind: TransferKind },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Upload was not accepted (status \"{0}\")")]
    Rejected(String),
    #[error("Could not save {path}: {source}")]
    Save {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Transfer ended before completing")]
    Aborted,
}

/// In-flight and error state of the transfers of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferState {
    pub downloading: bool,
    pub uploading: bool,
    pub download_error: Option<String>,
    pub upload_error: Option<String>,
}

impl TransferState {
    pub fn in_flight(&self) -> bool {
        self.downloading || self.uploading
    }
}

/// Completion of a transfer task.
#[derive(Debug)]
pub enum TransferEvent {
    /// Carries the location the file was saved to.
    Downloaded {
        row_id: String,
        result: Result<PathBuf, TransferError>,
    },
    /// Carries the path the server stored the file under.
    Uploaded {
        row_id: String,
        result: Result<String, TransferError>,
    },
}

impl TransferEvent {
    pub fn row_id(&self) -> &str {
        match self {
            TransferEvent::Downloaded { row_id, .. } | TransferEvent::Uploaded { row_id, .. } => row_id,
        }
    }

    fn aborted(kind: TransferKind, row_id: String) -> Self {
        match kind {
            TransferKind::Download => TransferEvent::Downloaded {
                row_id,
                result: Err(TransferError::Aborted),
            },
            TransferKind::Upload => TransferEvent::Uploaded {
                row_id,
                result: Err(TransferError::Aborted),
            },
        }
    }
}

/// Reports a transfer as aborted if its task is dropped before `finish`,
/// e.g. when the service panics. The in-flight flag is therefore always
/// cleared.
struct Completion {
    row_id: String,
    kind: TransferKind,
    events: UnboundedSender<TransferEvent>,
    done: bool,
}

impl Completion {
    fn finish(mut self, event: TransferEvent) {
        self.done = true;
        let _ = self.events.send(event);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            error!("{} for row {} did not complete", self.kind, self.row_id);
            let row_id = std::mem::take(&mut self.row_id);
            let _ = self.events.send(TransferEvent::aborted(self.kind, row_id));
        }
    }
}

pub struct TransferCoordinator<S: FileService> {
    service: Arc<S>,
    student_id: u64,
    download_dir: PathBuf,
    states: HashMap<String, TransferState>,
    events_tx: UnboundedSender<TransferEvent>,
    events_rx: UnboundedReceiver<TransferEvent>,
}

impl<S: FileService> TransferCoordinator<S> {
    pub fn new(service: Arc<S>, config: &SVConfig) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        TransferCoordinator {
            service,
            student_id: config.student_id,
            download_dir: config.download_dir.clone(),
            states: HashMap::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self, row_id: &str) -> Option<&TransferState> {
        self.states.get(row_id)
    }

    pub fn in_flight(&self) -> usize {
        self.states.values().filter(|s| s.in_flight()).count()
    }

    /// Starts downloading `file_ref` for `row_id` and saving it to the
    /// download directory. Returns `Ok(false)` without doing anything for an
    /// empty file reference.
    pub fn download(&mut self, row_id: &str, file_ref: &str) -> Result<bool, TransferError> {
        if file_ref.is_empty() {
            return Ok(false);
        }
        self.begin(row_id, TransferKind::Download)?;
        info!("Downloading {} for row {}", file_ref, row_id);

        let completion = self.completion(row_id, TransferKind::Download);
        let service = Arc::clone(&self.service);
        let path = file_ref.to_string();
        let dir = self.download_dir.clone();
        tokio::spawn(async move {
            let result = match service.download(&path).await {
                Ok(file) => save(&dir, &file).await,
                Err(e) => Err(e.into()),
            };
            let row_id = completion.row_id.clone();
            completion.finish(TransferEvent::Downloaded { row_id, result });
        });
        Ok(true)
    }

    /// Starts uploading `file` for `row_id`. Returns `Ok(false)` without doing
    /// anything when there is no file.
    pub fn upload(&mut self, row_id: &str, file: Option<UploadFile>) -> Result<bool, TransferError> {
        let Some(file) = file else {
            return Ok(false);
        };
        self.start_upload(row_id, async move { Ok::<_, TransferError>(file) })
    }

    /// Like `upload`, reading the file from disk inside the transfer task so a
    /// read failure shows up as the row's upload error.
    pub fn upload_path(&mut self, row_id: &str, path: PathBuf) -> Result<bool, TransferError> {
        self.start_upload(row_id, async move { Ok::<_, TransferError>(UploadFile::read(&path).await?) })
    }

    fn start_upload<F>(&mut self, row_id: &str, file: F) -> Result<bool, TransferError>
    where
        F: Future<Output = Result<UploadFile, TransferError>> + Send + 'static,
    {
        self.begin(row_id, TransferKind::Upload)?;
        info!("Uploading file for row {}", row_id);

        let completion = self.completion(row_id, TransferKind::Upload);
        let service = Arc::clone(&self.service);
        let student_id = self.student_id;
        let session_id = row_id.to_string();
        tokio::spawn(async move {
            let result = match file.await {
                Ok(file) => submit(service.as_ref(), student_id, &session_id, file).await,
                Err(e) => Err(e),
            };
            completion.finish(TransferEvent::Uploaded {
                row_id: session_id,
                result,
            });
        });
        Ok(true)
    }

    fn begin(&mut self, row_id: &str, kind: TransferKind) -> Result<(), TransferError> {
        let state = self.states.entry(row_id.to_string()).or_default();
        let busy = match kind {
            TransferKind::Download => &mut state.downloading,
            TransferKind::Upload => &mut state.uploading,
        };
        if *busy {
            debug!("Rejecting second {} for row {}", kind, row_id);
            return Err(TransferError::AlreadyInFlight {
                row_id: row_id.to_string(),
                kind,
            });
        }
        *busy = true;
        match kind {
            TransferKind::Download => state.download_error = None,
            TransferKind::Upload => state.upload_error = None,
        }
        Ok(())
    }

    fn completion(&self, row_id: &str, kind: TransferKind) -> Completion {
        Completion {
            row_id: row_id.to_string(),
            kind,
            events: self.events_tx.clone(),
            done: false,
        }
    }

    fn fold(&mut self, event: &TransferEvent) {
        let state = self.states.entry(event.row_id().to_string()).or_default();
        match event {
            TransferEvent::Downloaded { row_id, result } => {
                state.downloading = false;
                match result {
                    Ok(path) => {
                        info!("Row {} downloaded to {}", row_id, path.display());
                        state.download_error = None;
                    }
                    Err(e) => {
                        error!("Download for row {} failed: {}", row_id, e);
                        state.download_error = Some(e.to_string());
                    }
                }
            }
            TransferEvent::Uploaded { row_id, result } => {
                state.uploading = false;
                match result {
                    Ok(path) => {
                        info!("Row {} uploaded as {}", row_id, path);
                        state.upload_error = None;
                    }
                    Err(e) => {
                        error!("Upload for row {} failed: {}", row_id, e);
                        state.upload_error = Some(e.to_string());
                    }
                }
            }
        }
    }

    /// Folds all completed transfers into the state map and hands them out,
    /// so the caller can apply uploaded paths to its rows.
    pub fn poll(&mut self) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            self.fold(&event);
            events.push(event);
        }
        events
    }

    /// Waits for the next completed transfer.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        let event = self.events_rx.recv().await?;
        self.fold(&event);
        Some(event)
    }
}

async fn submit<S: FileService + ?Sized>(
    service: &S,
    student_id: u64,
    session_id: &str,
    file: UploadFile,
) -> Result<String, TransferError> {
    let response = service.upload(student_id, session_id, file).await?;
    match response.file_path() {
        Some(path) => Ok(path.to_string()),
        None => Err(TransferError::Rejected(response.status)),
    }
}

/// First of `name`, `stem (1).ext`, `stem (2).ext`, ... not present in `dir`.
async fn free_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

async fn save(dir: &Path, file: &DownloadedFile) -> Result<PathBuf, TransferError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| TransferError::Save {
            path: dir.to_path_buf(),
            source,
        })?;
    // Only the last segment, a server supplied name must not leave `dir`
    let name = file_name(&file.filename, "download");
    let target = free_target(dir, &name).await;
    tokio::fs::write(&target, &file.bytes)
        .await
        .map_err(|source| TransferError::Save {
            path: target.clone(),
            source,
        })?;
    debug!("Saved {} bytes ({}) to {}", file.bytes.len(), file.content_type, target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::UploadResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeFiles {
        calls: AtomicUsize,
        missing: Vec<String>,
        upload_status: Option<String>,
        gate: Option<Arc<Notify>>,
        uploads: Mutex<Vec<(u64, String, UploadFile)>>,
        panic_on_download: bool,
    }

    #[async_trait]
    impl FileService for FakeFiles {
        async fn download(&self, path: &str) -> Result<DownloadedFile, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.panic_on_download {
                panic!("download exploded");
            }
            if self.missing.iter().any(|m| m == path) {
                return Err(ApiError::Status {
                    status: 404,
                    reason: "Not Found".to_string(),
                });
            }
            Ok(DownloadedFile {
                filename: file_name(path, "download"),
                content_type: "application/pdf".to_string(),
                bytes: path.as_bytes().to_vec(),
            })
        }

        async fn upload(&self, student_id: u64, session_id: &str, file: UploadFile) -> Result<UploadResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let path = format!("/uploads/{session_id}/{}", file.filename);
            self.uploads
                .lock()
                .unwrap()
                .push((student_id, session_id.to_string(), file));
            Ok(match &self.upload_status {
                Some(status) => UploadResponse {
                    status: status.clone(),
                    data: None,
                },
                None => UploadResponse::success(path),
            })
        }
    }

    fn coordinator(files: FakeFiles) -> (TransferCoordinator<FakeFiles>, Arc<FakeFiles>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = SVConfig::default()
            .with_student_id(8)
            .with_download_dir(dir.path().join("downloads"));
        let files = Arc::new(files);
        (TransferCoordinator::new(Arc::clone(&files), &config), files, dir)
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile {
            filename: name.to_string(),
            bytes: b"%PDF".to_vec(),
        }
    }

    #[tokio::test]
    async fn empty_file_reference_is_a_no_op() {
        let (mut transfers, files, _dir) = coordinator(FakeFiles::default());
        assert!(!transfers.download("1", "").unwrap());
        assert!(transfers.state("1").is_none());
        assert_eq!(files.calls.load(Ordering::SeqCst), 0);
        assert!(transfers.poll().is_empty());
    }

    #[tokio::test]
    async fn missing_upload_file_is_a_no_op() {
        let (mut transfers, files, _dir) = coordinator(FakeFiles::default());
        assert!(!transfers.upload("1", None).unwrap());
        assert!(transfers.state("1").is_none());
        assert_eq!(files.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn download_saves_file_and_clears_flag() {
        let (mut transfers, _files, dir) = coordinator(FakeFiles::default());
        assert!(transfers.download("3", "/media/task.pdf").unwrap());
        assert!(transfers.state("3").unwrap().downloading);

        let event = transfers.next_event().await.unwrap();
        let TransferEvent::Downloaded { row_id, result } = event else {
            panic!("expected a download event");
        };
        assert_eq!(row_id, "3");
        let saved = result.unwrap();
        assert_eq!(saved, dir.path().join("downloads").join("task.pdf"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"/media/task.pdf");
        assert_eq!(transfers.state("3"), Some(&TransferState::default()));
    }

    #[tokio::test]
    async fn repeated_downloads_do_not_overwrite() {
        let (mut transfers, _files, dir) = coordinator(FakeFiles::default());
        for _ in 0..2 {
            transfers.download("3", "/media/task.pdf").unwrap();
            transfers.next_event().await.unwrap();
        }
        let downloads = dir.path().join("downloads");
        assert!(downloads.join("task.pdf").exists());
        assert!(downloads.join("task (1).pdf").exists());
    }

    #[tokio::test]
    async fn failed_download_records_error_and_clears_flag() {
        let files = FakeFiles {
            missing: vec!["/media/gone.pdf".to_string()],
            ..Default::default()
        };
        let (mut transfers, _files, _dir) = coordinator(files);
        transfers.download("7", "/media/gone.pdf").unwrap();
        transfers.next_event().await.unwrap();

        let state = transfers.state("7").unwrap();
        assert!(!state.downloading);
        let message = state.download_error.as_deref().unwrap();
        assert!(message.contains("404"), "{message}");

        // A new attempt starts from a clean error state
        transfers.download("7", "/media/other.pdf").unwrap();
        assert_eq!(transfers.state("7").unwrap().download_error, None);
        transfers.next_event().await.unwrap();
        assert_eq!(transfers.state("7"), Some(&TransferState::default()));
    }

    #[tokio::test]
    async fn successful_upload_reports_the_stored_path() {
        let (mut transfers, files, _dir) = coordinator(FakeFiles::default());
        assert!(transfers.upload("42", Some(pdf("essay.pdf"))).unwrap());
        assert!(transfers.state("42").unwrap().uploading);

        let event = transfers.next_event().await.unwrap();
        let TransferEvent::Uploaded { row_id, result } = event else {
            panic!("expected an upload event");
        };
        assert_eq!(row_id, "42");
        assert_eq!(result.unwrap(), "/uploads/42/essay.pdf");
        assert_eq!(transfers.state("42"), Some(&TransferState::default()));

        let uploads = files.uploads.lock().unwrap();
        assert_eq!(uploads[0].0, 8);
        assert_eq!(uploads[0].1, "42");
    }

    #[tokio::test]
    async fn non_success_status_is_an_upload_error() {
        let files = FakeFiles {
            upload_status: Some("error".to_string()),
            ..Default::default()
        };
        let (mut transfers, _files, _dir) = coordinator(files);
        transfers.upload("42", Some(pdf("essay.pdf"))).unwrap();
        let event = transfers.next_event().await.unwrap();
        assert!(matches!(
            event,
            TransferEvent::Uploaded {
                result: Err(TransferError::Rejected(_)),
                ..
            }
        ));
        let state = transfers.state("42").unwrap();
        assert!(!state.uploading);
        assert!(state.upload_error.is_some());
    }

    #[tokio::test]
    async fn unreadable_upload_path_is_a_row_error() {
        let (mut transfers, files, dir) = coordinator(FakeFiles::default());
        transfers
            .upload_path("5", dir.path().join("does-not-exist.pdf"))
            .unwrap();
        transfers.next_event().await.unwrap();
        let state = transfers.state("5").unwrap();
        assert!(!state.uploading);
        assert!(state.upload_error.as_deref().unwrap().contains("does-not-exist.pdf"));
        assert_eq!(files.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_transfer_for_busy_row_is_rejected() {
        let gate = Arc::new(Notify::new());
        let files = FakeFiles {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let (mut transfers, _files, _dir) = coordinator(files);

        transfers.download("1", "/media/a.pdf").unwrap();
        let err = transfers.download("1", "/media/a.pdf").unwrap_err();
        assert!(matches!(
            err,
            TransferError::AlreadyInFlight {
                kind: TransferKind::Download,
                ..
            }
        ));
        // The rejection leaves the running transfer alone
        assert!(transfers.state("1").unwrap().downloading);
        assert_eq!(transfers.state("1").unwrap().download_error, None);

        // Other rows and the other direction are independent
        assert!(transfers.download("2", "/media/b.pdf").unwrap());
        assert!(transfers.upload("1", Some(pdf("a.pdf"))).unwrap());
        assert_eq!(transfers.in_flight(), 2);

        for _ in 0..3 {
            gate.notify_one();
            transfers.next_event().await.unwrap();
        }
        assert_eq!(transfers.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_transfer_still_clears_flag() {
        let files = FakeFiles {
            panic_on_download: true,
            ..Default::default()
        };
        let (mut transfers, _files, _dir) = coordinator(files);
        transfers.download("9", "/media/a.pdf").unwrap();
        let event = transfers.next_event().await.unwrap();
        assert!(matches!(
            event,
            TransferEvent::Downloaded {
                result: Err(TransferError::Aborted),
                ..
            }
        ));
        let state = transfers.state("9").unwrap();
        assert!(!state.downloading);
        assert!(state.download_error.is_some());
    }
}
