//! CSV export panel: cancellable downloads and the session download log.

use std::{
    fmt,
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::Instant,
};

use chrono::{DateTime, Local};
use reqwest::{blocking::Client, header::CONTENT_DISPOSITION};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::constants::{DEFAULT_CSV_NAME, DOWNLOAD_CHUNK_BYTES};
use crate::error::{DashboardError, Result};
use crate::util::format_elapsed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Success,
    Failed,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::Success => write!(f, "Success"),
            DownloadStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One download attempt.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub status: DownloadStatus,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_secs: u64,
    pub error: String,
    pub file: Option<PathBuf>,
}

impl LogEntry {
    fn finish(start_time: DateTime<Local>, started: Instant, outcome: &Result<PathBuf>) -> Self {
        let (status, error, file) = match outcome {
            Ok(path) => (DownloadStatus::Success, String::new(), Some(path.clone())),
            Err(err) => (DownloadStatus::Failed, err.to_string(), None),
        };
        Self {
            status,
            start_time,
            end_time: Local::now(),
            duration_secs: started.elapsed().as_secs(),
            error,
            file,
        }
    }

    pub fn start_label(&self) -> String {
        self.start_time.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn end_label(&self) -> String {
        self.end_time.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn duration_label(&self) -> String {
        format!("{} seconds", self.duration_secs)
    }
}

/// Parses the filter text. Blank input means no filters.
pub fn parse_filters(input: &str) -> Result<Map<String, Value>> {
    let mut filters = Map::new();
    if input.trim().is_empty() {
        return Ok(filters);
    }
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(parsed)) => {
            filters.extend(parsed);
            Ok(filters)
        }
        Ok(other) => Err(DashboardError::FilterNotObject(json_kind(&other))),
        Err(err) => Err(DashboardError::InvalidFilter(err.to_string())),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `filename="<name>"` from a Content-Disposition header, else `data.csv`.
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .filter(|h| h.contains("filename="))
        .and_then(|h| {
            let rest = &h[h.find("filename=\"")? + "filename=\"".len()..];
            let name = &rest[..rest.rfind('"')?];
            Path::new(name).file_name()?.to_str().map(str::to_string)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_CSV_NAME.to_string())
}

/// `dir/name`, or `dir/stem (n).ext` when that file already exists.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

struct Download {
    client: Client,
    url: String,
    filters: Map<String, Value>,
    dir: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl Download {
    fn cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(DashboardError::Aborted);
        }
        Ok(())
    }

    fn run(&self) -> Result<PathBuf> {
        let mut response = self.client.post(&self.url).json(&self.filters).send()?;
        self.cancelled()?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Status(status.as_u16()));
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let name = filename_from_disposition(disposition);

        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().timestamp_nanos_opt().unwrap_or_default();
        let part = self.dir.join(format!(".{name}.{stamp}.part"));
        let written = self.stream_to(&mut response, &part);
        let committed = written.and_then(|_| {
            self.cancelled()?;
            let target = unique_path(&self.dir, &name);
            fs::rename(&part, &target)?;
            Ok(target)
        });
        if committed.is_err() {
            let _ = fs::remove_file(&part);
        }
        committed
    }

    fn stream_to(&self, body: &mut impl Read, path: &Path) -> Result<u64> {
        let mut file = File::create(path)?;
        let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
        let mut total = 0u64;
        loop {
            self.cancelled()?;
            let n = body.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            total += n as u64;
        }
        file.flush()?;
        Ok(total)
    }
}

/// The attempt the panel is currently waiting on.
struct ActiveDownload {
    id: u64,
    cancel: Arc<AtomicBool>,
    started: Instant,
}

pub struct ExportPanel {
    client: Client,
    url: String,
    dir: PathBuf,
    pub input: String,
    pub editing: bool,
    active: Option<ActiveDownload>,
    pending: Vec<(u64, Receiver<LogEntry>)>,
    next_id: u64,
    logs: Vec<LogEntry>,
    notice: Option<String>,
}

impl ExportPanel {
    pub fn new(client: Client, url: String, dir: PathBuf) -> Self {
        Self {
            client,
            url,
            dir,
            input: String::new(),
            editing: false,
            active: None,
            pending: Vec::new(),
            next_id: 0,
            logs: Vec::new(),
            notice: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Starts a download on a worker thread. Invalid filter text is rejected
    /// before anything is sent.
    pub fn start_download(&mut self) -> Result<()> {
        if self.is_busy() {
            return Ok(());
        }
        let filters = match parse_filters(&self.input) {
            Ok(filters) => filters,
            Err(err) => {
                self.notice = Some(match err {
                    DashboardError::FilterNotObject(_) => err.to_string(),
                    _ => "Invalid JSON body".to_string(),
                });
                return Err(err);
            }
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let download = Download {
            client: self.client.clone(),
            url: self.url.clone(),
            filters,
            dir: self.dir.clone(),
            cancel: Arc::clone(&cancel),
        };
        let (tx, rx) = mpsc::channel();
        let start_time = Local::now();
        let started = Instant::now();
        info!(url = %self.url, "download started");

        thread::spawn(move || {
            let outcome = download.run();
            let entry = LogEntry::finish(start_time, started, &outcome);
            match &outcome {
                Ok(path) => info!(file = %path.display(), secs = entry.duration_secs, "download finished"),
                Err(err) => warn!(%err, secs = entry.duration_secs, "download failed"),
            }
            let _ = tx.send(entry);
        });

        let id = self.next_id;
        self.next_id += 1;
        self.pending.push((id, rx));
        self.active = Some(ActiveDownload { id, cancel, started });
        Ok(())
    }

    /// Aborts the running attempt and clears busy state right away.
    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.store(true, Ordering::SeqCst);
            info!("download cancelled");
        }
    }

    /// Collects finished attempts into the log.
    pub fn poll(&mut self) {
        let mut finished = Vec::new();
        self.pending.retain(|(id, rx)| match rx.try_recv() {
            Ok(entry) => {
                finished.push((*id, Some(entry)));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                finished.push((*id, None));
                false
            }
        });
        for (id, entry) in finished {
            if self.active.as_ref().is_some_and(|a| a.id == id) {
                self.active = None;
            }
            self.logs.extend(entry);
        }
    }

    pub fn elapsed_label(&self) -> Option<String> {
        self.active
            .as_ref()
            .map(|a| format_elapsed(a.started.elapsed().as_secs()))
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn download_dir(&self) -> &Path {
        &self.dir
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CannedResponse, CannedServer};
    use std::time::Duration;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "profit_dashboard_{tag}_{}_{}",
            std::process::id(),
            Local::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn panel(url: String, dir: &Path) -> ExportPanel {
        ExportPanel::new(Client::new(), url, dir.to_path_buf())
    }

    fn wait_for_logs(panel: &mut ExportPanel, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while panel.logs().len() < n && Instant::now() < deadline {
            panel.poll();
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn blank_filter_is_empty_object() {
        assert!(parse_filters("   ").unwrap().is_empty());
        let f = parse_filters(r#"{"from": 3, "tag": "x"}"#).unwrap();
        assert_eq!(f.get("from"), Some(&Value::from(3)));
    }

    #[test]
    fn non_object_filter_is_invalid() {
        assert!(matches!(parse_filters("{oops"), Err(DashboardError::InvalidFilter(_))));
        assert!(matches!(parse_filters("[1, 2]"), Err(DashboardError::FilterNotObject("an array"))));
        assert!(matches!(parse_filters("42"), Err(DashboardError::FilterNotObject("a number"))));
    }

    #[test]
    fn filename_parsing() {
        assert_eq!(filename_from_disposition(None), "data.csv");
        assert_eq!(filename_from_disposition(Some("attachment")), "data.csv");
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="report 1.csv""#)),
            "report 1.csv"
        );
        assert_eq!(filename_from_disposition(Some("attachment; filename=plain.csv")), "data.csv");
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="../../etc/passwd""#)),
            "passwd"
        );
    }

    #[test]
    fn unique_path_skips_existing_files() {
        let dir = temp_dir("unique");
        assert_eq!(unique_path(&dir, "a.csv"), dir.join("a.csv"));
        fs::write(dir.join("a.csv"), "x").unwrap();
        fs::write(dir.join("a (1).csv"), "x").unwrap();
        assert_eq!(unique_path(&dir, "a.csv"), dir.join("a (2).csv"));
    }

    #[test]
    fn malformed_filter_never_hits_the_network() {
        let server = CannedServer::start(CannedResponse::ok("a,b\n"));
        let dir = temp_dir("malformed");
        let mut p = panel(server.url("/v1/transactions/csvExport"), &dir);
        p.input = "{not json".to_string();
        assert!(p.start_download().is_err());
        assert!(!p.is_busy());
        assert_eq!(p.notice(), Some("Invalid JSON body"));
        thread::sleep(Duration::from_millis(100));
        p.poll();
        assert_eq!(server.hits(), 0);
        assert!(p.logs().is_empty());
    }

    #[test]
    fn array_filter_notice_asks_for_an_object() {
        let server = CannedServer::start(CannedResponse::ok("a,b\n"));
        let dir = temp_dir("array");
        let mut p = panel(server.url("/v1/transactions/csvExport"), &dir);
        p.input = "[1, 2]".to_string();
        assert!(matches!(p.start_download(), Err(DashboardError::FilterNotObject(_))));
        assert!(!p.is_busy());
        assert_eq!(p.notice(), Some("Invalid JSON body: a JSON object is required, got an array"));
        assert_eq!(server.hits(), 0);
    }

    #[test]
    fn successful_download_writes_file_and_logs_once() {
        let server = CannedServer::start(
            CannedResponse::ok("index,profit\n0,4.50\n")
                .header("Content-Disposition", r#"attachment; filename="tx.csv""#),
        );
        let dir = temp_dir("success");
        let mut p = panel(server.url("/v1/transactions/csvExport"), &dir);
        p.input = r#"{"from": 1}"#.to_string();
        p.start_download().unwrap();
        assert!(p.is_busy());
        assert_eq!(p.elapsed_label().as_deref(), Some("00:00"));

        wait_for_logs(&mut p, 1);
        assert_eq!(p.logs().len(), 1);
        let entry = &p.logs()[0];
        assert_eq!(entry.status, DownloadStatus::Success);
        assert!(entry.error.is_empty());
        assert_eq!(entry.duration_label(), "0 seconds");
        assert!(!p.is_busy());
        assert_eq!(fs::read_to_string(dir.join("tx.csv")).unwrap(), "index,profit\n0,4.50\n");

        let request = &server.requests()[0];
        assert_eq!(request.method, axum::http::Method::POST);
        assert_eq!(request.path, "/v1/transactions/csvExport");
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert_eq!(request.body, r#"{"from":1}"#);
    }

    #[test]
    fn error_status_logs_failure() {
        let server = CannedServer::start(CannedResponse::ok("nope").status(500));
        let dir = temp_dir("status");
        let mut p = panel(server.url("/v1/transactions/csvExport"), &dir);
        p.start_download().unwrap();
        wait_for_logs(&mut p, 1);
        assert_eq!(p.logs().len(), 1);
        assert_eq!(p.logs()[0].status, DownloadStatus::Failed);
        assert!(p.logs()[0].error.contains("500"));
        assert!(!dir.join("data.csv").exists());
    }

    #[test]
    fn unreachable_server_logs_failure() {
        let dir = temp_dir("unreachable");
        let mut p = panel("http://127.0.0.1:1/v1/transactions/csvExport".to_string(), &dir);
        p.start_download().unwrap();
        wait_for_logs(&mut p, 1);
        assert_eq!(p.logs().len(), 1);
        assert_eq!(p.logs()[0].status, DownloadStatus::Failed);
    }

    #[test]
    fn cancelled_download_is_never_a_success() {
        let server = CannedServer::start(
            CannedResponse::ok("index,profit\n").delay(Duration::from_millis(300)),
        );
        let dir = temp_dir("cancel");
        let mut p = panel(server.url("/v1/transactions/csvExport"), &dir);
        p.start_download().unwrap();
        p.cancel();
        assert!(!p.is_busy());
        assert!(p.elapsed_label().is_none());

        wait_for_logs(&mut p, 1);
        assert_eq!(p.logs().len(), 1);
        assert_eq!(p.logs()[0].status, DownloadStatus::Failed);
        assert!(p.logs()[0].error.contains("aborted"));
        assert!(!dir.join("data.csv").exists());
    }

    #[test]
    fn starting_while_busy_is_ignored() {
        let server = CannedServer::start(CannedResponse::ok("x").delay(Duration::from_millis(200)));
        let dir = temp_dir("busy");
        let mut p = panel(server.url("/csv"), &dir);
        p.start_download().unwrap();
        p.start_download().unwrap();
        wait_for_logs(&mut p, 1);
        thread::sleep(Duration::from_millis(300));
        p.poll();
        assert_eq!(p.logs().len(), 1);
        assert_eq!(server.hits(), 1);
    }
}
