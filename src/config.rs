use clap::Parser;
use derive_setters::Setters;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::SVError;
use crate::pagination::{DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS};

/// sv - browse sessions, assignments and recordings of a student
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base url of the student API
    #[arg(long, env = "SV_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Token sent as `userKey` header with every request
    #[arg(long, env = "SV_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long, default_value_t = 8)]
    pub student_id: u64,

    #[arg(long, default_value_t = 31)]
    pub track_id: u64,

    /// Where downloaded files are saved
    #[arg(long, default_value = "~/Downloads")]
    pub download_dir: String,

    /// Rows per page (5, 10 or 25)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    #[arg(long, default_value = "sv.log")]
    pub log_file: String,

    /// Terminal event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,
}

/// Everything the running application is configured with. Built once at
/// start-up and handed to the API client, the transfer coordinator and the model.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct SVConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub student_id: u64,
    pub track_id: u64,
    pub download_dir: PathBuf,
    pub page_size: usize,
    pub request_timeout: Duration,
    pub log_file: PathBuf,
    pub event_poll_time: u64,
}

impl Default for SVConfig {
    fn default() -> Self {
        SVConfig {
            api_url: "http://localhost:8000".to_string(),
            auth_token: None,
            student_id: 8,
            track_id: 31,
            download_dir: PathBuf::from("."),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            log_file: PathBuf::from("sv.log"),
            event_poll_time: 100,
        }
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, SVError> {
    shellexpand::full(raw)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| SVError::InvalidConfig(format!("cannot expand {raw}: {e}")))
}

impl TryFrom<Cli> for SVConfig {
    type Error = SVError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if !PAGE_SIZE_OPTIONS.contains(&cli.page_size) {
            return Err(SVError::InvalidConfig(format!(
                "page size must be one of {:?}, got {}",
                PAGE_SIZE_OPTIONS, cli.page_size
            )));
        }
        Ok(SVConfig {
            api_url: cli.api_url,
            auth_token: cli.auth_token.filter(|t| !t.is_empty()),
            student_id: cli.student_id,
            track_id: cli.track_id,
            download_dir: expand_path(&cli.download_dir)?,
            page_size: cli.page_size,
            request_timeout: Duration::from_secs(cli.timeout),
            log_file: expand_path(&cli.log_file)?,
            event_poll_time: cli.poll_ms,
        })
    }
}
