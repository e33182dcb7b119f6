use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::api::ApiError;
use crate::payload::{Certificate, Level, Profile, Progress};

#[derive(Debug, Error)]
pub enum SVError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ApiError(#[from] ApiError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to set up logging: {0}")]
    LoggingFailed(String),
}

/// User intents, mapped from terminal events by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Exit,
    Enter,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextTab,
    PreviousTab,
    NextPage,
    PreviousPage,
    LargerPages,
    SmallerPages,
    Sort,
    Filter,
    ClearFilters,
    Download,
    Upload,
    EditName,
    EditBirthDate,
    EditImage,
    Refresh,
}

/// What the command line input is currently used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Filter,
    Upload,
    EditName,
    EditBirthDate,
    EditImage,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Filter => "Filter (values separated by |, empty clears)",
            CMDMode::Upload => "Upload file",
            CMDMode::EditName => "Name",
            CMDMode::EditBirthDate => "Birth date (YYYY-MM-DD)",
            CMDMode::EditImage => "Image file",
        }
    }
}

/// Results of background requests, delivered to the model over a channel.
#[derive(Debug)]
pub enum FetchEvent {
    Sessions(Result<Option<Vec<Level>>, ApiError>),
    Profile(Result<Option<Profile>, ApiError>),
    ProfileSaved(Result<Option<Profile>, ApiError>),
    Certificates(Result<Vec<Certificate>, ApiError>),
    Progress(Result<Progress, ApiError>),
}

pub const HELP_TEXT: &str = "\
Tab / Shift-Tab   switch between tabs
Up / Down (j/k)   select row
Left / Right      select column
s                 sort by selected column (again to reverse)
f                 filter selected column
c                 clear all filters
n / p             next / previous page
+ / -             larger / smaller pages
d                 download file of selected row
u                 upload file for selected row
e / b / i         edit name / birth date / image (profile tab)
r                 reload data
?                 this help
Esc               close popup / cancel input
q                 quit";
