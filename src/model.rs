use chrono::{DateTime, NaiveDate};
use ratatui::crossterm::event::KeyEvent;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, trace};

use crate::api::{Backend, FileService, file_name};
use crate::config::{SVConfig, expand_path};
use crate::domain::{CMDMode, FetchEvent, HELP_TEXT, Message, SVError};
use crate::inputter::{InputResult, Inputter};
use crate::payload::{Certificate, Profile, ProfileUpdate, Progress};
use crate::projector;
use crate::record::{
    AssignmentRow, Attachment, FieldDescriptor, FieldKind, Record, RecordingRow, ScheduleRow,
};
use crate::sort::{self, Direction};
use crate::transfer::{TransferCoordinator, TransferEvent, TransferState};
use crate::view::{ViewEvent, ViewOrchestrator};

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Schedule,
    Assignments,
    Recordings,
    Certificates,
    Profile,
}

pub const TABS: [Tab; 5] = [
    Tab::Schedule,
    Tab::Assignments,
    Tab::Recordings,
    Tab::Certificates,
    Tab::Profile,
];

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Schedule => "Schedule",
            Tab::Assignments => "Assignments",
            Tab::Recordings => "Recordings",
            Tab::Certificates => "Certificates",
            Tab::Profile => "Profile",
        }
    }

    pub fn index(&self) -> usize {
        TABS.iter().position(|t| t == self).unwrap_or(0)
    }

    fn cycle(&self, forward: bool) -> Tab {
        let n = TABS.len();
        let idx = self.index();
        TABS[if forward { (idx + 1) % n } else { (idx + n - 1) % n }]
    }
}

/// Selected cell, the row is relative to the current page.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Cursor {
    row: usize,
    column: usize,
}

/// A table ready for rendering, every cell already formatted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub footer: String,
}

pub struct UIData {
    pub tab: Tab,
    pub table: Option<TableData>,
    pub profile: Vec<(String, String)>,
    pub loading: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            tab: Tab::Schedule,
            table: None,
            profile: Vec::new(),
            loading: false,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model<B: Backend> {
    config: SVConfig,
    backend: Arc<B>,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    tab: Tab,
    cursors: [Cursor; TABS.len()],
    schedule: ViewOrchestrator<ScheduleRow>,
    assignments: ViewOrchestrator<AssignmentRow>,
    recordings: ViewOrchestrator<RecordingRow>,
    certificates: Vec<Certificate>,
    profile: Option<Profile>,
    progress: Option<Progress>,
    assignment_transfers: TransferCoordinator<B>,
    recording_transfers: TransferCoordinator<B>,
    certificate_transfers: TransferCoordinator<B>,
    fetch_tx: UnboundedSender<FetchEvent>,
    fetch_rx: UnboundedReceiver<FetchEvent>,
    pending_fetches: usize,
    ui_width: usize,
    ui_height: usize,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    upload_row: Option<String>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl<B: Backend> Model<B> {
    pub fn init(config: &SVConfig, backend: Arc<B>, ui_width: usize, ui_height: usize) -> Result<Self, SVError> {
        let (fetch_tx, fetch_rx) = unbounded_channel();
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            tab: Tab::Schedule,
            cursors: [Cursor::default(); TABS.len()],
            schedule: ViewOrchestrator::new("schedule", config.page_size),
            assignments: ViewOrchestrator::new("assignments", config.page_size),
            recordings: ViewOrchestrator::new("recordings", config.page_size),
            certificates: Vec::new(),
            profile: None,
            progress: None,
            assignment_transfers: TransferCoordinator::new(Arc::clone(&backend), config),
            recording_transfers: TransferCoordinator::new(Arc::clone(&backend), config),
            certificate_transfers: TransferCoordinator::new(Arc::clone(&backend), config),
            backend,
            fetch_tx,
            fetch_rx,
            pending_fetches: 0,
            ui_width,
            ui_height,
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            upload_row: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started sv!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_uidata();
        Ok(model)
    }

    /// Requests everything the dashboard shows. Results arrive through `tick`.
    pub fn start(&mut self) {
        let (student_id, track_id) = (self.config.student_id, self.config.track_id);
        info!("Loading data for student {} on track {}", student_id, track_id);
        self.status = Status::LOADING;
        // Results of a batch still in flight count down the same counter
        self.pending_fetches += FETCHES_PER_LOAD;

        let backend = Arc::clone(&self.backend);
        self.spawn_fetch(async move { FetchEvent::Sessions(backend.fetch_sessions(student_id, track_id).await) });
        let backend = Arc::clone(&self.backend);
        self.spawn_fetch(async move { FetchEvent::Profile(backend.get_profile(student_id).await) });
        let backend = Arc::clone(&self.backend);
        self.spawn_fetch(async move { FetchEvent::Certificates(backend.certificates(student_id, track_id).await) });
        let backend = Arc::clone(&self.backend);
        self.spawn_fetch(async move { FetchEvent::Progress(backend.progress(student_id, track_id).await) });

        self.set_status_message("Loading ...");
        self.update_uidata();
    }

    fn refresh(&mut self) {
        if self.status == Status::LOADING {
            self.set_status_message("Still loading ...");
            return;
        }
        self.start();
    }

    fn spawn_fetch<F>(&self, request: F)
    where
        F: Future<Output = FetchEvent> + Send + 'static,
    {
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
    }

    /// Folds finished requests and transfers into the model.
    pub fn tick(&mut self) {
        let mut changed = false;
        while let Ok(event) = self.fetch_rx.try_recv() {
            self.apply_fetch(event);
            changed = true;
        }
        for event in self.assignment_transfers.poll() {
            self.apply_transfer(Tab::Assignments, event);
            changed = true;
        }
        for event in self.recording_transfers.poll() {
            self.apply_transfer(Tab::Recordings, event);
            changed = true;
        }
        for event in self.certificate_transfers.poll() {
            self.apply_transfer(Tab::Certificates, event);
            changed = true;
        }
        if changed {
            self.clamp_cursor();
            self.update_uidata();
        }
    }

    fn apply_fetch(&mut self, event: FetchEvent) {
        trace!("Fetch finished: {:?}", event);
        match event {
            FetchEvent::Sessions(Ok(levels)) => {
                let levels = levels.as_deref();
                self.schedule.handle(ViewEvent::ReplaceRows(projector::schedule(levels)));
                self.assignments.handle(ViewEvent::ReplaceRows(projector::assignments(levels)));
                self.recordings.handle(ViewEvent::ReplaceRows(projector::recordings(levels)));
                info!("Loaded {} sessions", self.schedule.rows().len());
            }
            FetchEvent::Sessions(Err(e)) => self.fetch_failed("sessions", &e),
            FetchEvent::Profile(Ok(profile)) => self.profile = profile,
            FetchEvent::Profile(Err(e)) => self.fetch_failed("profile", &e),
            FetchEvent::Certificates(Ok(certificates)) => self.certificates = certificates,
            FetchEvent::Certificates(Err(e)) => self.fetch_failed("certificates", &e),
            FetchEvent::Progress(Ok(progress)) => self.progress = Some(progress),
            FetchEvent::Progress(Err(e)) => self.fetch_failed("progress", &e),
            FetchEvent::ProfileSaved(Ok(profile)) => {
                self.profile = profile;
                self.set_status_message("Profile updated successfully");
                return;
            }
            FetchEvent::ProfileSaved(Err(e)) => {
                error!("Saving profile failed: {}", e);
                self.set_status_message(format!("Failed to update profile: {e}"));
                return;
            }
        }

        self.pending_fetches = self.pending_fetches.saturating_sub(1);
        if self.pending_fetches == 0 && self.status == Status::LOADING {
            self.status = Status::READY;
            if !self.status_message.starts_with("Failed") {
                self.set_status_message("Loaded");
            }
        }
    }

    fn fetch_failed(&mut self, what: &str, e: &impl std::fmt::Display) {
        error!("Loading {} failed: {}", what, e);
        self.set_status_message(format!("Failed to load {what}: {e}"));
    }

    fn apply_transfer(&mut self, tab: Tab, event: TransferEvent) {
        let message = match event {
            TransferEvent::Downloaded { result: Ok(path), .. } => {
                format!("Saved to {}", path.display())
            }
            TransferEvent::Downloaded { result: Err(e), .. } => format!("Download failed: {e}"),
            TransferEvent::Uploaded { row_id, result: Ok(path) } => {
                if tab == Tab::Assignments {
                    self.assignments.apply_upload(&row_id, &path);
                }
                "Assignment uploaded successfully".to_string()
            }
            TransferEvent::Uploaded { result: Err(e), .. } => format!("Upload failed: {e}"),
        };
        self.set_status_message(message);
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
        self.uidata.last_update = Instant::now();
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.ui_width, width, self.ui_height, height
        );
        self.ui_width = width;
        self.ui_height = height;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), SVError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::NextTab => self.tab = self.tab.cycle(true),
                    Message::PreviousTab => self.tab = self.tab.cycle(false),
                    Message::NextPage => self.page_event(PageMove::Next),
                    Message::PreviousPage => self.page_event(PageMove::Previous),
                    Message::LargerPages => self.page_event(PageMove::Larger),
                    Message::SmallerPages => self.page_event(PageMove::Smaller),
                    Message::Sort => self.sort_current_column(),
                    Message::Filter => self.begin_filter(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Download | Message::Enter => self.download_selected(),
                    Message::Upload => self.begin_upload(),
                    Message::EditName => self.begin_profile_edit(CMDMode::EditName),
                    Message::EditBirthDate => self.begin_profile_edit(CMDMode::EditBirthDate),
                    Message::EditImage => self.begin_profile_edit(CMDMode::EditImage),
                    Message::Refresh => self.refresh(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        self.clamp_cursor();
        self.update_uidata();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(prefill);
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let mode = self.cmd_mode.take();
        let upload_row = self.upload_row.take();
        if self.last_input.canceled {
            debug!("Input for {:?} canceled", mode);
            return;
        }

        let cmd_input = self.last_input.input.trim().to_string();
        match mode {
            Some(CMDMode::Filter) => self.apply_filter(&cmd_input),
            Some(CMDMode::Upload) => {
                if let Some(row_id) = upload_row {
                    self.upload(&row_id, &cmd_input);
                }
            }
            Some(CMDMode::EditName) => self.save_name(cmd_input),
            Some(CMDMode::EditBirthDate) => self.save_birth_date(cmd_input),
            Some(CMDMode::EditImage) => self.save_image(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
    }

    fn page_event(&mut self, page_move: PageMove) {
        let moved = match self.tab {
            Tab::Schedule => page_move.apply(&mut self.schedule),
            Tab::Assignments => page_move.apply(&mut self.assignments),
            Tab::Recordings => page_move.apply(&mut self.recordings),
            Tab::Certificates | Tab::Profile => false,
        };
        if moved {
            self.cursor_mut().row = 0;
        }
    }

    fn sort_current_column(&mut self) {
        let column = self.cursor().column;
        let message = match self.tab {
            Tab::Schedule => toggle_sort(&mut self.schedule, column),
            Tab::Assignments => toggle_sort(&mut self.assignments, column),
            Tab::Recordings => toggle_sort(&mut self.recordings, column),
            Tab::Certificates | Tab::Profile => None,
        };
        if let Some(message) = message {
            self.set_status_message(message);
        }
    }

    fn begin_filter(&mut self) {
        let column = self.cursor().column;
        let prompt = match self.tab {
            Tab::Schedule => filter_prompt(&self.schedule, column),
            Tab::Assignments => filter_prompt(&self.assignments, column),
            Tab::Recordings => filter_prompt(&self.recordings, column),
            Tab::Certificates | Tab::Profile => return,
        };
        match prompt {
            Ok((prefill, options)) => {
                self.set_status_message(options);
                self.enter_cmd_mode(CMDMode::Filter, &prefill);
            }
            Err(message) => self.set_status_message(message),
        }
    }

    fn apply_filter(&mut self, input: &str) {
        let column = self.cursor().column;
        let values: Vec<String> = input
            .split(FILTER_SEPARATOR)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        let message = match self.tab {
            Tab::Schedule => set_filter(&mut self.schedule, column, values),
            Tab::Assignments => set_filter(&mut self.assignments, column, values),
            Tab::Recordings => set_filter(&mut self.recordings, column, values),
            Tab::Certificates | Tab::Profile => return,
        };
        self.cursor_mut().row = 0;
        self.set_status_message(message);
    }

    fn clear_filters(&mut self) {
        let cleared = match self.tab {
            Tab::Schedule => self.schedule.handle(ViewEvent::ClearFilters),
            Tab::Assignments => self.assignments.handle(ViewEvent::ClearFilters),
            Tab::Recordings => self.recordings.handle(ViewEvent::ClearFilters),
            Tab::Certificates | Tab::Profile => false,
        };
        if cleared {
            self.set_status_message("Filters cleared");
        }
    }

    fn download_selected(&mut self) {
        let row = self.cursor().row;
        let (target, transfers) = match self.tab {
            Tab::Assignments => (selected_file(&self.assignments, row), &mut self.assignment_transfers),
            Tab::Recordings => (selected_file(&self.recordings, row), &mut self.recording_transfers),
            Tab::Certificates => (
                self.certificates.get(row).map(|c| {
                    (certificate_key(c), c.attachment.clone().unwrap_or_default())
                }),
                &mut self.certificate_transfers,
            ),
            Tab::Schedule | Tab::Profile => return,
        };
        let Some((row_id, file_ref)) = target else {
            return;
        };
        let message = match transfers.download(&row_id, &file_ref) {
            Ok(true) => format!("Downloading {} ...", file_name(&file_ref, "file")),
            Ok(false) => "Nothing to download for this row".to_string(),
            Err(e) => e.to_string(),
        };
        self.set_status_message(message);
    }

    fn begin_upload(&mut self) {
        if self.tab != Tab::Assignments {
            self.set_status_message("Files can only be uploaded for assignments");
            return;
        }
        let Some(row) = self.assignments.visible().rows.get(self.cursor().row).map(|r| r.id().to_string()) else {
            return;
        };
        self.upload_row = Some(row);
        self.enter_cmd_mode(CMDMode::Upload, "");
    }

    fn upload(&mut self, row_id: &str, raw_path: &str) {
        if raw_path.is_empty() {
            self.set_status_message("Please select a file first");
            return;
        }
        let path = match expand_path(raw_path) {
            Ok(path) => path,
            Err(e) => {
                self.set_status_message(e.to_string());
                return;
            }
        };
        let message = match self.assignment_transfers.upload_path(row_id, path) {
            Ok(_) => format!("Uploading {} ...", file_name(raw_path, raw_path)),
            Err(e) => e.to_string(),
        };
        self.set_status_message(message);
    }

    fn begin_profile_edit(&mut self, mode: CMDMode) {
        if self.tab != Tab::Profile {
            return;
        }
        let current = self
            .profile
            .as_ref()
            .map(|p| match mode {
                CMDMode::EditBirthDate => p.birth_date.clone().unwrap_or_default(),
                CMDMode::EditName => p.name.clone(),
                _ => String::new(),
            })
            .unwrap_or_default();
        self.enter_cmd_mode(mode, &current);
    }

    fn save_name(&mut self, name: String) {
        if name.is_empty() {
            self.set_status_message("Name cannot be empty");
            return;
        }
        self.save_profile(ProfileUpdate {
            name: Some(name),
            ..Default::default()
        });
    }

    fn save_birth_date(&mut self, birth_date: String) {
        if NaiveDate::parse_from_str(&birth_date, "%Y-%m-%d").is_err() {
            self.set_status_message(format!("Not a date: {birth_date}"));
            return;
        }
        self.save_profile(ProfileUpdate {
            birth_date: Some(birth_date),
            ..Default::default()
        });
    }

    fn save_image(&mut self, raw_path: &str) {
        if raw_path.is_empty() {
            self.set_status_message("Please select a file first");
            return;
        }
        match expand_path(raw_path) {
            Ok(path) => self.save_profile(ProfileUpdate {
                image: Some(path),
                ..Default::default()
            }),
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn save_profile(&mut self, update: ProfileUpdate) {
        let student_id = self.config.student_id;
        let backend = Arc::clone(&self.backend);
        debug!("Saving profile {:?}", update);
        self.spawn_fetch(async move { FetchEvent::ProfileSaved(backend.update_profile(student_id, update).await) });
        self.set_status_message("Saving profile ...");
    }

    // ------------------------------ Selection ------------------------------ //

    fn cursor(&self) -> Cursor {
        self.cursors[self.tab.index()]
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursors[self.tab.index()]
    }

    /// Rows on the current page and columns of the current tab.
    fn table_shape(&self) -> (usize, usize) {
        match self.tab {
            Tab::Schedule => (self.schedule.visible().rows.len(), ScheduleRow::fields().len()),
            Tab::Assignments => (self.assignments.visible().rows.len(), AssignmentRow::fields().len()),
            Tab::Recordings => (self.recordings.visible().rows.len(), RecordingRow::fields().len()),
            Tab::Certificates => (self.certificates.len(), CERTIFICATE_HEADERS.len()),
            Tab::Profile => (0, 0),
        }
    }

    fn clamp_cursor(&mut self) {
        let (rows, columns) = self.table_shape();
        let cursor = self.cursor_mut();
        cursor.row = cursor.row.min(rows.saturating_sub(1));
        cursor.column = cursor.column.min(columns.saturating_sub(1));
    }

    fn move_selection_up(&mut self) {
        let cursor = self.cursor_mut();
        cursor.row = cursor.row.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        let (rows, _) = self.table_shape();
        let cursor = self.cursor_mut();
        if cursor.row + 1 < rows {
            cursor.row += 1;
        }
    }

    fn move_selection_left(&mut self) {
        let cursor = self.cursor_mut();
        cursor.column = cursor.column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        let (_, columns) = self.table_shape();
        let cursor = self.cursor_mut();
        if cursor.column + 1 < columns {
            cursor.column += 1;
        }
    }

    // ------------------------------ Rendering ------------------------------ //

    fn update_uidata(&mut self) {
        let cursor = self.cursor();
        let table = match self.tab {
            Tab::Schedule => {
                let mut table = table_data(&self.schedule, cursor, None::<&TransferCoordinator<B>>);
                let taken = self.schedule.rows().iter().filter(|r| r.is_taken()).count();
                table.footer.push_str(&format!("  {} of {} sessions taken", taken, self.schedule.rows().len()));
                Some(table)
            }
            Tab::Assignments => Some(table_data(&self.assignments, cursor, Some(&self.assignment_transfers))),
            Tab::Recordings => Some(table_data(&self.recordings, cursor, Some(&self.recording_transfers))),
            Tab::Certificates => Some(self.certificate_table(cursor)),
            Tab::Profile => None,
        };

        self.uidata = UIData {
            tab: self.tab,
            table,
            profile: self.profile_lines(),
            loading: self.status == Status::LOADING,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            last_update: Instant::now(),
        };
    }

    fn certificate_table(&self, cursor: Cursor) -> TableData {
        let rows = self
            .certificates
            .iter()
            .map(|c| {
                let state = self.certificate_transfers.state(&certificate_key(c));
                vec![
                    format!("Certificate #{}", c.id),
                    file_cell(c.attachment.as_deref().filter(|a| !a.is_empty()), "No Attachment", state),
                ]
            })
            .collect::<Vec<_>>();
        TableData {
            headers: CERTIFICATE_HEADERS.iter().map(|h| h.to_string()).collect(),
            footer: format!("{} certificates", rows.len()),
            rows,
            selected_row: cursor.row,
            selected_column: cursor.column,
        }
    }

    fn profile_lines(&self) -> Vec<(String, String)> {
        let mut lines = Vec::new();
        match &self.profile {
            Some(profile) => {
                lines.push(("Name".to_string(), profile.name.clone()));
                lines.push((
                    "Birth date".to_string(),
                    profile.birth_date.clone().unwrap_or_else(|| "-".to_string()),
                ));
                if let Some(image) = &profile.image {
                    lines.push(("Image".to_string(), image.clone()));
                }
            }
            None => lines.push(("Profile".to_string(), "Not loaded".to_string())),
        }
        if let Some(progress) = &self.progress {
            lines.push((
                "Progress".to_string(),
                format!("{:.0}%", progress.progress_percentage),
            ));
            if let Some(student) = &progress.student {
                lines.push(("Points".to_string(), student.points.to_string()));
                for round in &student.rounds {
                    lines.push(("Round".to_string(), format!("{} ({} {})", round.name, round.day, round.time)));
                }
            }
        }
        lines
    }
}

const CERTIFICATE_HEADERS: [&str; 2] = ["Certificate", "Attachment"];
const FETCHES_PER_LOAD: usize = 4;
/// Separates filter values on the command line. Course and level names may contain commas.
const FILTER_SEPARATOR: char = '|';

fn certificate_key(certificate: &Certificate) -> String {
    format!("cert-{}", certificate.id)
}

#[derive(Debug, Clone, Copy)]
enum PageMove {
    Next,
    Previous,
    Larger,
    Smaller,
}

impl PageMove {
    fn apply<R: Record>(self, view: &mut ViewOrchestrator<R>) -> bool {
        let event = match self {
            PageMove::Next => ViewEvent::NextPage,
            PageMove::Previous => ViewEvent::PreviousPage,
            PageMove::Larger => ViewEvent::CyclePageSize { forward: true },
            PageMove::Smaller => ViewEvent::CyclePageSize { forward: false },
        };
        view.handle(event)
    }
}

fn toggle_sort<R: Record>(view: &mut ViewOrchestrator<R>, column: usize) -> Option<String> {
    let descriptor = R::fields().get(column)?;
    if !view.handle(ViewEvent::ToggleSort(descriptor.field)) {
        return Some(format!("{} cannot be sorted", descriptor.label));
    }
    let direction = match view.sort_config().direction {
        Direction::Asc => "ascending",
        Direction::Desc => "descending",
    };
    Some(format!("Sorted by {} ({})", descriptor.label, direction))
}

/// Current selection and the available values of a filterable column.
fn filter_prompt<R: Record>(view: &ViewOrchestrator<R>, column: usize) -> Result<(String, String), String> {
    let Some(descriptor) = R::fields().get(column) else {
        return Err(String::new());
    };
    if !descriptor.filterable {
        return Err(format!("{} cannot be filtered", descriptor.label));
    }
    let prefill = view
        .filters()
        .selected(descriptor.field)
        .map(|values| values.iter().cloned().collect::<Vec<_>>().join(" | "))
        .unwrap_or_default();
    let options = format!(
        "{}: {}",
        descriptor.label,
        view.options_for(descriptor.field).join(" | ")
    );
    Ok((prefill, options))
}

fn set_filter<R: Record>(view: &mut ViewOrchestrator<R>, column: usize, values: Vec<String>) -> String {
    let Some(descriptor) = R::fields().get(column) else {
        return String::new();
    };
    if !view.handle(ViewEvent::SetFilter(descriptor.field, values)) {
        return format!("{} cannot be filtered", descriptor.label);
    }
    format!("{} of {} rows shown", view.total(), view.rows().len())
}

fn selected_file<R: Attachment>(view: &ViewOrchestrator<R>, row: usize) -> Option<(String, String)> {
    view.visible()
        .rows
        .get(row)
        .map(|r| (r.id().to_string(), r.file_ref().to_string()))
}

fn table_data<R: Record, S: FileService>(
    view: &ViewOrchestrator<R>,
    cursor: Cursor,
    transfers: Option<&TransferCoordinator<S>>,
) -> TableData {
    let slice = view.visible();
    let sort = view.sort_config();
    let headers = R::fields()
        .iter()
        .map(|d| {
            let mut label = d.label.to_string();
            if d.field == sort.field {
                label.push_str(match sort.direction {
                    Direction::Asc => " ▲",
                    Direction::Desc => " ▼",
                });
            }
            if view.filters().selected(d.field).is_some() {
                label.push_str(" *");
            }
            label
        })
        .collect();
    let rows = slice
        .rows
        .iter()
        .map(|row| {
            let state = transfers.and_then(|t| t.state(row.id()));
            R::fields().iter().map(|d| cell(*row, d, state)).collect()
        })
        .collect();
    let mut footer = format!(
        "Page {}/{}  {} rows  {} per page",
        slice.page.index() + 1,
        slice.page_count.max(1),
        slice.total,
        slice.page.size()
    );
    if view.filters().is_active() {
        footer.push_str(&format!("  (filtered from {})", view.rows().len()));
    }
    TableData {
        headers,
        rows,
        selected_row: cursor.row,
        selected_column: cursor.column,
        footer,
    }
}

fn cell<R: Record>(row: &R, descriptor: &FieldDescriptor<R::Field>, state: Option<&TransferState>) -> String {
    let value = row.value(descriptor.field).filter(|v| !v.is_empty());
    match descriptor.kind {
        FieldKind::DateTime => value.map(display_date).unwrap_or_default(),
        FieldKind::FileRef => file_cell(value, descriptor.placeholder, state),
        FieldKind::Text | FieldKind::NullableText => value.unwrap_or(descriptor.placeholder).to_string(),
    }
}

/// A file reference, replaced by the transfer status while one is running or failed.
fn file_cell(value: Option<&str>, placeholder: &str, state: Option<&TransferState>) -> String {
    if let Some(state) = state {
        if state.uploading {
            return "Uploading...".to_string();
        }
        if state.downloading {
            return "Downloading...".to_string();
        }
        if let Some(e) = &state.upload_error {
            return format!("Upload failed: {e}");
        }
        if let Some(e) = &state.download_error {
            return format!("Download failed: {e}");
        }
    }
    match value {
        Some(path) => file_name(path, path),
        None => placeholder.to_string(),
    }
}

fn display_date(raw: &str) -> String {
    match sort::parse_epoch_millis(raw) {
        0 => raw.to_string(),
        millis => DateTime::from_timestamp_millis(millis)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}
