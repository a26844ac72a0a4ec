//! Central panel state shared between the event loop, renderer, and dispatch
//! workers: the editable configuration fields, the focus model, the
//! newest-first log, and the set of in-flight dispatch jobs.

use std::{
    env, fs,
    io::Write,
    path::PathBuf,
    sync::mpsc::TryRecvError,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::config::AppConfig;
use crate::defaults::Defaults;
use crate::dispatch::{self, CommandRequest, DispatchJob};
use crate::presets::PRESET_KEYS;
use crate::storage::{ConfigStore, PanelConfig, CFG_STORAGE_KEY};
use chrono::Local;

/// Path to the temp log file we rotate between runs.
pub fn log_file_path() -> PathBuf {
    env::temp_dir().join("benqctl_tui.log")
}

/// Write debug messages to a temp file so we can troubleshoot without corrupting the TUI.
pub fn log_debug(msg: &str) {
    use std::fs::OpenOptions;

    let log_path = log_file_path();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
        let _ = writeln!(file, "[{timestamp}] {msg}");
    }
}

/// Remove the log file if it grows past 5 MB between runs.
pub fn init_debug_log_file() {
    let log_path = log_file_path();
    if let Ok(metadata) = fs::metadata(&log_path) {
        const MAX_BYTES: u64 = 5 * 1024 * 1024;
        if metadata.len() > MAX_BYTES {
            let _ = fs::remove_file(&log_path);
        }
    }
}

/// Which panel widget currently owns keystrokes. `Global` is the unfocused
/// state in which whitelisted keys are routed to preset sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Global,
    Ip,
    Port,
    WrapCr,
    Raw,
    Palette,
}

impl Focus {
    pub(crate) fn next(self) -> Self {
        match self {
            Focus::Global | Focus::Palette => Focus::Ip,
            Focus::Ip => Focus::Port,
            Focus::Port => Focus::WrapCr,
            Focus::WrapCr => Focus::Raw,
            Focus::Raw => Focus::Palette,
        }
    }

    pub(crate) fn prev(self) -> Self {
        match self {
            Focus::Global | Focus::Ip => Focus::Palette,
            Focus::Port => Focus::Ip,
            Focus::WrapCr => Focus::Port,
            Focus::Raw => Focus::WrapCr,
            Focus::Palette => Focus::Raw,
        }
    }
}

/// Central application state. Only the UI thread touches it; dispatch
/// workers report back over their job channels.
pub struct App {
    config: AppConfig,
    defaults: Defaults,
    store: Box<dyn ConfigStore>,
    ip_field: String,
    port_field: String,
    wrap_cr: bool,
    raw_field: String,
    focus: Focus,
    palette_index: usize,
    log: Vec<String>,
    scroll_offset: u16,
    jobs: Vec<DispatchJob>,
}

impl App {
    /// Create the panel with empty fields; `load_stored_config` populates
    /// them from the store or the bootstrap defaults.
    pub fn new(config: AppConfig, defaults: Defaults, store: Box<dyn ConfigStore>) -> Self {
        Self {
            config,
            defaults,
            store,
            ip_field: String::new(),
            port_field: String::new(),
            wrap_cr: false,
            raw_field: String::new(),
            focus: Focus::Global,
            palette_index: 0,
            log: Vec::new(),
            scroll_offset: 0,
            jobs: Vec::new(),
        }
    }

    // --- configuration -----------------------------------------------------

    /// Snapshot the panel fields as the configuration sent with every
    /// command. An empty or unparseable port falls back to the default port.
    pub fn current_config(&self) -> PanelConfig {
        let trimmed = self.port_field.trim();
        let port = if trimmed.is_empty() {
            self.defaults.port
        } else {
            trimmed.parse().unwrap_or(self.defaults.port)
        };
        PanelConfig {
            ip: self.ip_field.clone(),
            port,
            wrapcr: self.wrap_cr,
        }
    }

    /// Serialize the current configuration to the store. Durable write, no
    /// network call; the log carries the confirmation (or the failure).
    pub fn save_config(&mut self) {
        let cfg = self.current_config();
        let result = serde_json::to_string(&cfg)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(CFG_STORAGE_KEY, &raw));
        match result {
            Ok(()) => self.append_log("Saved configuration".to_string()),
            Err(err) => {
                log_debug(&format!("save_config failed: {err:#}"));
                self.append_log(format!("Failed to save configuration: {err:#}"));
            }
        }
    }

    /// Populate the fields from the store if a configuration was saved
    /// before, else from the bootstrap defaults. A value that fails to
    /// deserialize is ignored silently and the fields keep their declared
    /// state (wrap_cr stays untouched unless a stored value provides it).
    pub fn load_stored_config(&mut self) {
        match self.store.get(CFG_STORAGE_KEY) {
            Ok(Some(raw)) => {
                if let Ok(stored) = serde_json::from_str::<PanelConfig>(&raw) {
                    self.ip_field = stored.ip;
                    self.port_field = stored.port.to_string();
                    self.wrap_cr = stored.wrapcr;
                }
            }
            Ok(None) => {
                self.ip_field = self.defaults.ip.clone();
                self.port_field = self.defaults.port.to_string();
            }
            Err(err) => {
                log_debug(&format!("load_stored_config failed: {err:#}"));
            }
        }
    }

    // --- dispatch ----------------------------------------------------------

    /// Send a named preset. Logs optimistically before the request leaves;
    /// the worker's outcome lands in the log whenever it completes.
    pub fn send_preset(&mut self, key: &str) {
        let cfg = self.current_config();
        self.append_log(format!("Sending {key}..."));
        self.jobs.push(dispatch::start_dispatch_job(
            self.config.clone(),
            CommandRequest::preset(key),
            cfg,
        ));
    }

    /// Send the raw-command field verbatim. An empty field is a complete
    /// no-op: no log entry, no request.
    pub fn send_raw(&mut self) {
        if self.raw_field.is_empty() {
            return;
        }
        let cmd = self.raw_field.clone();
        let cfg = self.current_config();
        self.append_log(format!("Sending raw: {cmd}"));
        self.jobs.push(dispatch::start_dispatch_job(
            self.config.clone(),
            CommandRequest::raw(cmd),
            cfg,
        ));
    }

    /// Send the preset currently selected in the palette.
    pub fn send_selected_preset(&mut self) {
        let key = PRESET_KEYS[self.palette_index];
        self.send_preset(key);
    }

    /// Check every in-flight job without blocking; completed outcomes are
    /// appended to the log in completion order. Returns whether anything
    /// finished (the UI uses this to trigger a redraw).
    pub fn poll_dispatch_jobs(&mut self) -> bool {
        let mut any_finished = false;
        let mut index = 0;
        while index < self.jobs.len() {
            let received = match self.jobs[index].receiver.try_recv() {
                Ok(outcome) => Some(Some(outcome)),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(None),
            };
            match received {
                Some(outcome) => {
                    // Join the worker once it signals completion to avoid
                    // lingering handles.
                    let mut job = self.jobs.remove(index);
                    if let Some(handle) = job.handle.take() {
                        let _ = handle.join();
                    }
                    match outcome {
                        Some(outcome) => self.append_log(outcome.log_line()),
                        None => self
                            .append_log("Dispatch worker disconnected unexpectedly".to_string()),
                    }
                    any_finished = true;
                }
                None => index += 1,
            }
        }
        any_finished
    }

    pub fn has_active_jobs(&self) -> bool {
        !self.jobs.is_empty()
    }

    // --- log ---------------------------------------------------------------

    /// Prepend a timestamped entry; the newest entry is always index 0 and
    /// the view snaps back to it.
    pub(crate) fn append_log(&mut self, text: String) {
        let now = Local::now().format("%H:%M:%S");
        self.log.insert(0, format!("{now} — {text}"));
        self.scroll_offset = 0;
    }

    /// Diagnostic record of an unhandled global keydown.
    pub(crate) fn log_keydown(&mut self, name: &str) {
        self.append_log(format!("Keydown: {name}"));
    }

    pub fn log_entries(&self) -> &[String] {
        &self.log
    }

    pub(crate) fn get_scroll_offset(&self) -> u16 {
        self.scroll_offset
    }

    pub(crate) fn page_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(10);
    }

    pub(crate) fn page_down(&mut self) {
        let limit = self.log.len().saturating_sub(1).min(u16::MAX as usize) as u16;
        self.scroll_offset = self.scroll_offset.saturating_add(10).min(limit);
    }

    pub(crate) fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub(crate) fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.log.len().saturating_sub(1).min(u16::MAX as usize) as u16;
    }

    // --- focus and field editing -------------------------------------------

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub(crate) fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub(crate) fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    pub(crate) fn clear_focus(&mut self) {
        self.focus = Focus::Global;
    }

    #[cfg(test)]
    pub(crate) fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    /// Append a character to whichever text field has focus.
    pub(crate) fn push_field_char(&mut self, ch: char) {
        match self.focus {
            Focus::Ip => self.ip_field.push(ch),
            Focus::Port => self.port_field.push(ch),
            Focus::Raw => self.raw_field.push(ch),
            Focus::Global | Focus::WrapCr | Focus::Palette => {}
        }
    }

    pub(crate) fn backspace_field(&mut self) {
        match self.focus {
            Focus::Ip => {
                self.ip_field.pop();
            }
            Focus::Port => {
                self.port_field.pop();
            }
            Focus::Raw => {
                self.raw_field.pop();
            }
            Focus::Global | Focus::WrapCr | Focus::Palette => {}
        }
    }

    /// Text of the focused field, for cursor placement. `None` when focus is
    /// not on a text field.
    pub(crate) fn focused_field_text(&self) -> Option<&str> {
        match self.focus {
            Focus::Ip => Some(&self.ip_field),
            Focus::Port => Some(&self.port_field),
            Focus::Raw => Some(&self.raw_field),
            Focus::Global | Focus::WrapCr | Focus::Palette => None,
        }
    }

    pub(crate) fn toggle_wrap_cr(&mut self) {
        self.wrap_cr = !self.wrap_cr;
    }

    pub fn ip_field(&self) -> &str {
        &self.ip_field
    }

    pub fn port_field(&self) -> &str {
        &self.port_field
    }

    pub fn wrap_cr(&self) -> bool {
        self.wrap_cr
    }

    pub fn raw_field(&self) -> &str {
        &self.raw_field
    }

    #[cfg(test)]
    pub(crate) fn set_fields(&mut self, ip: &str, port: &str, wrap_cr: bool) {
        self.ip_field = ip.to_string();
        self.port_field = port.to_string();
        self.wrap_cr = wrap_cr;
    }

    #[cfg(test)]
    pub(crate) fn set_raw_field(&mut self, cmd: &str) {
        self.raw_field = cmd.to_string();
    }

    // --- palette -----------------------------------------------------------

    pub(crate) fn palette_index(&self) -> usize {
        self.palette_index
    }

    pub(crate) fn palette_move_up(&mut self) {
        self.palette_index = self.palette_index.saturating_sub(1);
    }

    pub(crate) fn palette_move_down(&mut self) {
        if self.palette_index + 1 < PRESET_KEYS.len() {
            self.palette_index += 1;
        }
    }
}
