pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod presets;
pub mod storage;
pub mod ui;

mod app;

pub use app::*;
pub use dispatch::{ApiReply, CommandRequest, DispatchJob, DispatchOutcome};
