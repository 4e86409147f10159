//! Faultline Core Library
//!
//! Captures host errors, exception chains and browser errors as
//! Sentry-compatible events, delivers them to the store API and keeps
//! undeliverable events in a file-backed retry queue.

pub mod client;
pub mod config;
pub mod context;
pub mod dsn;
pub mod error;
pub mod event;
pub mod format;
pub mod frames;
pub mod inventory;
pub mod panic;
pub mod queue;
pub mod reporter;

// Re-export commonly used items at crate root
pub use client::{DeliveryClient, auth_header};
pub use config::Settings;
pub use context::{AppInfo, BrowserInfo, CaptureContext, RequestInfo, RuntimeInfo, UserInfo};
pub use dsn::Dsn;
pub use error::{FaultlineError, Result};
pub use event::{
    CapturedException, Event, EventPatch, ExceptionRecord, Level, NativeErrorKind, RawError,
    Throwable,
};
pub use format::{format_duration, format_failure_notice};
pub use frames::{Frame, NativeFrame, frames_from_native, parse_javascript_stack};
pub use inventory::ModuleInventory;
pub use panic::install_panic_hook;
pub use queue::{PendingQueue, get_root_queue_dir};
pub use reporter::{BrowserReport, CaptureOutcome, Reporter, RetrySummary};
