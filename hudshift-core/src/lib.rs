//! Render planner and pipeline orchestrator for portrait gameplay renders.
//!
//! This crate turns an edit description (trim, speed, HUD layout, music,
//! caption, intro still, quality level) into an ordered ffmpeg pipeline and
//! runs it: a single-pass core encode, an optional intro still, and a
//! stream-copy concat. Planning validates everything up front; execution
//! reports monotonic progress, falls back from a failing hardware encoder to
//! the next one in the chain, honours cancellation and never leaves partial
//! output behind.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use hudshift_core::{CancelToken, CoreConfig, EditSpec, LoggingObserver, render_job};
//! use hudshift_core::external::{FfprobeCli, SidecarSpawner, StdFsMetadataProvider};
//!
//! let config = CoreConfig::default();
//! let job = std::fs::read_to_string("job.json").unwrap();
//! let spec: EditSpec = serde_json::from_str(&job).unwrap();
//!
//! let result = render_job(
//!     &config,
//!     &SidecarSpawner::new(&config.ffmpeg_path),
//!     &FfprobeCli::new(&config.ffprobe_path),
//!     &StdFsMetadataProvider,
//!     &spec,
//!     &LoggingObserver::new(),
//!     &CancelToken::new(),
//! );
//! println!("{}", serde_json::to_string_pretty(&result).unwrap());
//! ```

pub mod cancel;
pub mod config;
pub mod edit;
pub mod error;
pub mod external;
pub mod layout;
pub mod notifications;
pub mod progress_reporting;
pub mod render;
pub mod temp_files;
pub mod utils;

// Re-exports for public API
pub use cancel::CancelToken;
pub use config::{CoreConfig, CoreConfigBuilder};
pub use edit::{EditSpec, HardwareEncoder, IntroStill, IntroTime, MusicTrack, OutputFormat};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use layout::{HudElement, HudLayout, HudSelection, HudTag, LayoutStore};
pub use notifications::{Notification, NotificationSender, NotifyingObserver, NtfySender};
pub use progress_reporting::{
    LoggingObserver, NullObserver, ObserverSet, RecordingObserver, RenderObserver,
};
pub use render::{
    PipelineExecutor, PipelinePlanner, RenderFailure, RenderPlan, RenderResult, RenderSuccess,
    StageKind, render_job,
};
pub use temp_files::{TempFileScope, sweep_stale};
pub use utils::{format_bytes, format_duration, parse_ffmpeg_time};
