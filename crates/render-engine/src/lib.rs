//! Podreel Render Engine
//!
//! Turns a resolved timeline into a finished video by driving ffmpeg:
//! one intermediate clip per segment and gap, one concatenation, an optional
//! background-music mix, and a final distribution encode.
//!
//! # Pipeline Architecture
//!
//! ```text
//! segments ── TimelineBuilder ── sorted entries
//!                                    │
//!   intro ─┐                         ▼
//!          ├── speech / insert / section clips + gap fillers (RenderState fold)
//!          │                         │
//!          └─────────────────────────┤
//!                                    ▼
//!                         chunked concat (≤ N inputs per pass)
//!                                    │
//!                         BGM mix (never retimes)
//!                                    │
//!                         final encode (H.264 / AAC, +faststart)
//!                                    │
//!                                    ▼
//!                           title.mp4 + title.srt
//! ```
//!
//! Every ffmpeg call goes through the [`ffmpeg::Transcoder`] trait, so the
//! whole pipeline can run against an in-process fake.

pub mod clips;
pub mod compositor;
pub mod concat;
pub mod context;
pub mod engine;
pub mod ffmpeg;
pub mod filler;
pub mod graph;
pub mod mixdown;
pub mod progress;
pub mod scratch;
pub mod speech;

pub use engine::{render_project, sanitize_output_name, RenderEngine, RenderOutcome, RenderRequest};
pub use ffmpeg::{FfmpegCli, FfmpegInvocation, InputSource, InputSpec, MediaProbe, Transcoder};
pub use progress::{CancelToken, ProgressCallback, ProgressReporter, RenderPhase};
