//! Podreel Processing Core: timeline planning
//!
//! Decides everything about a render that does not need the transcoder:
//! - **Atempo:** Decompose a playback speed into bounded retiming steps
//! - **Speed Plan:** Choose the one stage that applies the speed change
//! - **Timeline Builder:** Resolve every segment's start and duration
//! - **Zoom:** Carry zoom, speaker, and background continuity between clips
//!
//! This crate is pure computation. Audio durations come in through the
//! [`timeline_builder::DurationSource`] trait; nothing here touches files.

pub mod atempo;
pub mod speed_plan;
pub mod timeline_builder;
pub mod zoom;

pub use atempo::AtempoChain;
pub use speed_plan::{SpeedPlan, Stage};
pub use timeline_builder::{DurationSource, TimelineBuilder, TimelineConfig};
pub use zoom::{RenderState, ZoomConfig};
