//! Podreel Captions
//!
//! Everything textual that ends up in or next to the video:
//! - **Wrapping:** Reflow subtitle and callout text to the layout width
//! - **Callouts:** Typewriter or static ASS cue tracks for the top label
//! - **Subtitles:** SRT/VTT export aligned with the rendered timeline

pub mod callout;
pub mod subtitles;
pub mod wrap;

pub use callout::*;
pub use subtitles::*;
pub use wrap::*;
