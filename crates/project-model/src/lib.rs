//! Podreel Project Model
//!
//! Defines the core data contracts for Podreel renders:
//! - **Segments:** Speech turns, inserted video excerpts, and section cards
//! - **Layout:** Fixed canvas geometry per output format
//! - **Project:** The render project file tying segments to shared assets
//! - **Timeline:** Segments annotated with resolved start and duration
//!
//! All times are seconds as `f64`. Project files may spell them as
//! `HH:MM:SS(.mmm)` strings; they are normalized on load.

pub mod layout;
pub mod project;
pub mod segment;
pub mod timeline;

pub use layout::*;
pub use project::*;
pub use segment::*;
pub use timeline::*;
