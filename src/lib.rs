//! Visual-regression gallery for control-systems plots.
//!
//! Each scenario draws one figure; a run collects them into a single
//! revision-tagged HTML document (or drops them in test mode).

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod figure;
pub mod gallery;
pub mod render;
pub mod revision;
pub mod scenario;
pub mod scope;
pub mod sink;
pub mod toolkit;

pub use error::GalleryError;
pub use figure::Figure;
pub use scenario::{RenderPath, RunReport, ScenarioRecord, ScenarioRunner};
pub use scope::{FigureScope, with_figure};
pub use sink::{ArtifactSink, OutputMode};
