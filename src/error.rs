use std::io;
use std::path::PathBuf;

use crate::revision::RevisionError;
use crate::toolkit::{ToolkitError, Unsupported};

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// No revision descriptor, so no artifact name.
    #[error("cannot name the gallery artifact: {0}")]
    Revision(#[from] RevisionError),

    #[error("failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render figure {figure}: {message}")]
    Render { figure: u32, message: String },

    #[error(transparent)]
    Toolkit(#[from] ToolkitError),

    /// Primary call unavailable and no older calling convention to fall back on.
    #[error("scenario `{scenario}` has no fallback for {source}")]
    NoFallback {
        scenario: String,
        #[source]
        source: Unsupported,
    },

    /// A call made from a fallback path is itself unavailable.
    #[error("unsupported toolkit call: {0}")]
    Unsupported(#[from] Unsupported),

    #[error("scenario `{scenario}` check failed: {message}")]
    Check { scenario: String, message: String },
}

impl GalleryError {
    /// Short category name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Revision(_) => "revision",
            Self::Artifact { .. } => "artifact",
            Self::Render { .. } => "render",
            Self::Toolkit(_) => "toolkit",
            Self::NoFallback { .. } => "no-fallback",
            Self::Unsupported(_) => "unsupported",
            Self::Check { .. } => "check",
        }
    }

    pub(crate) fn artifact(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Artifact {
            path: path.into(),
            source,
        }
    }
}
