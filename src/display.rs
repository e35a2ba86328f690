//! Interactive overlay: show each finished figure in an external viewer.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command, Stdio};
use std::thread;

use tracing::{debug, warn};

use crate::figure::Figure;
use crate::render::render_svg;

#[derive(Clone, Debug)]
pub struct Display {
    viewer: String,
    dir: PathBuf,
    size: (u32, u32),
}

impl Display {
    /// `dir` receives one `figure-<n>.svg` per shown figure.
    pub fn new(viewer: impl Into<String>, dir: impl AsRef<Path>, size: (u32, u32)) -> Self {
        Self {
            viewer: viewer.into(),
            dir: dir.as_ref().to_path_buf(),
            size,
        }
    }

    /// Per-process subdirectory of `base`, so concurrent runs never share
    /// SVG files.
    pub fn run_dir(base: &Path) -> PathBuf {
        base.join(format!("plot-gallery-{}", process::id()))
    }

    /// Hand the figure to the viewer without waiting on it. Failures are
    /// logged and swallowed.
    pub fn show(&self, figure: &Figure) {
        if let Err(message) = self.try_show(figure) {
            warn!(figure = figure.number(), viewer = %self.viewer, "display failed: {message}");
        }
    }

    fn try_show(&self, figure: &Figure) -> Result<(), String> {
        let svg = render_svg(figure, self.size).map_err(|e| e.to_string())?;
        fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;
        let path = self.dir.join(format!("figure-{}.svg", figure.number()));
        fs::write(&path, svg).map_err(|e| format!("{}: {e}", path.display()))?;

        let mut child = Command::new(&self.viewer)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("could not start `{}`: {e}", self.viewer))?;
        debug!(pid = child.id(), path = %path.display(), "viewer started");
        // Detached: the gallery never blocks on the viewer, it only reaps it.
        let spawned = thread::Builder::new()
            .name("viewer-reaper".into())
            .spawn(move || child.wait());
        if let Err(err) = spawned {
            debug!("viewer left unreaped: {err}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_viewer_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let display = Display::new("plot-gallery-no-such-viewer", dir.path(), (200, 150));
        display.show(&Figure::new(4, "anything"));
        assert!(dir.path().join("figure-4.svg").exists());
    }

    #[test]
    fn run_dir_is_unique_to_the_process() {
        let base = Path::new("/tmp");
        let dir = Display::run_dir(base);
        assert_eq!(dir.parent(), Some(base));
        assert_eq!(
            dir.file_name().unwrap().to_string_lossy(),
            format!("plot-gallery-{}", process::id())
        );
    }
}
