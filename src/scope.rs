//! Scoped ownership of one figure.
//!
//! A [`FigureScope`] creates the figure, hands it to the body, and on the way
//! out (success, error, or unwinding) logs the failure if any, passes the
//! figure to the sink, and releases it. Exactly one figure is live per scope.

use tracing::{error, info};

use crate::error::GalleryError;
use crate::figure::Figure;
use crate::sink::ArtifactSink;

pub struct FigureScope<'s> {
    sink: &'s mut ArtifactSink,
    figure: Figure,
    closed: bool,
}

impl<'s> FigureScope<'s> {
    pub fn enter(sink: &'s mut ArtifactSink, label: &str) -> Self {
        let number = sink.next_figure_number();
        info!("Generating {label} as Figure {number}");
        Self {
            sink,
            figure: Figure::new(number, label),
            closed: false,
        }
    }

    pub fn number(&self) -> u32 {
        self.figure.number()
    }

    pub fn figure_mut(&mut self) -> &mut Figure {
        &mut self.figure
    }

    /// Close the scope. `failure` is the body's error, if it had one; it is
    /// logged here and stays the caller's to propagate.
    pub fn exit(mut self, failure: Option<&GalleryError>) -> Result<(), GalleryError> {
        self.finish(failure)
    }

    fn finish(&mut self, failure: Option<&GalleryError>) -> Result<(), GalleryError> {
        self.closed = true;
        if let Some(err) = failure {
            error!(
                figure = self.figure.number(),
                kind = err.kind(),
                "{} failed: {err}",
                self.figure.label()
            );
        }
        let handed_off = self.sink.accept(&self.figure);
        self.figure.clear();
        handed_off
    }
}

impl Drop for FigureScope<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if std::thread::panicking() {
            error!(
                figure = self.figure.number(),
                "{} aborted by panic",
                self.figure.label()
            );
        }
        if let Err(err) = self.finish(None) {
            error!(kind = err.kind(), "could not hand off figure: {err}");
        }
    }
}

/// Run `body` against a fresh figure inside a scope. The body's own error
/// wins over any cleanup error, which is only logged.
pub fn with_figure<T>(
    sink: &mut ArtifactSink,
    label: &str,
    body: impl FnOnce(&mut Figure) -> Result<T, GalleryError>,
) -> Result<T, GalleryError> {
    let mut scope = FigureScope::enter(sink, label);
    match body(scope.figure_mut()) {
        Ok(value) => {
            scope.exit(None)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(cleanup) = scope.exit(Some(&err)) {
                error!(kind = cleanup.kind(), "cleanup after failure also failed: {cleanup}");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::Trace;
    use std::fs;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn draw(fig: &mut Figure) {
        fig.subplots(1, 1);
        fig.grid_axes_mut(0, 0)
            .unwrap()
            .push(Trace::line(0, vec![(0.0, 1.0), (1.0, 0.0)]));
    }

    #[test]
    fn scopes_number_figures_in_order() {
        let mut sink = ArtifactSink::suppressed((100, 100));
        let a = with_figure(&mut sink, "a", |fig| Ok(fig.number())).unwrap();
        let b = with_figure(&mut sink, "b", |fig| Ok(fig.number())).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn failing_body_still_appends_its_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let mut sink = ArtifactSink::persisted(&path, "t", (200, 150)).unwrap();

        let err = with_figure(&mut sink, "broken", |fig| -> Result<(), GalleryError> {
            draw(fig);
            Err(GalleryError::Check {
                scenario: "broken".into(),
                message: "boom".into(),
            })
        })
        .unwrap_err();

        assert_eq!(err.kind(), "check");
        assert_eq!(sink.pages_written(), 1);
        assert!(fs::read_to_string(&path).unwrap().contains("<h2>broken</h2>"));
    }

    #[test]
    fn unwinding_releases_the_figure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let mut sink = ArtifactSink::persisted(&path, "t", (200, 150)).unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut scope = FigureScope::enter(&mut sink, "panics");
            draw(scope.figure_mut());
            panic!("body panicked");
        }));

        assert!(outcome.is_err());
        assert_eq!(sink.pages_written(), 1);
    }

    #[test]
    fn explicit_exit_does_not_hand_off_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            ArtifactSink::persisted(dir.path().join("out.html"), "t", (200, 150)).unwrap();
        let mut scope = FigureScope::enter(&mut sink, "once");
        draw(scope.figure_mut());
        scope.exit(None).unwrap();
        assert_eq!(sink.pages_written(), 1);
    }
}
