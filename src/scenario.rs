//! Ordered scenario execution with a fallback for toolkit calls that exist
//! only in an older calling convention.

use std::path::PathBuf;

use tracing::info;

use crate::error::GalleryError;
use crate::figure::Figure;
use crate::scope::with_figure;
use crate::sink::ArtifactSink;
use crate::toolkit::{ApiCall, ControlToolkit};

type BuildFn<I> = dyn Fn(&dyn ControlToolkit) -> Result<I, GalleryError>;
type RenderFn<I> = dyn Fn(&dyn ControlToolkit, &I, &mut Figure) -> Result<ApiCall<()>, GalleryError>;
type FallbackFn<I> = dyn Fn(&dyn ControlToolkit, &I, &mut Figure) -> Result<(), GalleryError>;

/// Which branch produced a scenario's figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPath {
    Primary,
    Fallback,
}

/// One demonstration: build inputs, then render them onto a figure.
pub struct Scenario<I> {
    name: &'static str,
    build: Box<BuildFn<I>>,
    render: Box<RenderFn<I>>,
    fallback: Option<Box<FallbackFn<I>>>,
}

impl<I: 'static> Scenario<I> {
    pub fn new(
        name: &'static str,
        build: impl Fn(&dyn ControlToolkit) -> Result<I, GalleryError> + 'static,
        render: impl Fn(&dyn ControlToolkit, &I, &mut Figure) -> Result<ApiCall<()>, GalleryError>
        + 'static,
    ) -> Self {
        Self {
            name,
            build: Box::new(build),
            render: Box::new(render),
            fallback: None,
        }
    }

    /// Older calling convention, used only when `render` reports the call
    /// unsupported.
    pub fn with_fallback(
        mut self,
        fallback: impl Fn(&dyn ControlToolkit, &I, &mut Figure) -> Result<(), GalleryError> + 'static,
    ) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn boxed(self) -> Box<dyn GalleryEntry> {
        Box::new(self)
    }
}

/// Type-erased scenario, so scenarios with different inputs share a list.
pub trait GalleryEntry {
    fn name(&self) -> &'static str;

    fn has_fallback(&self) -> bool;

    /// Build and draw into `figure`.
    fn execute(
        &self,
        toolkit: &dyn ControlToolkit,
        figure: &mut Figure,
    ) -> Result<RenderPath, GalleryError>;
}

impl<I> GalleryEntry for Scenario<I> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    fn execute(
        &self,
        toolkit: &dyn ControlToolkit,
        figure: &mut Figure,
    ) -> Result<RenderPath, GalleryError> {
        let inputs = (self.build)(toolkit)?;
        match (self.render)(toolkit, &inputs, figure)? {
            ApiCall::Supported(()) => Ok(RenderPath::Primary),
            ApiCall::UnsupportedApi(unsupported) => {
                let Some(fallback) = &self.fallback else {
                    return Err(GalleryError::NoFallback {
                        scenario: self.name.to_string(),
                        source: unsupported,
                    });
                };
                info!(call = unsupported.call, "falling back to earlier method");
                figure.clear();
                fallback(toolkit, &inputs, figure)?;
                Ok(RenderPath::Fallback)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub name: &'static str,
    pub figure: u32,
    pub path: RenderPath,
    pub curves: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub records: Vec<ScenarioRecord>,
    /// The finalized document, when output was persisted.
    pub artifact: Option<PathBuf>,
}

impl RunReport {
    pub fn fallbacks(&self) -> impl Iterator<Item = &ScenarioRecord> {
        self.records
            .iter()
            .filter(|r| r.path == RenderPath::Fallback)
    }
}

pub struct ScenarioRunner<'t> {
    toolkit: &'t dyn ControlToolkit,
    scenarios: Vec<Box<dyn GalleryEntry>>,
}

impl<'t> ScenarioRunner<'t> {
    pub fn new(toolkit: &'t dyn ControlToolkit, scenarios: Vec<Box<dyn GalleryEntry>>) -> Self {
        Self { toolkit, scenarios }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    /// Run every scenario in order, one figure each. The first error aborts
    /// the run; the sink is left open.
    pub fn run(&self, sink: &mut ArtifactSink) -> Result<RunReport, GalleryError> {
        let mut report = RunReport::default();
        for scenario in &self.scenarios {
            let record = with_figure(sink, scenario.name(), |figure| {
                let path = scenario.execute(self.toolkit, figure)?;
                Ok(ScenarioRecord {
                    name: scenario.name(),
                    figure: figure.number(),
                    path,
                    curves: figure.curve_count(),
                })
            })?;
            report.records.push(record);
        }
        Ok(report)
    }

    /// [`run`](Self::run), then finalize the sink.
    pub fn run_to_completion(&self, mut sink: ArtifactSink) -> Result<RunReport, GalleryError> {
        let mut report = self.run(&mut sink)?;
        report.artifact = sink.finalize()?;
        info!(scenarios = report.records.len(), "gallery complete");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::Trace;
    use crate::toolkit::{ApiLevel, BuiltinToolkit, ToolkitError, Unsupported};
    use std::cell::Cell;
    use std::rc::Rc;

    fn unsupported() -> ApiCall<()> {
        ApiCall::UnsupportedApi(Unsupported {
            call: "bode_plot",
            reason: "single system only".into(),
        })
    }

    fn one_line(fig: &mut Figure) {
        fig.ensure_grid(1, 1).unwrap();
        fig.grid_axes_mut(0, 0)
            .unwrap()
            .push(Trace::line(0, vec![(0.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn fallback_runs_once_only_when_unsupported() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let scenario = Scenario::new("fb", |_| Ok(()), |_, _, fig| {
            // Partial output from the failed attempt must not survive.
            one_line(fig);
            Ok(unsupported())
        })
        .with_fallback(move |_, _, fig| {
            counter.set(counter.get() + 1);
            one_line(fig);
            Ok(())
        });

        let tk = BuiltinToolkit::default();
        let mut fig = Figure::new(1, "fb");
        let path = scenario.execute(&tk, &mut fig).unwrap();
        assert_eq!(path, RenderPath::Fallback);
        assert_eq!(calls.get(), 1);
        assert_eq!(fig.curve_count(), 1);
    }

    #[test]
    fn supported_primary_skips_fallback() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let scenario = Scenario::new("ok", |_| Ok(()), |_, _, fig| {
            one_line(fig);
            Ok(ApiCall::Supported(()))
        })
        .with_fallback(move |_, _, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        let tk = BuiltinToolkit::default();
        let mut fig = Figure::new(1, "ok");
        assert_eq!(scenario.execute(&tk, &mut fig).unwrap(), RenderPath::Primary);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn unsupported_without_fallback_is_an_error() {
        let scenario = Scenario::new("bare", |_| Ok(()), |_, _, _| Ok(unsupported()));
        let tk = BuiltinToolkit::new(ApiLevel::Legacy);
        let err = scenario
            .execute(&tk, &mut Figure::new(1, "bare"))
            .unwrap_err();
        assert!(matches!(err, GalleryError::NoFallback { .. }));
    }

    #[test]
    fn other_errors_abort_the_run() {
        let scenarios = vec![
            Scenario::new("first", |_| Ok(()), |_, _, fig| {
                one_line(fig);
                Ok(ApiCall::Supported(()))
            })
            .boxed(),
            Scenario::new(
                "broken",
                |_| -> Result<(), GalleryError> {
                    Err(ToolkitError::InvalidModel("empty denominator".into()).into())
                },
                |_, _, _| Ok(ApiCall::Supported(())),
            )
            .boxed(),
            Scenario::new("never", |_| Ok(()), |_, _, _| -> Result<ApiCall<()>, GalleryError> {
                panic!("must not run after a failure")
            })
            .boxed(),
        ];
        let tk = BuiltinToolkit::default();
        let runner = ScenarioRunner::new(&tk, scenarios);
        let mut sink = ArtifactSink::suppressed((100, 100));
        let err = runner.run(&mut sink).unwrap_err();
        assert_eq!(err.kind(), "toolkit");
    }
}
