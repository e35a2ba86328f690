use std::fs;

use chrono::NaiveDate;
use plot_gallery::config::OutputConfig;
use plot_gallery::figure::{Figure, GridStyle};
use plot_gallery::gallery;
use plot_gallery::revision::{RevisionError, RevisionSource};
use plot_gallery::toolkit::{ApiLevel, BuiltinToolkit};
use plot_gallery::{ArtifactSink, OutputMode, RenderPath, RunReport, ScenarioRunner};

struct FixedRevision;

impl RevisionSource for FixedRevision {
    fn describe(&self) -> Result<String, RevisionError> {
        Ok("0.10.1-42-g1a2b3c4".to_string())
    }
}

struct NoRepository;

impl RevisionSource for NoRepository {
    fn describe(&self) -> Result<String, RevisionError> {
        Err(RevisionError::Failed {
            command: "git describe".into(),
            status: "exit status: 128".into(),
            stderr: "fatal: not a git repository".into(),
        })
    }
}

fn run_suppressed(level: ApiLevel) -> RunReport {
    let toolkit = BuiltinToolkit::new(level);
    let runner = ScenarioRunner::new(&toolkit, gallery::scenarios());
    runner
        .run_to_completion(ArtifactSink::suppressed((640, 480)))
        .expect("suppressed run")
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 19).unwrap()
}

#[test]
fn suppressed_run_executes_every_scenario() {
    let report = run_suppressed(ApiLevel::Current);

    assert_eq!(report.artifact, None);
    assert_eq!(report.records.len(), 10);
    for (i, record) in report.records.iter().enumerate() {
        assert_eq!(record.figure, i as u32 + 1, "{}", record.name);
        assert!(record.curves > 0, "{} drew nothing", record.name);
        assert_eq!(record.path, RenderPath::Primary, "{}", record.name);
    }
}

#[test]
fn repeated_suppressed_runs_agree() {
    assert_eq!(run_suppressed(ApiLevel::Current), run_suppressed(ApiLevel::Current));
}

#[test]
fn legacy_toolkit_takes_fallbacks_with_the_same_curves() {
    let current = run_suppressed(ApiLevel::Current);
    let legacy = run_suppressed(ApiLevel::Legacy);

    let fallbacks: Vec<&str> = legacy.fallbacks().map(|r| r.name).collect();
    assert_eq!(fallbacks, ["Bode plot", "step response"]);

    for (a, b) in current.records.iter().zip(&legacy.records) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.curves, b.curves, "{} curve count differs", a.name);
    }
}

#[test]
fn persisted_run_writes_one_page_per_scenario_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = OutputConfig {
        dir: dir.path().to_path_buf(),
        page_width: 480,
        page_height: 360,
        ..OutputConfig::default()
    };
    let sink = ArtifactSink::select(OutputMode::Persisted, &FixedRevision, date(), &output).unwrap();
    let toolkit = BuiltinToolkit::default();
    let report = ScenarioRunner::new(&toolkit, gallery::scenarios())
        .run_to_completion(sink)
        .unwrap();

    let path = report.artifact.expect("persisted artifact");
    assert_eq!(
        path.file_name().unwrap(),
        "gallery-0.10.1-42-g1a2b3c4-2024-06-19.html"
    );
    let html = fs::read_to_string(&path).unwrap();
    assert_eq!(html.matches("<section class=\"page\"").count(), 10);

    let mut last = 0;
    for n in 1..=10 {
        let at = html
            .find(&format!("data-figure=\"{n}\""))
            .unwrap_or_else(|| panic!("page {n} missing"));
        assert!(at > last, "page {n} out of order");
        last = at;
    }
    assert!(html.contains("Root locus plots (w/ specified axes)"));
    assert!(html.trim_end().ends_with("</html>"));
}

#[test]
fn revision_failure_aborts_before_anything_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = OutputConfig {
        dir: dir.path().join("out"),
        ..OutputConfig::default()
    };
    let err = ArtifactSink::select(OutputMode::Persisted, &NoRepository, date(), &output)
        .err()
        .expect("revision failure must be fatal");
    assert_eq!(err.kind(), "revision");
    assert!(!output.dir.exists());
}

#[test]
fn suppressed_selection_ignores_revision_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = OutputConfig {
        dir: dir.path().to_path_buf(),
        ..OutputConfig::default()
    };
    let sink = ArtifactSink::select(OutputMode::Suppressed, &NoRepository, date(), &output).unwrap();
    assert!(!sink.is_persisted());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn output_mode_follows_variable_presence() {
    assert_eq!(OutputMode::from_env("PATH"), OutputMode::Suppressed);
    assert_eq!(
        OutputMode::from_env("PLOT_GALLERY_VARIABLE_THAT_IS_NEVER_SET"),
        OutputMode::Persisted
    );
}

#[test]
fn root_locus_cells_differ_only_in_gridlines() {
    let toolkit = BuiltinToolkit::default();
    let scenario = gallery::scenarios()
        .into_iter()
        .find(|s| s.name() == "Root locus plot")
        .unwrap();
    let mut figure = Figure::new(7, "Root locus plot");
    scenario.execute(&toolkit, &mut figure).unwrap();

    assert_eq!(figure.layout(), (2, 1));
    let axes = figure.axes();
    assert_eq!(axes[0].grid, GridStyle::SPlane);
    assert_eq!(axes[1].grid, GridStyle::None);
    assert!(axes[0].same_content(&axes[1]));
    assert!(!axes[0].traces.is_empty());
}

#[test]
fn time_response_carries_both_trace_labels() {
    let toolkit = BuiltinToolkit::default();
    let scenario = gallery::scenarios()
        .into_iter()
        .find(|s| s.name() == "time response")
        .unwrap();
    let mut figure = Figure::new(10, "time response");
    assert_eq!(scenario.execute(&toolkit, &mut figure).unwrap(), RenderPath::Primary);

    let labels: Vec<&str> = figure
        .axes()
        .iter()
        .flat_map(|a| a.traces.iter())
        .filter_map(|t| t.label.as_deref())
        .collect();
    assert!(labels.iter().any(|l| l.contains("resp1")));
    assert!(labels.iter().any(|l| l.contains("resp2")));
}
