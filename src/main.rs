use std::error::Error;

use chrono::Local;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use plot_gallery::cli::Args;
use plot_gallery::config::GalleryConfig;
use plot_gallery::display::Display;
use plot_gallery::gallery;
use plot_gallery::revision::GitDescribe;
use plot_gallery::toolkit::{BuiltinToolkit, ControlToolkit};
use plot_gallery::{ArtifactSink, OutputMode, ScenarioRunner};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    if args.write_config {
        if GalleryConfig::write_template(&args.config)? {
            info!("wrote config template to {}", args.config);
        } else {
            info!("{} already exists, left unchanged", args.config);
        }
        return Ok(());
    }
    let mut config = GalleryConfig::load_or_default(&args.config);
    args.apply(&mut config);

    let toolkit = BuiltinToolkit::new(config.toolkit.api_level);
    let runner = ScenarioRunner::new(&toolkit, gallery::scenarios());
    if args.list {
        for name in runner.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let mode = OutputMode::from_env(&config.environment.test_mode_var);
    let revision = GitDescribe::new(&config.environment.revision_dir);
    let today = Local::now().date_naive();
    let mut sink = ArtifactSink::select(mode, &revision, today, &config.output).inspect_err(|err| {
        error!(kind = err.kind(), "{err}");
    })?;
    if config.display.interactive {
        sink = sink.with_display(Display::new(
            config.display.viewer.clone(),
            Display::run_dir(&std::env::temp_dir()),
            config.output.page_size(),
        ));
    }

    info!(
        api_level = %toolkit.api_level(),
        persisted = sink.is_persisted(),
        interactive = sink.is_interactive(),
        "running {} scenarios", runner.names().len());
    let report = runner.run_to_completion(sink).inspect_err(|err| {
        error!(kind = err.kind(), "gallery aborted: {err}");
    })?;

    for record in report.fallbacks() {
        info!(figure = record.figure, "{} used the fallback path", record.name);
    }
    match &report.artifact {
        Some(path) => info!("saved {} pages to {}", report.records.len(), path.display()),
        None => info!("{} figures generated, none saved", report.records.len()),
    }
    Ok(())
}
