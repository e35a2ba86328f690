use std::path::PathBuf;

use clap::Parser;

use crate::config::GalleryConfig;
use crate::toolkit::ApiLevel;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Render the control plot gallery into one revision-tagged document")]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "gallery.toml")]
    pub config: String,

    /// Directory for the gallery document (overrides config)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Show each figure in the configured viewer as it is produced
    #[arg(long, default_value_t = false)]
    pub interactive: bool,

    /// Toolkit API generation to drive: legacy or current (overrides config)
    #[arg(long, value_name = "LEVEL")]
    pub api_level: Option<ApiLevel>,

    /// Write a commented config template to the --config path and exit
    #[arg(long, default_value_t = false)]
    pub write_config: bool,

    /// Print the scenario names in run order and exit
    #[arg(long, default_value_t = false)]
    pub list: bool,
}

impl Args {
    /// Fold command-line overrides into the loaded config.
    pub fn apply(&self, config: &mut GalleryConfig) {
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if self.interactive {
            config.display.interactive = true;
        }
        if let Some(level) = self.api_level {
            config.toolkit.api_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let args = Args::parse_from([
            "plot-gallery",
            "--output-dir",
            "out",
            "--interactive",
            "--api-level",
            "legacy",
        ]);
        let mut config = GalleryConfig::default();
        args.apply(&mut config);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert!(config.display.interactive);
        assert_eq!(config.toolkit.api_level, ApiLevel::Legacy);
    }

    #[test]
    fn absent_flags_keep_config() {
        let args = Args::parse_from(["plot-gallery"]);
        assert_eq!(args.config, "gallery.toml");
        let mut config = GalleryConfig::default();
        config.display.interactive = true;
        args.apply(&mut config);
        assert!(config.display.interactive);
        assert_eq!(config.output, GalleryConfig::default().output);
    }

    #[test]
    fn write_config_is_opt_in() {
        assert!(!Args::parse_from(["plot-gallery"]).write_config);
        let args = Args::parse_from(["plot-gallery", "--write-config", "--config", "ci.toml"]);
        assert!(args.write_config);
        assert_eq!(args.config, "ci.toml");
    }

    #[test]
    fn rejects_unknown_api_level() {
        assert!(Args::try_parse_from(["plot-gallery", "--api-level", "v3"]).is_err());
    }
}
