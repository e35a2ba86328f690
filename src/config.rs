use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::toolkit::ApiLevel;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "OutputConfig::default_prefix")]
    pub prefix: String,
    #[serde(default = "OutputConfig::default_page_width")]
    pub page_width: u32,
    #[serde(default = "OutputConfig::default_page_height")]
    pub page_height: u32,
}

impl OutputConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".")
    }
    fn default_prefix() -> String {
        "gallery".to_string()
    }
    fn default_page_width() -> u32 {
        1200
    }
    fn default_page_height() -> u32 {
        900
    }

    pub fn page_size(&self) -> (u32, u32) {
        (self.page_width, self.page_height)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            prefix: Self::default_prefix(),
            page_width: Self::default_page_width(),
            page_height: Self::default_page_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentConfig {
    /// Setting this variable (to anything) suppresses the artifact.
    #[serde(default = "EnvironmentConfig::default_test_mode_var")]
    pub test_mode_var: String,
    /// Where `git describe` runs.
    #[serde(default = "EnvironmentConfig::default_revision_dir")]
    pub revision_dir: PathBuf,
}

impl EnvironmentConfig {
    fn default_test_mode_var() -> String {
        "GALLERY_TEST_EXAMPLES".to_string()
    }
    fn default_revision_dir() -> PathBuf {
        PathBuf::from(".")
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            test_mode_var: Self::default_test_mode_var(),
            revision_dir: Self::default_revision_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default)]
    pub interactive: bool,
    #[serde(default = "DisplayConfig::default_viewer")]
    pub viewer: String,
}

impl DisplayConfig {
    fn default_viewer() -> String {
        if cfg!(target_os = "macos") {
            "open".to_string()
        } else {
            "xdg-open".to_string()
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interactive: false,
            viewer: Self::default_viewer(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolkitConfig {
    #[serde(default)]
    pub api_level: ApiLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GalleryConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub toolkit: ToolkitConfig,
}

impl GalleryConfig {
    /// Load settings from TOML. A missing file means defaults; nothing is
    /// written.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if !path_obj.exists() {
            debug!("no config at {path}, using defaults");
            return Self::default();
        }
        match fs::read_to_string(path_obj) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => return cfg,
                Err(err) => {
                    warn!("Failed to parse config {path}: {err}. Using defaults.");
                }
            },
            Err(err) => {
                warn!("Failed to read config {path}: {err}. Using defaults.");
            }
        }
        Self::default()
    }

    /// Write the commented defaults template to `path`. An existing file is
    /// left alone and `Ok(false)` is returned.
    pub fn write_template(path: &str) -> io::Result<bool> {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            return Ok(false);
        }
        let text = toml::to_string_pretty(&Self::default()).map_err(io::Error::other)?;
        fs::write(path_obj, Self::commented(&text))?;
        Ok(true)
    }

    /// Comment out every key so the template documents defaults without
    /// pinning them.
    fn commented(text: &str) -> String {
        let mut out = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
                out.push_str(line);
            } else {
                out.push_str("# ");
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_leaves_directory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.toml");

        let cfg = GalleryConfig::load_or_default(&path.to_string_lossy());
        assert_eq!(cfg, GalleryConfig::default());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn write_template_writes_defaults_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.toml");
        let path_str = path.to_string_lossy().to_string();

        assert!(GalleryConfig::write_template(&path_str).unwrap());
        assert!(path.exists(), "config file should be created");

        let contents = fs::read_to_string(&path).expect("read written config");
        assert!(contents.contains("[output]"), "section headers stay live");
        assert!(
            contents.contains("# prefix = \"gallery\""),
            "should write commented prefix"
        );
        assert!(
            contents.contains("# api_level = \"current\""),
            "should write commented api_level"
        );

        // The commented template parses back to defaults.
        let cfg = GalleryConfig::load_or_default(&path_str);
        assert_eq!(cfg, GalleryConfig::default());
        assert_eq!(cfg.output.prefix, "gallery");
        assert_eq!(cfg.environment.test_mode_var, "GALLERY_TEST_EXAMPLES");
        assert_eq!(cfg.toolkit.api_level, ApiLevel::Current);
    }

    #[test]
    fn write_template_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.toml");
        fs::write(&path, "[output]\nprefix = \"mine\"\n").unwrap();

        assert!(!GalleryConfig::write_template(&path.to_string_lossy()).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[output]\nprefix = \"mine\"\n"
        );
    }

    #[test]
    fn load_or_default_reads_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[output]\nprefix = \"nightly\"\npage_width = 800\n\n[toolkit]\napi_level = \"legacy\"\n\n[display]\ninteractive = true\n",
        )
        .unwrap();

        let cfg = GalleryConfig::load_or_default(&path.to_string_lossy());
        assert_eq!(cfg.output.prefix, "nightly");
        assert_eq!(cfg.output.page_size(), (800, 900));
        assert_eq!(cfg.toolkit.api_level, ApiLevel::Legacy);
        assert!(cfg.display.interactive);
        assert_eq!(cfg.environment, EnvironmentConfig::default());
    }

    #[test]
    fn unparsable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[output\nprefix = ").unwrap();
        let cfg = GalleryConfig::load_or_default(&path.to_string_lossy());
        assert_eq!(cfg, GalleryConfig::default());
    }
}
