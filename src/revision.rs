//! Source-control revision lookup used to name the gallery artifact.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("could not run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` printed an empty revision")]
    Empty { command: String },
}

/// Anything that can describe the checked-out revision in a few characters.
pub trait RevisionSource {
    fn describe(&self) -> Result<String, RevisionError>;
}

/// `git describe` in a working directory.
#[derive(Clone, Debug)]
pub struct GitDescribe {
    workdir: PathBuf,
}

impl GitDescribe {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }
}

impl RevisionSource for GitDescribe {
    fn describe(&self) -> Result<String, RevisionError> {
        let command = "git describe".to_string();
        let output = Command::new("git")
            .arg("describe")
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| RevisionError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(RevisionError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if revision.is_empty() {
            return Err(RevisionError::Empty { command });
        }
        debug!(%revision, workdir = %self.workdir.display(), "resolved revision");
        Ok(revision)
    }
}

/// Make a descriptor safe to embed in a file name.
pub fn file_safe(revision: &str) -> String {
    revision
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_safe_replaces_separators() {
        assert_eq!(file_safe("v0.10.1-12-gabc1234"), "v0.10.1-12-gabc1234");
        assert_eq!(file_safe("heads/main:dirty"), "heads-main-dirty");
    }

    #[test]
    fn describe_outside_a_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitDescribe::new(dir.path()).describe();
        assert!(err.is_err());
    }
}
