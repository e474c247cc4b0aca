//! Which target configuration a cache file belongs to.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File extension of persisted graph caches.
pub const CACHE_EXTENSION: &str = "jgraph";

/// One target configuration: a project's target built for one platform,
/// architecture, and configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphIdentity {
    /// Project file, or `None` for targets outside any project.
    pub project: Option<PathBuf>,
    /// Target name.
    pub target: String,
    /// Platform name.
    pub platform: String,
    /// Architecture name.
    pub architecture: String,
    /// Configuration name.
    pub configuration: String,
}

impl GraphIdentity {
    /// Creates an identity without a project.
    pub fn new(
        target: impl Into<String>,
        platform: impl Into<String>,
        architecture: impl Into<String>,
        configuration: impl Into<String>,
    ) -> Self {
        Self {
            project: None,
            target: target.into(),
            platform: platform.into(),
            architecture: architecture.into(),
            configuration: configuration.into(),
        }
    }

    /// Sets the project file.
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Path of this identity's cache file inside `dir`.
    pub fn cache_path(&self, dir: &Path) -> PathBuf {
        dir.join(cache_file_name(self))
    }
}

impl fmt::Display for GraphIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.target, self.platform, self.architecture, self.configuration
        )?;
        if let Some(project) = &self.project {
            write!(f, " ({})", project.display())?;
        }
        Ok(())
    }
}

/// File name of the cache for `identity`.
///
/// Characters outside `[A-Za-z0-9._-]` are replaced so every identity maps
/// to a portable name. Projects are distinguished by their file stem.
pub fn cache_file_name(identity: &GraphIdentity) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    let stem = identity
        .project
        .as_deref()
        .and_then(Path::file_stem)
        .and_then(|s| s.to_str());
    if let Some(stem) = stem {
        parts.push(stem);
    }
    parts.extend([
        identity.target.as_str(),
        identity.platform.as_str(),
        identity.architecture.as_str(),
        identity.configuration.as_str(),
    ]);
    let name: String = parts
        .join("-")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{name}.{CACHE_EXTENSION}")
}
