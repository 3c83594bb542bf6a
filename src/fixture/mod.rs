//! Fixture generation
//!
//! Materializes a synthetic build project on disk from a plain mapping of
//! relative path to file content. The build descriptor is opaque text:
//! syntax errors only surface once the build tool runs against it.

pub mod properties;

pub use properties::{Properties, CONFIGURATION_CACHE_KEY, CONFIGURATION_CACHE_PROBLEMS_KEY};

use crate::error::{HarnessError, HarnessResult};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Kotlin DSL build descriptor file name
pub const BUILD_FILE: &str = "build.gradle.kts";

/// Kotlin DSL settings file name
pub const SETTINGS_FILE: &str = "settings.gradle.kts";

/// Property overrides file name
pub const PROPERTIES_FILE: &str = "gradle.properties";

/// The set of files a fixture is made of, before anything touches disk
#[derive(Debug, Clone, Default)]
pub struct FixtureSpec {
    files: Vec<(PathBuf, String)>,
}

impl FixtureSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the build descriptor
    pub fn build_file(self, content: impl Into<String>) -> Self {
        self.file(BUILD_FILE, content)
    }

    /// Add the settings descriptor
    pub fn settings_file(self, content: impl Into<String>) -> Self {
        self.file(SETTINGS_FILE, content)
    }

    /// Add the property overrides file
    pub fn properties(self, properties: &Properties) -> Self {
        self.file(PROPERTIES_FILE, properties.render())
    }

    /// Add an arbitrary file. Collisions are reported when the fixture is written.
    pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Iterate files in insertion order
    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files.iter().map(|(p, c)| (p.as_path(), c.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Content fingerprint, independent of insertion order
    pub fn fingerprint(&self) -> String {
        let sorted: BTreeMap<&Path, &str> = self.files().collect();
        fingerprint_of(sorted)
    }

    /// Check there is something to write, every path is relative, stays
    /// under the fixture root, and does not collide with another entry.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.is_empty() {
            return Err(HarnessError::Precondition(
                "fixture has no files to write".to_string(),
            ));
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();

        for (path, _) in &self.files {
            let normalized = normalize_relative(path)?;
            if !seen.insert(normalized) {
                return Err(HarnessError::FixtureCollision {
                    path: path.clone(),
                    reason: "path supplied more than once".to_string(),
                });
            }
        }

        for path in &seen {
            if let Some(parent) = path.ancestors().skip(1).find(|a| seen.contains(*a)) {
                return Err(HarnessError::FixtureCollision {
                    path: path.clone(),
                    reason: format!("{} is also supplied as a file", parent.display()),
                });
            }
        }

        Ok(())
    }
}

/// Reduce a fixture path to its normal components, rejecting anything
/// absolute or escaping the root.
fn normalize_relative(path: &Path) -> HarnessResult<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(HarnessError::PathInvalid {
                    path: path.to_path_buf(),
                    reason: "must not contain '..'".to_string(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(HarnessError::PathInvalid {
                    path: path.to_path_buf(),
                    reason: "must be relative".to_string(),
                })
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(HarnessError::PathInvalid {
            path: path.to_path_buf(),
            reason: "empty path".to_string(),
        });
    }

    Ok(normalized)
}

fn fingerprint_of<'a>(files: impl IntoIterator<Item = (&'a Path, &'a str)>) -> String {
    let mut hasher = Sha256::new();
    for (path, content) in files {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(content.len().to_le_bytes());
        hasher.update(content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A fixture that has been written to disk
///
/// When created through [`ProjectFixture::create`] the directory is removed
/// on drop unless [`ProjectFixture::keep`] is called.
#[derive(Debug)]
pub struct ProjectFixture {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
    temp: Option<TempDir>,
}

impl ProjectFixture {
    /// Write the fixture into a fresh temporary directory
    pub async fn create(spec: &FixtureSpec) -> HarnessResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("cachecheck-")
            .tempdir()
            .map_err(|e| HarnessError::io("creating fixture directory", e))?;

        let mut fixture = Self::write_into(temp.path(), spec).await?;
        fixture.temp = Some(temp);
        Ok(fixture)
    }

    /// Write the fixture into an existing, empty directory owned by the caller
    pub async fn write_into(dir: &Path, spec: &FixtureSpec) -> HarnessResult<Self> {
        spec.validate()?;
        ensure_empty_dir(dir).await?;

        let mut files = BTreeMap::new();
        for (path, content) in spec.files() {
            let relative = normalize_relative(path)?;
            let target = dir.join(&relative);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    HarnessError::io(format!("creating directory {}", parent.display()), e)
                })?;
            }

            write_new(&target, &relative, content).await?;
            debug!("Wrote fixture file {} ({} bytes)", relative.display(), content.len());
            files.insert(relative, content.to_string());
        }

        info!("Fixture written to {} ({} files)", dir.display(), files.len());

        Ok(Self {
            root: dir.to_path_buf(),
            files,
            temp: None,
        })
    }

    /// Fixture root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files written, keyed by normalized relative path
    pub fn files(&self) -> &BTreeMap<PathBuf, String> {
        &self.files
    }

    /// Content fingerprint; equal for content-identical fixtures
    pub fn fingerprint(&self) -> String {
        fingerprint_of(self.files.iter().map(|(p, c)| (p.as_path(), c.as_str())))
    }

    /// Read every file back and return the paths whose content differs
    pub async fn verify(&self) -> HarnessResult<Vec<PathBuf>> {
        let mut mismatched = Vec::new();
        for (relative, expected) in &self.files {
            let path = self.root.join(relative);
            let actual = fs::read_to_string(&path)
                .await
                .map_err(|e| HarnessError::io(format!("reading back {}", path.display()), e))?;
            if &actual != expected {
                mismatched.push(relative.clone());
            }
        }
        Ok(mismatched)
    }

    /// Keep the directory on disk for inspection and return its path
    pub fn keep(mut self) -> PathBuf {
        if let Some(temp) = self.temp.take() {
            let path = temp.keep();
            info!("Keeping fixture at {}", path.display());
            return path;
        }
        self.root.clone()
    }
}

async fn ensure_empty_dir(dir: &Path) -> HarnessResult<()> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| HarnessError::io(format!("opening fixture directory {}", dir.display()), e))?;

    let first = entries
        .next_entry()
        .await
        .map_err(|e| HarnessError::io(format!("reading fixture directory {}", dir.display()), e))?;

    if first.is_some() {
        return Err(HarnessError::FixtureDirNotEmpty(dir.to_path_buf()));
    }
    Ok(())
}

async fn write_new(target: &Path, relative: &Path, content: &str) -> HarnessResult<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                HarnessError::FixtureCollision {
                    path: relative.to_path_buf(),
                    reason: "already exists on disk".to_string(),
                }
            } else {
                HarnessError::io(format!("writing {}", target.display()), e)
            }
        })?;

    file.write_all(content.as_bytes())
        .await
        .map_err(|e| HarnessError::io(format!("writing {}", target.display()), e))?;
    file.flush()
        .await
        .map_err(|e| HarnessError::io(format!("flushing {}", target.display()), e))?;
    Ok(())
}
