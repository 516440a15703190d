use crate::error::{Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const DJANGO_MARKER: &str = "os.environ.setdefault('DJANGO_SETTINGS_MODULE'";
pub const FASTAPI_MARKER: &str = "import FastAPI";
pub const FLASK_MARKER: &str = "import Flask";

const DJANGO_ENTRY: &str = "manage.py";

/// Runtime shape of a team project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    PurePython,
    Django,
    Flask,
    FastApi,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurePython => "pure_python",
            Self::Django => "django",
            Self::Flask => "flask",
            Self::FastApi => "fast_api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pure_python" => Some(Self::PurePython),
            "django" => Some(Self::Django),
            "flask" => Some(Self::Flask),
            "fast_api" => Some(Self::FastApi),
            _ => None,
        }
    }

    /// Port the process listens on inside the container
    pub fn internal_port(&self) -> u16 {
        match self {
            Self::Flask => 5000,
            Self::FastApi => 8000,
            Self::PurePython | Self::Django => 3000,
        }
    }

    /// Script projects exit after printing; the rest keep serving
    pub fn is_service(&self) -> bool {
        !matches!(self, Self::PurePython)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub project_type: ProjectType,
    /// Absolute path of the file the sandbox starts from
    pub entry_path: PathBuf,
}

/// Decides project type and entry point from file names and contents
pub struct ProjectClassifier;

impl ProjectClassifier {
    /// Classify the tree under `project_root`.
    ///
    /// Files are scanned in sorted path order so the outcome does not depend
    /// on directory listing order. A `manage.py` carrying the Django settings
    /// marker wins outright; otherwise the first file with a framework import
    /// decides, FastAPI taking priority over Flask within one file. With no
    /// marker anywhere the project is plain Python started from
    /// `requested_file`.
    pub async fn classify(project_root: &Path, requested_file: &Path) -> Result<Classification> {
        let project_root = project_root.to_path_buf();
        let requested_file = requested_file.to_path_buf();

        tokio::task::spawn_blocking(move || Self::classify_blocking(&project_root, &requested_file))
            .await
            .map_err(|e| SandboxError::Unknown(format!("Classification task failed: {}", e)))?
    }

    pub fn classify_blocking(project_root: &Path, requested_file: &Path) -> Result<Classification> {
        debug!("Classifying project in: {}", project_root.display());

        let files = list_files(project_root)?;

        if let Some(entry) = Self::find_django_entry(&files) {
            return Ok(Classification {
                project_type: ProjectType::Django,
                entry_path: entry,
            });
        }

        for file in &files {
            let Some(content) = read_lossy(file) else {
                continue;
            };

            let project_type = if content.contains(FASTAPI_MARKER) {
                ProjectType::FastApi
            } else if content.contains(FLASK_MARKER) {
                ProjectType::Flask
            } else {
                continue;
            };

            debug!("{} marker found in {}", project_type, file.display());
            return Ok(Classification {
                project_type,
                entry_path: file.clone(),
            });
        }

        Ok(Classification {
            project_type: ProjectType::PurePython,
            entry_path: requested_file.to_path_buf(),
        })
    }

    fn find_django_entry(files: &[PathBuf]) -> Option<PathBuf> {
        let mut candidates: Vec<&PathBuf> = files
            .iter()
            .filter(|path| path.file_name().is_some_and(|name| name == DJANGO_ENTRY))
            .collect();
        // shallowest first
        candidates.sort_by_key(|path| (path.components().count(), (*path).clone()));

        candidates
            .into_iter()
            .find(|path| read_lossy(path).is_some_and(|content| content.contains(DJANGO_MARKER)))
            .cloned()
    }
}

/// Every regular file under `root`, sorted
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(SandboxError::NotFound(format!(
            "Project directory does not exist: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(SandboxError::NotFound(format!(
                    "Cannot read project directory {}: {}",
                    root.display(),
                    e
                )))
            }
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn read_lossy(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!("Skipping unreadable file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_django_manage_py_wins() {
        let dir = TempDir::new().unwrap();
        let manage = write(
            dir.path(),
            "manage.py",
            "import os\nos.environ.setdefault('DJANGO_SETTINGS_MODULE', 'site.settings')\n",
        );
        write(dir.path(), "aaa.py", "from flask import Flask\n");

        let result =
            ProjectClassifier::classify_blocking(dir.path(), &dir.path().join("aaa.py")).unwrap();
        assert_eq!(result.project_type, ProjectType::Django);
        assert_eq!(result.entry_path, manage);
    }

    #[test]
    fn test_manage_py_without_marker_is_ignored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "manage.py", "print('not django')\n");
        let requested = write(dir.path(), "main.py", "print(1)\n");

        let result = ProjectClassifier::classify_blocking(dir.path(), &requested).unwrap();
        assert_eq!(result.project_type, ProjectType::PurePython);
        assert_eq!(result.entry_path, requested);
    }

    #[test]
    fn test_flask_marker_in_nested_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "util.py", "def f(): pass\n");
        let app = write(dir.path(), "web/app.py", "from flask import Flask\napp = Flask(__name__)\n");

        let result =
            ProjectClassifier::classify_blocking(dir.path(), &dir.path().join("util.py")).unwrap();
        assert_eq!(result.project_type, ProjectType::Flask);
        assert_eq!(result.entry_path, app);
    }

    #[test]
    fn test_fastapi_beats_flask_in_same_file() {
        let dir = TempDir::new().unwrap();
        let main = write(
            dir.path(),
            "main.py",
            "from flask import Flask\nfrom fastapi import FastAPI\n",
        );

        let result = ProjectClassifier::classify_blocking(dir.path(), &main).unwrap();
        assert_eq!(result.project_type, ProjectType::FastApi);
    }

    #[test]
    fn test_first_file_in_sorted_order_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b_api.py", "from fastapi import FastAPI\n");
        let a = write(dir.path(), "a_web.py", "from flask import Flask\n");

        for _ in 0..3 {
            let result = ProjectClassifier::classify_blocking(dir.path(), &a).unwrap();
            assert_eq!(result.project_type, ProjectType::Flask);
            assert_eq!(result.entry_path, a);
        }
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = ProjectClassifier::classify_blocking(&missing, &missing.join("main.py"));
        assert!(matches!(result, Err(SandboxError::NotFound(_))));
    }

    #[test]
    fn test_internal_ports() {
        assert_eq!(ProjectType::PurePython.internal_port(), 3000);
        assert_eq!(ProjectType::Django.internal_port(), 3000);
        assert_eq!(ProjectType::Flask.internal_port(), 5000);
        assert_eq!(ProjectType::FastApi.internal_port(), 8000);
    }

    #[test]
    fn test_project_type_round_trips_through_str() {
        for ty in [
            ProjectType::PurePython,
            ProjectType::Django,
            ProjectType::Flask,
            ProjectType::FastApi,
        ] {
            assert_eq!(ProjectType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ProjectType::parse("rails"), None);
    }
}
