// ABOUTME: Dockerfile synthesis from project classification
// ABOUTME: Renders one of the fixed sandbox templates and registers it in the file catalog

use crate::classifier::{Classification, ProjectType};
use crate::error::{Result, SandboxError};
use crate::storage::{FileCatalog, FileRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Path convention `{base_root}/{team_id}/{project_name}/...`
#[derive(Debug, Clone)]
pub struct SandboxPaths {
    base_root: PathBuf,
}

impl SandboxPaths {
    pub fn new(base_root: impl Into<PathBuf>) -> Self {
        Self {
            base_root: base_root.into(),
        }
    }

    /// Directory bind-mounted into the sandbox and used as build context
    pub fn team_root(&self, team_id: i64) -> PathBuf {
        self.base_root.join(team_id.to_string())
    }

    pub fn dockerfile_path(&self, team_id: i64) -> PathBuf {
        self.team_root(team_id).join(DOCKERFILE_NAME)
    }

    /// Resolve a client path `teamId/projectName/...` to `(team_id, project_root, absolute_file)`
    pub fn resolve_request(&self, file_path: &str) -> Result<(i64, PathBuf, PathBuf)> {
        let trimmed = file_path.trim().trim_start_matches('/');
        let mut segments = trimmed.split('/').filter(|s| !s.is_empty());

        let team_segment = segments
            .next()
            .ok_or_else(|| SandboxError::Wrong(format!("Empty file path: '{}'", file_path)))?;
        let team_id = team_segment.parse::<i64>().map_err(|_| {
            SandboxError::Wrong(format!("Invalid team id '{}' in path", team_segment))
        })?;
        let project_name = segments.next().ok_or_else(|| {
            SandboxError::Wrong(format!("Path '{}' has no project directory", file_path))
        })?;

        if trimmed.split('/').any(|s| s == "..") {
            return Err(SandboxError::Wrong(format!(
                "Path '{}' escapes the project directory",
                file_path
            )));
        }

        let project_root = self.team_root(team_id).join(project_name);
        let absolute = self.base_root.join(trimmed);
        Ok((team_id, project_root, absolute))
    }
}

/// Render the Dockerfile for `classification` rooted at `team_root`
pub fn render(
    classification: &Classification,
    team_root: &Path,
    stdin: Option<&str>,
    base_image: &str,
) -> Result<String> {
    let entry = &classification.entry_path;
    let relative = entry.strip_prefix(team_root).map_err(|_| {
        SandboxError::Wrong(format!(
            "Entry {} is outside team directory {}",
            entry.display(),
            team_root.display()
        ))
    })?;

    let content = match classification.project_type {
        ProjectType::PurePython => match stdin.filter(|s| !s.is_empty()) {
            None => format!(
                "FROM {}\nCMD [\"python3\", \"{}\"]\nEXPOSE 3000",
                base_image,
                entry.display()
            ),
            Some(input) => format!(
                "FROM {}\nCMD /bin/sh \nCMD echo \"{}\" | python3 {}\nEXPOSE 3000",
                base_image,
                escape_echo(input),
                entry.display()
            ),
        },
        ProjectType::Django => format!(
            "FROM {}\nRUN pip3 install django\nWORKDIR {}\nCOPY . .\nCMD [\"python3\", \"{}\", \"runserver\", \"0.0.0.0:3000\"]\nEXPOSE 3000",
            base_image,
            team_root.display(),
            relative.display()
        ),
        ProjectType::Flask => format!(
            "FROM {}\nWORKDIR {}\nCOPY . .\nRUN pip3 install Flask\nEXPOSE 5000\nCMD [ \"python3\" , \"{}\", \"run\", \"--host=0.0.0.0\"]",
            base_image,
            team_root.display(),
            relative.display()
        ),
        ProjectType::FastApi => {
            let module = module_name(entry)?;
            let workdir = entry.parent().unwrap_or(team_root);
            format!(
                "FROM {}\nWORKDIR {}\nRUN python3 -m venv venv\nRUN . ./venv/bin/activate\nRUN pip3 install uvicorn[standard]\nRUN pip3 install fastapi\nCOPY . .\nEXPOSE 8000\nCMD [\"uvicorn\", \"{}:app\", \"--host\", \"0.0.0.0\"]",
                base_image,
                workdir.display(),
                module
            )
        }
    };

    Ok(content)
}

/// File name up to its first dot: `main.py` -> `main`
pub fn module_name(entry: &Path) -> Result<String> {
    entry
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(String::from)
        .ok_or_else(|| SandboxError::Wrong(format!("No module name in {}", entry.display())))
}

/// Escape text for the double-quoted `echo` of the stdin template.
///
/// The shell-form `CMD` runs under `/bin/sh`, which strips one level of
/// backslashes inside double quotes before its `echo` interprets escapes, so a
/// literal backslash takes four. Newlines stay `\n` for `echo` to expand.
fn escape_echo(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\\\\\"),
            '"' | '$' | '`' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

/// Writes `{team_root}/Dockerfile` and keeps the catalog record in step
pub struct DockerfileSynthesizer {
    paths: SandboxPaths,
    catalog: Arc<dyn FileCatalog>,
    base_image: String,
}

impl DockerfileSynthesizer {
    pub fn new(paths: SandboxPaths, catalog: Arc<dyn FileCatalog>, base_image: String) -> Self {
        Self {
            paths,
            catalog,
            base_image,
        }
    }

    pub async fn synthesize(
        &self,
        team_id: i64,
        classification: &Classification,
        stdin: Option<&str>,
    ) -> Result<PathBuf> {
        let team_root = self.paths.team_root(team_id);
        let content = render(classification, &team_root, stdin, &self.base_image)?;
        let path = self.paths.dockerfile_path(team_id);

        debug!("Dockerfile for team {}:\n{}", team_id, content);

        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| {
                SandboxError::Unknown(format!("Failed to write {}: {}", path.display(), e))
            })?;

        self.catalog
            .register(&FileRecord {
                title: DOCKERFILE_NAME.to_string(),
                path: path.to_string_lossy().into_owned(),
                team_id,
            })
            .await
            .map_err(|e| SandboxError::Unknown(e.to_string()))?;

        info!(
            "Wrote {} Dockerfile for team {} at {}",
            classification.project_type,
            team_id,
            path.display()
        );

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classification(project_type: ProjectType, entry: &str) -> Classification {
        Classification {
            project_type,
            entry_path: PathBuf::from(entry),
        }
    }

    const ROOT: &str = "/data/7";

    #[test]
    fn test_pure_python_without_stdin() {
        let c = classification(ProjectType::PurePython, "/data/7/demo/main.py");
        let out = render(&c, Path::new(ROOT), None, "python:3.10").unwrap();
        assert_eq!(
            out,
            "FROM python:3.10\nCMD [\"python3\", \"/data/7/demo/main.py\"]\nEXPOSE 3000"
        );

        // empty input selects the same template
        let out_empty = render(&c, Path::new(ROOT), Some(""), "python:3.10").unwrap();
        assert_eq!(out, out_empty);
    }

    #[test]
    fn test_pure_python_with_stdin() {
        let c = classification(ProjectType::PurePython, "/data/7/demo/main.py");
        let out = render(&c, Path::new(ROOT), Some("5"), "python:3.10").unwrap();
        assert_eq!(
            out,
            "FROM python:3.10\nCMD /bin/sh \nCMD echo \"5\" | python3 /data/7/demo/main.py\nEXPOSE 3000"
        );
    }

    #[test]
    fn test_stdin_is_escaped() {
        let c = classification(ProjectType::PurePython, "/data/7/demo/main.py");
        let out = render(&c, Path::new(ROOT), Some("say \"hi\"\n2"), "python:3.10").unwrap();
        assert!(out.contains("CMD echo \"say \\\"hi\\\"\\n2\" | python3"));
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn test_stdin_shell_metacharacters_are_literal() {
        let c = classification(ProjectType::PurePython, "/data/7/demo/main.py");
        let out = render(
            &c,
            Path::new(ROOT),
            Some("price $HOME `echo x` a\\tb"),
            "python:3.10",
        )
        .unwrap();
        assert!(out.contains(
            "CMD echo \"price \\$HOME \\`echo x\\` a\\\\\\\\tb\" | python3 /data/7/demo/main.py"
        ));
    }

    #[test]
    fn test_django_template() {
        let c = classification(ProjectType::Django, "/data/7/demo/manage.py");
        let out = render(&c, Path::new(ROOT), None, "python:3.10").unwrap();
        assert_eq!(
            out,
            "FROM python:3.10\nRUN pip3 install django\nWORKDIR /data/7\nCOPY . .\nCMD [\"python3\", \"demo/manage.py\", \"runserver\", \"0.0.0.0:3000\"]\nEXPOSE 3000"
        );
    }

    #[test]
    fn test_flask_template() {
        let c = classification(ProjectType::Flask, "/data/7/demo/web/app.py");
        let out = render(&c, Path::new(ROOT), None, "python:3.10").unwrap();
        assert_eq!(
            out,
            "FROM python:3.10\nWORKDIR /data/7\nCOPY . .\nRUN pip3 install Flask\nEXPOSE 5000\nCMD [ \"python3\" , \"demo/web/app.py\", \"run\", \"--host=0.0.0.0\"]"
        );
    }

    #[test]
    fn test_fastapi_template() {
        let c = classification(ProjectType::FastApi, "/data/7/demo/api/server.py");
        let out = render(&c, Path::new(ROOT), None, "python:3.10").unwrap();
        assert_eq!(
            out,
            "FROM python:3.10\nWORKDIR /data/7/demo/api\nRUN python3 -m venv venv\nRUN . ./venv/bin/activate\nRUN pip3 install uvicorn[standard]\nRUN pip3 install fastapi\nCOPY . .\nEXPOSE 8000\nCMD [\"uvicorn\", \"server:app\", \"--host\", \"0.0.0.0\"]"
        );
    }

    #[test]
    fn test_entry_outside_team_root_is_wrong() {
        let c = classification(ProjectType::Flask, "/data/8/other/app.py");
        let result = render(&c, Path::new(ROOT), None, "python:3.10");
        assert!(matches!(result, Err(SandboxError::Wrong(_))));
    }

    #[test]
    fn test_resolve_request() {
        let paths = SandboxPaths::new("/data");
        let (team_id, project_root, file) = paths.resolve_request("7/demo/src/main.py").unwrap();
        assert_eq!(team_id, 7);
        assert_eq!(project_root, PathBuf::from("/data/7/demo"));
        assert_eq!(file, PathBuf::from("/data/7/demo/src/main.py"));
        assert_eq!(paths.dockerfile_path(7), PathBuf::from("/data/7/Dockerfile"));
    }

    #[test]
    fn test_resolve_request_rejects_bad_paths() {
        let paths = SandboxPaths::new("/data");
        assert!(matches!(
            paths.resolve_request("demo/main.py"),
            Err(SandboxError::Wrong(_))
        ));
        assert!(matches!(
            paths.resolve_request("7"),
            Err(SandboxError::Wrong(_))
        ));
        assert!(matches!(
            paths.resolve_request("7/demo/../../8/x.py"),
            Err(SandboxError::Wrong(_))
        ));
    }

    #[test]
    fn test_module_name() {
        assert_eq!(module_name(Path::new("/a/main.py")).unwrap(), "main");
        assert!(module_name(Path::new("/a/.py")).is_err());
    }
}
