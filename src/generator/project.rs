use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::artifacts::{media_types_json, routes_json, validators_json, Artifact};
use super::templates::routes_markdown;
use crate::design::{load_dir, ApiDefinition};
use crate::error::DefinitionIssue;
use crate::router::Router;

/// Failures while producing artifacts from an already checked definition.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render template: {0}")]
    Template(#[from] minijinja::Error),
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> GeneratorError + '_ {
    move |source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Print definition issues to stderr, one per line.
pub fn print_issues(issues: &[DefinitionIssue]) {
    eprintln!(
        "\n❌ API definition check failed. {} issue(s) found:\n",
        issues.len()
    );
    for issue in issues {
        eprintln!("[{}] {}: {}", issue.kind, issue.location, issue.message);
    }
    eprintln!("\nPlease fix the issues in your definition files before generating.\n");
}

/// Render every artifact in memory.
pub(crate) fn render_artifacts(api: &ApiDefinition) -> Result<Vec<Artifact>, GeneratorError> {
    let router = Router::new(api);
    Ok(vec![
        Artifact {
            file_name: "routes.json",
            contents: routes_json(api, &router)?,
        },
        Artifact {
            file_name: "validators.json",
            contents: validators_json(api)?,
        },
        Artifact {
            file_name: "media_types.json",
            contents: media_types_json(api)?,
        },
        Artifact {
            file_name: "ROUTES.md",
            contents: routes_markdown(api, &router)?,
        },
    ])
}

/// Write `artifacts` into `output` through a staging directory.
///
/// Everything is written to `output/.mediaroute-staging-<ulid>` first. Files
/// already in `output` are moved aside into the staging directory before the
/// new ones are renamed into place; if any rename fails, every replaced file
/// is put back. The staging directory is removed either way.
pub(crate) fn write_artifacts(
    output: &Path,
    artifacts: &[Artifact],
) -> Result<Vec<PathBuf>, GeneratorError> {
    write_artifacts_with(output, artifacts, |from, to| fs::rename(from, to))
}

pub(crate) fn write_artifacts_with<R>(
    output: &Path,
    artifacts: &[Artifact],
    rename: R,
) -> Result<Vec<PathBuf>, GeneratorError>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    fs::create_dir_all(output).map_err(io_error(output))?;
    let staging = output.join(format!(".mediaroute-staging-{}", ulid::Ulid::new()));
    fs::create_dir(&staging).map_err(io_error(&staging))?;
    debug!(staging = %staging.display(), "Created staging directory");

    let result = stage(&staging, output, artifacts)
        .and_then(|()| commit(&staging, output, artifacts, rename));
    if let Err(e) = fs::remove_dir_all(&staging) {
        warn!(
            staging = %staging.display(),
            error = %e,
            "Failed to remove staging directory"
        );
    }
    let written = result?;
    for path in &written {
        println!("✅ Wrote {}", path.display());
    }
    Ok(written)
}

fn stage(staging: &Path, output: &Path, artifacts: &[Artifact]) -> Result<(), GeneratorError> {
    for artifact in artifacts {
        let target = output.join(artifact.file_name);
        if target.is_dir() {
            return Err(GeneratorError::Io {
                path: target,
                source: io::Error::other("a directory is in the way of an artifact"),
            });
        }
        let path = staging.join(artifact.file_name);
        fs::write(&path, &artifact.contents).map_err(io_error(&path))?;
    }
    fs::create_dir(staging.join(BACKUP_DIR)).map_err(io_error(staging))
}

const BACKUP_DIR: &str = "previous";

/// One artifact moved into `output`, with the file it replaced if any.
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

fn commit<R>(
    staging: &Path,
    output: &Path,
    artifacts: &[Artifact],
    mut rename: R,
) -> Result<Vec<PathBuf>, GeneratorError>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut committed: Vec<Committed> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let from = staging.join(artifact.file_name);
        let target = output.join(artifact.file_name);
        let backup = staging.join(BACKUP_DIR).join(artifact.file_name);

        match replace(&mut rename, &from, &target, &backup) {
            Ok(had_previous) => committed.push(Committed {
                target,
                backup: had_previous.then_some(backup),
            }),
            Err(e) => {
                roll_back(&committed);
                return Err(e);
            }
        }
    }
    Ok(committed.into_iter().map(|c| c.target).collect())
}

/// Move `from` onto `target`, keeping any existing `target` at `backup`.
/// Returns whether a previous file was kept.
fn replace<R>(
    rename: &mut R,
    from: &Path,
    target: &Path,
    backup: &Path,
) -> Result<bool, GeneratorError>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    let had_previous = target.exists();
    if had_previous {
        rename(target, backup).map_err(io_error(target))?;
    }
    if let Err(e) = rename(from, target) {
        if had_previous {
            restore(backup, target);
        }
        return Err(io_error(target)(e));
    }
    Ok(had_previous)
}

fn roll_back(committed: &[Committed]) {
    for entry in committed.iter().rev() {
        match &entry.backup {
            Some(backup) => restore(backup, &entry.target),
            None => {
                if let Err(e) = fs::remove_file(&entry.target) {
                    warn!(
                        path = %entry.target.display(),
                        error = %e,
                        "Failed to remove partially written artifact"
                    );
                }
            }
        }
    }
}

fn restore(backup: &Path, target: &Path) {
    if let Err(e) = fs::rename(backup, target) {
        warn!(
            path = %target.display(),
            error = %e,
            "Failed to restore previous artifact"
        );
    }
}

/// Load the definition under `source` and write its artifacts to `output`.
///
/// Definition problems come back as a [`DefinitionError`](crate::error::DefinitionError)
/// inside the error, listing every issue; nothing is written in that case.
pub fn generate(source: &Path, output: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let api = load_dir(source)?;
    let artifacts = render_artifacts(&api)?;
    let written = write_artifacts(output, &artifacts)?;
    info!(
        api = %api.name,
        output = %output.display(),
        artifacts = written.len(),
        "Generated artifacts"
    );
    Ok(written)
}
