//! Recursive artifact listing.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::DiscoveryConfig;
use crate::discovery::artifact::{Artifact, RuleRoots};

/// Errors raised while scanning discovery roots.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot resolve current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("failed to read {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// List every artifact under the configured roots, with absolute paths.
///
/// The result is sorted and free of duplicates; a file under nested roots is
/// classified by the deepest one.
pub fn list_artifacts(config: &DiscoveryConfig) -> Result<Vec<Artifact>, DiscoveryError> {
    let cwd = std::env::current_dir().map_err(DiscoveryError::CurrentDir)?;
    let extension = config.extension.trim_start_matches('.');

    let roots = RuleRoots::from_config(&config.roots, &cwd);

    let mut files = BTreeSet::new();
    for root in roots.iter() {
        if !root.path.is_dir() {
            tracing::warn!(root = %root.path.display(), "Discovery root not found, skipping");
            continue;
        }
        collect_files(&root.path, extension, &mut files)?;
    }

    let artifacts: Vec<Artifact> = files
        .into_iter()
        .filter_map(|path| {
            let behavior = roots.classify(&path)?;
            Some(Artifact::new(path, behavior))
        })
        .collect();

    tracing::debug!(count = artifacts.len(), "Artifact discovery finished");
    Ok(artifacts)
}

fn collect_files(
    dir: &Path,
    extension: &str,
    out: &mut BTreeSet<PathBuf>,
) -> Result<(), DiscoveryError> {
    let read_err = |source| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_err)?;

        if file_type.is_dir() {
            collect_files(&path, extension, out)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            out.insert(path);
        }
    }
    Ok(())
}
