//! Gitignore-filtered project copy
//!
//! Copies the input tree into the output tree before the transform runs.
//! Every `.gitignore` in the tree contributes patterns, `.git` directories
//! are always skipped, and ignored directories are pruned whole.

use std::{fs, path::Path, time::Instant};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ObfuscateError, ObfuscateResult};

/// Copy phase counters.
#[derive(Debug, Default)]
pub struct CopySummary {
    pub files_copied: usize,
    pub dirs_created: usize,
    pub paths_skipped_by_gitignore: usize,
    pub paths_skipped_git_dir: usize,
    pub elapsed_ms: u64,
}

/// Copy `input_root` to `output_root`, honoring ignore rules.
pub fn copy_project(input_root: &Path, output_root: &Path) -> ObfuscateResult<CopySummary> {
    let started = Instant::now();
    let matcher = build_matcher(input_root)?;

    fs::create_dir_all(output_root).map_err(|err| ObfuscateError::Io {
        path: output_root.to_path_buf(),
        source: err,
    })?;

    let mut summary = CopySummary::default();
    let mut walker = WalkDir::new(input_root).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map_or_else(|| input_root.to_path_buf(), Path::to_path_buf);
            ObfuscateError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.depth() == 0 {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(input_root)
            .expect("walked path is under the input root");
        let is_dir = entry.file_type().is_dir();

        if is_dir && entry.file_name() == ".git" {
            summary.paths_skipped_git_dir += 1;
            walker.skip_current_dir();
            continue;
        }
        if matcher.matched(relative, is_dir).is_ignore() {
            debug!("skipping {} (gitignore)", relative.display());
            summary.paths_skipped_by_gitignore += 1;
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let destination = output_root.join(relative);
        if is_dir {
            fs::create_dir_all(&destination).map_err(|err| ObfuscateError::Io {
                path: destination.clone(),
                source: err,
            })?;
            summary.dirs_created += 1;
        } else if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &destination)?;
            summary.files_copied += 1;
        } else {
            fs::copy(entry.path(), &destination).map_err(|err| ObfuscateError::Io {
                path: destination.clone(),
                source: err,
            })?;
            summary.files_copied += 1;
        }
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(summary)
}

/// Combine every `.gitignore` under the input root into one matcher.
fn build_matcher(input_root: &Path) -> ObfuscateResult<Gitignore> {
    let mut builder = GitignoreBuilder::new(input_root);
    let mut ignore_files = Vec::new();
    for entry in WalkDir::new(input_root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map_or_else(|| input_root.to_path_buf(), Path::to_path_buf);
            ObfuscateError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_file() && entry.file_name() == ".gitignore" {
            ignore_files.push(entry.path().to_path_buf());
        }
    }
    for ignore_file in ignore_files {
        if let Some(err) = builder.add(&ignore_file) {
            warn!("failed to read {}: {err}", ignore_file.display());
        }
    }
    builder.build().map_err(|err| ObfuscateError::Io {
        path: input_root.to_path_buf(),
        source: std::io::Error::other(err),
    })
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> ObfuscateResult<()> {
    let target = fs::read_link(source).map_err(|err| ObfuscateError::Io {
        path: source.to_path_buf(),
        source: err,
    })?;
    std::os::unix::fs::symlink(&target, destination).map_err(|err| ObfuscateError::Io {
        path: destination.to_path_buf(),
        source: err,
    })
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> ObfuscateResult<()> {
    fs::copy(source, destination)
        .map(|_| ())
        .map_err(|err| ObfuscateError::Io {
            path: destination.to_path_buf(),
            source: err,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_copy_honors_gitignore() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        write(&input.path().join(".gitignore"), "*.log\nbuild/\n");
        write(&input.path().join("app.py"), "x = 1\n");
        write(&input.path().join("debug.log"), "noise\n");
        write(&input.path().join("build/out.py"), "y = 2\n");
        write(&input.path().join(".git/config"), "[core]\n");

        let summary = copy_project(input.path(), output.path()).unwrap();
        assert!(output.path().join("app.py").exists());
        assert!(output.path().join(".gitignore").exists());
        assert!(!output.path().join("debug.log").exists());
        assert!(!output.path().join("build").exists());
        assert!(!output.path().join(".git").exists());
        assert_eq!(summary.paths_skipped_git_dir, 1);
        assert_eq!(summary.paths_skipped_by_gitignore, 2);
        assert_eq!(summary.files_copied, 2);
    }

    #[test]
    fn test_nested_gitignore_applies() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        write(&input.path().join(".gitignore"), "");
        write(&input.path().join("pkg/.gitignore"), "cache.py\n");
        write(&input.path().join("pkg/cache.py"), "tmp = 1\n");
        write(&input.path().join("pkg/mod.py"), "x = 1\n");

        copy_project(input.path(), output.path()).unwrap();
        assert!(output.path().join("pkg/mod.py").exists());
        assert!(!output.path().join("pkg/cache.py").exists());
    }

    #[test]
    fn test_copy_preserves_contents() {
        let input = tempfile::TempDir::new().unwrap();
        let output = tempfile::TempDir::new().unwrap();
        write(&input.path().join(".gitignore"), "");
        write(&input.path().join("data.py"), "payload = '\\x00binary-ish'\n");

        copy_project(input.path(), output.path()).unwrap();
        let copied = fs::read_to_string(output.path().join("data.py")).unwrap();
        assert_eq!(copied, "payload = '\\x00binary-ish'\n");
    }
}
