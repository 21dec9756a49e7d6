//! File system watcher with debouncing.
//!
//! Uses the `notify` crate (via `notify-debouncer-mini`) for platform-native
//! filesystem monitoring. Events are debounced and sent through a channel
//! to the indexing pipeline. `full_scan` walks the tree once up front for
//! `Init`/`full_reindex`; `watch` keeps running afterward for `ApplyChanges`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify_debouncer_mini::{notify::RecursiveMode, DebouncedEventKind};
use tokio::sync::mpsc;

use crate::config::{IndexingConfig, WatcherConfig};
use crate::error::{OmniError, OmniResult};
use crate::types::{Language, PipelineEvent};

/// File system watcher that emits pipeline events.
pub struct FileWatcher {
    watcher_config: WatcherConfig,
    indexing_config: IndexingConfig,
    root: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root directory.
    pub fn new(root: &Path, watcher_config: &WatcherConfig, indexing_config: &IndexingConfig) -> Self {
        Self {
            watcher_config: watcher_config.clone(),
            indexing_config: indexing_config.clone(),
            root: root.to_path_buf(),
        }
    }

    /// Start watching for file changes. Blocks until the underlying
    /// watcher's channel closes (the watcher/debouncer is dropped) or the
    /// receiving side hangs up. Intended to run on its own task.
    pub async fn watch(&self, tx: mpsc::Sender<PipelineEvent>) -> OmniResult<()> {
        let root = self.root.clone();
        let debounce_ms = self.watcher_config.debounce_ms;
        let globset = build_globset(&self.indexing_config.exclude_patterns)?;

        tracing::info!(root = %root.display(), "file watcher starting");

        tokio::task::spawn_blocking(move || -> OmniResult<()> {
            let (std_tx, std_rx) = std::sync::mpsc::channel();
            let mut debouncer = notify_debouncer_mini::new_debouncer(
                Duration::from_millis(debounce_ms),
                move |result| {
                    let _ = std_tx.send(result);
                },
            )
            .map_err(|e| OmniError::Internal(format!("failed to create file watcher: {e}")))?;

            debouncer
                .watcher()
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| {
                    OmniError::Internal(format!("failed to watch {}: {e}", root.display()))
                })?;

            for batch in std_rx {
                match batch {
                    Ok(events) => {
                        for event in events {
                            if is_excluded(&globset, &root, &event.path) {
                                continue;
                            }
                            if !matches!(
                                event.kind,
                                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                            ) {
                                continue;
                            }

                            let pipeline_event = if event.path.exists() {
                                PipelineEvent::FileChanged { path: event.path }
                            } else {
                                PipelineEvent::FileDeleted { path: event.path }
                            };

                            if tx.blocking_send(pipeline_event).is_err() {
                                // Receiver dropped; nothing more to do.
                                return Ok(());
                            }
                        }
                    }
                    Err(errors) => {
                        tracing::warn!(?errors, "file watcher reported errors");
                    }
                }
            }

            Ok(())
        })
        .await
        .map_err(|e| OmniError::Internal(format!("watcher task panicked: {e}")))?
    }

    /// Walk the whole tree once, sending `FileChanged` for every eligible
    /// file. Intended to run on a blocking thread (`spawn_blocking`) since
    /// it does synchronous directory I/O and uses `blocking_send`.
    pub fn full_scan(&self, tx: &mpsc::Sender<PipelineEvent>) -> OmniResult<usize> {
        let globset = build_globset(&self.indexing_config.exclude_patterns)?;
        let mut discovered = Vec::new();
        walk_dir(
            &self.root,
            self.indexing_config.follow_symlinks,
            &globset,
            &self.root,
            &mut discovered,
        )?;

        let mut emitted = 0usize;
        for path in discovered {
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            if metadata.len() > self.indexing_config.max_file_size {
                tracing::debug!(path = %path.display(), size = metadata.len(), "skipping oversized file");
                continue;
            }
            if !is_probably_text(&path) {
                continue;
            }

            if tx.blocking_send(PipelineEvent::FileChanged { path }).is_err() {
                break;
            }
            emitted += 1;
        }

        Ok(emitted)
    }
}

/// Build a matcher from the configured exclude patterns. Each pattern is
/// checked against every path component, so both plain directory names
/// (`.git`, `node_modules`) and filename globs (`*.lock`) work the same way.
fn build_globset(patterns: &[String]) -> OmniResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| OmniError::Config {
            details: format!("invalid exclude pattern '{pattern}': {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| OmniError::Config {
        details: format!("failed to compile exclude patterns: {e}"),
    })
}

fn is_excluded(globset: &GlobSet, root: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().any(|component| {
        let segment = component.as_os_str().to_string_lossy();
        globset.is_match(segment.as_ref())
    })
}

fn walk_dir(
    dir: &Path,
    follow_symlinks: bool,
    globset: &GlobSet,
    root: &Path,
    out: &mut Vec<PathBuf>,
) -> OmniResult<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to read directory, skipping");
            return Ok(());
        }
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if is_excluded(globset, root, &path) {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_symlink() && !follow_symlinks {
            continue;
        }

        if file_type.is_dir() {
            walk_dir(&path, follow_symlinks, globset, root, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }

    Ok(())
}

/// Cheap binary-file heuristic: a recognized code/document extension is
/// always text; otherwise sniff the first few KB for a NUL byte (the same
/// heuristic grep/ripgrep use to skip binaries).
fn is_probably_text(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = Language::from_extension(ext);
    if language.is_code() || language.is_document() {
        return true;
    }

    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let sniff_len = bytes.len().min(8192);
    !bytes[..sniff_len].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_globset_matches_plain_and_glob_patterns() {
        let globset = build_globset(&[".git".into(), "*.lock".into()]).expect("build globset");
        assert!(globset.is_match(".git"));
        assert!(globset.is_match("Cargo.lock"));
        assert!(!globset.is_match("main.rs"));
    }

    #[test]
    fn test_full_scan_skips_excluded_dirs_and_finds_source_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        std::fs::create_dir_all(root.join("node_modules")).expect("mkdir");
        std::fs::write(root.join("node_modules/vendored.js"), "ignored").expect("write");
        std::fs::write(root.join("main.py"), "print('hi')").expect("write");

        let watcher_config = WatcherConfig::default();
        let indexing_config = IndexingConfig::default();
        let watcher = FileWatcher::new(root, &watcher_config, &indexing_config);

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let count = watcher.full_scan(&tx).expect("full scan");
        drop(tx);

        assert_eq!(count, 1);
        let event = rx.blocking_recv().expect("one event");
        match event {
            PipelineEvent::FileChanged { path } => {
                assert_eq!(path.file_name().unwrap(), "main.py");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_full_scan_skips_oversized_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        std::fs::write(root.join("big.py"), "x".repeat(1024)).expect("write");

        let watcher_config = WatcherConfig::default();
        let mut indexing_config = IndexingConfig::default();
        indexing_config.max_file_size = 100;
        let watcher = FileWatcher::new(root, &watcher_config, &indexing_config);

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let count = watcher.full_scan(&tx).expect("full scan");
        drop(tx);

        assert_eq!(count, 0);
        assert!(rx.blocking_recv().is_none());
    }
}
