use anyhow::Result;
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebouncedEvent, Debouncer, NoCache, new_debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Watches input files and reports which of them changed.
///
/// The parent directories are watched instead of the files themselves, so
/// editors that save by replacing the file are still picked up.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, NoCache>,
}

impl FileWatcher {
    pub fn new<F>(files: &[PathBuf], on_change: F) -> Result<Self>
    where
        F: Fn(&Path) + Send + 'static,
    {
        let files: Vec<PathBuf> = files.iter().map(|file| absolute(file)).collect();
        let watched = files.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(100),
            None,
            move |res: Result<Vec<DebouncedEvent>, _>| {
                let events = match res {
                    Ok(events) => events,
                    Err(e) => {
                        error!("Watch error: {:?}", e);
                        return;
                    }
                };

                let changed: BTreeSet<&PathBuf> = events
                    .iter()
                    .filter(|e| {
                        matches!(
                            e.event.kind,
                            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                        )
                    })
                    .flat_map(|e| e.event.paths.iter())
                    .filter_map(|path| watched.iter().find(|file| *file == path))
                    .collect();

                for file in changed {
                    info!("File modification detected: {}", file.display());
                    on_change(file);
                }
            },
        )?;

        let directories: BTreeSet<&Path> = files.iter().filter_map(|file| file.parent()).collect();
        for directory in directories {
            info!("Watching directory: {:?}", directory);
            debouncer.watch(directory, RecursiveMode::NonRecursive)?;
        }

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_owned())
}
