use anyhow::Context as _;
use mini_recon::session::{Action, Session, Side};
use mini_recon::{CsvCodec, RecordCodec};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct FileChangeEvent;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<Mutex<Session>>,
    pub codec: CsvCodec,
    pub file_change_tx: broadcast::Sender<FileChangeEvent>,

    /// Files given on startup, reloaded whenever they change on disk.
    pub watched: Arc<Vec<(Side, PathBuf)>>,
}

impl AppState {
    pub fn new(
        codec: CsvCodec,
        watched: Vec<(Side, PathBuf)>,
        file_change_tx: broadcast::Sender<FileChangeEvent>,
    ) -> Self {
        let state = Self {
            inner: Arc::new(Mutex::new(Session::default())),
            codec,
            file_change_tx,
            watched: Arc::new(watched),
        };
        for (side, path) in state.watched.iter() {
            state.load_path(*side, path);
        }
        state
    }

    /// Run one transition and return a snapshot of the resulting session.
    pub fn dispatch(&self, action: Action) -> Session {
        let mut inner = self.inner.lock().unwrap();
        let next = std::mem::take(&mut *inner).apply(action);
        *inner = next;
        inner.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.lock().unwrap().clone()
    }

    /// Parse uploaded text into one side. On failure the session already
    /// carries the error message when this returns `Err`.
    pub fn load_text(&self, side: Side, name: String, text: &str) -> Result<Session, Session> {
        self.dispatch(Action::LoadStarted {
            side,
            name: name.clone(),
        });
        match self.codec.parse(text) {
            Ok(records) => {
                tracing::info!("Loaded {} records into {:?} from {}", records.len(), side, name);
                Ok(self.dispatch(Action::Loaded {
                    side,
                    name,
                    records,
                }))
            }
            Err(error) => {
                tracing::warn!("Failed to parse {}: {:#}", name, error);
                Err(self.dispatch(Action::LoadFailed {
                    side,
                    name,
                    error: format!("{error:#}"),
                }))
            }
        }
    }

    pub fn load_path(&self, side: Side, path: &Path) {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
        match text {
            Ok(text) => {
                // a parse failure is already recorded in the session
                let _ = self.load_text(side, name, &text);
            }
            Err(error) => {
                tracing::warn!("{:#}", error);
                self.dispatch(Action::LoadFailed {
                    side,
                    name,
                    error: format!("{error:#}"),
                });
            }
        }
    }

    /// Reload a watched file after it changed and tell connected clients.
    pub fn reload(&self, changed: &Path) {
        for (side, path) in self.watched.iter() {
            if std::path::absolute(path).is_ok_and(|path| path == changed) {
                self.load_path(*side, path);
            }
        }
        // no subscribers is fine
        let _ = self.file_change_tx.send(FileChangeEvent);
    }
}
