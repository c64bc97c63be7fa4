//! Background asset fetching
//!
//! Reads sound files on a worker thread so a slow disk never blocks the
//! control loop. Requests and results travel over crossbeam channels;
//! callers poll for results whenever convenient.

use crossbeam_channel::{self, Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEvent {
    Loaded { sound: String, bytes: Vec<u8> },
    Failed { sound: String, error: String },
}

impl AssetEvent {
    pub fn sound(&self) -> &str {
        match self {
            AssetEvent::Loaded { sound, .. } | AssetEvent::Failed { sound, .. } => sound,
        }
    }
}

struct AssetRequest {
    sound: String,
    file: String,
}

/// Worker that loads files from one directory
pub struct AssetFetcher {
    dir: PathBuf,
    request_tx: Option<Sender<AssetRequest>>,
    event_rx: Receiver<AssetEvent>,
    worker: Option<JoinHandle<()>>,
}

impl AssetFetcher {
    /// Start the worker thread
    pub fn spawn(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<AssetRequest>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let worker_dir = dir.clone();

        let worker = thread::spawn(move || {
            for request in request_rx {
                let path = worker_dir.join(&request.file);
                let event = match std::fs::read(&path) {
                    Ok(bytes) => {
                        debug!("Fetched {} ({} bytes)", path.display(), bytes.len());
                        AssetEvent::Loaded {
                            sound: request.sound,
                            bytes,
                        }
                    }
                    Err(e) => {
                        warn!("Failed to fetch {}: {}", path.display(), e);
                        AssetEvent::Failed {
                            sound: request.sound,
                            error: format!("{}: {}", request.file, e),
                        }
                    }
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self {
            dir,
            request_tx: Some(request_tx),
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue `file` (relative to the directory) for `sound`; false if the worker is gone
    pub fn request(&self, sound: &str, file: &str) -> bool {
        match &self.request_tx {
            Some(tx) => tx
                .send(AssetRequest {
                    sound: sound.to_string(),
                    file: file.to_string(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Next finished fetch, if any
    pub fn try_next(&self) -> Option<AssetEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Block up to `timeout` for the next finished fetch
    pub fn wait_next(&self, timeout: Duration) -> Option<AssetEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for AssetFetcher {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
