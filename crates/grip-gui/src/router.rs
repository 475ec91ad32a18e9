//! Background listing and download for the viewer.
//!
//! Store traffic runs on a worker thread so the UI never blocks on it. Each
//! command carries the shared cached store, and every download completion
//! carries the navigation ticket it was issued against; the app discards
//! completions whose ticket has been superseded by a newer selection.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use grip_lib::frame::SensorFrame;
use grip_lib::nav::Generation;
use grip_lib::record::FileRecord;
use grip_lib::storage::{CachedStore, LocalDirStore};

use crate::store::ViewStore;

/// Listing id of a local store root.
const ROOT_FOLDER: &str = "";

pub type SharedStore = Arc<CachedStore<LocalDirStore>>;

pub enum FetchCommand {
    Relist {
        root: String,
        store: SharedStore,
    },
    Load {
        ticket: Generation,
        record: FileRecord,
        store: SharedStore,
    },
    Shutdown,
}

pub enum FetchUpdate {
    Listing {
        root: String,
        result: Result<Arc<Vec<FileRecord>>, String>,
    },
    Recording {
        ticket: Generation,
        name: String,
        result: Result<SensorFrame, String>,
    },
}

pub struct FetchRouter {
    store: ViewStore,
    command_tx: Sender<FetchCommand>,
    update_rx: Receiver<FetchUpdate>,
    worker: Option<JoinHandle<()>>,
}

impl FetchRouter {
    pub fn new(store: ViewStore) -> Self {
        let (command_tx, command_rx) = bounded(32);
        let (update_tx, update_rx) = bounded(32);
        let worker = std::thread::spawn(move || FetchWorker::new(command_rx, update_tx).run());
        Self {
            store,
            command_tx,
            update_rx,
            worker: Some(worker),
        }
    }

    pub fn relist(&self, files: SharedStore, root: String) {
        let _ = self.command_tx.send(FetchCommand::Relist { root, store: files });
    }

    pub fn fetch(&self, files: SharedStore, ticket: Generation, record: FileRecord) {
        let _ = self.command_tx.send(FetchCommand::Load {
            ticket,
            record,
            store: files,
        });
    }

    /// Drains every update the worker has finished since the last frame.
    pub fn poll(&mut self) -> Vec<FetchUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.update_rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

struct FetchWorker {
    command_rx: Receiver<FetchCommand>,
    update_tx: Sender<FetchUpdate>,
}

impl FetchWorker {
    fn new(command_rx: Receiver<FetchCommand>, update_tx: Sender<FetchUpdate>) -> Self {
        Self {
            command_rx,
            update_tx,
        }
    }

    fn run(self) {
        while let Ok(command) = self.command_rx.recv() {
            match command {
                FetchCommand::Relist { root, store } => {
                    let result = store.list_all(ROOT_FOLDER).map_err(|err| err.to_string());
                    let _ = self.update_tx.send(FetchUpdate::Listing { root, result });
                }
                FetchCommand::Load {
                    ticket,
                    record,
                    store,
                } => {
                    let result = store
                        .download(&record.id)
                        .map_err(|err| err.to_string())
                        .and_then(|bytes| {
                            SensorFrame::from_slice(&bytes).map_err(|err| err.to_string())
                        });
                    let _ = self.update_tx.send(FetchUpdate::Recording {
                        ticket,
                        name: record.name,
                        result,
                    });
                }
                FetchCommand::Shutdown => break,
            }
        }
    }
}

impl Deref for FetchRouter {
    type Target = ViewStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for FetchRouter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

impl Drop for FetchRouter {
    fn drop(&mut self) {
        let _ = self.command_tx.send(FetchCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
