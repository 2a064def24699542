use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;
use wit_common::State;

use crate::error::StoreError;

pub const STATE_FILE_NAME: &str = "state.json";

/// Owner of the single persisted [`State`] record.
///
/// Each call is atomic on its own; composing `get` and `set` is not.
pub trait StateStore: Send + Sync + 'static {
    fn get(&self) -> impl Future<Output = Result<State, StoreError>> + Send;
    fn set(&self, state: &State) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Clone)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(data_dir.as_ref().join(STATE_FILE_NAME)),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_ref()
    }
}

impl StateStore for JsonFileStore {
    async fn get(&self) -> Result<State, StoreError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.path()).await {
            Ok(raw) => serde_json::from_slice::<State>(&raw).map_err(|source| StoreError::Malformed {
                path: self.path().to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(State::default()),
            Err(source) => Err(StoreError::Io {
                path: self.path().to_path_buf(),
                source,
            }),
        }
    }

    async fn set(&self, state: &State) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(state).map_err(StoreError::Encode)?;
        let io_error = |source| StoreError::Io {
            path: self.path().to_path_buf(),
            source,
        };

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path().parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(self.path(), payload)
            .await
            .map_err(io_error)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use super::*;

    /// In-memory store that counts writes and can be told to fail reads.
    #[derive(Default)]
    pub struct MemoryStore {
        state: Mutex<State>,
        writes: AtomicUsize,
        fail_reads: AtomicBool,
    }

    impl MemoryStore {
        pub fn with_state(state: State) -> Self {
            Self {
                state: Mutex::new(state),
                ..Self::default()
            }
        }

        pub fn snapshot(&self) -> State {
            self.state.lock().unwrap().clone()
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }
    }

    impl StateStore for MemoryStore {
        async fn get(&self) -> Result<State, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    path: PathBuf::from("memory"),
                    source: std::io::Error::other("read refused"),
                });
            }
            Ok(self.snapshot())
        }

        async fn set(&self, state: &State) -> Result<(), StoreError> {
            *self.state.lock().unwrap() = state.clone();
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
