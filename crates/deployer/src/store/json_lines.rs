use {
    super::StoreError,
    crate::{domain::DeploymentRecord, traits::ArtifactStore},
    std::{
        collections::HashMap,
        io::ErrorKind,
        path::PathBuf,
    },
    tokio::{
        fs::{File, OpenOptions},
        io::AsyncWriteExt,
        sync::Mutex,
    },
    uuid::Uuid,
};

/// Append-only file with one JSON encoded record per line.
///
/// Every change appends the full record, so the last line for an id is its
/// current state. The file is replayed into memory when opened and each
/// append is synced to disk before it is acknowledged.
#[derive(Debug)]
pub struct JsonLines {
    path: PathBuf,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    file: File,
    /// Length of the file up to the end of the last acknowledged record.
    len: u64,
    /// A failed append may have left part of a line after `len`.
    dirty: bool,
    records: HashMap<Uuid, DeploymentRecord>,
}

impl State {
    async fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.dirty {
            self.truncate().await?;
        }
        self.dirty = true;
        self.file.write_all(line).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        self.dirty = false;
        self.len += line.len() as u64;
        Ok(())
    }

    /// Cuts off whatever follows the last acknowledged record.
    async fn truncate(&mut self) -> std::io::Result<()> {
        self.file.set_len(self.len).await?;
        self.file.sync_data().await?;
        self.dirty = false;
        Ok(())
    }
}

impl JsonLines {
    /// Opens the file, creating it if needed, and replays its records.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(io(err)),
        };
        let replay = replay(&data)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io)?;
        match replay.tail {
            Tail::Complete => (),
            Tail::Unterminated => {
                file.write_all(b"\n").await.map_err(io)?;
                file.sync_data().await.map_err(io)?;
            }
            Tail::Truncated { valid_len } => {
                // A crash in the middle of an append. The lost record was
                // never acknowledged.
                tracing::warn!(?path, "discarding incomplete deployment record");
                file.set_len(valid_len as u64).await.map_err(io)?;
                file.sync_data().await.map_err(io)?;
            }
        }

        let len = file.metadata().await.map_err(io)?.len();

        tracing::debug!(?path, records = replay.records.len(), "opened deployment records");
        Ok(Self {
            state: Mutex::new(State {
                file,
                len,
                dirty: false,
                records: replay.records,
            }),
            path,
        })
    }

    async fn append(&self, state: &mut State, record: &DeploymentRecord) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut line = serde_json::to_vec(record).map_err(StoreError::Encode)?;
        line.push(b'\n');
        if let Err(err) = state.write_line(&line).await {
            // Remove the partial line right away. If that fails too, the next
            // append retries before writing.
            if let Err(err) = state.truncate().await {
                tracing::warn!(path = ?self.path, ?err, "failed to remove partial deployment record");
            }
            return Err(io(err));
        }
        state.records.insert(record.request_id, record.clone());
        Ok(())
    }
}

struct Replay {
    records: HashMap<Uuid, DeploymentRecord>,
    tail: Tail,
}

enum Tail {
    Complete,
    /// The last record is intact but misses its line break.
    Unterminated,
    Truncated {
        valid_len: usize,
    },
}

fn replay(data: &[u8]) -> Result<Replay, StoreError> {
    let mut records = HashMap::new();
    let mut tail = Tail::Complete;
    let mut offset = 0;
    for (index, line) in data.split_inclusive(|byte| *byte == b'\n').enumerate() {
        let terminated = line.ends_with(b"\n");
        let content = line.trim_ascii();
        if !content.is_empty() {
            match serde_json::from_slice::<DeploymentRecord>(content) {
                Ok(record) => {
                    records.insert(record.request_id, record);
                    if !terminated {
                        tail = Tail::Unterminated;
                    }
                }
                Err(_) if !terminated => {
                    tail = Tail::Truncated { valid_len: offset };
                }
                Err(source) => {
                    return Err(StoreError::Corrupt {
                        line: index + 1,
                        source,
                    });
                }
            }
        }
        offset += line.len();
    }
    Ok(Replay { records, tail })
}

#[async_trait::async_trait]
impl ArtifactStore for JsonLines {
    async fn save(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.records.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate(record.request_id));
        }
        self.append(&mut state, record).await
    }

    async fn update(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        super::check_transition(state.records.get(&record.request_id), record)?;
        self.append(&mut state, record).await
    }

    async fn fetch(&self, request_id: Uuid) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.state.lock().await.records.get(&request_id).cloned())
    }

    async fn pending(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        Ok(super::pending(self.state.lock().await.records.values()))
    }
}
