use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use indexmap::IndexMap;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    bucket_store::{BucketStore, BucketTransaction},
    models::{BucketEntity, DrawRecordEntity, UserCooldownEntity},
    storage::StorageResult,
};

use super::{
    error::{FileResult, FileStoreError},
    models::{BUCKET_FILE_NAME, FileDocument},
};

/// JSON document store rooted at a data directory.
///
/// Writes go through a temporary file and an atomic rename so readers never
/// observe a half-written document. The in-process gate serializes writers of
/// this handle only; other processes are not excluded.
///
/// The whole document is rewritten on every commit, draw history included.
/// History is never trimmed, so each write costs time and space proportional
/// to the number of draws ever recorded.
#[derive(Clone)]
pub struct FileBucketStore {
    inner: Arc<FileInner>,
}

struct FileInner {
    data_dir: PathBuf,
    path: PathBuf,
    write_gate: Mutex<()>,
}

impl FileBucketStore {
    /// Open the store, creating the data directory when missing.
    pub fn open(data_dir: impl Into<PathBuf>) -> FileResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|source| FileStoreError::CreateDir {
            path: data_dir.clone(),
            source,
        })?;

        let path = data_dir.join(BUCKET_FILE_NAME);
        Ok(Self {
            inner: Arc::new(FileInner {
                data_dir,
                path,
                write_gate: Mutex::new(()),
            }),
        })
    }

    /// Location of the bucket document.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn read_document(&self) -> FileResult<Option<FileDocument>> {
        let path = self.path();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FileStoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| FileStoreError::Decode {
                path: path.to_path_buf(),
                source,
            })
    }

    fn write_document(&self, document: &FileDocument) -> FileResult<()> {
        let payload = serde_json::to_vec_pretty(document)
            .map_err(|source| FileStoreError::Encode { source })?;

        let tmp_path = self
            .inner
            .data_dir
            .join(format!(".{BUCKET_FILE_NAME}.{}.tmp", Uuid::new_v4()));

        let written = fs::write(&tmp_path, payload).and_then(|()| fs::rename(&tmp_path, self.path()));
        if let Err(source) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(FileStoreError::Write {
                path: self.path().to_path_buf(),
                source,
            });
        }

        Ok(())
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.inner
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl BucketStore for FileBucketStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn begin(&self) -> StorageResult<Box<dyn BucketTransaction + '_>> {
        let gate = self.gate();
        let document = match self.read_document() {
            Ok(document) => document,
            Err(err @ FileStoreError::Decode { .. }) => {
                warn!(error = %err, "bucket file is corrupt; it will be replaced on commit");
                None
            }
            Err(err) => return Err(err.into()),
        };

        let (bucket, draw_history, user_cooldowns) = match document {
            Some(document) => (
                Some(document.bucket),
                document.draw_history,
                document.user_cooldowns,
            ),
            None => (None, Vec::new(), IndexMap::new()),
        };

        Ok(Box::new(FileTransaction {
            store: self,
            _gate: gate,
            bucket,
            draw_history,
            user_cooldowns,
        }))
    }

    fn load_bucket(&self) -> StorageResult<Option<BucketEntity>> {
        Ok(self.read_document()?.map(|document| document.bucket))
    }

    fn find_cooldown(&self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        Ok(self
            .read_document()?
            .and_then(|mut document| document.user_cooldowns.swap_remove(user)))
    }

    fn recent_draws(&self, limit: usize) -> StorageResult<Vec<DrawRecordEntity>> {
        Ok(self
            .read_document()?
            .map(|document| {
                document
                    .draw_history
                    .into_iter()
                    .rev()
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn health_check(&self) -> StorageResult<()> {
        let metadata =
            fs::metadata(&self.inner.data_dir).map_err(|source| FileStoreError::Read {
                path: self.inner.data_dir.clone(),
                source,
            })?;
        if metadata.permissions().readonly() {
            return Err(FileStoreError::Write {
                path: self.inner.data_dir.clone(),
                source: ErrorKind::PermissionDenied.into(),
            }
            .into());
        }
        Ok(())
    }
}

struct FileTransaction<'a> {
    store: &'a FileBucketStore,
    _gate: MutexGuard<'a, ()>,
    bucket: Option<BucketEntity>,
    draw_history: Vec<DrawRecordEntity>,
    user_cooldowns: IndexMap<String, UserCooldownEntity>,
}

impl BucketTransaction for FileTransaction<'_> {
    fn load(&mut self) -> StorageResult<Option<BucketEntity>> {
        Ok(self.bucket.clone())
    }

    fn find_cooldown(&mut self, user: &str) -> StorageResult<Option<UserCooldownEntity>> {
        Ok(self.user_cooldowns.get(user).cloned())
    }

    fn save(&mut self, bucket: &BucketEntity) -> StorageResult<()> {
        self.bucket = Some(bucket.clone());
        Ok(())
    }

    fn append_draw(&mut self, record: &DrawRecordEntity) -> StorageResult<()> {
        self.draw_history.push(record.clone());
        Ok(())
    }

    fn upsert_cooldown(&mut self, cooldown: &UserCooldownEntity) -> StorageResult<()> {
        self.user_cooldowns
            .insert(cooldown.user.clone(), cooldown.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let FileTransaction {
            store,
            _gate,
            bucket,
            draw_history,
            user_cooldowns,
        } = *self;

        let bucket = bucket.ok_or_else(|| FileStoreError::NothingStaged {
            path: store.path().to_path_buf(),
        })?;

        store
            .write_document(&FileDocument::new(bucket, draw_history, user_cooldowns))
            .map_err(Into::into)
    }
}
