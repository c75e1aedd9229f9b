//! Session store: one directory per session, one pretty-printed JSON document per
//! data type.
//!
//! Layout:
//!   <base>/<session uuid>/session_info.json
//!   <base>/<session uuid>/<data_type>.json
//!
//! Every successful write is optionally mirrored to S3 under the same relative key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::sessions::mirror::S3Mirror;

const SESSION_INFO: &str = "session_info";
pub const PROFILE_DOC: &str = "userprofile";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Invalid data type '{0}': use lowercase letters, digits and underscores")]
    InvalidDataType(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub base_dir: String,
    pub session_count: usize,
    pub s3_mirror: bool,
}

#[derive(Clone)]
pub struct SessionStore {
    base: PathBuf,
    mirror: Option<S3Mirror>,
    /// One writer per session: every read-modify-write cycle holds its session's lock.
    locks: Arc<std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl SessionStore {
    pub fn new(base: impl Into<PathBuf>, mirror: Option<S3Mirror>) -> Self {
        Self {
            base: base.into(),
            mirror,
            locks: Arc::default(),
        }
    }

    pub async fn create_session(&self) -> Result<SessionInfo, StorageError> {
        let now = Utc::now();
        let info = SessionInfo {
            session_id: Uuid::new_v4(),
            created_at: now,
            last_updated: now,
        };
        let dir = self.session_dir(info.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let value = serde_json::to_value(&info).map_err(|e| StorageError::json(&dir, e))?;
        self.write_doc(info.session_id, SESSION_INFO, &value).await?;

        info!("Created session {}", info.session_id);
        Ok(info)
    }

    pub async fn session_info(&self, session: Uuid) -> Result<SessionInfo, StorageError> {
        let path = self.ensure_session(session).await?.join(file_name(SESSION_INFO));
        let value = read_json(&path)
            .await?
            .ok_or(StorageError::SessionNotFound(session))?;
        serde_json::from_value(value).map_err(|e| StorageError::json(&path, e))
    }

    /// Saves `value` as the `data_type` document of `session`, returning the user id
    /// the document ends up carrying.
    pub async fn save(
        &self,
        session: Uuid,
        data_type: &str,
        value: Value,
        user_id: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        validate_data_type(data_type)?;
        self.ensure_session(session).await?;
        let _guard = self.lock_session(session).await;
        self.save_locked(session, data_type, value, user_id).await
    }

    /// Reads the `data_type` document (empty when absent), lets `change` edit it and
    /// writes it back, all under the session's lock. Nothing is written when `change`
    /// fails or leaves the document as it was.
    pub async fn update<T, E, F>(
        &self,
        session: Uuid,
        data_type: &str,
        user_id: Option<&str>,
        change: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut Map<String, Value>) -> Result<T, E>,
        E: From<StorageError>,
    {
        validate_data_type(data_type)?;
        let dir = self.ensure_session(session).await?;
        let _guard = self.lock_session(session).await;

        let mut doc = match read_json(&dir.join(file_name(data_type))).await? {
            Some(Value::Object(map)) => map,
            Some(other) => wrap(other),
            None => Map::new(),
        };
        let before = doc.clone();
        let out = change(&mut doc)?;

        if doc != before {
            self.save_locked(session, data_type, Value::Object(doc), user_id)
                .await?;
        }
        Ok(out)
    }

    pub async fn load(&self, session: Uuid, data_type: &str) -> Result<Option<Value>, StorageError> {
        validate_data_type(data_type)?;
        let dir = self.ensure_session(session).await?;
        read_json(&dir.join(file_name(data_type))).await
    }

    /// Appends `item` to the array under `key` in the `data_type` document and returns
    /// the updated document.
    pub async fn append(
        &self,
        session: Uuid,
        data_type: &str,
        key: &str,
        item: Value,
        user_id: Option<&str>,
    ) -> Result<Value, StorageError> {
        validate_data_type(data_type)?;
        let dir = self.ensure_session(session).await?;
        let _guard = self.lock_session(session).await;

        let mut doc = match read_json(&dir.join(file_name(data_type))).await? {
            Some(Value::Object(map)) => map,
            Some(other) => wrap(other),
            None => Map::new(),
        };

        let item = match item {
            Value::Object(mut fields) => {
                fields
                    .entry("added_at")
                    .or_insert_with(|| json!(Utc::now().to_rfc3339()));
                Value::Object(fields)
            }
            other => other,
        };

        match doc.get_mut(key) {
            Some(Value::Array(items)) => items.push(item),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, item]);
            }
            None => {
                doc.insert(key.to_string(), Value::Array(vec![item]));
            }
        }

        let doc = Value::Object(doc);
        self.save_locked(session, data_type, doc, user_id).await?;
        read_json(&dir.join(file_name(data_type)))
            .await?
            .ok_or(StorageError::SessionNotFound(session))
    }

    /// Data types stored for a session, sorted, excluding the session metadata.
    pub async fn data_types(&self, session: Uuid) -> Result<Vec<String>, StorageError> {
        let dir = self.ensure_session(session).await?;
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let mut types = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem != SESSION_INFO {
                    types.push(stem.to_string());
                }
            }
        }
        types.sort();
        Ok(types)
    }

    pub async fn list_sessions(&self) -> Result<Vec<Uuid>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.base).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.base, e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.base, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) {
                sessions.push(id);
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    pub async fn info(&self) -> Result<StorageInfo, StorageError> {
        Ok(StorageInfo {
            base_dir: self.base.display().to_string(),
            session_count: self.list_sessions().await?.len(),
            s3_mirror: self.mirror.is_some(),
        })
    }

    // ── internals ────────────────────────────────────────────────────────────

    async fn lock_session(&self, session: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(session).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn session_dir(&self, session: Uuid) -> PathBuf {
        self.base.join(session.to_string())
    }

    async fn ensure_session(&self, session: Uuid) -> Result<PathBuf, StorageError> {
        let dir = self.session_dir(session);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StorageError::SessionNotFound(session)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::SessionNotFound(session))
            }
            Err(e) => Err(StorageError::io(&dir, e)),
        }
    }

    /// Caller holds the session's lock.
    async fn save_locked(
        &self,
        session: Uuid,
        data_type: &str,
        value: Value,
        user_id: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        let path = self.session_dir(session).join(file_name(data_type));
        let previous = read_json(&path).await?;

        let mut doc = match value {
            Value::Object(map) => map,
            other => wrap(other),
        };

        if let Some(id) = user_id {
            doc.insert("user_id".to_string(), json!(id));
        } else if data_type == PROFILE_DOC && !doc.contains_key("user_id") {
            doc.insert("user_id".to_string(), json!(Uuid::new_v4().to_string()));
        }

        let now = json!(Utc::now().to_rfc3339());
        let created_at = previous
            .as_ref()
            .and_then(|p| p.get("created_at").cloned())
            .or_else(|| doc.get("created_at").cloned())
            .unwrap_or_else(|| now.clone());
        doc.insert("created_at".to_string(), created_at);
        doc.insert("updated_at".to_string(), now);

        let stored_user = doc
            .get("user_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.write_doc(session, data_type, &Value::Object(doc)).await?;
        self.touch(session).await?;
        Ok(stored_user)
    }

    async fn touch(&self, session: Uuid) -> Result<(), StorageError> {
        let path = self.session_dir(session).join(file_name(SESSION_INFO));
        let Some(Value::Object(mut info)) = read_json(&path).await? else {
            return Ok(());
        };
        info.insert("last_updated".to_string(), json!(Utc::now()));
        self.write_doc(session, SESSION_INFO, &Value::Object(info)).await
    }

    async fn write_doc(&self, session: Uuid, data_type: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.session_dir(session).join(file_name(data_type));
        let body = serde_json::to_vec_pretty(value).map_err(|e| StorageError::json(&path, e))?;

        // Write-then-rename keeps readers from seeing a half-written document.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        debug!("Wrote {}", path.display());

        if let Some(mirror) = &self.mirror {
            let key = S3Mirror::key_for(&session.to_string(), data_type);
            mirror.put(&key, body).await;
        }
        Ok(())
    }
}

fn file_name(data_type: &str) -> String {
    format!("{data_type}.json")
}

fn wrap(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("data".to_string(), value);
    map
}

fn validate_data_type(data_type: &str) -> Result<(), StorageError> {
    let valid = !data_type.is_empty()
        && data_type != SESSION_INFO
        && data_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidDataType(data_type.to_string()))
    }
}

async fn read_json(path: &Path) -> Result<Option<Value>, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::json(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}
