//! The context store: durable key/value state shared by separate invocations.
//!
//! A context is a flat JSON object kept in a single file (`context.json` by
//! default). Keys are free-form but conventionally dot-namespaced, e.g.
//! `L2_A.ChainID` or `L2_A.Emitted.default`. It is loaded whole at the start
//! of an invocation and every mutation is written through to disk before the
//! mutating call returns, so a command that fails half-way keeps the keys it
//! already committed.
//!
//! # Concurrency
//!
//! By default a [`Context`] holds an exclusive lock on `<backing>.lock` for
//! its whole lifetime and persists with temp-file-plus-rename, so a second
//! invocation against the same backing fails fast instead of clobbering it.
//! Both are controlled through [`ContextOptions`].

pub mod persist;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::errors::ContextError;

pub use persist::{SessionLock, WriteMode};

/// Conventional name of the backing file.
pub const DEFAULT_CONTEXT_FILE: &str = "context.json";

/// Persistence behaviour for a context backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub write_mode: WriteMode,
    pub lock: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::Atomic,
            lock: true,
        }
    }
}

/// Live handle to the shared context for one invocation.
#[derive(Debug)]
pub struct Context {
    path: PathBuf,
    data: Map<String, Value>,
    options: ContextOptions,
    _lock: Option<SessionLock>,
}

impl Context {
    /// Load the context at `path`. A missing file yields an empty context;
    /// an unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>, options: ContextOptions) -> Result<Self, ContextError> {
        let path = path.as_ref().to_path_buf();
        let lock = if options.lock {
            Some(SessionLock::acquire(&path)?)
        } else {
            None
        };

        let data = match std::fs::read_to_string(&path) {
            Ok(content) => parse(&path, &content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(ContextError::Read { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = data.len(), "context loaded");

        Ok(Self {
            path,
            data,
            options,
            _lock: lock,
        })
    }

    /// Path of the durable backing.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    /// Value stored under `key`, or `None` if it was never set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Like [`get`](Self::get), but absence is a `KeyNotFound` error.
    pub fn require(&self, key: &str) -> Result<&Value, ContextError> {
        self.data.get(key).ok_or_else(|| ContextError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// String value under `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Insert or overwrite `key`, then persist the whole context.
    ///
    /// If the write fails the in-memory value is restored, so the handle
    /// never holds a mutation that is not on disk.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ContextError> {
        let key = key.into();
        let previous = self.data.insert(key.clone(), value.into());

        if let Err(err) = self.persist(Some(&key)) {
            match previous {
                Some(old) => self.data.insert(key, old),
                None => self.data.remove(&key),
            };
            return Err(err);
        }

        tracing::debug!(key = %key, path = %self.path.display(), "context key set");
        Ok(())
    }

    /// Remove `key` and persist. Returns the old value, if any.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, ContextError> {
        let Some(previous) = self.data.remove(key) else {
            return Ok(None);
        };

        if let Err(err) = self.persist(Some(key)) {
            self.data.insert(key.to_string(), previous);
            return Err(err);
        }

        tracing::debug!(key = %key, "context key removed");
        Ok(Some(previous))
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole context as a JSON object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Flush the full context to disk.
    pub fn save(&self) -> Result<(), ContextError> {
        self.persist(None)
    }

    fn persist(&self, key: Option<&str>) -> Result<(), ContextError> {
        let bytes = render(&self.data);
        persist::write_bytes(&self.path, &bytes, self.options.write_mode).map_err(|source| {
            ContextError::Write {
                path: self.path.clone(),
                key: key.map(str::to_string),
                source,
            }
        })
    }
}

fn parse(path: &Path, content: &str) -> Result<Map<String, Value>, ContextError> {
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(content).map_err(|source| ContextError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ContextError::NotAnObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Pretty JSON with a 4-space indent and a trailing newline.
fn render(data: &Map<String, Value>) -> Vec<u8> {
    use serde::Serialize;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    // Serializing a map of `Value`s into a Vec cannot fail.
    if data.serialize(&mut ser).is_ok() {
        buf.push(b'\n');
    }
    buf
}
