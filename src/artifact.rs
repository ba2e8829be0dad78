// パス: src/artifact.rs
// 役割: 生成物の書き出し先（メモリ/ディスク）を抽象化する
// 意図: REPL ではファイルシステムを触らずに成果物を保持し、明示指定時のみディスクへ書く
// 関連ファイル: src/pipeline/codegen.rs, src/repl/adapter.rs, src/pipeline/context.rs
//! 成果物ストア
//!
//! - `ArtifactStore` は `write(path, bytes)` / `read(path)` の最小インタフェース。
//! - `MemoryStore` は追記型。同じパスへの再書き込みは内容を置き換えるが、パスは消えない。
//! - `DiskStore` はルートディレクトリ配下にだけ書き込む。

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

/// 成果物ストアで発生しうるエラー種別。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),
}

pub trait ArtifactStore: Debug {
    fn write(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    fn contains(&self, path: &str) -> bool;
    /// 格納済みのパス（名前順）。
    fn paths(&self) -> Vec<String>;
}

/// 対話間で共有されるストア。単一スレッド前提。
pub type SharedStore = Rc<RefCell<dyn ArtifactStore>>;

/// 相対パスで、親ディレクトリへの参照を含まないことを確認する。
fn validate(path: &str) -> Result<&Path, StoreError> {
    let p = Path::new(path);
    let ok = !path.is_empty()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(p)
    } else {
        Err(StoreError::InvalidPath(path.to_string()))
    }
}

/// メモリ上の成果物ストア。
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate(path)?;
        self.files.insert(path.to_string(), bytes);
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}

/// ディスク上の成果物ストア。
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl ArtifactStore for DiskStore {
    fn write(&mut self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let full = self.root.join(validate(path)?);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }
        fs::write(&full, bytes).map_err(|e| Self::io_error(&full, e))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.root.join(validate(path)?);
        match fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(Self::io_error(&full, e)),
        }
    }

    fn contains(&self, path: &str) -> bool {
        validate(path)
            .map(|p| self.root.join(p).is_file())
            .unwrap_or(false)
    }

    fn paths(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut out: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// メモリストアは同じパスへの再書き込みで内容だけを置き換える。
    fn memory_store_is_append_only_by_path() {
        let mut store = MemoryStore::new();
        store.write("a.tlir", b"1".to_vec()).unwrap();
        store.write("b.tlir", b"2".to_vec()).unwrap();
        store.write("a.tlir", b"3".to_vec()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read("a.tlir").unwrap(), b"3");
        assert_eq!(store.paths(), vec!["a.tlir", "b.tlir"]);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.read("x"), Err(StoreError::NotFound(_))));
    }

    #[test]
    /// 親ディレクトリへ抜けるパスや絶対パスは拒否される。
    fn rejects_escaping_paths() {
        let mut store = MemoryStore::new();
        for bad in ["../x", "/etc/passwd", ""] {
            assert!(matches!(
                store.write(bad, Vec::new()),
                Err(StoreError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn disk_store_round_trips_through_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DiskStore::new(dir.path());
        store.write("M.tlir", b"{}".to_vec()).unwrap();
        assert!(store.contains("M.tlir"));
        assert_eq!(store.read("M.tlir").unwrap(), b"{}");
        assert_eq!(store.paths(), vec!["M.tlir"]);
        assert!(matches!(store.read("N.tlir"), Err(StoreError::NotFound(_))));
    }
}
