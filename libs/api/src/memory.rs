use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::fs::{parent_dir, DistributedFs, FileStatus};
use crate::{FsError, FsErrorKind};

// ═══════════════════════════════════════════════════════════════
//  Operation log / fault injection
// ═══════════════════════════════════════════════════════════════

/// Record of a filesystem call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsOp {
    Status(String),
    List(String),
    Mkdirs(String),
    Create { path: String, overwrite: bool },
    Append(String),
    Read(String),
}

impl FsOp {
    pub fn path(&self) -> &str {
        match self {
            FsOp::Status(p) | FsOp::List(p) | FsOp::Mkdirs(p) | FsOp::Append(p) | FsOp::Read(p) => p,
            FsOp::Create { path, .. } => path,
        }
    }
}

/// Операция, на которую можно навесить сбой.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Status,
    Mkdirs,
    Create,
    Append,
    Read,
}

#[derive(Debug)]
struct Fault {
    op: FaultOp,
    path: String,
    kind: FsErrorKind,
    remaining: u32,
}

#[derive(Debug, Default)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    ops: Vec<FsOp>,
    faults: Vec<Fault>,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryFs
// ═══════════════════════════════════════════════════════════════

/// In-memory `DistributedFs` with HDFS-like semantics: `append` requires
/// an existing file, `create` without overwrite refuses existing paths.
///
/// Every call is logged; faults can be injected per operation and path
/// (single- or multi-shot), or globally with `set_unreachable`.
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: Mutex<State>,
    unreachable: AtomicBool,
}

impl MemoryFs {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock().dirs.insert("/".to_string());
        fs
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every call with an `Io` error (simulates the namenode being down).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Fail the next `times` calls of `op` on `path` with an error of `kind`.
    pub fn inject_fault(&self, op: FaultOp, path: &str, kind: FsErrorKind, times: u32) {
        self.lock().faults.push(Fault {
            op,
            path: path.to_string(),
            kind,
            remaining: times,
        });
    }

    /// Положить файл напрямую, минуя лог операций.
    pub fn seed_file(&self, path: &str, data: &[u8]) {
        let mut state = self.lock();
        insert_ancestors(&mut state.dirs, path);
        state.files.insert(path.to_string(), data.to_vec());
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Содержимое файла как строки JSON Lines.
    pub fn lines(&self, path: &str) -> Vec<String> {
        self.contents(path)
            .map(|b| String::from_utf8_lossy(&b).lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(path)
    }

    pub fn ops(&self) -> Vec<FsOp> {
        self.lock().ops.clone()
    }

    /// Log the call, then apply a pending fault if one matches.
    fn enter(&self, op: FsOp, fault_op: Option<FaultOp>) -> Result<MutexGuard<'_, State>, FsError> {
        let mut state = self.lock();
        let path = op.path().to_string();
        state.ops.push(op);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(FsError::io(format!("connection refused: {path}")));
        }

        if let Some(fault_op) = fault_op {
            if let Some(idx) = state
                .faults
                .iter()
                .position(|f| f.op == fault_op && f.path == path && f.remaining > 0)
            {
                let fault = &mut state.faults[idx];
                fault.remaining -= 1;
                let kind = fault.kind;
                if fault.remaining == 0 {
                    state.faults.remove(idx);
                }
                return Err(FsError::new(kind, format!("injected {kind} on {path}")));
            }
        }

        Ok(state)
    }
}

fn insert_ancestors(dirs: &mut BTreeSet<String>, path: &str) {
    let mut current = parent_dir(path);
    while let Some(dir) = current {
        if !dirs.insert(dir.to_string()) {
            break;
        }
        current = parent_dir(dir);
    }
}

impl DistributedFs for MemoryFs {
    fn status<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Option<FileStatus>, FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let state = self.enter(FsOp::Status(path.to_string()), Some(FaultOp::Status))?;
            if state.dirs.contains(path) {
                return Ok(Some(FileStatus::directory()));
            }
            Ok(state.files.get(path).map(|b| FileStatus::file(b.len() as u64)))
        })
    }

    fn list<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<String>, FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let state = self.enter(FsOp::List(path.to_string()), None)?;
            if !state.dirs.contains(path) {
                return Err(FsError::not_found(path));
            }
            let children = state
                .dirs
                .iter()
                .chain(state.files.keys())
                .filter(|p| parent_dir(p) == Some(path))
                .filter_map(|p| p.rsplit('/').next().map(str::to_string))
                .collect::<BTreeSet<_>>();
            Ok(children.into_iter().collect())
        })
    }

    fn mkdirs<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut state = self.enter(FsOp::Mkdirs(path.to_string()), Some(FaultOp::Mkdirs))?;
            if state.files.contains_key(path) {
                return Err(FsError::already_exists(path));
            }
            insert_ancestors(&mut state.dirs, path);
            state.dirs.insert(path.to_string());
            Ok(())
        })
    }

    fn create<'a>(&'a self, path: &'a str, data: &'a [u8], overwrite: bool)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let op = FsOp::Create { path: path.to_string(), overwrite };
            let mut state = self.enter(op, Some(FaultOp::Create))?;
            if state.dirs.contains(path) || (!overwrite && state.files.contains_key(path)) {
                return Err(FsError::already_exists(path));
            }
            insert_ancestors(&mut state.dirs, path);
            state.files.insert(path.to_string(), data.to_vec());
            Ok(())
        })
    }

    fn append<'a>(&'a self, path: &'a str, data: &'a [u8])
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut state = self.enter(FsOp::Append(path.to_string()), Some(FaultOp::Append))?;
            match state.files.get_mut(path) {
                Some(existing) => {
                    existing.extend_from_slice(data);
                    Ok(())
                }
                None => Err(FsError::not_found(path)),
            }
        })
    }

    fn read<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FsError>> + Send + 'a>>
    {
        Box::pin(async move {
            let state = self.enter(FsOp::Read(path.to_string()), Some(FaultOp::Read))?;
            state.files.get(path).cloned().ok_or_else(|| FsError::not_found(path))
        })
    }
}
