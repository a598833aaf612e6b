use std::future::Future;
use std::pin::Pin;

use crate::FsError;

// ════════════════════════════════════════════════════════════════
//  Filesystem types
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Метаданные объекта файловой системы (GETFILESTATUS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub kind: FileKind,
    /// Длина в байтах (0 для директорий).
    pub length: u64,
}

impl FileStatus {
    pub fn file(length: u64) -> Self {
        Self { kind: FileKind::File, length }
    }

    pub fn directory() -> Self {
        Self { kind: FileKind::Directory, length: 0 }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }
}

// ════════════════════════════════════════════════════════════════
//  DistributedFs
// ════════════════════════════════════════════════════════════════

/// Distributed filesystem with single-writer append leases (HDFS semantics).
///
/// Paths are absolute, `/`-separated. Implementations never panic on
/// backend failure; every call returns an `FsError` with a kind the
/// caller can branch on.
pub trait DistributedFs: Send + Sync {
    /// Метаданные пути. `Ok(None)` если путь не существует.
    fn status<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Option<FileStatus>, FsError>> + Send + 'a>>;

    /// Имена прямых потомков директории, отсортированные.
    fn list<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<String>, FsError>> + Send + 'a>>;

    /// Создать директорию вместе с недостающими родителями. Идемпотентно.
    fn mkdirs<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Создать файл с содержимым `data`. Если файл существует и
    /// `overwrite == false`: ошибка `AlreadyExists`, иначе truncate.
    fn create<'a>(&'a self, path: &'a str, data: &'a [u8], overwrite: bool)
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Native append. Fails with `LeaseConflict` while another client
    /// holds the write lease.
    fn append<'a>(&'a self, path: &'a str, data: &'a [u8])
        -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Прочитать файл целиком.
    fn read<'a>(&'a self, path: &'a str)
        -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FsError>> + Send + 'a>>;
}

/// Parent directory of an absolute path (`/a/b/c.json` → `/a/b`).
/// `None` for the root and for paths without a separator.
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    if idx == 0 {
        return if trimmed.len() > 1 { Some("/") } else { None };
    }
    Some(&trimmed[..idx])
}

#[cfg(test)]
mod tests {
    use super::parent_dir;

    #[test]
    fn parent_of_nested_file() {
        assert_eq!(parent_dir("/user/events/search_events/2024-05-01.json"), Some("/user/events/search_events"));
        assert_eq!(parent_dir("/top.json"), Some("/"));
        assert_eq!(parent_dir("/"), None);
        assert_eq!(parent_dir("relative"), None);
        assert_eq!(parent_dir("/a/b/"), Some("/a"));
    }
}
