use sink_api::{DistributedFs, FsError};

use crate::partition::{PartitionResolver, USER_DIR};

#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<(String, FsError)>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ensure `<base>`, `<base>/<bucket>` for each bucket and `<base>/by_user`
/// exist. Idempotent. Failures are logged and skipped: the writer
/// re-creates missing parents lazily.
pub async fn ensure_paths(fs: &dyn DistributedFs, base: &str, buckets: &[&str]) -> ProvisionReport {
    let resolver = PartitionResolver::new(base);
    let mut dirs = vec![resolver.base().to_string()];
    dirs.extend(buckets.iter().map(|b| resolver.dir(b)));
    dirs.push(resolver.dir(USER_DIR));

    let mut report = ProvisionReport::default();
    for dir in dirs {
        match fs.status(&dir).await {
            Ok(Some(_)) => report.existing.push(dir),
            Ok(None) => match fs.mkdirs(&dir).await {
                Ok(()) => {
                    tracing::info!(dir = %dir, "created directory");
                    report.created.push(dir);
                }
                Err(e) => {
                    tracing::error!(dir = %dir, error = ?e, "create directory failed");
                    report.failed.push((dir, e));
                }
            },
            Err(e) => {
                tracing::error!(dir = %dir, error = ?e, "status failed");
                report.failed.push((dir, e));
            }
        }
    }

    match fs.list(resolver.base()).await {
        Ok(children) => {
            for child in &children {
                tracing::info!(base = %resolver.base(), child = %child, "directory entry");
            }
        }
        Err(e) => tracing::warn!(base = %resolver.base(), error = ?e, "list base directory failed"),
    }

    tracing::info!(
        created = report.created.len(),
        existing = report.existing.len(),
        failed = report.failed.len(),
        "directory structure verified"
    );
    report
}
