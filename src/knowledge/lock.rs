//! 수집 쓰기 잠금
//!
//! `<data_dir>/ingest.lock` 파일에 배타적 잠금(flock)을 걸어
//! 같은 데이터 디렉토리를 쓰는 모든 수집을 프로세스와 무관하게 직렬화합니다.
//! 잠금은 가드가 drop되거나 프로세스가 종료되면 풀립니다.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs4::FileExt;

/// 데이터 디렉토리 단위 쓰기 잠금
#[derive(Debug, Clone)]
pub struct WriterLock {
    path: PathBuf,
}

/// 잠금 보유 가드
#[derive(Debug)]
pub struct WriterGuard {
    file: File,
}

impl WriterLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 잠금 획득 (다른 수집이 잡고 있으면 끝날 때까지 대기)
    pub async fn acquire(&self) -> Result<WriterGuard> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || lock_file(&path))
            .await
            .context("Lock task panicked")?
    }
}

fn lock_file(path: &Path) -> Result<WriterGuard> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    if FileExt::try_lock_exclusive(&file).is_err() {
        tracing::info!("Waiting for another ingestion to finish ({})", path.display());
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Failed to lock {}", path.display()))?;
    }

    tracing::debug!("Acquired writer lock {}", path.display());
    Ok(WriterGuard { file })
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release writer lock: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let lock = WriterLock::new(dir.path().join("ingest.lock"));

        let guard = lock.acquire().await.unwrap();

        // 별도로 연 파일 핸들은 같은 프로세스라도 잠금을 얻지 못함
        let other = File::open(dir.path().join("ingest.lock")).unwrap();
        assert!(FileExt::try_lock_exclusive(&other).is_err());

        let waiter = tokio::spawn({
            let lock = lock.clone();
            async move { lock.acquire().await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_creates_missing_data_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh").join("ingest.lock");
        let _guard = WriterLock::new(&path).acquire().await.unwrap();
        assert!(path.exists());
    }
}
