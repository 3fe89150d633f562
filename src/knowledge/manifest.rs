//! 임베딩 매니페스트 - 저장된 벡터를 만든 모델 기록
//!
//! 수집이 끝나면 `<data_dir>/embedding.json`에 모델 이름과 차원을 남깁니다.
//! 질의 시 현재 임베딩 프로바이더와 다르면 검색하지 않고 설정 에러를 반환합니다.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;

/// 저장된 벡터의 임베딩 모델 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingManifest {
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingManifest {
    /// 프로바이더의 현재 모델/차원
    pub fn of(embedder: &dyn EmbeddingProvider) -> Self {
        Self {
            model: embedder.name().to_string(),
            dimension: embedder.dimension(),
        }
    }
}

impl std::fmt::Display for EmbeddingManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} dims)", self.model, self.dimension)
    }
}

/// 매니페스트 파일
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 매니페스트 읽기 (파일이 없으면 None)
    pub async fn load(&self) -> Result<Option<EmbeddingManifest>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read manifest {}", self.path.display())
                })
            }
        };

        let manifest = serde_json::from_slice(&raw)
            .with_context(|| format!("Corrupt manifest {}", self.path.display()))?;
        Ok(Some(manifest))
    }

    /// 매니페스트 저장 (임시 파일에 쓴 뒤 교체)
    pub async fn save(&self, manifest: &EmbeddingManifest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create data directory")?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(manifest)?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        tracing::debug!("Recorded embedding manifest: {}", manifest);
        Ok(())
    }

    /// 매니페스트 삭제 (없으면 무시)
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove manifest {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn manifest(model: &str, dimension: usize) -> EmbeddingManifest {
        EmbeddingManifest {
            model: model.to_string(),
            dimension,
        }
    }

    #[tokio::test]
    async fn test_missing_manifest_is_none() {
        let dir = TempDir::new().unwrap();
        let file = ManifestFile::new(dir.path().join("embedding.json"));
        assert!(file.load().await.unwrap().is_none());
        file.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let dir = TempDir::new().unwrap();
        let file = ManifestFile::new(dir.path().join("nested").join("embedding.json"));

        file.save(&manifest("gemini-embedding-001", 768)).await.unwrap();
        assert_eq!(
            file.load().await.unwrap(),
            Some(manifest("gemini-embedding-001", 768))
        );

        file.save(&manifest("text-embedding-3-small", 1536)).await.unwrap();
        assert_eq!(
            file.load().await.unwrap(),
            Some(manifest("text-embedding-3-small", 1536))
        );

        file.remove().await.unwrap();
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let file = ManifestFile::new(dir.path().join("embedding.json"));
        tokio::fs::write(file.path(), b"{not json").await.unwrap();
        assert!(file.load().await.is_err());
    }
}
