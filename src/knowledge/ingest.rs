//! 문서 수집기 (Ingestor)
//!
//! 추출 -> 저장소 비우기 -> 청킹 -> 배치 임베딩 -> 일괄 삽입 순서로 진행합니다.
//! 저장소는 항상 마지막으로 수집한 문서 하나만 보관합니다 (전체 재색인).

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;

use crate::config::{BatchPolicy, IngestConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::extractor::{extension_of, extract_document, DocumentRenderer, FileType};

use super::chunker::Chunker;
use super::lock::WriterLock;
use super::manifest::{EmbeddingManifest, ManifestFile};
use super::vector::{ChunkMetadata, ChunkRecord, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 수집 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    /// 추출은 성공했으나 임베딩된 청크가 없음 (저장소는 이미 비워진 상태)
    Failure,
}

/// 수집 결과
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub message: String,
    pub status: IngestStatus,
    pub chunk_count: usize,
    /// 임베딩에 실패해 버려진 배치 수
    pub failed_batches: usize,
}

impl IngestReport {
    fn success(chunk_count: usize, failed_batches: usize) -> Self {
        Self {
            message: format!("Successfully processed {} chunks", chunk_count),
            status: IngestStatus::Success,
            chunk_count,
            failed_batches,
        }
    }

    fn failure(failed_batches: usize) -> Self {
        Self {
            message: "No chunks were embedded.".to_string(),
            status: IngestStatus::Failure,
            chunk_count: 0,
            failed_batches,
        }
    }
}

// ============================================================================
// Ingestor
// ============================================================================

/// 문서 수집기
///
/// 같은 데이터 디렉토리에 대한 수집은 파일 잠금으로 직렬화됩니다
/// (인스턴스/프로세스 무관). 비우기부터 삽입까지가 잠금 안에서 진행됩니다.
pub struct Ingestor {
    renderer: Arc<dyn DocumentRenderer>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
    config: IngestConfig,
    lock: WriterLock,
    manifest: ManifestFile,
}

impl Ingestor {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunker: Box<dyn Chunker>,
        config: IngestConfig,
        lock: WriterLock,
        manifest: ManifestFile,
    ) -> Self {
        Self {
            renderer,
            embedder,
            store,
            chunker,
            config,
            lock,
            manifest,
        }
    }

    /// 문서 수집
    ///
    /// # Arguments
    /// * `bytes` - 원본 문서 바이트
    /// * `source_name` - 파일 이름/경로 (확장자로 형식 판별, 메타데이터에 기록)
    ///
    /// # Errors
    /// 형식 미지원, 추출 실패, 저장소 실패는 에러입니다.
    /// 임베딩된 청크가 0개인 경우는 `IngestStatus::Failure` 결과로 반환합니다.
    pub async fn ingest(&self, bytes: Vec<u8>, source_name: &str) -> Result<IngestReport, RagError> {
        let file_type = FileType::from_path(Path::new(source_name)).ok_or_else(|| {
            let ext = extension_of(source_name);
            tracing::error!("Rejected {}: unsupported file type {:?}", source_name, ext);
            RagError::UnsupportedFormat(ext)
        })?;

        let _guard = self.lock.acquire().await.map_err(|e| {
            tracing::error!("Failed to acquire writer lock: {:#}", e);
            RagError::Store(e)
        })?;

        let file_size = bytes.len() as u64;
        let extracted = extract_document(self.renderer.clone(), Arc::new(bytes))
            .await
            .map_err(|e| {
                tracing::error!("Extraction failed for {}: {:#}", source_name, e);
                RagError::Extraction(e)
            })?;

        // 이전 문서 전체 삭제 (이후 임베딩이 모두 실패해도 복구하지 않음)
        let deleted = self.store.delete_all().await.map_err(|e| {
            tracing::error!("Failed to clear vector store: {:#}", e);
            RagError::Store(e)
        })?;
        tracing::info!("Cleared {} existing chunks", deleted);
        self.manifest.remove().await.map_err(RagError::Store)?;

        let chunks = self.chunker.chunk(&extracted.text);
        tracing::info!(
            "Split {} ({} chars) into {} chunks with {}",
            source_name,
            extracted.text.chars().count(),
            chunks.len(),
            self.chunker.name()
        );

        let upload_timestamp = Utc::now();
        let mut records: Vec<ChunkRecord> = Vec::with_capacity(chunks.len());
        let mut failed_batches = 0;

        for (batch_no, batch) in chunks.chunks(self.config.batch_size).enumerate() {
            let embeddings = match self.embed_batch(batch).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    failed_batches += 1;
                    match self.config.batch_policy {
                        BatchPolicy::BestEffort => {
                            tracing::warn!(
                                "Dropping batch {} ({} chunks): {:#}",
                                batch_no,
                                batch.len(),
                                e
                            );
                            continue;
                        }
                        BatchPolicy::FailFast => {
                            tracing::error!("Aborting ingestion at batch {}: {:#}", batch_no, e);
                            return Err(RagError::Upstream(
                                e.context(format!("embedding batch {} failed", batch_no)),
                            ));
                        }
                    }
                }
            };

            tracing::debug!("Embedded batch {} ({} chunks)", batch_no, batch.len());

            for (text, embedding) in batch.iter().zip(embeddings) {
                let chunk_index = records.len() as u32;
                records.push(ChunkRecord {
                    text: text.clone(),
                    embedding,
                    metadata: ChunkMetadata {
                        filename: source_name.to_string(),
                        preview_image: extracted.preview_image.clone(),
                        file_type: file_type.as_str().to_string(),
                        upload_timestamp,
                        file_size,
                        chunk_index,
                    },
                });
            }
        }

        if records.is_empty() {
            tracing::error!(
                "No chunks embedded for {} ({} batches failed); store is now empty",
                source_name,
                failed_batches
            );
            return Ok(IngestReport::failure(failed_batches));
        }

        let inserted = self.store.insert_many(&records).await.map_err(|e| {
            tracing::error!("Failed to insert chunks: {:#}", e);
            RagError::Store(e)
        })?;
        self.manifest
            .save(&EmbeddingManifest::of(self.embedder.as_ref()))
            .await
            .map_err(RagError::Store)?;

        tracing::info!(
            "Ingested {} (chunks={}, failed_batches={})",
            source_name,
            inserted,
            failed_batches
        );

        Ok(IngestReport::success(inserted, failed_batches))
    }

    /// 배치 하나 임베딩 (개수/차원 검증 포함)
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embedder.embed_batch(batch).await?;

        if embeddings.len() != batch.len() {
            anyhow::bail!(
                "{} returned {} embeddings for {} chunks",
                self.embedder.name(),
                embeddings.len(),
                batch.len()
            );
        }

        let dimension = self.embedder.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dimension,
                bad.len()
            );
        }

        Ok(embeddings)
    }
}

// ============================================================================
// Tests
// ============================================================================
