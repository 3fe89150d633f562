//! In-memory Vector Store
//!
//! 전수 코사인 유사도 스캔. 테스트와 드라이런에 사용합니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::vector::{cosine_similarity, ChunkRecord, RetrievedChunk, VectorStore};

/// 메모리 벡터 저장소
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 복사본 (삽입 순서)
    #[cfg(test)]
    pub fn snapshot(&self) -> Result<Vec<ChunkRecord>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(records.clone())
    }
}

fn to_retrieved(record: &ChunkRecord, similarity: Option<f32>) -> RetrievedChunk {
    RetrievedChunk {
        text: record.text.clone(),
        metadata: record.metadata.clone(),
        similarity,
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn delete_all(&self) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let deleted = records.len();
        records.clear();
        Ok(deleted)
    }

    async fn insert_many(&self, new_records: &[ChunkRecord]) -> Result<usize> {
        let mut records = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        records.extend_from_slice(new_records);
        Ok(new_records.len())
    }

    async fn nearest_neighbors(
        &self,
        query_embedding: &[f32],
        k: usize,
        _candidate_pool: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        // 전수 스캔이므로 후보 풀은 전체
        let mut scored: Vec<(f32, &ChunkRecord)> = records
            .iter()
            .map(|r| (cosine_similarity(query_embedding, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, r)| to_retrieved(r, Some(score)))
            .collect())
    }

    async fn sample_all(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(records
            .iter()
            .take(limit)
            .map(|r| to_retrieved(r, None))
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let records = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::knowledge::ChunkMetadata;

    fn record(text: &str, embedding: Vec<f32>, chunk_index: u32) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            embedding,
            metadata: ChunkMetadata {
                filename: "a.pdf".to_string(),
                preview_image: None,
                file_type: "pdf".to_string(),
                upload_timestamp: Utc::now(),
                file_size: 10,
                chunk_index,
            },
        }
    }

    #[tokio::test]
    async fn test_nearest_neighbors_ranked() {
        let store = InMemoryVectorStore::new();
        store
            .insert_many(&[
                record("x", vec![1.0, 0.0], 0),
                record("y", vec![0.0, 1.0], 1),
                record("xy", vec![1.0, 1.0], 2),
            ])
            .await
            .unwrap();

        let results = store.nearest_neighbors(&[1.0, 0.1], 2, 100).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["x", "xy"]);
        assert!(results[0].similarity.unwrap() > results[1].similarity.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_and_sample() {
        let store = InMemoryVectorStore::new();
        assert!(store.sample_all(5).await.unwrap().is_empty());

        store
            .insert_many(&[record("a", vec![1.0], 0), record("b", vec![1.0], 1)])
            .await
            .unwrap();
        let sample = store.sample_all(1).await.unwrap();
        assert_eq!(sample.len(), 1);
        assert!(sample[0].similarity.is_none());

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
