//! 파이프라인 테스트용 가짜 협력자

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::extractor::DocumentRenderer;
use crate::generation::{GenerationProvider, GenerationRequest};

use super::memory::InMemoryVectorStore;
use super::vector::{ChunkRecord, RetrievedChunk, VectorStore};

pub const DIM: usize = 8;

/// 글자 빈도 기반 결정적 임베딩. 지정한 배치 호출 번호에서 실패
#[derive(Default)]
pub struct HashEmbedder {
    fail_batches: HashSet<usize>,
    fail_query: bool,
    wrong_dimension: bool,
    batch_calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_batches(batches: &[usize]) -> Self {
        Self {
            fail_batches: batches.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn failing_query() -> Self {
        Self {
            fail_query: true,
            ..Self::default()
        }
    }

    pub fn wrong_dimension() -> Self {
        Self {
            wrong_dimension: true,
            ..Self::default()
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        for c in text.chars().filter(|c| c.is_alphanumeric()) {
            v[(c as usize) % DIM] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_query {
            anyhow::bail!("embedding service unreachable");
        }
        Ok(Self::vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.contains(&call) {
            anyhow::bail!("batch {} rejected by embedding service", call);
        }
        if self.wrong_dimension {
            return Ok(texts.iter().map(|_| vec![1.0; DIM + 1]).collect());
        }
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }
}

/// 고정 텍스트/미리보기를 반환하는 렌더러
pub struct FakeRenderer {
    pub text: Option<String>,
    pub preview: Option<Vec<u8>>,
}

impl FakeRenderer {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            preview: Some(vec![0xFF, 0xD8, 0xFF, 0xD9]),
        }
    }

    pub fn broken() -> Self {
        Self {
            text: None,
            preview: None,
        }
    }
}

impl DocumentRenderer for FakeRenderer {
    fn extract_text(&self, _bytes: &[u8]) -> Result<String> {
        self.text
            .clone()
            .ok_or_else(|| anyhow::anyhow!("corrupt xref table"))
    }

    fn render_first_page_preview(&self, _bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.preview.clone())
    }
}

/// 호출을 기록하는 생성기
#[derive(Default)]
pub struct RecordingGenerator {
    pub fail: bool,
    calls: AtomicUsize,
    last: Mutex<Option<(String, String, f32, u32)>>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 마지막 요청 (system, user, temperature, max_tokens)
    pub fn last_request(&self) -> Option<(String, String, f32, u32)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((
            request.system_prompt.to_string(),
            request.user_prompt.to_string(),
            request.temperature,
            request.max_tokens,
        ));
        if self.fail {
            anyhow::bail!("generation service returned 503");
        }
        Ok("generated answer".to_string())
    }

    fn name(&self) -> &str {
        "recording-generator"
    }
}

/// 유사도 검색만 실패하는 저장소
pub struct BrokenSearchStore {
    pub inner: Arc<InMemoryVectorStore>,
    pub empty_results: bool,
}

#[async_trait]
impl VectorStore for BrokenSearchStore {
    async fn delete_all(&self) -> Result<usize> {
        self.inner.delete_all().await
    }

    async fn insert_many(&self, records: &[ChunkRecord]) -> Result<usize> {
        self.inner.insert_many(records).await
    }

    async fn nearest_neighbors(
        &self,
        _query_embedding: &[f32],
        _k: usize,
        _candidate_pool: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if self.empty_results {
            return Ok(vec![]);
        }
        anyhow::bail!("vector index 'vector_index' not found")
    }

    async fn sample_all(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        self.inner.sample_all(limit).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}
