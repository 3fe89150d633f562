//! Vector Store - 청크 레코드 타입과 저장소 트레이트
//!
//! 저장소는 한 번에 하나의 문서 청크만 보관합니다.
//! 새 문서를 수집하면 `delete_all` 후 `insert_many`로 전체를 교체합니다.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 청크 메타데이터
///
/// 한 번의 수집에서 만들어진 청크는 `filename`, `preview_image`,
/// `file_type`, `upload_timestamp`, `file_size`가 모두 같습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 원본 파일 이름 (수집 시 전달된 경로)
    pub filename: String,
    /// 첫 페이지 미리보기 이미지 (base64)
    pub preview_image: Option<String>,
    /// 확장자 기반 파일 타입 (예: "pdf")
    pub file_type: String,
    /// 수집 시각
    pub upload_timestamp: DateTime<Utc>,
    /// 원본 문서 바이트 크기
    pub file_size: u64,
    /// 문서 내 청크 순번 (0부터)
    pub chunk_index: u32,
}

/// 저장용 청크 레코드
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// 검색된 청크
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// 유사도 스코어. 순위 없는 샘플 조회에서는 None
    pub similarity: Option<f32>,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 저장된 모든 레코드 삭제, 삭제된 개수 반환
    async fn delete_all(&self) -> Result<usize>;

    /// 레코드 일괄 삽입
    async fn insert_many(&self, records: &[ChunkRecord]) -> Result<usize>;

    /// 최근접 청크 검색 (유사도 내림차순)
    ///
    /// `candidate_pool`은 근사 검색이 순위를 매기기 전에 고려할 후보 수입니다.
    async fn nearest_neighbors(
        &self,
        query_embedding: &[f32],
        k: usize,
        candidate_pool: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// 순위 없이 최대 `limit`개 청크 조회 (검색 불가 시 대체 경로)
    async fn sample_all(&self, limit: usize) -> Result<Vec<RetrievedChunk>>;

    /// 레코드 개수 조회
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 비어 있으면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
