//! Knowledge 모듈 - 청킹, 저장, 수집, 질의 응답
//!
//! - Chunker: 문자 단위 슬라이딩 윈도우
//! - VectorStore: LanceDB (ANN) / 메모리 (전수 스캔)
//! - Ingestor: 문서 -> 청크 레코드 (전체 재색인)
//! - Retriever: 질의 -> 컨텍스트 -> 답변
//! - WriterLock / EmbeddingManifest: 데이터 디렉토리 쓰기 잠금, 저장된 임베딩 모델 기록

mod chunker;
mod engine;
mod ingest;
mod lance;
mod lock;
mod manifest;
mod memory;
mod retrieve;
mod vector;

#[cfg(test)]
mod test_support;

// Re-exports
pub use chunker::{sliding_window, sliding_window_chunker, ChunkConfig, Chunker, SlidingWindowChunker};
pub use engine::{EngineStats, RagEngine};
pub use ingest::{IngestReport, IngestStatus, Ingestor};
pub use lance::LanceVectorStore;
pub use lock::{WriterGuard, WriterLock};
pub use manifest::{EmbeddingManifest, ManifestFile};
pub use memory::InMemoryVectorStore;
pub use retrieve::{
    build_prompt, Answer, RetrievalMode, Retriever, INSUFFICIENT_CONTEXT_ANSWER, SYSTEM_PROMPT,
};
pub use vector::{cosine_similarity, ChunkMetadata, ChunkRecord, RetrievedChunk, VectorStore};
