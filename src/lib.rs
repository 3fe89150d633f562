//! lectern - 단일 문서 PDF RAG 엔진
//!
//! PDF 하나를 청크로 나누어 LanceDB에 임베딩과 함께 저장하고,
//! 질문이 오면 가장 가까운 청크를 컨텍스트로 LLM 답변을 생성합니다.
//! 새 문서를 수집하면 이전 문서는 모두 교체됩니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;

// Re-exports
pub use config::{get_data_dir, BatchPolicy, Provider, RagConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding, OpenAiEmbedding};
pub use error::RagError;
pub use extractor::{DocumentRenderer, FileType, PdfRenderer};
pub use generation::{GenerationProvider, GenerationRequest};
pub use knowledge::{
    Answer, ChunkConfig, ChunkMetadata, Chunker, EmbeddingManifest, IngestReport, IngestStatus,
    Ingestor, LanceVectorStore, RagEngine, RetrievalMode, RetrievedChunk, Retriever, VectorStore,
};
