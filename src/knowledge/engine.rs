//! RAG 엔진 - 수집기와 응답기를 하나의 저장소로 묶음
//!
//! 두 컴포넌트는 같은 임베딩 프로바이더와 같은 벡터 저장소를 공유합니다.
//! 생성 프로바이더는 첫 질문 때 만들어집니다 (수집만 할 때는 생성 API 키가 필요 없음).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::RagConfig;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::RagError;
use crate::extractor::{DocumentRenderer, PdfRenderer};
use crate::generation::{create_generator, GenerationProvider};

use super::chunker::sliding_window_chunker;
use super::ingest::{IngestReport, Ingestor};
use super::lance::LanceVectorStore;
use super::lock::WriterLock;
use super::manifest::{EmbeddingManifest, ManifestFile};
use super::retrieve::{Answer, Retriever};
use super::vector::VectorStore;

/// 엔진 통계
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub chunk_count: usize,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    /// 저장된 청크를 만든 임베딩 모델 (수집 전이면 None)
    pub indexed_with: Option<EmbeddingManifest>,
}

/// RAG 엔진
pub struct RagEngine {
    config: RagConfig,
    ingestor: Ingestor,
    retriever: OnceCell<Retriever>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl RagEngine {
    /// 설정으로 엔진 생성 (LanceDB + 설정된 임베딩 프로바이더 + PDF 렌더러)
    pub async fn open(config: &RagConfig) -> Result<Self, RagError> {
        config.validate()?;

        let embedder =
            create_embedder(&config.embedding).map_err(|e| RagError::Config(format!("{:#}", e)))?;

        let store = LanceVectorStore::open(&config.lance_path(), embedder.dimension())
            .await
            .map_err(RagError::Store)?;

        tracing::info!("Opened vector store at {}", config.lance_path().display());

        let engine = Self::from_parts(config, Arc::new(PdfRenderer::new()), embedder, Arc::new(store));
        engine.warn_on_embedding_mismatch().await;
        Ok(engine)
    }

    /// 협력자를 직접 지정하여 생성 (생성 프로바이더는 설정으로 지연 생성)
    pub fn from_parts(
        config: &RagConfig,
        renderer: Arc<dyn DocumentRenderer>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let ingestor = Ingestor::new(
            renderer,
            embedder.clone(),
            store.clone(),
            sliding_window_chunker(config.chunking.clone()),
            config.ingest.clone(),
            WriterLock::new(config.lock_path()),
            ManifestFile::new(config.manifest_path()),
        );

        Self {
            config: config.clone(),
            ingestor,
            retriever: OnceCell::new(),
            embedder,
            store,
        }
    }

    /// 생성 프로바이더 지정
    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        let retriever = self.build_retriever(generator);
        self.retriever = OnceCell::new_with(Some(retriever));
        self
    }

    fn build_retriever(&self, generator: Arc<dyn GenerationProvider>) -> Retriever {
        Retriever::new(
            self.embedder.clone(),
            generator,
            self.store.clone(),
            self.config.retrieval.clone(),
            ManifestFile::new(self.config.manifest_path()),
        )
    }

    /// 문서 수집 (이전 문서는 모두 교체됨)
    pub async fn ingest(&self, bytes: Vec<u8>, source_name: &str) -> Result<IngestReport, RagError> {
        self.ingestor.ingest(bytes, source_name).await
    }

    /// 질문에 답변
    pub async fn answer(&self, query: &str) -> Result<Answer, RagError> {
        let retriever = self
            .retriever
            .get_or_try_init(|| async {
                let generator = create_generator(&self.config.generation)
                    .map_err(|e| RagError::Config(format!("{:#}", e)))?;
                Ok::<_, RagError>(self.build_retriever(generator))
            })
            .await?;

        retriever.answer(query).await
    }

    /// 저장소 통계
    pub async fn stats(&self) -> Result<EngineStats, RagError> {
        let chunk_count = self.store.count().await.map_err(RagError::Store)?;
        let indexed_with = ManifestFile::new(self.config.manifest_path())
            .load()
            .await
            .map_err(RagError::Store)?;

        Ok(EngineStats {
            chunk_count,
            embedding_model: self.embedder.name().to_string(),
            embedding_dimension: self.embedder.dimension(),
            indexed_with,
        })
    }

    /// 저장된 벡터의 임베딩 모델이 현재 설정과 다르면 경고
    async fn warn_on_embedding_mismatch(&self) {
        let manifest = ManifestFile::new(self.config.manifest_path());
        match manifest.load().await {
            Ok(Some(stored)) => {
                let current = EmbeddingManifest::of(self.embedder.as_ref());
                if stored != current {
                    tracing::warn!(
                        "Stored chunks were embedded with {}, configured embedder is {}; re-ingest before asking",
                        stored,
                        current
                    );
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not read {}: {:#}", manifest.path().display(), e),
        }
    }
}
