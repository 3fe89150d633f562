//! 설정 모듈
//!
//! 모든 파이프라인 파라미터는 `LECTERN_*` 환경변수로 조정합니다.
//! 값이 없으면 기본값을 사용합니다. (`.env` 파일은 main에서 로드)

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RagError;
use crate::knowledge::ChunkConfig;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (<로컬 데이터 디렉토리>/.lectern/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lectern")
}

// ============================================================================
// Types
// ============================================================================

/// 배치 임베딩 실패 처리 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// 실패한 배치만 버리고 계속 진행 (부분 수집 허용)
    BestEffort,
    /// 첫 실패에서 수집 전체를 중단
    FailFast,
}

impl FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(BatchPolicy::BestEffort),
            "fail-fast" | "fail_fast" => Ok(BatchPolicy::FailFast),
            other => Err(format!("unknown batch policy: {}", other)),
        }
    }
}

/// 외부 서비스 프로바이더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// 수집 설정
#[derive(Debug, Clone, Serialize)]
pub struct IngestConfig {
    /// 임베딩 요청 1회당 청크 수
    pub batch_size: usize,
    pub batch_policy: BatchPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_policy: BatchPolicy::BestEffort,
        }
    }
}

/// 검색 + 답변 생성 설정
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalConfig {
    /// 반환할 최근접 청크 수
    pub top_k: usize,
    /// 근사 검색 후보 풀 크기 (recall/latency 트레이드오프)
    pub candidate_pool: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidate_pool: 100,
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// 임베딩 프로바이더 설정
///
/// 하나의 저장소에는 하나의 모델만 사용해야 합니다.
/// 모델이 다르면 벡터끼리 비교할 수 없습니다.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    /// None이면 프로바이더 기본 모델
    pub model: Option<String>,
    /// None이면 프로바이더 기본 차원
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: None,
            dimension: None,
        }
    }
}

/// 텍스트 생성 프로바이더 설정
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub model: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: None,
        }
    }
}

/// 전체 설정
#[derive(Debug, Clone, Serialize)]
pub struct RagConfig {
    pub data_dir: PathBuf,
    pub chunking: ChunkConfig,
    pub ingest: IngestConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            chunking: ChunkConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl RagConfig {
    /// 환경변수에서 설정 로드 + 검증
    pub fn from_env() -> Result<Self, RagError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 로드 (테스트에서 환경변수 없이 사용)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("LECTERN_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(v) = parse_var(&get, "LECTERN_CHUNK_SIZE")? {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_CHUNK_OVERLAP")? {
            config.chunking.overlap = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_EMBED_BATCH_SIZE")? {
            config.ingest.batch_size = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_BATCH_POLICY")? {
            config.ingest.batch_policy = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_TOP_K")? {
            config.retrieval.top_k = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_CANDIDATE_POOL")? {
            config.retrieval.candidate_pool = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_TEMPERATURE")? {
            config.retrieval.temperature = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_MAX_TOKENS")? {
            config.retrieval.max_tokens = v;
        }
        if let Some(v) = parse_var(&get, "LECTERN_EMBEDDING_PROVIDER")? {
            config.embedding.provider = v;
        }
        config.embedding.model = get("LECTERN_EMBEDDING_MODEL");
        config.embedding.dimension = parse_var(&get, "LECTERN_EMBEDDING_DIMENSION")?;
        if let Some(v) = parse_var(&get, "LECTERN_GENERATION_PROVIDER")? {
            config.generation.provider = v;
        }
        config.generation.model = get("LECTERN_GENERATION_MODEL");

        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), RagError> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(RagError::Config("chunk size must be positive".into()));
        }
        if chunking.overlap >= chunking.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunking.overlap, chunking.chunk_size
            )));
        }
        if self.ingest.batch_size == 0 {
            return Err(RagError::Config("embedding batch size must be positive".into()));
        }

        let retrieval = &self.retrieval;
        if retrieval.top_k == 0 {
            return Err(RagError::Config("top_k must be positive".into()));
        }
        if retrieval.candidate_pool < retrieval.top_k {
            return Err(RagError::Config(format!(
                "candidate pool ({}) must be at least top_k ({})",
                retrieval.candidate_pool, retrieval.top_k
            )));
        }
        if !(0.0..=2.0).contains(&retrieval.temperature) {
            return Err(RagError::Config(format!(
                "temperature {} out of range 0.0..=2.0",
                retrieval.temperature
            )));
        }

        Ok(())
    }

    /// LanceDB 디렉토리 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("chunks.lance")
    }

    /// 수집 쓰기 잠금 파일 경로
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("ingest.lock")
    }

    /// 임베딩 매니페스트 경로
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("embedding.json")
    }
}

/// 환경변수 값 파싱 (없으면 None, 형식 오류는 Config 에러)
fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>, RagError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RagError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.batch_policy, BatchPolicy::BestEffort);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.candidate_pool, 100);
        assert!((config.retrieval.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.max_tokens, 500);
        assert_eq!(config.embedding.provider, Provider::Gemini);
    }

    #[test]
    fn test_overrides() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("LECTERN_DATA_DIR", "/tmp/lectern-test"),
            ("LECTERN_CHUNK_SIZE", "500"),
            ("LECTERN_CHUNK_OVERLAP", "50"),
            ("LECTERN_BATCH_POLICY", "fail-fast"),
            ("LECTERN_EMBEDDING_PROVIDER", "openai"),
            ("LECTERN_EMBEDDING_DIMENSION", "1536"),
            ("LECTERN_GENERATION_MODEL", "gpt-4o"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/lectern-test"));
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.ingest.batch_policy, BatchPolicy::FailFast);
        assert_eq!(config.embedding.provider, Provider::OpenAi);
        assert_eq!(config.embedding.dimension, Some(1536));
        assert_eq!(config.generation.model.as_deref(), Some("gpt-4o"));
        assert_eq!(
            config.lance_path(),
            PathBuf::from("/tmp/lectern-test/chunks.lance")
        );
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/tmp/lectern-test/ingest.lock")
        );
        assert_eq!(
            config.manifest_path(),
            PathBuf::from("/tmp/lectern-test/embedding.json")
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config =
            RagConfig::from_lookup(lookup_from(&[("LECTERN_TOP_K", "  ")])).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_invalid_number() {
        let result = RagConfig::from_lookup(lookup_from(&[("LECTERN_TOP_K", "five")]));
        assert!(matches!(result, Err(RagError::Config(msg)) if msg.contains("LECTERN_TOP_K")));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let result = RagConfig::from_lookup(lookup_from(&[
            ("LECTERN_CHUNK_SIZE", "100"),
            ("LECTERN_CHUNK_OVERLAP", "100"),
        ]));
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_candidate_pool_must_cover_top_k() {
        let result = RagConfig::from_lookup(lookup_from(&[
            ("LECTERN_TOP_K", "10"),
            ("LECTERN_CANDIDATE_POOL", "5"),
        ]));
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("best_effort".parse::<BatchPolicy>(), Ok(BatchPolicy::BestEffort));
        assert_eq!("FAIL-FAST".parse::<BatchPolicy>(), Ok(BatchPolicy::FailFast));
        assert!("retry".parse::<BatchPolicy>().is_err());
        assert_eq!("google".parse::<Provider>(), Ok(Provider::Gemini));
        assert!("cohere".parse::<Provider>().is_err());
    }
}
