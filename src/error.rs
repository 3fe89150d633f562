//! 엔진 에러 타입
//!
//! 협력자(임베딩/생성/저장소/렌더러)는 `anyhow::Result`를 반환하고,
//! 엔진 경계에서 `RagError`로 분류됩니다.
//!
//! 복구 가능한 상황(배치 임베딩 실패, 검색 실패, 컨텍스트 없음)은
//! 에러가 아니라 로그 + 결과 필드로 표현됩니다.

use thiserror::Error;

/// RAG 엔진 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 지원하지 않는 문서 형식 (저장소 변경 전에 발생)
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// 문서 텍스트 추출 실패
    #[error("Failed to extract document: {0:#}")]
    Extraction(anyhow::Error),

    /// 임베딩/생성 서비스 호출 실패
    #[error("Upstream service error: {0:#}")]
    Upstream(anyhow::Error),

    /// 벡터 저장소 실패
    #[error("Vector store error: {0:#}")]
    Store(anyhow::Error),

    /// 설정 오류
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_keep_context_chain() {
        let err = RagError::Upstream(
            anyhow::anyhow!("connection refused").context("Failed to send embedding request"),
        );
        let msg = err.to_string();
        assert!(msg.contains("Failed to send embedding request"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_unsupported_format_names_extension() {
        let err = RagError::UnsupportedFormat("pptx".into());
        assert_eq!(err.to_string(), "Unsupported file type: pptx");
    }
}
