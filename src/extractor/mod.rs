//! 콘텐츠 추출 모듈
//!
//! 업로드된 문서에서 텍스트와 첫 페이지 미리보기를 추출합니다.
//! 현재 지원 형식은 PDF(페이지 구조 문서) 하나입니다.

pub mod pdf;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};

pub use pdf::PdfRenderer;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// PDF 파일
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 메타데이터에 기록되는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
        }
    }
}

/// 파일 이름의 확장자 (소문자, 없으면 빈 문자열)
pub fn extension_of(source_name: &str) -> String {
    Path::new(source_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

// ============================================================================
// Document Renderer
// ============================================================================

/// 문서 렌더러 트레이트
///
/// CPU 바운드 작업이므로 동기 인터페이스이며, 호출 측에서 `spawn_blocking`으로 실행합니다.
pub trait DocumentRenderer: Send + Sync {
    /// 모든 페이지의 텍스트를 문서 순서대로 이어붙여 반환
    fn extract_text(&self, bytes: &[u8]) -> Result<String>;

    /// 첫 페이지를 래스터화한 미리보기 이미지 (PNG). 페이지가 없으면 None
    fn render_first_page_preview(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>>;
}

// ============================================================================
// Extracted Document
// ============================================================================

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 전체 텍스트
    pub text: String,
    /// base64 인코딩된 첫 페이지 미리보기
    pub preview_image: Option<String>,
}

/// 문서에서 텍스트와 미리보기 추출
///
/// 텍스트 추출 실패는 에러입니다. 미리보기 실패는 경고만 남기고 None으로 처리합니다.
pub async fn extract_document(
    renderer: Arc<dyn DocumentRenderer>,
    bytes: Arc<Vec<u8>>,
) -> Result<ExtractedDocument> {
    tokio::task::spawn_blocking(move || {
        let text = renderer.extract_text(&bytes)?;

        let preview_image = match renderer.render_first_page_preview(&bytes) {
            Ok(Some(image)) => Some(STANDARD.encode(image)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to render preview image: {:#}", e);
                None
            }
        };

        Ok(ExtractedDocument {
            text,
            preview_image,
        })
    })
    .await
    .context("Document extraction task failed")?
}

// ============================================================================
// Tests
// ============================================================================
