//! PDF 렌더러
//!
//! 텍스트는 pdf-extract로 페이지별 추출, 미리보기는 hayro로 첫 페이지를 래스터화하여 PNG로 인코딩합니다.

use anyhow::{Context, Result};
use hayro::hayro_interpret::InterpreterSettings;
use hayro::hayro_syntax::Pdf;
use hayro::vello_cpu::color::palette::css::WHITE;
use hayro::{RenderCache, RenderSettings};

use super::DocumentRenderer;

/// PDF 시그니처
const PDF_MAGIC: &[u8] = b"%PDF-";

/// 미리보기 배율 (1.0 = 72 DPI)
const PREVIEW_SCALE: f32 = 1.0;

/// PDF 렌더러
#[derive(Debug, Default, Clone)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for PdfRenderer {
    fn extract_text(&self, bytes: &[u8]) -> Result<String> {
        ensure_pdf(bytes)?;

        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .context("Failed to extract text from PDF")?;

        let text = join_pages(&pages);

        // 텍스트가 비어있으면 경고
        if text.trim().is_empty() {
            tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        }

        Ok(text)
    }

    fn render_first_page_preview(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        ensure_pdf(bytes)?;

        let pdf = Pdf::new(bytes.to_vec())
            .map_err(|e| anyhow::anyhow!("Failed to parse PDF for rendering: {:?}", e))?;

        let pages = pdf.pages();
        let Some(first_page) = pages.first() else {
            tracing::debug!("PDF has no pages; no preview");
            return Ok(None);
        };

        let cache = RenderCache::new();
        let render_settings = RenderSettings {
            x_scale: PREVIEW_SCALE,
            y_scale: PREVIEW_SCALE,
            bg_color: WHITE,
            ..Default::default()
        };

        let pixmap = hayro::render(
            first_page,
            &cache,
            &InterpreterSettings::default(),
            &render_settings,
        );
        let (width, height) = (pixmap.width(), pixmap.height());

        let png = pixmap
            .into_png()
            .context("Failed to encode preview as PNG")?;

        tracing::debug!(
            "Rendered first page preview ({}x{}, {} bytes)",
            width,
            height,
            png.len()
        );

        Ok(Some(png))
    }
}

/// PDF 시그니처 확인
fn ensure_pdf(bytes: &[u8]) -> Result<()> {
    if !bytes.starts_with(PDF_MAGIC) {
        anyhow::bail!("Not a PDF document (missing %PDF- header)");
    }
    Ok(())
}

/// 페이지 텍스트를 문서 순서대로 줄바꿈으로 이어붙임
fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    /// lopdf로 테스트용 PDF 생성 (페이지당 한 줄의 텍스트)
    ///
    /// `inherit_resources`가 참이면 폰트 리소스를 Pages 노드에만 둡니다.
    fn build_pdf(page_texts: &[&str], inherit_resources: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };

        let mut kids = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            };
            if !inherit_resources {
                page.set("Resources", resources.clone());
            }
            kids.push(doc.add_object(page).into());
        }

        let count = kids.len() as i64;
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        };
        if inherit_resources {
            pages.set("Resources", resources);
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// PNG IHDR의 가로/세로
    fn png_dimensions(png: &[u8]) -> (u32, u32) {
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        (width, height)
    }

    #[test]
    fn test_rejects_non_pdf() {
        let renderer = PdfRenderer::new();
        assert!(renderer.extract_text(b"PK\x03\x04 not a pdf").is_err());
        assert!(renderer.render_first_page_preview(b"hello").is_err());
    }

    #[test]
    fn test_join_pages_keeps_order() {
        let pages = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        assert_eq!(join_pages(&pages), "first\nsecond\nthird");
        assert_eq!(join_pages(&["single page".to_string()]), "single page");
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn test_extract_text_separates_pages_in_order() {
        let bytes = build_pdf(&["Alpha", "Beta", "Gamma"], false);
        let text = PdfRenderer::new().extract_text(&bytes).unwrap();

        let alpha = text.find("Alpha").unwrap();
        let beta = text.find("Beta").unwrap();
        let gamma = text.find("Gamma").unwrap();
        assert!(alpha < beta && beta < gamma);
        assert!(text[alpha..beta].contains('\n'));
        assert!(text[beta..gamma].contains('\n'));
        assert!(!text.contains("AlphaBeta"));
    }

    #[test]
    fn test_text_only_page_renders_png_preview() {
        let bytes = build_pdf(&["Lecture"], false);
        let preview = PdfRenderer::new()
            .render_first_page_preview(&bytes)
            .unwrap()
            .unwrap();

        assert!(preview.starts_with(PNG_MAGIC));
        assert_eq!(png_dimensions(&preview), (595, 842));
    }

    #[test]
    fn test_preview_with_inherited_resources() {
        let bytes = build_pdf(&["Cover", "Second"], true);
        let preview = PdfRenderer::new()
            .render_first_page_preview(&bytes)
            .unwrap();
        assert!(preview.is_some_and(|png| png.starts_with(PNG_MAGIC)));
    }

    #[test]
    fn test_no_preview_without_pages() {
        let bytes = build_pdf(&[], false);
        let preview = PdfRenderer::new().render_first_page_preview(&bytes).unwrap();
        assert!(preview.is_none());
    }
}
