//! CLI 모듈
//!
//! lectern CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{Provider, RagConfig};
use crate::embedding::has_api_key;
use crate::knowledge::{Answer, IngestReport, IngestStatus, RagEngine, RetrievalMode};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "lectern")]
#[command(version, about = "단일 문서 PDF RAG 엔진", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 문서 수집 (기존 문서는 교체됨)
    Ingest {
        /// 수집할 파일 경로
        file: PathBuf,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 수집된 문서에 질문
    Ask {
        /// 질문
        question: String,

        /// 결과를 JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = RagConfig::from_env().context("설정 로드 실패")?;

    match cli.command {
        Commands::Ingest { file, json } => cmd_ingest(&config, file, json).await,
        Commands::Ask { question, json } => cmd_ask(&config, &question, json).await,
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
///
/// 파일을 읽어 청크/임베딩을 저장합니다. 이전 문서의 청크는 삭제됩니다.
async fn cmd_ingest(config: &RagConfig, file: PathBuf, json: bool) -> Result<()> {
    require_api_keys(&providers(config, false))?;

    let source_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow::anyhow!("잘못된 파일 경로: {}", file.display()))?;

    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("파일 읽기 실패: {}", file.display()))?;

    if !json {
        println!("[*] 수집 중: {} ({})", source_name, format_bytes(bytes.len()));
    }

    let engine = RagEngine::open(config).await.context("엔진 초기화 실패")?;
    let report = engine.ingest(bytes, &source_name).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.status == IngestStatus::Failure {
        bail!("수집 실패: {}", report.message);
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: &RagConfig, question: &str, json: bool) -> Result<()> {
    require_api_keys(&providers(config, true))?;

    if !json {
        println!("[*] 질문: \"{}\"", question);
    }

    let engine = RagEngine::open(config).await.context("엔진 초기화 실패")?;
    let answer = engine.answer(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 시스템 상태를 확인합니다.
async fn cmd_status(config: &RagConfig) -> Result<()> {
    println!("lectern v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!(
        "[*] 청킹: {} 문자 / 겹침 {} 문자",
        config.chunking.chunk_size, config.chunking.overlap
    );
    println!(
        "[*] 임베딩: {} / 생성: {}",
        provider_label(config.embedding.provider),
        provider_label(config.generation.provider)
    );

    // API 키 상태
    for provider in providers(config, true) {
        if has_api_key(provider) {
            println!("[OK] {} API 키: 설정됨", provider_label(provider));
        } else {
            println!("[!] {} API 키: 미설정", provider_label(provider));
            println!("    설정: export {}=your-key", key_var(provider));
        }
    }

    // 저장소 상태 (임베딩 API 키가 있을 때만)
    if has_api_key(config.embedding.provider) {
        match RagEngine::open(config).await {
            Ok(engine) => match engine.stats().await {
                Ok(stats) => {
                    println!("[OK] 저장된 청크: {} 건", stats.chunk_count);
                    println!(
                        "     임베딩 모델: {} ({} 차원)",
                        stats.embedding_model, stats.embedding_dimension
                    );
                    if let Some(stored) = &stats.indexed_with {
                        if stored.model != stats.embedding_model
                            || stored.dimension != stats.embedding_dimension
                        {
                            println!("[!] 저장된 청크의 임베딩 모델: {} (다시 수집 필요)", stored);
                        }
                    }
                }
                Err(e) => {
                    println!("[!] 통계 조회 실패: {}", e);
                }
            },
            Err(e) => {
                tracing::debug!("Engine open failed: {}", e);
                println!("[!] 저장소 열기 실패: {}", e);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 명령어에 필요한 프로바이더 목록 (중복 제거)
///
/// 수집은 임베딩만, 질문은 임베딩과 생성 모두 사용합니다.
fn providers(config: &RagConfig, with_generation: bool) -> Vec<Provider> {
    let mut list = vec![config.embedding.provider];
    if with_generation && config.generation.provider != config.embedding.provider {
        list.push(config.generation.provider);
    }
    list
}

fn require_api_keys(providers: &[Provider]) -> Result<()> {
    for &provider in providers {
        if !has_api_key(provider) {
            bail!(
                "{} API 키가 설정되지 않았습니다.\n\n\
                 설정 방법:\n  \
                 export {}=your-api-key",
                provider_label(provider),
                key_var(provider)
            );
        }
    }
    Ok(())
}

fn provider_label(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "Gemini",
        Provider::OpenAi => "OpenAI",
    }
}

fn key_var(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "GEMINI_API_KEY",
        Provider::OpenAi => "OPENAI_API_KEY",
    }
}

fn print_report(report: &IngestReport) {
    match report.status {
        IngestStatus::Success => println!("[OK] {}", report.message),
        IngestStatus::Failure => println!("[!] {}", report.message),
    }
    if report.failed_batches > 0 {
        println!("    실패한 배치: {} 개", report.failed_batches);
    }
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.answer);
    println!();

    if answer.retrieval_mode == RetrievalMode::Fallback {
        println!("[!] 유사도 검색 실패: 순위 없는 샘플 컨텍스트를 사용했습니다");
    }

    if !answer.context_used.is_empty() {
        println!("[*] 사용된 컨텍스트 ({} 건):", answer.context_used.len());
        for (i, chunk) in answer.context_used.iter().enumerate() {
            println!("  {}. {}", i + 1, truncate_text(chunk, 120));
        }
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        assert_eq!(truncate_text(korean, 5), "안녕하세요...");
    }

    #[test]
    fn test_providers_deduplicated() {
        let mut config = RagConfig::default();
        assert_eq!(providers(&config, true), vec![Provider::Gemini]);

        config.generation.provider = Provider::OpenAi;
        assert_eq!(providers(&config, true), vec![Provider::Gemini, Provider::OpenAi]);
    }

    #[test]
    fn test_ingest_needs_only_embedding_provider() {
        let mut config = RagConfig::default();
        config.embedding.provider = Provider::Gemini;
        config.generation.provider = Provider::OpenAi;
        assert_eq!(providers(&config, false), vec![Provider::Gemini]);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["lectern", "ingest", "notes.pdf", "--json"]).unwrap();
        match cli.command {
            Commands::Ingest { file, json } => {
                assert_eq!(file, PathBuf::from("notes.pdf"));
                assert!(json);
            }
            _ => panic!("expected ingest"),
        }

        let cli = Cli::try_parse_from(["lectern", "ask", "what is a lifetime?"]).unwrap();
        assert!(matches!(cli.command, Commands::Ask { json: false, .. }));
    }
}
