//! Text Chunking Module
//!
//! 고정 크기 슬라이딩 윈도우로 텍스트를 분할합니다.
//! 크기와 오버랩은 바이트가 아니라 문자(char) 단위입니다.

use serde::Serialize;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Serialize)]
pub struct ChunkConfig {
    /// 윈도우 크기 (문자 수)
    pub chunk_size: usize,
    /// 연속 청크 간 오버랩 (문자 수), chunk_size 미만
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// 윈도우 이동 거리
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }

    /// 길이 `len`인 텍스트에서 생성될 청크 수
    pub fn expected_chunks(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else if len <= self.chunk_size {
            1
        } else {
            (len - self.overlap).div_ceil(self.step())
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 고정 크기 슬라이딩 윈도우 청커
///
/// `text[0..W]`, `text[W-O..2W-O]`, ... 순서로 자르며,
/// 윈도우 끝이 텍스트 끝에 닿으면 멈춥니다. 마지막 청크는 W보다 짧을 수 있습니다.
/// 입력과 설정만으로 결과가 결정됩니다.
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        sliding_window(text, self.config.chunk_size, self.config.overlap)
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }
}

/// 문자 단위 슬라이딩 윈도우 분할
///
/// # Arguments
/// * `text` - 분할할 텍스트
/// * `chunk_size` - 청크 당 문자 수
/// * `overlap` - 청크 간 중첩 문자 수
pub fn sliding_window(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    // 문자 인덱스 -> 바이트 오프셋 (마지막에 text.len() 추가)
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = offsets.len();
    offsets.push(text.len());

    if char_len <= chunk_size {
        return vec![text.to_string()];
    }

    let config = ChunkConfig {
        chunk_size,
        overlap,
    };
    let step = config.step();
    let mut chunks = Vec::with_capacity(config.expected_chunks(char_len));
    let mut start = 0;

    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        chunks.push(text[offsets[start]..offsets[end]].to_string());

        if end >= char_len {
            break;
        }

        start += step;
    }

    chunks
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 설정 지정 청커 생성
pub fn sliding_window_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(SlidingWindowChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, overlap: usize) -> SlidingWindowChunker {
        SlidingWindowChunker::new(ChunkConfig {
            chunk_size,
            overlap,
        })
    }

    #[test]
    fn test_chunker_empty() {
        let chunks = SlidingWindowChunker::new(ChunkConfig::default()).chunk("");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_example() {
        let chunks = chunker(4, 2).chunk("ABCDEFGHIJ");
        assert_eq!(chunks, vec!["ABCD", "CDEF", "EFGH", "GHIJ"]);
    }

    #[test]
    fn test_text_not_longer_than_window_is_one_chunk() {
        let c = chunker(10, 3);
        for len in 1..=10 {
            let text = "x".repeat(len);
            assert_eq!(c.chunk(&text), vec![text.clone()], "len={}", len);
        }

        // 기본 설정에서 W-O < L <= W 구간도 한 청크
        let text = "a".repeat(900);
        assert_eq!(SlidingWindowChunker::new(ChunkConfig::default()).chunk(&text).len(), 1);
    }

    #[test]
    fn test_chunk_count_formula_and_overlap() {
        let text: String = (0..2537).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let config = ChunkConfig::default();
        let chunks = SlidingWindowChunker::new(config.clone()).chunk(&text);

        assert_eq!(chunks.len(), config.expected_chunks(text.len()));
        assert_eq!(chunks.len(), (2537usize - 200).div_ceil(800));

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].chars().skip(1000 - 200).collect();
            let next_head: String = pair[1].chars().take(200).collect();
            assert_eq!(prev_tail, next_head);
        }
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "가나다라마바사아자차"; // 10자, 30바이트
        let chunks = chunker(4, 2).chunk(text);
        assert_eq!(chunks, vec!["가나다라", "다라마바", "마바사아", "사아자차"]);
    }

    #[test]
    fn test_no_overlap() {
        let chunks = chunker(4, 0).chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(100);
        let c = chunker(120, 30);
        assert_eq!(c.chunk(&text), c.chunk(&text));
    }

    #[test]
    fn test_expected_chunks() {
        let config = ChunkConfig {
            chunk_size: 4,
            overlap: 2,
        };
        assert_eq!(config.expected_chunks(0), 0);
        assert_eq!(config.expected_chunks(3), 1);
        assert_eq!(config.expected_chunks(10), 4);
        assert_eq!(config.expected_chunks(11), 5);
    }
}
