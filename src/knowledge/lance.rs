//! LanceDB Vector Store - 청크 레코드 저장 및 ANN 검색
//!
//! 임베딩 차원은 저장소를 열 때 고정됩니다 (임베딩 모델 하나당 저장소 하나).
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::vector::{ChunkMetadata, ChunkRecord, RetrievedChunk, VectorStore};

/// 청크 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 텍스트, 메타데이터, 임베딩을 한 테이블에 저장합니다.
/// 코사인 거리로 검색합니다.
pub struct LanceVectorStore {
    db: Connection,
    dimension: usize,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 임베딩 차원 (임베딩 프로바이더와 일치해야 함)
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be positive");
        }

        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db, dimension })
    }

    /// 청크 테이블 스키마
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("text", DataType::Utf8, false),
            Field::new("filename", DataType::Utf8, false),
            Field::new("preview_image", DataType::Utf8, true),
            Field::new("file_type", DataType::Utf8, false),
            Field::new("upload_timestamp", DataType::Utf8, false),
            Field::new("file_size", DataType::Int64, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            anyhow::bail!("Cannot create batch from empty records");
        }

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != self.dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch at chunk {}: expected {}, got {}",
                bad.metadata.chunk_index,
                self.dimension,
                bad.embedding.len()
            );
        }

        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let filenames: Vec<&str> = records.iter().map(|r| r.metadata.filename.as_str()).collect();
        let previews: Vec<Option<&str>> = records
            .iter()
            .map(|r| r.metadata.preview_image.as_deref())
            .collect();
        let file_types: Vec<&str> = records.iter().map(|r| r.metadata.file_type.as_str()).collect();
        let timestamps: Vec<String> = records
            .iter()
            .map(|r| r.metadata.upload_timestamp.to_rfc3339())
            .collect();
        let file_sizes = records
            .iter()
            .map(|r| i64::try_from(r.metadata.file_size))
            .collect::<Result<Vec<i64>, _>>()
            .context("File size out of range")?;
        let chunk_indices = records
            .iter()
            .map(|r| i32::try_from(r.metadata.chunk_index))
            .collect::<Result<Vec<i32>, _>>()
            .context("Chunk index out of range")?;

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(StringArray::from(previews)),
                Arc::new(StringArray::from(file_types)),
                Arc::new(StringArray::from(timestamps)),
                Arc::new(Int64Array::from(file_sizes)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|name| name == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunk table")
    }
}

/// RecordBatch 행들을 RetrievedChunk로 변환
///
/// `_distance` 컬럼이 있으면 (벡터 검색 결과) 코사인 유사도로 바꿔 넣습니다.
fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
    }

    let texts = string_column(batch, "text")?;
    let filenames = string_column(batch, "filename")?;
    let previews = string_column(batch, "preview_image")?;
    let file_types = string_column(batch, "file_type")?;
    let timestamps = string_column(batch, "upload_timestamp")?;

    let file_sizes = batch
        .column_by_name("file_size")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing file_size column"))?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

    // _distance 컬럼 (LanceDB가 벡터 검색 시 자동 추가)
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut chunks = Vec::with_capacity(batch.num_rows());

    for i in 0..batch.num_rows() {
        let upload_timestamp = DateTime::parse_from_rfc3339(timestamps.value(i))
            .context("Invalid upload_timestamp")?
            .with_timezone(&Utc);

        let preview_image = if previews.is_null(i) {
            None
        } else {
            Some(previews.value(i).to_string())
        };

        chunks.push(RetrievedChunk {
            text: texts.value(i).to_string(),
            metadata: ChunkMetadata {
                filename: filenames.value(i).to_string(),
                preview_image,
                file_type: file_types.value(i).to_string(),
                upload_timestamp,
                file_size: u64::try_from(file_sizes.value(i)).unwrap_or_default(),
                chunk_index: u32::try_from(chunk_indices.value(i)).unwrap_or_default(),
            },
            // 코사인 거리(0~2) -> 유사도(-1~1)
            similarity: distances.map(|d| 1.0 - d.value(i)),
        });
    }

    Ok(chunks)
}

/// 후보 풀 크기를 refine factor로 환산 (k * factor >= candidate_pool)
fn refine_factor(k: usize, candidate_pool: usize) -> u32 {
    let k = k.max(1);
    let factor = candidate_pool.div_ceil(k).max(1);
    u32::try_from(factor).unwrap_or(u32::MAX)
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn delete_all(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let before_count = self.count().await?;

        // 테이블을 통째로 제거 (차원이 바뀐 경우에도 새 스키마로 재생성)
        self.db
            .drop_table(TABLE_NAME)
            .await
            .context("Failed to drop chunk table")?;

        tracing::debug!("Dropped chunk table ({} rows)", before_count);
        Ok(before_count)
    }

    async fn insert_many(&self, records: &[ChunkRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            // 기존 테이블에 추가
            let table = self.open_table().await?;
            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add chunks to table")?;
        } else {
            // 새 테이블 생성
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create chunk table")?;
        }

        Ok(records.len())
    }

    async fn nearest_neighbors(
        &self,
        query_embedding: &[f32],
        k: usize,
        candidate_pool: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if !self.table_exists().await? {
            return Ok(vec![]);
        }

        if query_embedding.len() != self.dimension {
            anyhow::bail!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                query_embedding.len()
            );
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .refine_factor(refine_factor(k, candidate_pool))
            .limit(k)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(batch_to_chunks(batch)?);
        }

        chunks.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks.truncate(k);

        Ok(chunks)
    }

    async fn sample_all(&self, limit: usize) -> Result<Vec<RetrievedChunk>> {
        if !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .query()
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute plain query")?;

        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(batch_to_chunks(batch)?);
        }
        chunks.truncate(limit);

        Ok(chunks)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================
