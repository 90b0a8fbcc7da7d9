//! Conversation corpus sampled at every reset.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, StringArray};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Read-only table of conversation prefixes.
#[derive(Debug, Clone, Default)]
pub struct ConversationCorpus {
    conversations: Vec<String>,
}

impl ConversationCorpus {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            conversations: texts.into_iter().map(Into::into).collect(),
        }
    }

    /// Loads the UTF-8 `text_column` of a parquet file. Null rows are skipped.
    pub fn from_parquet(path: impl AsRef<Path>, text_column: &str) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let text_idx = builder.schema().index_of(text_column).map_err(|_| {
            Error::Dataset(format!(
                "column '{}' not found in {}. Available columns: {:?}",
                text_column,
                path.display(),
                builder
                    .schema()
                    .fields()
                    .iter()
                    .map(|f| f.name().as_str())
                    .collect::<Vec<_>>()
            ))
        })?;

        let mut conversations = Vec::new();
        let mut skipped = 0usize;
        for batch in builder.build()? {
            let batch = batch?;
            let texts = batch
                .column(text_idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    Error::Dataset(format!("column '{text_column}' is not a string column"))
                })?;

            for i in 0..texts.len() {
                if texts.is_null(i) {
                    skipped += 1;
                    continue;
                }
                conversations.push(texts.value(i).to_string());
            }
        }

        if skipped > 0 {
            warn!(skipped, path = %path.display(), "skipped null conversations");
        }
        info!(rows = conversations.len(), path = %path.display(), "loaded conversation corpus");

        Ok(Self { conversations })
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.conversations.get(index).map(String::as_str)
    }

    /// Number of rows eligible for sampling, honouring an optional limit.
    ///
    /// Null rows are dropped by [`from_parquet`](Self::from_parquet), so the
    /// limit counts the first `n` non-null conversations, not file rows.
    pub fn sample_len(&self, limit: Option<usize>) -> usize {
        limit.map_or(self.len(), |n| n.min(self.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int32Array, StringBuilder};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::arrow_writer::ArrowWriter;

    fn write_parquet(path: &Path, batch: RecordBatch) {
        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_from_texts() {
        let corpus = ConversationCorpus::from_texts(["a", "b"]);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(1), Some("b"));
        assert_eq!(corpus.get(2), None);
        assert_eq!(corpus.sample_len(None), 2);
        assert_eq!(corpus.sample_len(Some(1)), 1);
        assert_eq!(corpus.sample_len(Some(10)), 2);
    }

    #[test]
    fn test_parquet_loading_skips_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.parquet");

        let schema = Arc::new(Schema::new(vec![Field::new("text", DataType::Utf8, true)]));
        let mut texts = StringBuilder::new();
        texts.append_value("hello there");
        texts.append_null();
        texts.append_value("general kenobi");
        let batch = RecordBatch::try_new(schema, vec![Arc::new(texts.finish())]).unwrap();
        write_parquet(&path, batch);

        let corpus = ConversationCorpus::from_parquet(&path, "text").unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0), Some("hello there"));
        assert_eq!(corpus.get(1), Some("general kenobi"));

        // The limit counts non-null rows, so two rows cover both conversations.
        assert_eq!(corpus.sample_len(Some(2)), 2);
        assert_eq!(corpus.get(corpus.sample_len(Some(2)) - 1), Some("general kenobi"));
        assert_eq!(corpus.sample_len(Some(5)), 2);
    }

    #[test]
    fn test_parquet_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.parquet");

        let schema = Arc::new(Schema::new(vec![Field::new("content", DataType::Utf8, false)]));
        let mut texts = StringBuilder::new();
        texts.append_value("x");
        let batch = RecordBatch::try_new(schema, vec![Arc::new(texts.finish())]).unwrap();
        write_parquet(&path, batch);

        let err = ConversationCorpus::from_parquet(&path, "text")
            .unwrap_err()
            .to_string();
        assert!(err.contains("not found"), "unexpected error: {err}");
    }

    #[test]
    fn test_parquet_wrong_column_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.parquet");

        let schema = Arc::new(Schema::new(vec![Field::new("text", DataType::Int32, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2]))]).unwrap();
        write_parquet(&path, batch);

        assert!(matches!(
            ConversationCorpus::from_parquet(&path, "text"),
            Err(Error::Dataset(_))
        ));
    }
}
