//! Parquet sink for acceptance records.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Float32Builder, ListArray, ListBuilder, UInt32Builder,
    UInt64Array, UInt64Builder, UInt8Builder,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Float32Type, Schema, SchemaRef, UInt32Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use tracing::info;

use crate::error::{Error, Result};

/// One generated example with per-position hidden states.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceRecord {
    /// Prompt followed by the main model's continuation.
    pub input_ids: Vec<u32>,
    /// Main model hidden states, one row per generated position.
    pub main_hidden_states: Vec<Vec<f32>>,
    /// Draft model hidden states, one row per generated position.
    pub draft_hidden_states: Vec<Vec<f32>>,
    /// 1 where the draft's greedy prediction disagrees with the main model.
    pub accept_mask: Vec<u8>,
    /// Index of the source item.
    pub dataset_index: u64,
}

fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// Arrow schema of the acceptance dataset.
pub fn acceptance_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("input_ids", list_of(DataType::UInt32), false),
        Field::new("main_hidden_states", list_of(list_of(DataType::Float32)), false),
        Field::new("draft_hidden_states", list_of(list_of(DataType::Float32)), false),
        Field::new("accept_mask", list_of(DataType::UInt8), false),
        Field::new("dataset_index", DataType::UInt64, false),
    ]))
}

/// Buffers records and writes them as parquet row groups.
pub struct AcceptanceDatasetWriter {
    writer: ArrowWriter<File>,
    schema: SchemaRef,
    pending: Vec<AcceptanceRecord>,
    writeback_interval: usize,
    rows_written: usize,
    /// When resuming, rows go to a staging file that replaces the target on finish.
    staged: Option<Staged>,
}

struct Staged {
    staging: PathBuf,
    target: PathBuf,
}

impl AcceptanceDatasetWriter {
    /// Creates a new dataset at `path`, failing if the file already exists.
    /// A batch is flushed every `writeback_interval` pushed rows.
    pub fn create(path: impl AsRef<Path>, writeback_interval: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::Dataset(format!(
                    "{} already exists; append to it or remove it first",
                    path.display()
                )),
                _ => Error::Io(e),
            })?;
        Self::open(file, writeback_interval, None)
    }

    /// Continues an existing dataset at `path`, or creates it if missing.
    ///
    /// Existing rows are copied into a `.partial` file next to `path`, which
    /// replaces `path` on [`finish`](Self::finish). Until then the original
    /// file is left untouched.
    pub fn append(path: impl AsRef<Path>, writeback_interval: usize) -> Result<Self> {
        let target = path.as_ref();
        if !target.exists() {
            return Self::create(target, writeback_interval);
        }

        let staging = staging_path(target);
        let file = File::create(&staging)?;
        let mut writer = Self::open(
            file,
            writeback_interval,
            Some(Staged {
                staging,
                target: target.to_path_buf(),
            }),
        )?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(target)?)?.build()?;
        for batch in reader {
            let batch = RecordBatch::try_new(writer.schema.clone(), batch?.columns().to_vec())?;
            writer.writer.write(&batch)?;
            writer.rows_written += batch.num_rows();
        }
        writer.writer.flush()?;

        info!(
            rows = writer.rows_written,
            path = %target.display(),
            "resuming acceptance dataset"
        );
        Ok(writer)
    }

    fn open(file: File, writeback_interval: usize, staged: Option<Staged>) -> Result<Self> {
        if writeback_interval == 0 {
            return Err(Error::Config("writeback_interval must be positive".into()));
        }
        let schema = acceptance_schema();
        let writer = ArrowWriter::try_new(file, schema.clone(), None)?;
        Ok(Self {
            writer,
            schema,
            pending: Vec::with_capacity(writeback_interval),
            writeback_interval,
            rows_written: 0,
            staged,
        })
    }

    pub fn push(&mut self, record: AcceptanceRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= self.writeback_interval {
            self.flush()?;
        }
        Ok(())
    }

    /// Rows in the dataset so far, including resumed and unflushed ones.
    pub fn len(&self) -> usize {
        self.rows_written + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes all buffered rows as one record batch.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = self.build_batch()?;
        self.writer.write(&batch)?;
        self.writer.flush()?;
        self.rows_written += self.pending.len();
        info!(
            rows = self.pending.len(),
            total = self.rows_written,
            "flushed acceptance records"
        );
        self.pending.clear();
        Ok(())
    }

    /// Flushes the remaining rows and closes the file. Returns the total row count.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        self.writer.close()?;
        if let Some(staged) = &self.staged {
            fs::rename(&staged.staging, &staged.target)?;
        }
        Ok(self.rows_written)
    }

    fn build_batch(&self) -> Result<RecordBatch> {
        let mut input_ids = ListBuilder::new(UInt32Builder::new());
        let mut main_hidden = ListBuilder::new(ListBuilder::new(Float32Builder::new()));
        let mut draft_hidden = ListBuilder::new(ListBuilder::new(Float32Builder::new()));
        let mut accept_mask = ListBuilder::new(UInt8Builder::new());
        let mut dataset_index = UInt64Builder::with_capacity(self.pending.len());

        for record in &self.pending {
            input_ids.values().append_slice(&record.input_ids);
            input_ids.append(true);

            append_matrix(&mut main_hidden, &record.main_hidden_states);
            append_matrix(&mut draft_hidden, &record.draft_hidden_states);

            accept_mask.values().append_slice(&record.accept_mask);
            accept_mask.append(true);

            dataset_index.append_value(record.dataset_index);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(input_ids.finish()),
            Arc::new(main_hidden.finish()),
            Arc::new(draft_hidden.finish()),
            Arc::new(accept_mask.finish()),
            Arc::new(dataset_index.finish()),
        ];
        Ok(RecordBatch::try_new(self.schema.clone(), columns)?)
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn append_matrix(builder: &mut ListBuilder<ListBuilder<Float32Builder>>, rows: &[Vec<f32>]) {
    for row in rows {
        builder.values().values().append_slice(row);
        builder.values().append(true);
    }
    builder.append(true);
}

/// Reads every record of an acceptance dataset back into memory.
pub fn read_acceptance_records(path: impl AsRef<Path>) -> Result<Vec<AcceptanceRecord>> {
    let file = File::open(path.as_ref())?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let input_ids = list_column(&batch, "input_ids")?;
        let main_hidden = list_column(&batch, "main_hidden_states")?;
        let draft_hidden = list_column(&batch, "draft_hidden_states")?;
        let accept_mask = list_column(&batch, "accept_mask")?;
        let dataset_index = column::<UInt64Array>(&batch, "dataset_index")?;

        for row in 0..batch.num_rows() {
            records.push(AcceptanceRecord {
                input_ids: primitive_values::<UInt32Type>(&input_ids.value(row))?,
                main_hidden_states: matrix_values(&main_hidden.value(row))?,
                draft_hidden_states: matrix_values(&draft_hidden.value(row))?,
                accept_mask: primitive_values::<UInt8Type>(&accept_mask.value(row))?,
                dataset_index: dataset_index.value(row),
            });
        }
    }
    Ok(records)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Dataset(format!("missing or mistyped column '{name}'")))
}

fn list_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ListArray> {
    column::<ListArray>(batch, name)
}

fn primitive_values<T: ArrowPrimitiveType>(array: &ArrayRef) -> Result<Vec<T::Native>> {
    array
        .as_primitive_opt::<T>()
        .map(|values| values.values().to_vec())
        .ok_or_else(|| Error::Dataset("unexpected list item type".into()))
}

fn matrix_values(array: &ArrayRef) -> Result<Vec<Vec<f32>>> {
    let rows = array
        .as_list_opt::<i32>()
        .ok_or_else(|| Error::Dataset("hidden states are not a nested list".into()))?;
    (0..rows.len())
        .map(|i| primitive_values::<Float32Type>(&rows.value(i)))
        .collect()
}
