/// Immutable column-major relations of 64-bit unsigned integers
///
/// A relation is an ordered collection of equally long columns; row i is the
/// tuple of the i-th value of every column. Relations never change while a
/// query runs. The binary on-disk format is: row count (u64), column count
/// (u64), then the column-major payload, all little-endian.
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

pub type RelationId = u32;

#[derive(Debug, Clone)]
pub struct Relation {
    row_count: u64,
    columns: Vec<Vec<u64>>,
}

impl Relation {
    /// Create a relation from owned columns, validating equal lengths
    pub fn new(columns: Vec<Vec<u64>>) -> EngineResult<Self> {
        let row_count = columns.first().map(Vec::len).unwrap_or(0) as u64;
        for (col_id, column) in columns.iter().enumerate() {
            if column.len() as u64 != row_count {
                return Err(EngineError::internal(format!(
                    "column {} has {} rows, expected {}",
                    col_id,
                    column.len(),
                    row_count
                )));
            }
        }
        Ok(Self { row_count, columns })
    }

    /// The number of tuples
    pub fn size(&self) -> u64 {
        self.row_count
    }

    /// The number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Borrow one column as a contiguous slice
    pub fn column(&self, col_id: usize) -> &[u64] {
        &self.columns[col_id]
    }

    /// Borrow all columns
    pub fn columns(&self) -> &[Vec<u64>] {
        &self.columns
    }

    /// Load a relation from the binary file format
    pub fn load(path: &Path) -> EngineResult<Self> {
        let bytes = fs::read(path)
            .map_err(|e| EngineError::io_with_path(e.to_string(), path.display().to_string()))?;
        if bytes.len() < 16 || bytes.len() % 8 != 0 {
            return Err(EngineError::io_with_path(
                "relation file is not a whole number of u64 words",
                path.display().to_string(),
            ));
        }

        let mut words = bytes.chunks_exact(8).map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        });
        let row_count = words.next().unwrap_or(0);
        let col_count = words.next().unwrap_or(0);
        if col_count == 0 {
            return Err(EngineError::io_with_path(
                "relation file has no columns",
                path.display().to_string(),
            ));
        }

        let payload_words = (bytes.len() - 16) as u64 / 8;
        let expected = row_count.checked_mul(col_count);
        if expected != Some(payload_words) {
            return Err(EngineError::io_with_path(
                format!(
                    "relation file payload mismatch: header promises {row_count}x{col_count} \
                     values, file holds {payload_words}"
                ),
                path.display().to_string(),
            ));
        }

        let mut columns = Vec::with_capacity(col_count as usize);
        for _ in 0..col_count {
            columns.push(words.by_ref().take(row_count as usize).collect());
        }
        Ok(Self { row_count, columns })
    }

    /// Store a relation in the binary file format
    pub fn store(&self, path: &Path) -> EngineResult<()> {
        let payload = self.columns.len() * self.row_count as usize;
        let mut bytes = Vec::with_capacity(16 + payload * 8);
        bytes.extend_from_slice(&self.row_count.to_le_bytes());
        bytes.extend_from_slice(&(self.columns.len() as u64).to_le_bytes());
        for column in &self.columns {
            for value in column {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        fs::write(path, bytes)
            .map_err(|e| EngineError::io_with_path(e.to_string(), path.display().to_string()))
    }
}
