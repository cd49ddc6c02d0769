//! Row blocks produced by an external file parser.

use super::Line;
use crate::error::{DataError, Result};

/// A block of CSR rows, optionally with per-row labels, weights and query ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowBlock {
    pub offset: Vec<u64>,
    pub index: Vec<u32>,
    /// `None` means every stored value is `1.0`.
    pub value: Option<Vec<f32>>,
    pub label: Option<Vec<f32>>,
    pub weight: Option<Vec<f32>>,
    pub qid: Option<Vec<u64>>,
}

impl RowBlock {
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    fn check(&self) -> Result<()> {
        let rows = self.num_rows();
        let nnz = self.offset.last().copied().unwrap_or(0) as usize;
        if self.offset.first().is_some_and(|&o| o != 0) || self.index.len() != nnz {
            return Err(DataError::InvalidShape(format!(
                "row block offsets end at {nnz} but hold {} indices",
                self.index.len()
            )));
        }
        let per_entry = [("value", self.value.as_ref().map(Vec::len), nnz)];
        let per_row = [
            ("label", self.label.as_ref().map(Vec::len), rows),
            ("weight", self.weight.as_ref().map(Vec::len), rows),
            ("qid", self.qid.as_ref().map(Vec::len), rows),
        ];
        for (field, got, expected) in per_entry.into_iter().chain(per_row) {
            if let Some(got) = got.filter(|&g| g != expected) {
                return Err(DataError::LengthMismatch {
                    field,
                    expected: expected as u64,
                    got: got as u64,
                });
            }
        }
        Ok(())
    }
}

/// A parser of some on-disk text or binary layout.
///
/// Parsing itself lives outside this crate; the adapter only consumes the
/// blocks.
pub trait RowBlockParser {
    fn before_first(&mut self) -> Result<()>;

    fn next_block(&mut self) -> Result<Option<RowBlock>>;

    /// Number of columns if known up front, `0` otherwise.
    fn num_columns(&self) -> usize {
        0
    }
}

pub struct FileAdapter<'a> {
    parser: Box<dyn RowBlockParser + 'a>,
    current: RowBlock,
    rows_seen: usize,
}

impl<'a> FileAdapter<'a> {
    pub fn new(parser: impl RowBlockParser + 'a) -> Self {
        Self {
            parser: Box::new(parser),
            current: RowBlock::default(),
            rows_seen: 0,
        }
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.parser.num_columns()
    }

    pub(super) fn before_first(&mut self) -> Result<()> {
        self.rows_seen = 0;
        self.current = RowBlock::default();
        self.parser.before_first()
    }

    pub(super) fn next(&mut self) -> Result<Option<FileBatch<'_>>> {
        let Some(block) = self.parser.next_block()? else {
            return Ok(None);
        };
        block.check()?;
        let base_rowid = self.rows_seen;
        self.rows_seen += block.num_rows();
        self.current = block;
        Ok(Some(FileBatch {
            block: &self.current,
            base_rowid,
        }))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FileBatch<'b> {
    block: &'b RowBlock,
    base_rowid: usize,
}

impl<'b> FileBatch<'b> {
    #[inline]
    pub fn size(&self) -> usize {
        self.block.num_rows()
    }

    #[inline]
    pub fn block(&self) -> &'b RowBlock {
        self.block
    }

    #[inline]
    pub fn base_rowid(&self) -> usize {
        self.base_rowid
    }

    #[inline]
    pub fn line(&self, i: usize) -> Line<'b> {
        let begin = self.block.offset[i] as usize;
        let end = self.block.offset[i + 1] as usize;
        Line::Sparse {
            row: self.base_rowid + i,
            indices: &self.block.index[begin..end],
            values: self.block.value.as_deref().map(|v| &v[begin..end]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, CooTuple};

    struct Blocks {
        blocks: Vec<RowBlock>,
        cursor: usize,
    }

    impl RowBlockParser for Blocks {
        fn before_first(&mut self) -> Result<()> {
            self.cursor = 0;
            Ok(())
        }

        fn next_block(&mut self) -> Result<Option<RowBlock>> {
            let block = self.blocks.get(self.cursor).cloned();
            self.cursor += 1;
            Ok(block)
        }
    }

    fn block(offset: Vec<u64>, index: Vec<u32>) -> RowBlock {
        RowBlock {
            offset,
            index,
            ..Default::default()
        }
    }

    #[test]
    fn row_ids_continue_across_blocks() {
        let parser = Blocks {
            blocks: vec![block(vec![0, 1, 2], vec![0, 1]), block(vec![0, 1], vec![4])],
            cursor: 0,
        };
        let mut adapter = Adapter::File(FileAdapter::new(parser));
        assert_eq!(adapter.num_rows(), None);
        let _ = adapter.next().unwrap().unwrap();
        let second = adapter.next().unwrap().unwrap();
        assert_eq!(second.line(0).get_element(0), CooTuple::new(2, 4, 1.0));
        assert!(adapter.next().unwrap().is_none());
    }

    #[test]
    fn label_length_is_checked() {
        let mut bad = block(vec![0, 1], vec![0]);
        bad.label = Some(vec![1.0, 2.0]);
        let mut adapter = FileAdapter::new(Blocks {
            blocks: vec![bad],
            cursor: 0,
        });
        let err = adapter.next().unwrap_err();
        assert!(matches!(err, DataError::LengthMismatch { field: "label", .. }));
    }
}
