//! In-memory matrix holding one row page.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::{DMatrix, PageIter};
use crate::adapter::Adapter;
use crate::cats::CatContainer;
use crate::collective::Communicator;
use crate::context::Context;
use crate::error::{DataError, FormatError, Result};
use crate::meta::{ArrayInterface, DataSplitMode, MetaInfo};
use crate::page::{read_page, write_page, SparsePage};
use crate::stream::{read_pod, write_pod};

/// Leading `u32` of a binary matrix file.
pub const DMATRIX_MAGIC: u32 = 0xffff_ab01;

#[derive(Debug)]
pub struct SimpleDMatrix {
    ctx: Context,
    info: MetaInfo,
    page: SparsePage,
    column_page: OnceLock<SparsePage>,
    sorted_column_page: OnceLock<SparsePage>,
}

impl SimpleDMatrix {
    pub(crate) fn from_parts(ctx: Context, info: MetaInfo, page: SparsePage) -> Self {
        Self {
            ctx,
            info,
            page,
            column_page: OnceLock::new(),
            sorted_column_page: OnceLock::new(),
        }
    }

    /// Ingest every batch of `adapter`.
    ///
    /// Values that are NaN or equal to `missing` are not stored. With
    /// [`DataSplitMode::Col`] the adapter holds this participant's columns;
    /// they are renumbered after the columns of lower ranks and the column
    /// count is summed across participants.
    pub fn from_adapter(
        mut adapter: Adapter<'_>,
        missing: f32,
        ctx: &Context,
        split_mode: DataSplitMode,
        comm: &dyn Communicator,
    ) -> Result<Self> {
        let n_threads = ctx.threads();
        let mut page = SparsePage::new();
        let mut labels: Vec<f32> = Vec::new();
        let mut weights: Vec<f32> = Vec::new();
        let mut qids: Vec<u64> = Vec::new();
        let mut inferred_num_columns = 0usize;

        adapter.before_first()?;
        while let Some(batch) = adapter.next()? {
            let n = page.push_batch(&batch, missing, n_threads)?;
            inferred_num_columns = inferred_num_columns.max(n);
            labels.extend_from_slice(batch.labels().unwrap_or_default());
            weights.extend_from_slice(batch.weights().unwrap_or_default());
            qids.extend_from_slice(batch.qids().unwrap_or_default());
        }

        if let Some(num_rows) = adapter.num_rows() {
            if page.size() < num_rows {
                let last = page.offset.last().copied().unwrap_or(0);
                page.offset.resize(num_rows + 1, last);
            }
        }

        let mut info = MetaInfo::new();
        info.num_row = page.size() as u64;
        info.num_col = adapter.num_columns().max(inferred_num_columns) as u64;
        info.num_nonzero = page.data.len() as u64;

        if !labels.is_empty() {
            info.set_info("label", ArrayInterface::vector(labels.as_slice()))?;
        }
        if !weights.is_empty() {
            info.set_info("weight", ArrayInterface::vector(weights.as_slice()))?;
        }
        if !qids.is_empty() {
            info.set_info("qid", ArrayInterface::vector(qids.as_slice()))?;
        }
        // Column-split feature types are gathered against the global width.
        info.data_split_mode = split_mode;
        let mut cats = adapter.cats();
        if !info.is_column_split() {
            if let Some(cats) = cats.take() {
                set_categorical(&mut info, cats, comm)?;
            }
        }

        if split_mode == DataSplitMode::Col && comm.is_distributed() {
            let shift = columns_before_rank(comm, info.num_col)?;
            page.reindex(shift, n_threads)?;
        }
        info.synchronize_number_of_columns(comm, split_mode)?;
        if let Some(cats) = cats {
            set_categorical(&mut info, cats, comm)?;
        }
        info.validate(ctx.device)?;

        Ok(Self::from_parts(ctx.clone(), info, page))
    }

    #[inline]
    pub fn info(&self) -> &MetaInfo {
        &self.info
    }

    #[inline]
    pub fn info_mut(&mut self) -> &mut MetaInfo {
        &mut self.info
    }

    #[inline]
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    #[inline]
    pub fn row_page(&self) -> &SparsePage {
        &self.page
    }

    /// The transposed page, built on first use.
    pub fn column_page(&self) -> Result<&SparsePage> {
        if let Some(page) = self.column_page.get() {
            return Ok(page);
        }
        let page = self
            .page
            .get_transpose(self.info.num_col as usize, self.ctx.threads())?;
        Ok(self.column_page.get_or_init(|| page))
    }

    /// The transposed page with every column sorted by value.
    pub fn sorted_column_page(&self) -> Result<&SparsePage> {
        if let Some(page) = self.sorted_column_page.get() {
            return Ok(page);
        }
        let mut page = self.column_page()?.clone();
        page.sort_rows(self.ctx.threads());
        Ok(self.sorted_column_page.get_or_init(|| page))
    }

    /// A new matrix holding rows `ridxs`, in that order.
    pub fn slice(&self, ridxs: &[usize]) -> Result<SimpleDMatrix> {
        let mut page = SparsePage::new();
        for &r in ridxs {
            if r >= self.page.size() {
                return Err(DataError::InvalidShape(format!(
                    "row {r} is out of range for a matrix with {} rows",
                    self.page.size()
                )));
            }
            page.data.extend_from_slice(self.page.line(r));
            page.offset.push(page.data.len() as u64);
        }
        let info = self.info.slice(ridxs, page.data.len() as u64)?;
        Ok(Self::from_parts(self.ctx.clone(), info, page))
    }

    pub fn save_binary<W: Write>(&self, w: &mut W) -> Result<()> {
        write_pod(w, DMATRIX_MAGIC)?;
        self.info.save_binary(w)?;
        write_page(w, &self.page)?;
        Ok(())
    }

    pub fn load_binary<R: Read>(r: &mut R, ctx: &Context) -> Result<Self> {
        let magic: u32 = read_pod(r, "matrix magic")?;
        if magic != DMATRIX_MAGIC {
            return Err(FormatError::BadMagic { what: "matrix" }.into());
        }
        let info = MetaInfo::load_binary(r)?;
        let page = read_page(r)?;
        if page.size() as u64 != info.num_row {
            return Err(DataError::InvalidShape(format!(
                "page holds {} rows, metadata declares {}",
                page.size(),
                info.num_row
            )));
        }
        Ok(Self::from_parts(ctx.clone(), info, page))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path.as_ref())?);
        self.save_binary(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, ctx: &Context) -> Result<Self> {
        let path = path.as_ref();
        let mut r = BufReader::new(File::open(path)?);
        let dmat = Self::load_binary(&mut r, ctx)?;
        tracing::info!(
            "{}x{} matrix with {} entries loaded from {}",
            dmat.info.num_row,
            dmat.info.num_col,
            dmat.info.num_nonzero,
            path.display()
        );
        Ok(dmat)
    }
}

/// Number of columns held by the participants ranked below this one.
fn set_categorical(info: &mut MetaInfo, cats: CatContainer, comm: &dyn Communicator) -> Result<()> {
    let types: Vec<&str> = (0..cats.num_features())
        .map(|f| if cats.n_categories(f) > 0 { "c" } else { "float" })
        .collect();
    info.set_feature_info_with(comm, "feature_type", types.as_slice())?;
    info.set_cats(Arc::new(cats));
    Ok(())
}

fn columns_before_rank(comm: &dyn Communicator, num_col: u64) -> Result<u64> {
    let counts = comm.allgather_bytes(&num_col.to_le_bytes())?;
    counts[..comm.rank()]
        .iter()
        .map(|part| read_pod::<_, u64>(&mut part.as_slice(), "column count"))
        .sum()
}

impl DMatrix for SimpleDMatrix {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut MetaInfo {
        &mut self.info
    }

    fn ctx(&self) -> &Context {
        &self.ctx
    }

    fn num_pages(&self) -> usize {
        1
    }

    fn row_pages(&self) -> PageIter<'_> {
        Box::new(std::iter::once(Ok::<_, DataError>(Cow::Borrowed(&self.page))))
    }

    fn slice(&self, ridxs: &[usize]) -> Result<Box<dyn DMatrix>> {
        Ok(Box::new(SimpleDMatrix::slice(self, ridxs)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Column, ColumnarAdapter, CsrAdapter, DenseAdapter, FileAdapter, RowBlock, RowBlockParser};
    use crate::cats::Categories;
    use crate::collective::{InMemoryCommunicator, SingleProcess};
    use crate::page::Entry;
    use ndarray::array;
    use std::thread;

    fn csr(n_threads: usize) -> SimpleDMatrix {
        let indptr = [0u64, 2, 3, 3];
        let indices = [0u32, 2, 1];
        let values = [1.0f32, 3.0, 2.0];
        let adapter = Adapter::Csr(CsrAdapter::new(&indptr, &indices, &values, 3));
        SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(n_threads), DataSplitMode::Row, &SingleProcess)
            .unwrap()
    }

    #[test]
    fn csr_shape() {
        let dmat = csr(2);
        assert_eq!(dmat.info().num_row, 3);
        assert_eq!(dmat.info().num_col, 3);
        assert_eq!(dmat.info().num_nonzero, 3);
        assert_eq!(dmat.row_page().offset, vec![0, 2, 3, 3]);
    }

    #[test]
    fn trailing_empty_dense_rows_are_kept() {
        let values = array![[1.0f32, 2.0], [f32::NAN, f32::NAN], [f32::NAN, f32::NAN]];
        let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
        let dmat =
            SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(3), DataSplitMode::Row, &SingleProcess)
                .unwrap();
        assert_eq!(dmat.row_page().offset, vec![0, 2, 2, 2]);
        assert_eq!(dmat.info().num_row, 3);
    }

    #[test]
    fn column_pages_are_cached() {
        let dmat = csr(1);
        let first = dmat.column_page().unwrap() as *const SparsePage;
        let second = dmat.column_page().unwrap() as *const SparsePage;
        assert_eq!(first, second);
        assert_eq!(dmat.column_page().unwrap().offset, vec![0, 1, 2, 3]);
    }

    #[test]
    fn sorted_column_page_orders_by_value() {
        let values = array![[3.0f32], [1.0], [2.0]];
        let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
        let dmat =
            SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(2), DataSplitMode::Row, &SingleProcess)
                .unwrap();
        let sorted = dmat.sorted_column_page().unwrap();
        assert_eq!(sorted.data, vec![Entry::new(1, 1.0), Entry::new(2, 2.0), Entry::new(0, 3.0)]);
    }

    #[test]
    fn slice_keeps_selected_rows() {
        let dmat = csr(1);
        let out = SimpleDMatrix::slice(&dmat, &[2, 0]).unwrap();
        assert_eq!(out.row_page().offset, vec![0, 0, 2]);
        assert_eq!(out.info().num_row, 2);
        assert_eq!(out.info().num_nonzero, 2);
        assert!(SimpleDMatrix::slice(&dmat, &[3]).is_err());
    }

    #[test]
    fn binary_roundtrip() {
        let mut dmat = csr(1);
        dmat.info_mut()
            .set_info("label", ArrayInterface::vector(&[0.0f32, 1.0, 0.0][..]))
            .unwrap();
        let mut buf = Vec::new();
        dmat.save_binary(&mut buf).unwrap();
        assert_eq!(&buf[..4], &DMATRIX_MAGIC.to_le_bytes());

        let back = SimpleDMatrix::load_binary(&mut buf.as_slice(), &Context::cpu(1)).unwrap();
        assert_eq!(back.info(), dmat.info());
        assert_eq!(back.row_page(), dmat.row_page());

        buf[0] = 0;
        assert!(matches!(
            SimpleDMatrix::load_binary(&mut buf.as_slice(), &Context::cpu(1)),
            Err(DataError::Format(FormatError::BadMagic { .. }))
        ));
    }

    struct Blocks(Vec<RowBlock>, usize);

    impl RowBlockParser for Blocks {
        fn before_first(&mut self) -> Result<()> {
            self.1 = 0;
            Ok(())
        }

        fn next_block(&mut self) -> Result<Option<RowBlock>> {
            let block = self.0.get(self.1).cloned();
            self.1 += 1;
            Ok(block)
        }
    }

    #[test]
    fn file_blocks_carry_labels_and_qids() {
        let block = |label: f32, qid: u64| RowBlock {
            offset: vec![0, 1],
            index: vec![4],
            value: None,
            label: Some(vec![label]),
            weight: None,
            qid: Some(vec![qid]),
        };
        let parser = Blocks(vec![block(1.0, 7), block(0.0, 7), block(1.0, 9)], 0);
        let adapter = Adapter::File(FileAdapter::new(parser));
        let dmat =
            SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(2), DataSplitMode::Row, &SingleProcess)
                .unwrap();
        assert_eq!(dmat.info().num_row, 3);
        assert_eq!(dmat.info().num_col, 5);
        assert_eq!(dmat.info().group_ptr, vec![0, 2, 3]);
        assert_eq!(dmat.info().labels.nrows(), 3);
        assert_eq!(dmat.row_page().data, vec![Entry::new(4, 1.0); 3]);
    }

    #[test]
    fn columnar_categories_mark_feature_types() {
        let categories = Categories::Int(vec![10, 20, 30]);
        let codes = [2, 0];
        let adapter = Adapter::Columnar(
            ColumnarAdapter::new(vec![
                Column::U8(&[1, 2]),
                Column::Categorical {
                    codes: &codes,
                    categories: &categories,
                },
            ])
            .unwrap(),
        );
        let dmat =
            SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(1), DataSplitMode::Row, &SingleProcess)
                .unwrap();
        assert!(dmat.info().has_categorical());
        assert_eq!(dmat.info().feature_type_names, vec!["float", "c"]);
        assert_eq!(dmat.info().cats().n_categories(1), 3);
    }

    #[test]
    fn column_split_renumbers_columns() {
        let handles: Vec<_> = InMemoryCommunicator::group(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let values = if comm.rank() == 0 {
                        array![[1.0f32, 2.0], [3.0, 4.0]]
                    } else {
                        array![[5.0f32, 6.0, 7.0], [8.0, 9.0, 10.0]]
                    };
                    let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
                    let dmat =
                        SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(1), DataSplitMode::Col, &comm)
                            .unwrap();
                    let first: Vec<u32> = dmat.row_page().line(0).iter().map(|e| e.index).collect();
                    (comm.rank(), dmat.info().num_col, first)
                })
            })
            .collect();
        for h in handles {
            let (rank, num_col, first) = h.join().unwrap();
            assert_eq!(num_col, 5);
            if rank == 0 {
                assert_eq!(first, vec![0, 1]);
            } else {
                assert_eq!(first, vec![2, 3, 4]);
            }
        }
    }

    #[test]
    fn column_split_gathers_categorical_feature_types() {
        let handles: Vec<_> = InMemoryCommunicator::group(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let categories = Categories::Int(vec![10, 20, 30]);
                    let codes = [2, 0];
                    let columns = if comm.rank() == 0 {
                        vec![
                            Column::U8(&[1, 2]),
                            Column::Categorical {
                                codes: &codes,
                                categories: &categories,
                            },
                        ]
                    } else {
                        vec![Column::Categorical {
                            codes: &codes,
                            categories: &categories,
                        }]
                    };
                    let adapter = Adapter::Columnar(ColumnarAdapter::new(columns).unwrap());
                    let dmat =
                        SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(1), DataSplitMode::Col, &comm)
                            .unwrap();
                    (dmat.info().num_col, dmat.info().feature_type_names.clone(), dmat.info().has_categorical())
                })
            })
            .collect();
        for h in handles {
            let (num_col, types, has_cat) = h.join().unwrap();
            assert_eq!(num_col, 3);
            assert_eq!(types, vec!["float", "c", "c"]);
            assert!(has_cat);
        }
    }
}
