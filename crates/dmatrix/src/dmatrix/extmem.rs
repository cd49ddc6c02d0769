//! Row pages cached on disk.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bon::Builder;

use super::proxy::{create_from_proxy, DMatrixProxy, DataIter};
use super::{DMatrix, PageIter};
use crate::context::Context;
use crate::error::{DataError, Result};
use crate::meta::MetaInfo;
use crate::page::{read_page, write_page, SparsePage};

/// Parameters of external-memory construction.
///
/// ```
/// use dmatrix::dmatrix::ExtMemConfig;
///
/// let config = ExtMemConfig::builder().cache_prefix("/tmp/train").build();
/// assert_eq!(config.min_cache_page_bytes, 32 << 20);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct ExtMemConfig {
    /// Cache files are named `{cache_prefix}.row.page`.
    #[builder(into)]
    pub cache_prefix: PathBuf,
    #[builder(default = f32::NAN)]
    pub missing: f32,
    /// Small batches are concatenated until a page reaches this size.
    #[builder(default = 32 << 20)]
    pub min_cache_page_bytes: usize,
}

/// Location of one page in the cache file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PageSpan {
    offset: u64,
    len: u64,
}

/// A matrix whose row pages live in a cache file and are streamed back on
/// every pass. The cache file is removed when the matrix is dropped.
#[derive(Debug)]
pub struct ExtMemDMatrix {
    ctx: Context,
    info: MetaInfo,
    cache_path: PathBuf,
    index: Vec<PageSpan>,
}

impl ExtMemDMatrix {
    pub fn from_iter(iter: &mut dyn DataIter, config: &ExtMemConfig, ctx: &Context) -> Result<Self> {
        let cache_path = cache_file(&config.cache_prefix);
        let built = write_cache(iter, config, ctx, &cache_path);
        match built {
            Ok((info, index)) => Ok(Self {
                ctx: ctx.clone(),
                info,
                cache_path,
                index,
            }),
            Err(err) => {
                let _ = fs::remove_file(&cache_path);
                Err(err)
            }
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}

fn cache_file(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".row.page");
    PathBuf::from(name)
}

fn write_cache(
    iter: &mut dyn DataIter,
    config: &ExtMemConfig,
    ctx: &Context,
    path: &Path,
) -> Result<(MetaInfo, Vec<PageSpan>)> {
    let mut w = BufWriter::new(File::create(path)?);
    let mut proxy = DMatrixProxy::new();
    let mut info = MetaInfo::new();
    let mut index = Vec::new();
    let mut pending = SparsePage::new();
    let mut written = 0u64;
    let mut n_batches = 0usize;

    let mut flush = |page: &mut SparsePage, index: &mut Vec<PageSpan>| -> Result<()> {
        let len = write_page(&mut w, page)?;
        tracing::debug!(
            base_rowid = page.base_rowid,
            rows = page.size(),
            bytes = len,
            "wrote page to {}",
            path.display()
        );
        index.push(PageSpan { offset: written, len });
        written += len;
        let next_rowid = page.base_rowid + page.size() as u64;
        page.clear();
        page.base_rowid = next_rowid;
        Ok(())
    };

    iter.reset()?;
    while iter.next(&mut proxy)? {
        let batch = create_from_proxy(&proxy, config.missing, ctx)?;
        info.extend(batch.info(), true, true)?;
        pending.push_page(batch.row_page());
        n_batches += 1;
        if pending.mem_cost_bytes() >= config.min_cache_page_bytes {
            flush(&mut pending, &mut index)?;
        }
    }
    if n_batches == 0 {
        return Err(DataError::EmptyIterator);
    }
    if !pending.is_empty() {
        flush(&mut pending, &mut index)?;
    }
    drop(flush);
    w.flush()?;

    info.validate(ctx.device)?;
    Ok((info, index))
}

fn stream_pages<'a, R: Read + Seek + 'a>(mut r: R, index: &'a [PageSpan]) -> PageIter<'a> {
    Box::new(index.iter().map(move |span| -> Result<Cow<'a, SparsePage>> {
        r.seek(SeekFrom::Start(span.offset))?;
        let page = read_page(&mut r.by_ref().take(span.len))?;
        tracing::debug!(base_rowid = page.base_rowid, rows = page.size(), "read cached page");
        Ok(Cow::Owned(page))
    }))
}

impl DMatrix for ExtMemDMatrix {
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
        self.index.len()
    }

    fn row_pages(&self) -> PageIter<'_> {
        match File::open(&self.cache_path) {
            Ok(file) => stream_pages(BufReader::new(file), &self.index),
            Err(err) => Box::new(std::iter::once(Err::<Cow<'_, SparsePage>, _>(DataError::from(err)))),
        }
    }
}

impl Drop for ExtMemDMatrix {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.cache_path) {
            tracing::warn!(%err, "failed to remove cache file {}", self.cache_path.display());
        }
    }
}
