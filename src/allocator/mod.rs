//! 参照カウント付きのマルチセグメント・メモリブロック.
//!
//! [`Allocator`]は、一回の確保で得られた連続領域を、
//! 複数の論理的な部分領域(セグメント)に分割して保持する.
//!
//! インスタンスのクローン(i.e., `refer`)はメモリの複製を伴わず、
//! 同じメモリブロックへの参照を共有するだけである.
//! 内容を書き換える場合には、必ず[`Allocator::privatize`]を経由して排他的な所有権を得る必要がある
//! (いわゆるcopy-on-write).
//!
//! [`Allocator`]: ./struct.Allocator.html
//! [`Allocator::privatize`]: ./struct.Allocator.html#method.privatize
use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

use self::segment::SegmentTable;
use crate::metrics::AllocatorMetrics;
use crate::{ErrorKind, Result};

mod segment;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// `Allocator`のビルダ.
///
/// ロガーやメトリクスの設定は、このビルダから生成された全てのメモリブロックで共有される.
#[derive(Debug, Clone)]
pub struct AllocatorBuilder {
    logger: Logger,
    metrics: AllocatorMetrics,
}
impl AllocatorBuilder {
    /// デフォルト設定で`AllocatorBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        AllocatorBuilder {
            logger: Logger::root(Discard, o!()),
            metrics: AllocatorMetrics::new(&MetricBuilder::new()),
        }
    }

    /// ロガーを登録する.
    ///
    /// デフォルトでは、全てのログが破棄される.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: &MetricBuilder) -> &mut Self {
        self.metrics = AllocatorMetrics::new(metrics);
        self
    }

    /// このビルダが使用するメトリクスを返す.
    pub fn allocator_metrics(&self) -> &AllocatorMetrics {
        &self.metrics
    }

    /// 指定されたサイズ群のセグメントを持つ`Allocator`を生成する.
    ///
    /// # Errors
    ///
    /// `Allocator::new`と同様.
    pub fn build(&self, sizes: &[usize]) -> Result<Allocator> {
        track!(self.build_inner(sizes, None))
    }

    /// 解放フック付きの`Allocator`を生成する.
    ///
    /// `hook`は、最後の参照が破棄された時点で一度だけ呼び出される.
    /// 私有化によって作成された複製には引き継がれない.
    pub fn build_with_release_hook<F>(&self, sizes: &[usize], hook: F) -> Result<Allocator>
    where
        F: FnOnce() + Send + 'static,
    {
        track!(self.build_inner(sizes, Some(Box::new(hook))))
    }

    fn build_inner(&self, sizes: &[usize], hook: Option<ReleaseHook>) -> Result<Allocator> {
        let table = track!(SegmentTable::new(sizes))?;
        let context = Arc::new(Context {
            logger: self.logger.clone(),
            metrics: self.metrics.clone(),
        });
        let block = track!(Block::new(table, hook, Some(context)))?;
        Ok(Allocator {
            inner: Arc::new(block),
        })
    }
}
impl Default for AllocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 参照カウント付きのメモリブロック.
///
/// 一つの連続領域を`segment_count()`個のセグメントに分割して保持する.
/// 各セグメントは重なり合うことはなく、確保直後はゼロ埋めされている.
///
/// `clone()`(ないし`refer()`)は参照カウントを増やすだけで、内容は共有される.
/// 参照カウントの操作はアトミックに行われるため、異なるスレッド間で安全に共有可能.
///
/// # Examples
///
/// ```
/// use cowkit::allocator::Allocator;
///
/// let mut a = Allocator::new(&[4, 2]).unwrap();
/// let b = a.refer();
/// assert_eq!(a.refcount(), 2);
///
/// // 書き込み前に私有化されるので`b`からは変更が見えない
/// a.segment_mut(0).unwrap().copy_from_slice(b"abcd");
/// assert_eq!(a.segment(0), b"abcd");
/// assert_eq!(b.segment(0), &[0; 4][..]);
/// assert_eq!(b.refcount(), 1);
/// ```
#[derive(Clone)]
pub struct Allocator {
    inner: Arc<Block>,
}
impl Allocator {
    /// 指定されたサイズ群のセグメントを持つ`Allocator`インスタンスを生成する.
    ///
    /// 全セグメントは一回の確保で得られた連続領域内に順番に配置される.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - `sizes`が空
    /// - サイズが`0`のセグメントが含まれている
    ///
    /// メモリの確保に失敗した場合には、種類が`ErrorKind::OutOfMemory`のエラーが返される.
    pub fn new(sizes: &[usize]) -> Result<Self> {
        let table = track!(SegmentTable::new(sizes))?;
        let block = track!(Block::new(table, None, None))?;
        Ok(Allocator {
            inner: Arc::new(block),
        })
    }

    /// 単一のセグメントを持つ`Allocator`インスタンスを生成する.
    pub fn with_size(size: usize) -> Result<Self> {
        track!(Self::new(&[size]))
    }

    /// 参照を一つ増やし、同じメモリブロックを指すハンドルを返す.
    ///
    /// `clone()`と等価.
    pub fn refer(&self) -> Self {
        self.clone()
    }

    /// 参照を一つ減らす.
    ///
    /// 最後の参照だった場合には、解放フックが呼び出された後に、メモリブロックが解放される.
    /// `drop()`と等価.
    pub fn unref(self) {}

    /// 現在の参照カウントを返す.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// このハンドルがメモリブロックを排他的に所有しているかどうかを判定する.
    pub fn is_unique(&self) -> bool {
        self.refcount() == 1
    }

    /// 二つのハンドルが同じメモリブロックを指しているかどうかを判定する.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// メモリブロックを私有化する.
    ///
    /// 既に排他的に所有している場合には何も行わない(複製は発生しない).
    /// 他と共有している場合には、同じセグメント配置を持つ新しいメモリブロックを確保して内容を複製し、
    /// 元のメモリブロックへの参照を手放した上で、このハンドルを新しいブロックに付け替える.
    ///
    /// # Errors
    ///
    /// 複製用のメモリ確保に失敗した場合には、種類が`ErrorKind::OutOfMemory`のエラーが返される.
    /// その場合でも、このハンドルは元のメモリブロックを指したまま変更されない.
    pub fn privatize(&mut self) -> Result<()> {
        if self.is_unique() {
            return Ok(());
        }
        let copy = track!(self.inner.duplicate())?;
        if let Some(context) = copy.context.as_ref() {
            context.metrics.privatized_copies.increment();
            debug!(
                context.logger,
                "Privatizes a shared memory block";
                "bytes" => copy.bytes.len(),
                "refcount" => self.refcount()
            );
        }
        self.inner = Arc::new(copy);
        Ok(())
    }

    /// 参照カウントに関わらず、内容を複製した新しい`Allocator`を返す.
    pub fn deep_clone(&self) -> Result<Self> {
        let copy = track!(self.inner.duplicate())?;
        Ok(Allocator {
            inner: Arc::new(copy),
        })
    }

    /// このインスタンスと同じ設定(ロガー、メトリクス)で、別のセグメント構成の`Allocator`を生成する.
    ///
    /// 内容は引き継がれず、ゼロ埋めされた状態で返される.
    pub fn allocate_like(&self, sizes: &[usize]) -> Result<Self> {
        let table = track!(SegmentTable::new(sizes))?;
        let block = track!(Block::new(table, None, self.inner.context.clone()))?;
        Ok(Allocator {
            inner: Arc::new(block),
        })
    }

    /// セグメントの数を返す.
    pub fn segment_count(&self) -> usize {
        self.inner.table.len()
    }

    /// `index`番目のセグメントのサイズを返す.
    ///
    /// # Panics
    ///
    /// `index`がセグメント数以上の場合にはパニックする.
    pub fn size_of(&self, index: usize) -> usize {
        self.inner.table.size(index)
    }

    /// 全セグメントの合計サイズを返す.
    pub fn total_size(&self) -> usize {
        self.inner.table.total()
    }

    /// `index`番目のセグメントの内容を返す.
    ///
    /// # Panics
    ///
    /// `index`がセグメント数以上の場合にはパニックする.
    pub fn segment(&self, index: usize) -> &[u8] {
        &self.inner.bytes[self.inner.table.range(index)]
    }

    /// `index`番目のセグメントへの破壊的な参照を返す.
    ///
    /// 参照を返す前に`privatize()`が呼び出される.
    ///
    /// # Panics
    ///
    /// `index`がセグメント数以上の場合にはパニックする.
    pub fn segment_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        track!(self.privatize())?;
        let block = track!(self.exclusive())?;
        let range = block.table.range(index);
        Ok(&mut block.bytes[range])
    }

    /// 全セグメントへの破壊的な参照を、セグメントの並び順で返す.
    ///
    /// 参照を返す前に`privatize()`が呼び出される.
    pub fn segments_mut(&mut self) -> Result<Vec<&mut [u8]>> {
        track!(self.privatize())?;
        let Block { bytes, table, .. } = track!(self.exclusive())?;
        let mut rest = &mut bytes[..];
        let mut segments = Vec::with_capacity(table.len());
        for i in 0..table.len() {
            let (head, tail) = mem::take(&mut rest).split_at_mut(table.size(i));
            segments.push(head);
            rest = tail;
        }
        Ok(segments)
    }

    fn exclusive(&mut self) -> Result<&mut Block> {
        match Arc::get_mut(&mut self.inner) {
            Some(block) => Ok(block),
            None => track_panic!(
                ErrorKind::InconsistentState,
                "Memory block is shared after privatization"
            ),
        }
    }
}
impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sizes = (0..self.segment_count())
            .map(|i| self.size_of(i))
            .collect::<Vec<_>>();
        write!(
            f,
            "Allocator {{ segments: {:?}, refcount: {} }}",
            sizes,
            self.refcount()
        )
    }
}

#[derive(Debug)]
struct Context {
    logger: Logger,
    metrics: AllocatorMetrics,
}

/// 参照カウントの対象となる実体.
struct Block {
    bytes: Vec<u8>,
    table: SegmentTable,
    release_hook: Mutex<Option<ReleaseHook>>,
    context: Option<Arc<Context>>,
}
impl Block {
    fn new(
        table: SegmentTable,
        release_hook: Option<ReleaseHook>,
        context: Option<Arc<Context>>,
    ) -> Result<Self> {
        let bytes = track!(allocate_zeroed(table.total()))?;
        if let Some(context) = context.as_ref() {
            context.metrics.record_allocation(bytes.len());
        }
        Ok(Block {
            bytes,
            table,
            release_hook: Mutex::new(release_hook),
            context,
        })
    }

    fn duplicate(&self) -> Result<Self> {
        let mut copy = track!(Block::new(self.table.clone(), None, self.context.clone()))?;
        copy.bytes.copy_from_slice(&self.bytes);
        Ok(copy)
    }
}
impl Drop for Block {
    fn drop(&mut self) {
        let hook = match self.release_hook.get_mut() {
            Ok(hook) => hook.take(),
            Err(e) => e.into_inner().take(),
        };
        if let Some(hook) = hook {
            hook();
        }
        if let Some(context) = self.context.as_ref() {
            context.metrics.record_release(self.bytes.len());
            debug!(context.logger, "Releases a memory block"; "bytes" => self.bytes.len());
        }
    }
}

fn allocate_zeroed(size: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    track!(bytes.try_reserve_exact(size).map_err(crate::Error::from))?;
    bytes.resize(size, 0);
    Ok(bytes)
}
