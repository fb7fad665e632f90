use std::ops::Range;

use crate::{ErrorKind, Result};

/// 一つのメモリブロック内のセグメント配置表.
///
/// `offsets[i]..offsets[i + 1]`が`i`番目のセグメントの範囲となる.
/// 末尾の要素はブロック全体のサイズと等しい.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SegmentTable {
    offsets: Vec<usize>,
}
impl SegmentTable {
    /// 各セグメントのサイズから配置表を生成する.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - `sizes`が空
    /// - サイズが`0`のセグメントが含まれている
    /// - サイズの合計が`usize`で表現できない
    pub fn new(sizes: &[usize]) -> Result<Self> {
        track_assert!(!sizes.is_empty(), ErrorKind::InvalidInput, "No segments");

        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        let mut total = 0usize;
        offsets.push(total);
        for (i, &size) in sizes.iter().enumerate() {
            track_assert_ne!(size, 0, ErrorKind::InvalidInput, "Empty segment: index={}", i);
            total = track_assert_some!(
                total.checked_add(size),
                ErrorKind::InvalidInput,
                "Too large segments"
            );
            offsets.push(total);
        }
        Ok(SegmentTable { offsets })
    }

    /// セグメントの数を返す.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// 全セグメントの合計サイズを返す.
    pub fn total(&self) -> usize {
        self.offsets[self.len()]
    }

    /// `index`番目のセグメントのサイズを返す.
    pub fn size(&self, index: usize) -> usize {
        let range = self.range(index);
        range.end - range.start
    }

    /// `index`番目のセグメントが占める範囲を返す.
    ///
    /// # Panics
    ///
    /// `index`がセグメント数以上の場合にはパニックする.
    pub fn range(&self, index: usize) -> Range<usize> {
        assert!(
            index < self.len(),
            "Segment index out of range: index={}, segments={}",
            index,
            self.len()
        );
        self.offsets[index]..self.offsets[index + 1]
    }
}
