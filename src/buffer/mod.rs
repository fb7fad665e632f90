//! 読み書きカーソル付きのバッファ.
//!
//! [`Buffer`]は[`Allocator`]の先頭セグメントをストリームとして扱うためのビューであり、
//! 以下の不変項を常に満たす:
//!
//! ```text
//! 0 <= read_pos <= write_pos <= capacity
//! ```
//!
//! バッファが満杯、ないし空であることはエラーではなく、各操作の結果が`0`になることで表現される.
//!
//! 内容を書き換える操作は、全て事前に`Allocator::privatize()`を経由するので、
//! 同じメモリブロックを共有している他の`Buffer`(ないし`Allocator`)から変更が見えることはない.
//!
//! [`Buffer`]: ./struct.Buffer.html
//! [`Allocator`]: ../allocator/struct.Allocator.html
use std::cmp;
use std::fmt;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::os::unix::io::RawFd;

use crate::allocator::Allocator;
use crate::{ErrorKind, Result};

pub use self::staged::{read_staged, write_staged, write_trailer};

mod staged;

/// `Buffer::printf()`を`format!`と同じ書式で呼び出すためのマクロ.
///
/// # Examples
///
/// ```
/// #[macro_use]
/// extern crate cowkit;
///
/// use cowkit::buffer::Buffer;
///
/// # fn main() {
/// let mut buf = Buffer::new(8).unwrap();
/// assert_eq!(bprintf!(buf, "{}-{}", 12, "ab").unwrap(), 5);
/// assert_eq!(buf.as_bytes(), b"12-ab");
/// # }
/// ```
#[macro_export]
macro_rules! bprintf {
    ($buf:expr, $($arg:tt)*) => {
        $buf.printf(format_args!($($arg)*))
    };
}

/// 読み書きカーソル付きのバッファ.
///
/// `clone()`は内容の複製を伴わず、メモリブロックを共有したコピーを返す(カーソル位置は引き継がれる).
/// 内容まで複製したい場合には`deep_clone()`を使用する.
#[derive(Debug, Clone)]
pub struct Buffer {
    alloc: Allocator,
    read_pos: usize,
    write_pos: usize,
}
impl Buffer {
    /// 指定された容量を持つ新しい`Buffer`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `capacity`が`0`の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// メモリの確保に失敗した場合には、種類が`ErrorKind::OutOfMemory`のエラーが返される.
    pub fn new(capacity: usize) -> Result<Self> {
        let alloc = track!(Allocator::with_size(capacity))?;
        Ok(Self::from_allocator(alloc))
    }

    /// 既存の`Allocator`の先頭セグメントを使用する`Buffer`インスタンスを生成する.
    ///
    /// カーソルはどちらも`0`に初期化される.
    pub fn from_allocator(alloc: Allocator) -> Self {
        Buffer {
            alloc,
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// 内部で使用している`Allocator`への参照を返す.
    pub fn allocator(&self) -> &Allocator {
        &self.alloc
    }

    /// 所有権を放棄して、内部の`Allocator`を返す.
    pub fn into_allocator(self) -> Allocator {
        self.alloc
    }

    /// バッファの容量を返す.
    pub fn capacity(&self) -> usize {
        self.alloc.size_of(0)
    }

    /// 読み込みカーソルの位置を返す.
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// 書き込みカーソルの位置を返す.
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// 未読のバイト数を返す.
    pub fn readable_len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// 書き込み可能な残りバイト数を返す.
    pub fn writable_len(&self) -> usize {
        self.capacity() - self.write_pos
    }

    /// 未読のデータが存在しないかどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// これ以上書き込めないかどうかを判定する.
    pub fn is_full(&self) -> bool {
        self.write_pos == self.capacity()
    }

    /// 未読部分(`read_pos..write_pos`)のバイト列を返す.
    pub fn as_bytes(&self) -> &[u8] {
        &self.alloc.segment(0)[self.read_pos..self.write_pos]
    }

    /// 書き込み済みの部分(`0..write_pos`)のバイト列を返す.
    pub fn written_bytes(&self) -> &[u8] {
        &self.alloc.segment(0)[..self.write_pos]
    }

    /// 内部のメモリブロックを私有化する.
    ///
    /// 詳細は`Allocator::privatize()`を参照のこと.
    pub fn privatize(&mut self) -> Result<()> {
        track!(self.alloc.privatize())
    }

    /// 内容を複製した、新しい`Buffer`インスタンスを返す.
    ///
    /// カーソル位置も引き継がれる.
    pub fn deep_clone(&self) -> Result<Self> {
        let alloc = track!(self.alloc.deep_clone())?;
        Ok(Buffer {
            alloc,
            read_pos: self.read_pos,
            write_pos: self.write_pos,
        })
    }

    /// データを書き込む.
    ///
    /// 実際に書き込まれるのは`min(data.len(), writable_len())`バイトで、その値が結果として返される.
    /// バッファが満杯の場合には`0`が返される.
    ///
    /// # Errors
    ///
    /// 私有化に失敗した場合には、種類が`ErrorKind::OutOfMemory`のエラーが返される.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let size = cmp::min(data.len(), self.writable_len());
        if size == 0 {
            return Ok(0);
        }
        let start = self.write_pos;
        let segment = track!(self.alloc.segment_mut(0))?;
        segment[start..][..size].copy_from_slice(&data[..size]);
        self.write_pos += size;
        Ok(size)
    }

    /// 未読のデータを読み込む.
    ///
    /// 実際に読み込まれるのは`min(buf.len(), readable_len())`バイトで、その値が結果として返される.
    /// 未読のデータが存在しない場合には`0`が返される.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let size = cmp::min(buf.len(), self.readable_len());
        buf[..size].copy_from_slice(&self.alloc.segment(0)[self.read_pos..][..size]);
        self.read_pos += size;
        size
    }

    /// 読み込み済みのデータを排出し、未読のデータをバッファの先頭に移動する.
    ///
    /// 読み込みカーソルが既に先頭にある場合には何も行わない.
    ///
    /// # Errors
    ///
    /// 私有化に失敗した場合には、種類が`ErrorKind::OutOfMemory`のエラーが返される.
    pub fn drain(&mut self) -> Result<()> {
        if self.read_pos == 0 {
            return Ok(());
        }
        let (start, end) = (self.read_pos, self.write_pos);
        if start < end {
            let segment = track!(self.alloc.segment_mut(0))?;
            segment.copy_within(start..end, 0);
        }
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
        Ok(())
    }

    /// 残りの領域を`stuffing`で埋める.
    ///
    /// 埋められたバイト数が結果として返される(満杯の場合には`0`).
    pub fn fill(&mut self, stuffing: u8) -> Result<usize> {
        let size = self.writable_len();
        if size == 0 {
            return Ok(0);
        }
        let start = self.write_pos;
        let segment = track!(self.alloc.segment_mut(0))?;
        for b in &mut segment[start..] {
            *b = stuffing;
        }
        self.write_pos += size;
        Ok(size)
    }

    /// 書式化されたデータを書き込む.
    ///
    /// 書き込まれるのは残りの容量分までで、それを超える部分は切り捨てられる.
    /// 実際に書き込まれたバイト数が結果として返される(満杯の場合には`0`).
    ///
    /// 通常は`bprintf!`マクロ経由で使用する.
    ///
    /// # Errors
    ///
    /// 引数の書式化自体が失敗した場合には、種類が`ErrorKind::Other`のエラーが返され、
    /// 書き込みカーソルは変更されない.
    pub fn printf(&mut self, args: fmt::Arguments) -> Result<usize> {
        if self.is_full() {
            return Ok(0);
        }
        let start = self.write_pos;
        let segment = track!(self.alloc.segment_mut(0))?;
        let mut writer = BoundedWriter {
            buf: &mut segment[start..],
            len: 0,
            truncated: false,
        };
        if fmt::write(&mut writer, args).is_err() && !writer.truncated {
            track_panic!(ErrorKind::Other, "Formatting failed");
        }
        let size = writer.len;
        self.write_pos += size;
        Ok(size)
    }

    /// `reader`からデータを取り込んで、バッファの末尾に追記する.
    ///
    /// 読み込みの要求サイズは`min(at_most, writable_len())`で、`reader.read()`は一度だけ呼び出される.
    /// 取り込んだバイト数が結果として返される(終端に達した場合や満杯の場合には`0`).
    ///
    /// # Errors
    ///
    /// `reader`が返したエラーはそのまま伝播される.
    pub fn import_from<R: Read>(&mut self, mut reader: R, at_most: usize) -> Result<usize> {
        let size = cmp::min(at_most, self.writable_len());
        if size == 0 {
            return Ok(0);
        }
        let start = self.write_pos;
        let segment = track!(self.alloc.segment_mut(0))?;
        let read_size = track_io!(reader.read(&mut segment[start..][..size]))?;
        track_assert!(read_size <= size, ErrorKind::InconsistentState);
        self.write_pos += read_size;
        Ok(read_size)
    }

    /// 書き込み可能な領域全体を対象に`import_from()`を呼び出す.
    pub fn import<R: Read>(&mut self, reader: R) -> Result<usize> {
        let size = self.writable_len();
        track!(self.import_from(reader, size))
    }

    /// 未読のデータを`writer`に書き出す.
    ///
    /// 書き出しの要求サイズは`min(at_most, readable_len())`で、`writer.write()`は一度だけ呼び出される.
    /// 書き出したバイト数が結果として返され、その分だけ読み込みカーソルが進む.
    ///
    /// # Errors
    ///
    /// `writer`が返したエラーはそのまま伝播される.
    pub fn export_to<W: Write>(&mut self, mut writer: W, at_most: usize) -> Result<usize> {
        let size = cmp::min(at_most, self.readable_len());
        if size == 0 {
            return Ok(0);
        }
        let written = track_io!(writer.write(&self.alloc.segment(0)[self.read_pos..][..size]))?;
        track_assert!(written <= size, ErrorKind::InconsistentState);
        self.read_pos += written;
        Ok(written)
    }

    /// 未読のデータ全体を対象に`export_to()`を呼び出す.
    pub fn export<W: Write>(&mut self, writer: W) -> Result<usize> {
        let size = self.readable_len();
        track!(self.export_to(writer, size))
    }

    /// ファイルディスクリプタからデータを取り込む.
    ///
    /// `libc::read()`を一度だけ呼び出す以外は`import_from()`と同様.
    #[cfg(unix)]
    pub fn import_from_fd(&mut self, fd: RawFd, at_most: usize) -> Result<usize> {
        let size = cmp::min(at_most, self.writable_len());
        if size == 0 {
            return Ok(0);
        }
        let start = self.write_pos;
        let segment = track!(self.alloc.segment_mut(0))?;
        let ptr = segment[start..].as_mut_ptr() as *mut libc::c_void;
        let read_size = unsafe { libc::read(fd, ptr, size) };
        if read_size < 0 {
            return track_io!(Err(io::Error::last_os_error()));
        }
        self.write_pos += read_size as usize;
        Ok(read_size as usize)
    }

    /// ファイルディスクリプタにデータを書き出す.
    ///
    /// `libc::write()`を一度だけ呼び出す以外は`export_to()`と同様.
    #[cfg(unix)]
    pub fn export_to_fd(&mut self, fd: RawFd, at_most: usize) -> Result<usize> {
        let size = cmp::min(at_most, self.readable_len());
        if size == 0 {
            return Ok(0);
        }
        let ptr = self.alloc.segment(0)[self.read_pos..].as_ptr() as *const libc::c_void;
        let written = unsafe { libc::write(fd, ptr, size) };
        if written < 0 {
            return track_io!(Err(io::Error::last_os_error()));
        }
        self.read_pos += written as usize;
        Ok(written as usize)
    }

    /// バッファの容量を変更する.
    ///
    /// 新しいメモリブロックが確保され、書き込み済みのデータのうち先頭から
    /// `min(write_pos, new_capacity)`バイトが引き継がれる.
    /// カーソルは新しい容量に収まるように切り詰められる.
    /// 先頭以外のセグメントは、大きさと内容がそのまま引き継がれる.
    ///
    /// # Errors
    ///
    /// `new_capacity`が`0`の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        track_assert_ne!(new_capacity, 0, ErrorKind::InvalidInput);
        if new_capacity == self.capacity() {
            return Ok(());
        }
        let mut sizes = (0..self.alloc.segment_count())
            .map(|i| self.alloc.size_of(i))
            .collect::<Vec<_>>();
        sizes[0] = new_capacity;
        let mut alloc = track!(self.alloc.allocate_like(&sizes))?;

        let keep = cmp::min(self.write_pos, new_capacity);
        {
            let mut segments = track!(alloc.segments_mut())?;
            segments[0][..keep].copy_from_slice(&self.written_bytes()[..keep]);
            for (i, segment) in segments.iter_mut().enumerate().skip(1) {
                segment.copy_from_slice(self.alloc.segment(i));
            }
        }

        self.alloc = alloc;
        self.write_pos = keep;
        self.read_pos = cmp::min(self.read_pos, keep);
        Ok(())
    }
}
impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Buffer::read(self, buf))
    }
}
impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let size = track!(Buffer::write(self, buf))?;
        Ok(size)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}
impl<'a> fmt::Write for BoundedWriter<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.buf.len() - self.len;
        let size = cmp::min(room, s.len());
        self.buf[self.len..][..size].copy_from_slice(&s.as_bytes()[..size]);
        self.len += size;
        if size < s.len() {
            self.truncated = true;
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}
