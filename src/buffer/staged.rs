//! `Buffer`をステージング領域として利用する、固定長単位の読み書き.
//!
//! テープ装置のように、決まった大きさの単位でしか読み書きできない相手や、
//! 細切れの書き込みをまとめて発行したい場合に使用する.
use std::io::{Read, Write};

use super::Buffer;
use crate::Result;

/// `stage`を経由してデータを書き込む.
///
/// データは一旦`stage`に追記され、`stage`が満杯になる度に、その内容全体が`writer`に書き出される.
/// 受理されたバイト数が結果として返される.
///
/// `writer`が書き出しを受け付けなくなった(i.e., `0`を返した)場合には、
/// それまでに受理されたバイト数が返される.
pub fn write_staged<W: Write>(mut writer: W, data: &[u8], stage: &mut Buffer) -> Result<usize> {
    let mut accepted = 0;
    while accepted < data.len() {
        if stage.is_full() {
            let pending = track!(flush(&mut writer, stage))?;
            if pending != 0 {
                break;
            }
        }
        accepted += track!(stage.write(&data[accepted..]))?;
    }
    if stage.is_full() {
        track!(flush(&mut writer, stage))?;
    }
    Ok(accepted)
}

/// `stage`に残っているデータを書き出す.
///
/// `stuffing`が指定されている場合には、書き出し前に`stage`の残り領域がその値で埋められる
/// (ただし`stage`が空の場合は何もしない).
///
/// 書き出せずに残ったバイト数が結果として返される(`0`なら全て書き出し済み).
pub fn write_trailer<W: Write>(
    mut writer: W,
    stuffing: Option<u8>,
    stage: &mut Buffer,
) -> Result<usize> {
    if stage.is_empty() {
        return Ok(0);
    }
    if let Some(stuffing) = stuffing {
        track!(stage.fill(stuffing))?;
    }
    track!(flush(&mut writer, stage))
}

/// `stage`を経由してデータを読み込む.
///
/// `stage`が空の場合には、`stage`が満杯になるか`reader`が終端に達するまで取り込みを行った上で、
/// そこから`buf`への読み込みを行う.
/// 読み込んだバイト数が結果として返される(`reader`の終端に達していて`stage`も空なら`0`).
pub fn read_staged<R: Read>(mut reader: R, buf: &mut [u8], stage: &mut Buffer) -> Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        if stage.is_empty() {
            track!(stage.drain())?;
            while !stage.is_full() {
                if track!(stage.import(&mut reader))? == 0 {
                    break;
                }
            }
            if stage.is_empty() {
                break;
            }
        }
        done += stage.read(&mut buf[done..]);
    }
    Ok(done)
}

fn flush<W: Write>(writer: &mut W, stage: &mut Buffer) -> Result<usize> {
    while !stage.is_empty() {
        if track!(stage.export(&mut *writer))? == 0 {
            break;
        }
    }
    track!(stage.drain())?;
    Ok(stage.readable_len())
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use trackable::result::TestResult;

    use super::*;

    /// 一度に`unit`バイトまでしか受け付けない書き込み先.
    struct Chunked {
        unit: usize,
        writes: Vec<Vec<u8>>,
    }
    impl Write for Chunked {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let size = std::cmp::min(self.unit, buf.len());
            self.writes.push(buf[..size].to_owned());
            Ok(size)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_staged_works() -> TestResult {
        let mut stage = track!(Buffer::new(4))?;
        let mut out = Vec::new();

        assert_eq!(track!(write_staged(&mut out, b"ab", &mut stage))?, 2);
        assert!(out.is_empty());

        assert_eq!(track!(write_staged(&mut out, b"cdefghij", &mut stage))?, 8);
        assert_eq!(out, b"abcdefgh");
        assert_eq!(stage.as_bytes(), b"ij");

        assert_eq!(track!(write_trailer(&mut out, Some(b'.'), &mut stage))?, 0);
        assert_eq!(out, b"abcdefghij..");
        assert!(stage.is_empty());
        assert_eq!(track!(write_trailer(&mut out, Some(b'.'), &mut stage))?, 0);
        assert_eq!(out.len(), 12);
        Ok(())
    }

    #[test]
    fn short_writes_are_resumed() -> TestResult {
        let mut stage = track!(Buffer::new(5))?;
        let mut writer = Chunked {
            unit: 2,
            writes: Vec::new(),
        };
        assert_eq!(track!(write_staged(&mut writer, b"0123456", &mut stage))?, 7);
        assert_eq!(track!(write_trailer(&mut writer, None, &mut stage))?, 0);

        let joined = writer.writes.concat();
        assert_eq!(joined, b"0123456");
        assert!(writer.writes.iter().all(|w| w.len() <= 2));
        Ok(())
    }

    #[test]
    fn stalled_writer_leaves_pending_bytes() -> TestResult {
        let mut stage = track!(Buffer::new(4))?;
        let mut writer = Chunked {
            unit: 0,
            writes: Vec::new(),
        };
        assert_eq!(track!(write_staged(&mut writer, b"abcdef", &mut stage))?, 4);
        assert_eq!(track!(write_trailer(&mut writer, None, &mut stage))?, 4);
        Ok(())
    }

    #[test]
    fn read_staged_works() -> TestResult {
        let mut stage = track!(Buffer::new(4))?;
        let mut input = Cursor::new(b"0123456789".to_vec());

        let mut buf = [0; 3];
        assert_eq!(track!(read_staged(&mut input, &mut buf, &mut stage))?, 3);
        assert_eq!(&buf, b"012");
        assert_eq!(input.position(), 4);

        let mut buf = [0; 6];
        assert_eq!(track!(read_staged(&mut input, &mut buf, &mut stage))?, 6);
        assert_eq!(&buf, b"345678");

        let mut buf = [0; 6];
        assert_eq!(track!(read_staged(&mut input, &mut buf, &mut stage))?, 1);
        assert_eq!(&buf[..1], b"9");
        assert_eq!(track!(read_staged(&mut input, &mut buf, &mut stage))?, 0);
        Ok(())
    }
}
