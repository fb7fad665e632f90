//! ディレクトリ階層を走査して、その構造を[`Tree`]として構築するためのモジュール.
//!
//! 各エントリは一つのノードとなり、そのペイロードは以下の二つのセグメントから構成される:
//!
//! - セグメント0: エントリのフルパス(バイト列)
//! - セグメント1: 固定長(20バイト)のステータス情報. 内容は[`EntryStat`]を参照.
//!
//! シンボリックリンクは辿らない.
//!
//! [`Tree`]: ../tree/struct.Tree.html
//! [`EntryStat`]: ./struct.EntryStat.html
use byteorder::{BigEndian, ByteOrder};
use slog::{Discard, Logger};
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use crate::allocator::Allocator;
use crate::tree::{NodeId, Tree};
use crate::{ErrorKind, Result};

const STAT_SIZE: usize = 8 + 4 + 8;

/// エントリのステータス情報.
///
/// ペイロード上では、以下の順でビッグエンディアンで符号化される:
///
/// ```text
/// dev: u64 | mode: u32 | len: u64
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    /// エントリが存在するデバイスのID.
    pub dev: u64,

    /// ファイル種別とパーミッション(`st_mode`).
    pub mode: u32,

    /// ファイルサイズ(バイト単位).
    pub len: u64,
}
impl EntryStat {
    /// ノードのペイロードからステータス情報を復号する.
    ///
    /// # Errors
    ///
    /// ペイロードが二つ以上のセグメントを持たない場合や、
    /// セグメント1のサイズが想定と異なる場合には、`ErrorKind::InvalidInput`エラーが返される.
    pub fn decode(payload: &Allocator) -> Result<Self> {
        track_assert!(
            payload.segment_count() >= 2,
            ErrorKind::InvalidInput,
            "Not a directory entry: segments={}",
            payload.segment_count()
        );
        let bytes = payload.segment(1);
        track_assert_eq!(bytes.len(), STAT_SIZE, ErrorKind::InvalidInput);
        Ok(EntryStat {
            dev: BigEndian::read_u64(&bytes[0..8]),
            mode: BigEndian::read_u32(&bytes[8..12]),
            len: BigEndian::read_u64(&bytes[12..20]),
        })
    }

    /// ディレクトリかどうかを判定する.
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
    }

    /// 通常ファイルかどうかを判定する.
    pub fn is_file(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFREG as u32
    }

    /// シンボリックリンクかどうかを判定する.
    pub fn is_symlink(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFLNK as u32
    }

    fn from_metadata(metadata: &Metadata) -> Self {
        EntryStat {
            dev: metadata.dev(),
            mode: metadata.mode(),
            len: metadata.len(),
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        BigEndian::write_u64(&mut buf[0..8], self.dev);
        BigEndian::write_u32(&mut buf[8..12], self.mode);
        BigEndian::write_u64(&mut buf[12..20], self.len);
    }
}

/// ペイロードのセグメント0に格納されているパスを返す.
///
/// 末尾に`NUL`文字が含まれる場合には、その直前までがパスとして扱われる.
pub fn entry_path(payload: &Allocator) -> PathBuf {
    let bytes = payload.segment(0);
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    PathBuf::from(OsStr::from_bytes(&bytes[..end]))
}

/// ディレクトリ走査器.
///
/// # Examples
///
/// ```
/// use cowkit::dirent::DirScanner;
/// use cowkit::tree::Tree;
///
/// let mut tree = Tree::new();
/// let root = DirScanner::new().depth(0).scan_path(&mut tree, "/").unwrap();
/// assert!(tree.len() >= 1);
/// assert_eq!(tree.father(root), None);
/// ```
#[derive(Debug, Clone)]
pub struct DirScanner {
    depth: usize,
    one_file_system: bool,
    max_entries: Option<usize>,
    logger: Logger,
}
impl DirScanner {
    /// デフォルト設定で`DirScanner`を生成する.
    pub fn new() -> Self {
        Self::default()
    }

    /// 走査の深さを設定する.
    ///
    /// `0`なら指定されたディレクトリの直下のみを、
    /// `n`(`>= 1`)ならそこから更に`n`階層下までを走査する.
    ///
    /// デフォルト値は`0`.
    pub fn depth(&mut self, depth: usize) -> &mut Self {
        self.depth = depth;
        self
    }

    /// 起点と異なるファイルシステム上のディレクトリには降りないようにするかどうかを設定する.
    ///
    /// デフォルト値は`false`.
    pub fn one_file_system(&mut self, enabled: bool) -> &mut Self {
        self.one_file_system = enabled;
        self
    }

    /// 一回の走査で追加するノード数の上限を設定する.
    ///
    /// 上限を超えるエントリが見つかった場合には、走査はエラーとなる.
    /// エントリ数が多いとメモリ使用量も大きくなるので、その抑制に使用する.
    ///
    /// デフォルト値は`None`(上限なし).
    pub fn max_entries(&mut self, limit: Option<usize>) -> &mut Self {
        self.max_entries = limit;
        self
    }

    /// ロガーを設定する.
    ///
    /// 読み込めなかったエントリは、このロガーに警告として出力される.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// `path`を起点に走査を行い、その結果を格納した木の根を返す.
    ///
    /// 根のペイロードは、エントリのノードと同じ形式となる.
    pub fn scan_path<P: AsRef<Path>>(&self, tree: &mut Tree, path: P) -> Result<NodeId> {
        let path = path.as_ref();
        let metadata = track_io!(fs::symlink_metadata(path))?;
        let root = track!(alloc_entry(tree, path, &metadata))?;
        if let Err(e) = self.scan(tree, root) {
            tree.free(root);
            return Err(track!(e));
        }
        Ok(root)
    }

    /// `father`のペイロードのセグメント0に格納されているパスを起点に走査を行う.
    ///
    /// 見つかったエントリは、それぞれ`father`(ないしその子孫)の末子として追加される.
    /// 同じディレクトリ内のエントリは、名前の昇順に並ぶ.
    ///
    /// 追加されたノードの数が結果として返される.
    ///
    /// # Errors
    ///
    /// 起点となるディレクトリが読み込めなかった場合にはエラーが返される.
    /// 配下のディレクトリが読み込めなかった場合には、警告を出力した上でスキップする.
    ///
    /// エラー時には、それまでに追加されたノードは全て解放され、`father`は呼び出し前の状態に戻る.
    pub fn scan(&self, tree: &mut Tree, father: NodeId) -> Result<usize> {
        let start = match tree.payload(father) {
            Some(payload) => entry_path(payload),
            None => track_panic!(ErrorKind::InvalidInput, "No payload: {:?}", father),
        };
        let start_dev = track_io!(fs::metadata(&start))?.dev();
        let entries = track!(read_sorted(&start))?;

        let mut attached = Vec::new();
        match self.scan_entries(tree, father, start_dev, entries, &mut attached) {
            Ok(added) => Ok(added),
            Err(e) => {
                // 途中まで追加したノード群を取り除いて、呼び出し前の状態に戻す
                for id in attached {
                    tree.free(id);
                }
                Err(track!(e))
            }
        }
    }

    fn scan_entries(
        &self,
        tree: &mut Tree,
        father: NodeId,
        start_dev: u64,
        entries: Vec<PathBuf>,
        attached: &mut Vec<NodeId>,
    ) -> Result<usize> {
        let mut added = 0;
        let mut stack = vec![(father, 0, entries)];
        while let Some((dir, level, entries)) = stack.pop() {
            for entry in entries {
                let metadata = match fs::symlink_metadata(&entry) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(self.logger, "Cannot stat a directory entry";
                              "path" => %entry.display(), "error" => %e);
                        continue;
                    }
                };
                if let Some(limit) = self.max_entries {
                    track_assert!(
                        added < limit,
                        ErrorKind::Other,
                        "Too many entries: limit={}, path={:?}",
                        limit,
                        entry
                    );
                }
                let node = track!(alloc_entry(tree, &entry, &metadata))?;
                if let Err(e) = tree.insert_child(dir, node, false) {
                    tree.free(node);
                    return Err(track!(e));
                }
                if dir == father {
                    attached.push(node);
                }
                added += 1;

                if !metadata.file_type().is_dir() || level >= self.depth {
                    continue;
                }
                if self.one_file_system && metadata.dev() != start_dev {
                    continue;
                }
                match read_sorted(&entry) {
                    Ok(children) => stack.push((node, level + 1, children)),
                    Err(e) => {
                        warn!(self.logger, "Cannot read a directory";
                              "path" => %entry.display(), "error" => %e);
                    }
                }
            }
        }
        Ok(added)
    }
}
impl Default for DirScanner {
    fn default() -> Self {
        DirScanner {
            depth: 0,
            one_file_system: false,
            max_entries: None,
            logger: Logger::root(Discard, o!()),
        }
    }
}

fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in track_io!(fs::read_dir(dir))? {
        let entry = track_io!(entry)?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn alloc_entry(tree: &mut Tree, path: &Path, metadata: &Metadata) -> Result<NodeId> {
    let path = path.as_os_str().as_bytes();
    track_assert!(!path.is_empty(), ErrorKind::InvalidInput);

    let mut payload = track!(Allocator::new(&[path.len(), STAT_SIZE]))?;
    {
        let mut segments = track!(payload.segments_mut())?;
        segments[0].copy_from_slice(path);
        EntryStat::from_metadata(metadata).encode(&mut segments[1]);
    }
    Ok(tree.alloc(Some(payload)))
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use tempdir::TempDir;
    use trackable::result::TestResult;

    use super::*;
    use crate::tree::ScanControl;

    fn names(tree: &Tree, root: NodeId) -> Vec<(usize, String)> {
        let base = tree.payload(root).map(entry_path).unwrap_or_default();
        let mut names = Vec::new();
        tree.scan(root, 0, |depth, id| {
            let path = tree.payload(id).map(entry_path).unwrap_or_default();
            let relative = path.strip_prefix(&base).unwrap_or(path.as_path());
            names.push((depth, relative.display().to_string()));
            ScanControl::Continue
        });
        names
    }

    fn setup() -> crate::Result<TempDir> {
        let dir = track_io!(TempDir::new("cowkit_dirent"))?;
        track_io!(fs::create_dir_all(dir.path().join("a/b/c")))?;
        let mut f = track_io!(File::create(dir.path().join("a/x.txt")))?;
        track_io!(f.write_all(b"hello"))?;
        track_io!(File::create(dir.path().join("z")))?;
        Ok(dir)
    }

    #[test]
    fn scan_path_works() -> TestResult {
        let dir = track!(setup())?;
        let mut tree = Tree::new();
        let root = track!(DirScanner::new().depth(10).scan_path(&mut tree, dir.path()))?;
        assert_eq!(
            names(&tree, root),
            vec![
                (0, "".to_owned()),
                (1, "a".to_owned()),
                (2, "a/b".to_owned()),
                (3, "a/b/c".to_owned()),
                (2, "a/x.txt".to_owned()),
                (1, "z".to_owned()),
            ]
        );

        let a = tree.child(root, true).unwrap();
        let stat = track!(EntryStat::decode(tree.payload(a).unwrap()))?;
        assert!(stat.is_dir());

        let x = tree.child(a, false).unwrap();
        let stat = track!(EntryStat::decode(tree.payload(x).unwrap()))?;
        assert!(stat.is_file());
        assert_eq!(stat.len, 5);
        Ok(())
    }

    #[test]
    fn depth_limits_descent() -> TestResult {
        let dir = track!(setup())?;
        let mut tree = Tree::new();

        let root = track!(DirScanner::new().scan_path(&mut tree, dir.path()))?;
        assert_eq!(names(&tree, root).len(), 3);

        let root = track!(DirScanner::new().depth(1).scan_path(&mut tree, dir.path()))?;
        assert_eq!(names(&tree, root).len(), 5);
        Ok(())
    }

    #[test]
    fn scan_under_existing_node_works() -> TestResult {
        let dir = track!(setup())?;
        let mut tree = Tree::new();

        // `NUL`終端されたパスも受け付ける
        let mut path = dir.path().as_os_str().as_bytes().to_owned();
        path.push(0);
        let root = track!(tree.alloc_with_size(path.len()))?;
        track!(tree.payload_mut(root).unwrap().segment_mut(0))?.copy_from_slice(&path);

        let added = track!(DirScanner::new()
            .depth(1)
            .one_file_system(true)
            .scan(&mut tree, root))?;
        assert_eq!(added, 4);
        assert_eq!(tree.len(), 5);
        Ok(())
    }

    #[test]
    fn symlinks_are_not_followed() -> TestResult {
        let dir = track!(setup())?;
        track_io!(std::os::unix::fs::symlink(
            dir.path().join("a"),
            dir.path().join("link")
        ))?;

        let mut tree = Tree::new();
        let root = track!(DirScanner::new().depth(10).scan_path(&mut tree, dir.path()))?;
        let link = tree
            .children(root)
            .find(|&id| tree.payload(id).map(entry_path) == Some(dir.path().join("link")))
            .unwrap();
        let stat = track!(EntryStat::decode(tree.payload(link).unwrap()))?;
        assert!(stat.is_symlink());
        assert_eq!(tree.child(link, true), None);
        Ok(())
    }

    #[test]
    fn unreadable_start_is_an_error() -> TestResult {
        let dir = track!(setup())?;
        let mut tree = Tree::new();
        let missing = dir.path().join("missing");
        assert!(DirScanner::new().scan_path(&mut tree, &missing).is_err());

        // ファイルは起点にできない
        let file = dir.path().join("z");
        assert!(DirScanner::new().scan_path(&mut tree, &file).is_err());
        assert!(tree.is_empty());
        Ok(())
    }

    #[test]
    fn decode_rejects_foreign_payloads() -> TestResult {
        let payload = track!(Allocator::with_size(20))?;
        assert_eq!(
            EntryStat::decode(&payload).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        Ok(())
    }

    #[test]
    fn failed_scan_leaves_father_untouched() -> TestResult {
        let dir = track!(setup())?;
        let mut tree = Tree::new();
        let path = dir.path().as_os_str().as_bytes();
        let root = track!(tree.alloc_with_size(path.len()))?;
        track!(tree.payload_mut(root).unwrap().segment_mut(0))?.copy_from_slice(path);

        let e = DirScanner::new()
            .depth(10)
            .max_entries(Some(3))
            .scan(&mut tree, root)
            .err();
        assert_eq!(e.map(|e| *e.kind()), Some(ErrorKind::Other));
        assert_eq!(tree.child(root, true), None);
        assert_eq!(tree.len(), 1);

        let added = track!(DirScanner::new()
            .depth(10)
            .max_entries(Some(5))
            .scan(&mut tree, root))?;
        assert_eq!(added, 5);
        Ok(())
    }
}
