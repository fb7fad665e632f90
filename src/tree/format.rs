use std::fmt;
use std::io::Write;

use super::{NodeId, ScanControl, Tree};
use crate::{Error, Result};

impl Tree {
    /// 木構造を表す罫線を前置した上で、`args`の内容を`writer`に書き込む.
    ///
    /// `depth`は`id`が属する部分木の根からの深さで、`0`の場合には罫線は出力されない.
    /// 改行は付与されない.
    pub fn write_line<W: Write>(
        &self,
        mut writer: W,
        depth: usize,
        id: NodeId,
        args: fmt::Arguments,
    ) -> Result<()> {
        let prefix = self.line_prefix(depth, id);
        track_io!(writer.write_all(prefix.as_bytes()))?;
        track_io!(writer.write_fmt(args))?;
        Ok(())
    }

    /// `root`配下の部分木を一行一ノードの形式で`writer`に出力する.
    ///
    /// 各行の内容は`label`によって決定され、末尾には改行が付与される.
    ///
    /// ```text
    /// root
    /// ├── a
    /// │   └── c
    /// └── b
    /// ```
    pub fn dump<W, F>(&self, root: NodeId, mut writer: W, mut label: F) -> Result<()>
    where
        W: Write,
        F: FnMut(&Tree, NodeId) -> String,
    {
        let mut error: Option<Error> = None;
        self.scan(root, 0, |depth, id| {
            let text = label(self, id);
            match self.write_line(&mut writer, depth, id, format_args!("{}\n", text)) {
                Ok(()) => ScanControl::Continue,
                Err(e) => {
                    error = Some(e);
                    ScanControl::Abort
                }
            }
        });
        if let Some(e) = error {
            return Err(track!(e));
        }
        Ok(())
    }

    fn line_prefix(&self, depth: usize, id: NodeId) -> String {
        if depth == 0 {
            return String::new();
        }

        // 直近の祖先から順に`depth - 1`個分の罫線を決定し、最後に反転させる
        let mut parts = Vec::with_capacity(depth);
        parts.push(if self.sibling(id, false).is_some() {
            "├── "
        } else {
            "└── "
        });
        let mut current = id;
        for _ in 1..depth {
            current = match self.father(current) {
                Some(father) => father,
                None => break,
            };
            parts.push(if self.sibling(current, false).is_some() {
                "│   "
            } else {
                "    "
            });
        }
        parts.reverse();
        parts.concat()
    }
}
