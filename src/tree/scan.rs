use std::cmp;

use super::{NodeId, Tree};

/// 走査時に使用するスタックの初期サイズ(深さ).
const DEFAULT_STACK_DEPTH: usize = 64;

/// `Tree::scan()`の訪問関数が返す、走査の継続方法.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanControl {
    /// 子孫および兄弟の走査を継続する.
    Continue,

    /// このノードの子孫は飛ばして、兄弟の走査を継続する.
    SkipChildren,

    /// 走査全体を即座に中断する.
    Abort,
}

impl Tree {
    /// `root`を根とする部分木を深さ優先(行きがけ順)で走査する.
    ///
    /// 各ノードに対して`visit(depth, id)`が呼び出される(`root`の深さは`0`).
    /// 走査対象は`root`の部分木のみで、`root`自身の兄弟は訪問されない.
    ///
    /// 再帰呼び出しではなく明示的なスタックを使用するので、深い木でもコールスタックは溢れない.
    /// `stack_depth_hint`はスタックの初期容量の目安で、不足する場合には自動で拡張される
    /// (`0`の場合にはデフォルト値が使われる). 木のノード数を超える値は切り詰められる.
    ///
    /// 走査が中断されずに最後まで完了した場合には`true`が返される.
    pub fn scan<F>(&self, root: NodeId, stack_depth_hint: usize, mut visit: F) -> bool
    where
        F: FnMut(usize, NodeId) -> ScanControl,
    {
        let hint = if stack_depth_hint == 0 {
            DEFAULT_STACK_DEPTH
        } else {
            stack_depth_hint
        };
        // 深さはノード数を超えない
        let capacity = cmp::min(hint, cmp::max(self.len(), 1));
        let mut stack = Vec::with_capacity(capacity);
        stack.push(root);

        while let Some(&current) = stack.last() {
            let depth = stack.len() - 1;
            match visit(depth, current) {
                ScanControl::Abort => return false,
                ScanControl::Continue => {
                    if let Some(child) = self.child(current, true) {
                        stack.push(child);
                        continue;
                    }
                }
                ScanControl::SkipChildren => {}
            }

            // 次の兄弟に進む. いなければ祖先を遡る.
            while let Some(done) = stack.pop() {
                if stack.is_empty() {
                    break;
                }
                if let Some(next) = self.sibling(done, false) {
                    stack.push(next);
                    break;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;

    /// 0 -> {1 -> {3, 4}, 2 -> {5 -> {6}}}
    fn sample() -> crate::Result<(Tree, Vec<NodeId>)> {
        let mut tree = Tree::new();
        let n = (0..7).map(|_| tree.alloc(None)).collect::<Vec<_>>();
        track!(tree.insert_child(n[0], n[1], false))?;
        track!(tree.insert_child(n[0], n[2], false))?;
        track!(tree.insert_child(n[1], n[3], false))?;
        track!(tree.insert_child(n[1], n[4], false))?;
        track!(tree.insert_child(n[2], n[5], false))?;
        track!(tree.insert_child(n[5], n[6], false))?;
        Ok((tree, n))
    }

    #[test]
    fn scan_visits_every_node_once_in_preorder() -> TestResult {
        let (tree, n) = track!(sample())?;
        let mut visited = Vec::new();
        let completed = tree.scan(n[0], 0, |depth, id| {
            visited.push((depth, id));
            ScanControl::Continue
        });
        assert!(completed);
        assert_eq!(
            visited,
            vec![
                (0, n[0]),
                (1, n[1]),
                (2, n[3]),
                (2, n[4]),
                (1, n[2]),
                (2, n[5]),
                (3, n[6]),
            ]
        );
        Ok(())
    }

    #[test]
    fn skip_children_works() -> TestResult {
        let (tree, n) = track!(sample())?;

        let mut visited = Vec::new();
        tree.scan(n[0], 0, |_, id| {
            visited.push(id);
            ScanControl::SkipChildren
        });
        assert_eq!(visited, vec![n[0]]);

        let mut visited = Vec::new();
        tree.scan(n[0], 0, |_, id| {
            visited.push(id);
            if id == n[1] {
                ScanControl::SkipChildren
            } else {
                ScanControl::Continue
            }
        });
        assert_eq!(visited, vec![n[0], n[1], n[2], n[5], n[6]]);
        Ok(())
    }

    #[test]
    fn abort_works() -> TestResult {
        let (tree, n) = track!(sample())?;

        let mut visited = 0;
        let completed = tree.scan(n[0], 0, |_, _| {
            visited += 1;
            ScanControl::Abort
        });
        assert!(!completed);
        assert_eq!(visited, 1);

        let mut visited = Vec::new();
        tree.scan(n[0], 0, |_, id| {
            visited.push(id);
            if id == n[4] {
                ScanControl::Abort
            } else {
                ScanControl::Continue
            }
        });
        assert_eq!(visited, vec![n[0], n[1], n[3], n[4]]);
        Ok(())
    }

    #[test]
    fn scan_of_subtree_ignores_root_siblings() -> TestResult {
        let (tree, n) = track!(sample())?;
        let mut visited = Vec::new();
        tree.scan(n[1], 0, |depth, id| {
            visited.push((depth, id));
            ScanControl::Continue
        });
        assert_eq!(visited, vec![(0, n[1]), (1, n[3]), (1, n[4])]);
        Ok(())
    }

    #[test]
    fn deep_tree_does_not_overflow() -> TestResult {
        let mut tree = Tree::new();
        let root = tree.alloc(None);
        let mut last = root;
        for _ in 0..10_000 {
            let node = tree.alloc(None);
            track!(tree.insert_child(last, node, true))?;
            last = node;
        }

        let mut visited = 0;
        let mut max_depth = 0;
        tree.scan(root, 1, |depth, _| {
            visited += 1;
            max_depth = depth;
            ScanControl::Continue
        });
        assert_eq!(visited, 10_001);
        assert_eq!(max_depth, 10_000);

        assert_eq!(tree.free(root), 10_001);
        Ok(())
    }

    #[test]
    fn huge_stack_depth_hint_is_clamped() -> TestResult {
        let (tree, n) = track!(sample())?;
        let mut visited = 0;
        assert!(tree.scan(n[0], usize::MAX / 4, |_, _| {
            visited += 1;
            ScanControl::Continue
        }));
        assert_eq!(visited, 7);

        let mut single = Tree::new();
        let root = single.alloc(None);
        let mut visited = 0;
        single.scan(root, usize::MAX, |_, _| {
            visited += 1;
            ScanControl::Continue
        });
        assert_eq!(visited, 1);
        Ok(())
    }
}
