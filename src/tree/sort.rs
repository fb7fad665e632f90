use std::cmp::Ordering;

use super::{NodeId, Tree};

/// 並び替えの方向.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// 昇順.
    Ascending,

    /// 降順.
    Descending,
}

impl Tree {
    /// `father`の子ノード群を`compare`に従って並び替える.
    ///
    /// 並び替えは安定で、比較結果が等しいノード同士の相対的な順序は保たれる.
    /// `Order::Descending`が指定された場合でも、この性質は変わらない.
    ///
    /// 子ノードの集合および各子ノード配下の部分木は変化しない.
    pub fn sort<F>(&mut self, father: NodeId, mut compare: F, order: Order)
    where
        F: FnMut(&Tree, NodeId, NodeId) -> Ordering,
    {
        let mut children = self.children(father).collect::<Vec<_>>();
        if children.len() < 2 {
            return;
        }
        {
            let tree = &*self;
            match order {
                Order::Ascending => children.sort_by(|a, b| compare(tree, *a, *b)),
                Order::Descending => children.sort_by(|a, b| compare(tree, *b, *a)),
            }
        }

        let last = children.len() - 1;
        for (i, child) in children.iter().enumerate() {
            let prev = if i == 0 {
                None
            } else {
                Some(children[i - 1].index)
            };
            let next = children.get(i + 1).map(|c| c.index);
            let links = &mut self.node_mut(*child).links;
            links.prev = prev;
            links.next = next;
        }
        let links = &mut self.node_mut(father).links;
        links.first_child = Some(children[0].index);
        links.last_child = Some(children[last].index);
    }
}
