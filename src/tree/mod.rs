//! 階層構造を表現するための汎用的な木.
//!
//! 各ノードは「親」「兄」「弟」「長子」「末子」の五つの関係を持ち、
//! 任意で[`Allocator`]をデータ(ペイロード)として保持する.
//!
//! ノード群は[`Tree`]が所有するアリーナ上に配置され、世代番号付きの[`NodeId`]で参照される.
//! 解放済みのノードを指す`NodeId`を使用した場合には、世代番号の不一致が検出されてパニックする.
//!
//! # ノードの状態
//!
//! ```text
//! Detached (親なし) <--- insert / unlink ---> Attached (親あり)
//!        \                                       /
//!         +--------------- free ----------------+--> Freed
//! ```
//!
//! [`Allocator`]: ../allocator/struct.Allocator.html
//! [`Tree`]: ./struct.Tree.html
//! [`NodeId`]: ./struct.NodeId.html
use crate::allocator::Allocator;
use crate::{ErrorKind, Result};

pub use self::scan::ScanControl;
pub use self::sort::Order;

mod format;
mod scan;
mod sort;

/// `Tree`内のノードの識別子.
///
/// ノードが解放されて、その領域が別のノードに再利用された場合でも、
/// 世代番号が異なるので、古い識別子が新しいノードを指すことはない.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Links {
    father: Option<u32>,
    prev: Option<u32>,
    next: Option<u32>,
    first_child: Option<u32>,
    last_child: Option<u32>,
}

#[derive(Debug)]
struct Node {
    links: Links,
    payload: Option<Allocator>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// ノード群を保持する木(森).
///
/// 一つの`Tree`インスタンスは、任意の数の根(親を持たないノード)を保持することができる.
///
/// # Examples
///
/// ```
/// use cowkit::tree::{ScanControl, Tree};
///
/// let mut tree = Tree::new();
/// let root = tree.alloc_with_size(8).unwrap();
/// let a = tree.alloc(None);
/// let b = tree.alloc(None);
/// tree.insert_child(root, a, false).unwrap();
/// tree.insert_child(root, b, false).unwrap();
/// assert_eq!(tree.child(root, true), Some(a));
/// assert_eq!(tree.sibling(a, false), Some(b));
///
/// let mut visited = Vec::new();
/// tree.scan(root, 0, |depth, id| {
///     visited.push((depth, id));
///     ScanControl::Continue
/// });
/// assert_eq!(visited, vec![(0, root), (1, a), (1, b)]);
/// ```
#[derive(Debug, Default)]
pub struct Tree {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    len: usize,
}
impl Tree {
    /// 空の`Tree`インスタンスを生成する.
    pub fn new() -> Self {
        Self::default()
    }

    /// 生存しているノードの数を返す.
    pub fn len(&self) -> usize {
        self.len
    }

    /// ノードが一つも存在しないかどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `id`が生存しているノードを指しているかどうかを判定する.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map_or(false, |s| s.generation == id.generation && s.node.is_some())
    }

    /// 新しいノードを生成する.
    ///
    /// 生成直後のノードは、どのノードとも関係を持たない根となる.
    /// `payload`の所有権はノードに移り、ノードの解放時に参照が破棄される.
    pub fn alloc(&mut self, payload: Option<Allocator>) -> NodeId {
        let node = Node {
            links: Links::default(),
            payload,
        };
        self.len += 1;
        if let Some(index) = self.free_slots.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            assert!(self.slots.len() < u32::MAX as usize, "Too many nodes");
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// 指定されたサイズ群のセグメントを持つペイロード付きで、新しいノードを生成する.
    pub fn alloc_with_sizes(&mut self, sizes: &[usize]) -> Result<NodeId> {
        let payload = track!(Allocator::new(sizes))?;
        Ok(self.alloc(Some(payload)))
    }

    /// 単一セグメントのペイロード付きで、新しいノードを生成する.
    pub fn alloc_with_size(&mut self, size: usize) -> Result<NodeId> {
        track!(self.alloc_with_sizes(&[size]))
    }

    /// 親ノードを返す.
    ///
    /// # Panics
    ///
    /// `id`が生存しているノードを指していない場合にはパニックする(以降の操作も同様).
    pub fn father(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).links.father.map(|i| self.id_at(i))
    }

    /// 兄弟ノードを返す.
    ///
    /// `elder`が`true`なら直前の兄を、`false`なら直後の弟を返す.
    pub fn sibling(&self, id: NodeId, elder: bool) -> Option<NodeId> {
        let links = &self.node(id).links;
        let sibling = if elder { links.prev } else { links.next };
        sibling.map(|i| self.id_at(i))
    }

    /// 子ノードを返す.
    ///
    /// `first`が`true`なら長子を、`false`なら末子を返す.
    pub fn child(&self, id: NodeId, first: bool) -> Option<NodeId> {
        let links = &self.node(id).links;
        let child = if first {
            links.first_child
        } else {
            links.last_child
        };
        child.map(|i| self.id_at(i))
    }

    /// 子ノード群を長子から順に走査するイテレータを返す.
    pub fn children(&self, id: NodeId) -> Children {
        Children {
            tree: self,
            next: self.node(id).links.first_child,
        }
    }

    /// ノードのペイロードを返す.
    pub fn payload(&self, id: NodeId) -> Option<&Allocator> {
        self.node(id).payload.as_ref()
    }

    /// ノードのペイロードへの破壊的な参照を返す.
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut Allocator> {
        self.node_mut(id).payload.as_mut()
    }

    /// ノードのペイロードを置き換えて、以前のペイロードを返す.
    pub fn replace_payload(&mut self, id: NodeId, payload: Option<Allocator>) -> Option<Allocator> {
        std::mem::replace(&mut self.node_mut(id).payload, payload)
    }

    /// ノードを親から切り離す.
    ///
    /// 切り離されたノードの子孫は、そのまま切り離されたノードの配下に残る.
    /// 親を持たないノードに対しては何も行わない.
    pub fn unlink(&mut self, id: NodeId) {
        let links = self.node(id).links;
        let father = match links.father {
            None => return,
            Some(father) => father,
        };
        match links.prev {
            Some(prev) => self.node_at_mut(prev).links.next = links.next,
            None => self.node_at_mut(father).links.first_child = links.next,
        }
        match links.next {
            Some(next) => self.node_at_mut(next).links.prev = links.prev,
            None => self.node_at_mut(father).links.last_child = links.prev,
        }

        let links = &mut self.node_mut(id).links;
        links.father = None;
        links.prev = None;
        links.next = None;
    }

    /// `child`を`father`の子として挿入する.
    ///
    /// `at`が`None`なら`child`は長子となり、
    /// そうでなければ`at`の直後(i.e., `at`の弟)に挿入される.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - `child`が既に親を持っている (付け替えたい場合は事前に`unlink()`を呼ぶこと)
    /// - `child`が`father`自身、ないしその祖先
    /// - `at`が`father`の子ではない
    pub fn insert(&mut self, father: NodeId, child: NodeId, at: Option<NodeId>) -> Result<()> {
        track_assert!(
            self.node(child).links.father.is_none(),
            ErrorKind::InvalidInput,
            "The child already has a father: {:?}",
            child
        );
        let father_links = self.node(father).links;
        let mut ancestor = Some(father.index);
        while let Some(index) = ancestor {
            track_assert_ne!(
                index,
                child.index,
                ErrorKind::InvalidInput,
                "The child is the father itself or its ancestor"
            );
            ancestor = self.node_at(index).links.father;
        }
        if let Some(at) = at {
            track_assert_eq!(
                self.node(at).links.father,
                Some(father.index),
                ErrorKind::InvalidInput,
                "Not a child of the father: {:?}",
                at
            );
        }

        let (prev, next) = match at {
            None => (None, father_links.first_child),
            Some(at) => (Some(at.index), self.node(at).links.next),
        };
        {
            let links = &mut self.node_mut(child).links;
            links.father = Some(father.index);
            links.prev = prev;
            links.next = next;
        }
        match prev {
            Some(prev) => self.node_at_mut(prev).links.next = Some(child.index),
            None => self.node_mut(father).links.first_child = Some(child.index),
        }
        match next {
            Some(next) => self.node_at_mut(next).links.prev = Some(child.index),
            None => self.node_mut(father).links.last_child = Some(child.index),
        }
        Ok(())
    }

    /// `child`を`father`の長子(`first`が`true`)ないし末子(`false`)として挿入する.
    ///
    /// # Errors
    ///
    /// `insert()`と同様.
    pub fn insert_child(&mut self, father: NodeId, child: NodeId, first: bool) -> Result<()> {
        let at = if first {
            None
        } else {
            self.child(father, false)
        };
        track!(self.insert(father, child, at))
    }

    /// ノードとその子孫を全て解放する.
    ///
    /// ノードが親を持つ場合には、事前に切り離される.
    /// 各ノードのペイロードへの参照も破棄される.
    ///
    /// 解放されたノードの数が結果として返される.
    pub fn free(&mut self, id: NodeId) -> usize {
        self.unlink(id);

        let mut freed = 0;
        let mut stack = vec![id.index];
        while let Some(index) = stack.pop() {
            let node = self.release_slot(index);
            let mut child = node.links.first_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.node_at(c).links.next;
            }
            freed += 1;
        }
        freed
    }

    fn release_slot(&mut self, index: u32) -> Node {
        let slot = &mut self.slots[index as usize];
        let node = slot.node.take().expect("Released node must be alive");
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);
        self.len -= 1;
        node
    }

    fn id_at(&self, index: u32) -> NodeId {
        NodeId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        match self.slots.get(id.index as usize) {
            Some(Slot {
                generation,
                node: Some(node),
            }) if *generation == id.generation => node,
            _ => panic!("Stale or unknown node: {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.slots.get_mut(id.index as usize) {
            Some(Slot {
                generation,
                node: Some(node),
            }) if *generation == id.generation => node,
            _ => panic!("Stale or unknown node: {:?}", id),
        }
    }

    fn node_at(&self, index: u32) -> &Node {
        self.slots[index as usize]
            .node
            .as_ref()
            .expect("Linked node must be alive")
    }

    fn node_at_mut(&mut self, index: u32) -> &mut Node {
        self.slots[index as usize]
            .node
            .as_mut()
            .expect("Linked node must be alive")
    }
}

/// 子ノード群を走査するためのイテレータ.
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<u32>,
}
impl<'a> Iterator for Children<'a> {
    type Item = NodeId;
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = self.tree.node_at(index).links.next;
        Some(self.tree.id_at(index))
    }
}
