#![feature(test)]
extern crate cowkit;
extern crate test;
#[macro_use]
extern crate trackable;

use cowkit::allocator::Allocator;
use cowkit::buffer::{write_staged, Buffer};
use cowkit::tree::{Order, ScanControl, Tree};
use test::Bencher;

#[bench]
fn allocator_refer_and_privatize(b: &mut Bencher) {
    let base = track_try_unwrap!(Allocator::new(&[64, 4096]));
    b.iter(|| {
        let mut copy = base.refer();
        track_try_unwrap!(copy.privatize());
        copy
    });
}

#[bench]
fn buffer_write_read_drain(b: &mut Bencher) {
    let mut buf = track_try_unwrap!(Buffer::new(64 * 1024));
    let data = vec![7; 1000];
    let mut out = vec![0; 700];
    b.iter(|| {
        while track_try_unwrap!(buf.write(&data)) > 0 {
            buf.read(&mut out);
        }
        track_try_unwrap!(buf.drain());
    });
}

#[bench]
fn buffer_write_staged(b: &mut Bencher) {
    let mut stage = track_try_unwrap!(Buffer::new(4096));
    let data = vec![1; 1500];
    let mut sink = Vec::with_capacity(1024 * 1024);
    b.iter(|| {
        sink.clear();
        track_try_unwrap!(write_staged(&mut sink, &data, &mut stage))
    });
}

fn wide_tree(children: usize) -> (Tree, cowkit::tree::NodeId) {
    let mut tree = Tree::new();
    let root = tree.alloc(None);
    for i in 0..children {
        let node = track_try_unwrap!(tree.alloc_with_size(4));
        track_try_unwrap!(tree.payload_mut(node).unwrap().segment_mut(0))
            .copy_from_slice(&(i as u32).wrapping_mul(2_654_435_761).to_be_bytes());
        track_try_unwrap!(tree.insert_child(root, node, false));
    }
    (tree, root)
}

#[bench]
fn tree_scan_10k(b: &mut Bencher) {
    let (tree, root) = wide_tree(10_000);
    b.iter(|| {
        let mut n = 0;
        tree.scan(root, 0, |_, _| {
            n += 1;
            ScanControl::Continue
        });
        n
    });
}

#[bench]
fn tree_sort_10k(b: &mut Bencher) {
    let (mut tree, root) = wide_tree(10_000);
    let mut order = Order::Ascending;
    b.iter(|| {
        tree.sort(
            root,
            |t, x, y| {
                let x = t.payload(x).unwrap().segment(0);
                let y = t.payload(y).unwrap().segment(0);
                x.cmp(y)
            },
            order,
        );
        order = match order {
            Order::Ascending => Order::Descending,
            Order::Descending => Order::Ascending,
        };
    });
}
