//! Copy-on-write segment allocator, cursor buffer and hierarchical node tree.
//!
//! `cowkit`は、参照カウント付きのメモリブロックと、それを土台とする二つのデータ構造を提供するライブラリ.
//!
//! # 特徴
//!
//! - 一つの連続領域を複数の固定長セグメントに分割して管理する[Allocator]
//!   - 複製は参照の追加のみで行われ、書き込み時に共有されていた場合にだけ実体がコピーされる(copy-on-write)
//!   - 最後の参照が破棄された時点で領域が解放され、任意で登録された解放フックが一度だけ呼ばれる
//! - 読み込み位置と書き込み位置の二つのカーソルを持つ[Buffer]
//!   - 任意の`Read`/`Write`実装やファイルディスクリプタとの間でデータを取り込み/書き出し可能
//!   - 固定長単位での読み書きを行うための[ステージング][staged]機能
//! - 親/兄/弟/長子/末子の関係でノード群を繋ぐ[Tree]
//!   - 深さ優先走査、安定な子ノードの並び替え、罫線付きのダンプ出力
//! - ディレクトリ階層を[Tree]として取り込むための[dirent]モジュール
//!
//! # モジュールの依存関係
//!
//! ```text
//! dirent => tree => allocator
//!         buffer => allocator
//! ```
//!
//! - [allocator]モジュール:
//!   - 主に[Allocator]構造体を提供
//!   - 他の全てのモジュールは、データの保持にこの構造体を使用する
//! - [buffer]モジュール:
//!   - 主に[Buffer]構造体を提供
//!   - 単一セグメントの[Allocator]の上に、カーソル付きの読み書き操作を実装している
//! - [tree]モジュール:
//!   - 主に[Tree]構造体を提供
//!   - 各ノードは任意で[Allocator]をペイロードとして保持する
//! - [dirent]モジュール:
//!   - [tree]の上にディレクトリ走査を実装している
//!
//! [allocator]: ./allocator/index.html
//! [Allocator]: ./allocator/struct.Allocator.html
//! [buffer]: ./buffer/index.html
//! [Buffer]: ./buffer/struct.Buffer.html
//! [staged]: ./buffer/fn.write_staged.html
//! [tree]: ./tree/index.html
//! [Tree]: ./tree/struct.Tree.html
//! [dirent]: ./dirent/index.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate libc;
extern crate prometrics;
#[cfg(test)]
extern crate tempdir;
#[macro_use]
extern crate trackable;
#[macro_use]
extern crate slog;

pub use crate::error::{Error, ErrorKind};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

pub mod allocator;
pub mod buffer;
#[cfg(unix)]
pub mod dirent;
pub mod metrics;
pub mod tree;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
