use std::collections::TryReserveError;
use trackable::error::ErrorKindExt;

/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if let Some(e) = e.get_ref().and_then(|e| e.downcast_ref::<Error>()).cloned() {
            e
        } else if e.kind() == std::io::ErrorKind::InvalidInput {
            ErrorKind::InvalidInput.cause(e).into()
        } else {
            ErrorKind::Other.cause(e).into()
        }
    }
}
impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match *e.kind() {
            ErrorKind::InvalidInput => std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            ErrorKind::OutOfMemory => std::io::Error::new(std::io::ErrorKind::OutOfMemory, e),
            _ => std::io::Error::new(std::io::ErrorKind::Other, e),
        }
    }
}
impl From<TryReserveError> for Error {
    fn from(e: TryReserveError) -> Self {
        ErrorKind::OutOfMemory.cause(e).into()
    }
}

/// 発生し得るエラーの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// メモリ領域の確保に失敗した.
    ///
    /// 失敗した操作の対象(e.g., 私有化前の`Allocator`)は、呼び出し前の状態のまま保たれる.
    ///
    /// # 典型的な対応策
    ///
    /// - 不要なバッファやノードを解放してからリトライする
    /// - 要求サイズを小さくする
    OutOfMemory,

    /// 入力が不正.
    ///
    /// E.g., サイズが`0`のセグメント、既に親を持つノードの挿入
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正して入力を正しくする
    InvalidInput,

    /// 内部状態が不整合に陥っている.
    ///
    /// プログラムにバグがあることを示している.
    ///
    /// # 典型的な対応策
    ///
    /// - バグ修正を行ってプログラムを更新する
    InconsistentState,

    /// その他エラー.
    ///
    /// E.g., I/Oエラー
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側で（指数バックオフ等を挟みつつ）何度かリトライ
    Other,
}
impl trackable::error::ErrorKind for ErrorKind {}
