//! 不揮発ストレージインターフェース
//!
//! EEPROMエミュレーション層（フラッシュページ管理を含む物理ドライバ）への
//! インターフェース。ストレージは16ビット変数をフラットな論理インデックス
//! 空間で読み書きするスタイルで抽象化され、実装はボード側クレートが提供
//! します。
//!
//! インデックス空間はファームウェア全体で共有されるため、各サブシステムは
//! 自分の予約範囲以外に書き込んではいけません。設定レコードの予約範囲は
//! [`crate::config::store`]を参照。

/// EEPROM操作のエラー型
///
/// スロット系エラーは失敗した論理インデックスを保持する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EepromError {
    /// ストレージ媒体の初期化失敗（ブート阻害条件）
    InitFailed,

    /// スロット読み取り失敗
    ReadFailed(u16),

    /// スロット書き込み失敗
    WriteFailed(u16),
}

/// 16ビットスロット単位の不揮発ストレージ
///
/// すべての操作は同期的で、スケジューリングに対して十分高速であることを
/// 前提とする（呼び出し中にサスペンドしない）。
pub trait Eeprom {
    /// ストレージ媒体を変数アクセス用に準備する
    ///
    /// 読み書きの前に必ず一度呼ぶこと。冪等。
    fn init(&mut self) -> Result<(), EepromError>;

    /// 論理インデックス`index`のスロットを読む
    fn read(&mut self, index: u16) -> Result<u16, EepromError>;

    /// 論理インデックス`index`のスロットへ書き込む
    fn write(&mut self, index: u16, value: u16) -> Result<(), EepromError>;
}
