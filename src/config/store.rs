//! 設定レコードの永続化
//!
//! レコードを16ビットスロット列（ビッグエンディアン分割）として
//! 不揮発ストレージの予約インデックス範囲に読み書きします。
//! 読み取りはどのスロットが失敗しても外部に失敗を報告せず、レコード全体を
//! コンパイル時デフォルトで置き換えます（部分デフォルトの混成は作らない）。

use crate::eeprom::{Eeprom, EepromError};
use crate::fmt::*;

use super::record::MotorConfig;

/// 設定レコード用スロット範囲の先頭論理インデックス
///
/// `[CONFIG_SLOT_BASE, CONFIG_SLOT_BASE + CONFIG_SLOT_COUNT)`はこの
/// レコード専用に予約され、他サブシステムの予約範囲と重なってはいけない。
pub const CONFIG_SLOT_BASE: u16 = 100;

/// レコードが占めるスロット数（1スロット＝2バイト）
pub const CONFIG_SLOT_COUNT: usize = MotorConfig::BYTE_SIZE / 2;

/// `load_with_source`が返す読み出し元の診断
///
/// 「工場デフォルトでブートした」と「ストレージが壊れていた」を呼び出し側が
/// 区別できるようにするための内部フラグ。`load`の外部契約（決して失敗を
/// 報告しない）は変えない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigSource {
    /// ストレージから有効なレコードを読み出した
    Stored,
    /// 読み取り失敗によりデフォルトレコードで代替した
    Defaults,
}

/// 設定ストア
///
/// ストレージ媒体はコンストラクタで注入され、直接のハードウェアハンドルは
/// 保持しない。
pub struct ConfigStore<S: Eeprom> {
    storage: S,
}

impl<S: Eeprom> ConfigStore<S> {
    /// 新しい設定ストアを作成
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// ストレージ媒体を変数アクセス用に準備する
    ///
    /// 読み書きの前に必ず一度呼ぶこと。失敗はブート阻害条件として
    /// 呼び出し側へ伝播する。
    pub fn init(&mut self) -> Result<(), EepromError> {
        self.storage.init()
    }

    /// 設定レコードを読み込む
    ///
    /// 決して失敗を報告しない：スロット読み取りがひとつでも失敗した場合、
    /// 部分的に埋まったレコードは破棄され、デフォルトレコードが返る。
    /// 読み出し元を知る必要があれば[`Self::load_with_source`]を使う。
    pub fn load(&mut self) -> MotorConfig {
        self.load_with_source().0
    }

    /// 設定レコードを読み込み、読み出し元の診断を添えて返す
    pub fn load_with_source(&mut self) -> (MotorConfig, ConfigSource) {
        let mut bytes = [0u8; MotorConfig::BYTE_SIZE];
        let mut is_ok = true;

        for i in 0..CONFIG_SLOT_COUNT {
            match self.storage.read(CONFIG_SLOT_BASE + i as u16) {
                Ok(var) => {
                    // ビッグエンディアン：上位バイトが先
                    bytes[2 * i] = (var >> 8) as u8;
                    bytes[2 * i + 1] = (var & 0xFF) as u8;
                }
                Err(e) => {
                    warn!("Config slot read failed: {:?}", e);
                    is_ok = false;
                    break;
                }
            }
        }

        if is_ok {
            if let Some(config) = MotorConfig::from_bytes(&bytes) {
                info!("Config loaded from storage");
                return (config, ConfigSource::Stored);
            }
            warn!("Stored config image is invalid, using defaults");
        } else {
            warn!("Config load incomplete, using defaults");
        }

        (MotorConfig::default(), ConfigSource::Defaults)
    }

    /// 設定レコードを書き込む
    ///
    /// 最初に失敗したスロットで書き込みループを中断し、そのスロット番号を
    /// エラーとして返す（書き込み済みスロットのロールバックはしない）。
    /// 失敗時のストレージは新旧混在の可能性があるため、呼び出し側は
    /// 再書き込みするまで内容を信頼してはいけない。
    pub fn store(&mut self, config: &MotorConfig) -> Result<(), EepromError> {
        let bytes = config.as_bytes();

        for i in 0..CONFIG_SLOT_COUNT {
            let var = ((bytes[2 * i] as u16) << 8) | bytes[2 * i + 1] as u16;

            if let Err(e) = self.storage.write(CONFIG_SLOT_BASE + i as u16, var) {
                error!("Config store aborted: {:?}", e);
                return Err(e);
            }
        }

        info!("Config stored ({} slots)", CONFIG_SLOT_COUNT);
        Ok(())
    }
}
