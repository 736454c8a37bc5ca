//! Configuration module
//!
//! 設定レコードの定義・デフォルト値・不揮発ストレージへの永続化を
//! 提供します。

pub mod params;
pub mod record;
pub mod store;

pub use record::MotorConfig;
pub use store::{ConfigSource, ConfigStore, CONFIG_SLOT_BASE, CONFIG_SLOT_COUNT};
