//! センサーレスBLDCコントローラの自己キャリブレーション・設定永続化コア
//!
//! 本クレートはブラシレスモーターファームウェアのうち、ハードウェアに
//! 依存しないコアを提供します：
//!
//! - [`detect`] — スクリプト化したオープンループシーケンスでモーターを
//!   駆動し、フラックス積分リミットと逆起電力結合定数を導出する
//!   検出シーケンサ
//! - [`config`] — 調整パラメータの固定レイアウトレコードと、EEPROM
//!   スタイルの不揮発ストレージへの永続化
//!
//! 転流/PWMエンジンと物理ストレージドライバはボード側クレートが
//! [`mcpwm::MotorControl`]と[`eeprom::Eeprom`]の実装として注入します。

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
pub mod detect;
pub mod eeprom;
pub mod mcpwm;

pub use config::{ConfigSource, ConfigStore, MotorConfig};
pub use detect::{
    detect_motor_parameters, detect_motor_parameters_locked, DetectPhase, DetectionResult,
    ParamDetector,
};
pub use eeprom::{Eeprom, EepromError};
pub use mcpwm::{CommMode, InputChannel, MotorControl, PwmMode};
