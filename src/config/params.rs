//! 設定レコードのコンパイル時デフォルト値
//!
//! ストレージが読めない場合（初回ブート・破損）はこの値で全フィールドを
//! 初期化します。すべてのフィールドに安全なデフォルトが定義されている
//! ことがレコードの不変条件です。

use crate::mcpwm::{CommMode, PwmMode};

/// PWM生成モード（デフォルト値）
pub const DEFAULT_PWM_MODE: PwmMode = PwmMode::Synchronous;

/// 転流モード（デフォルト値）
pub const DEFAULT_COMM_MODE: CommMode = CommMode::Integrate;

/// モーター電流上限 [A]（デフォルト値）
pub const DEFAULT_MAX_CURRENT: f32 = 60.0;

/// モーター電流下限（回生側）[A]（デフォルト値）
pub const DEFAULT_MIN_CURRENT: f32 = -60.0;

/// 入力電流上限 [A]（デフォルト値）
pub const DEFAULT_MAX_INPUT_CURRENT: f32 = 60.0;

/// 入力電流下限（回生側）[A]（デフォルト値）
pub const DEFAULT_MIN_INPUT_CURRENT: f32 = -20.0;

/// 絶対電流上限（過電流フォルトしきい値）[A]（デフォルト値）
pub const DEFAULT_MAX_ABS_CURRENT: f32 = 130.0;

/// 速度下限 [ERPM]（デフォルト値）
pub const DEFAULT_MIN_ERPM: f32 = -100_000.0;

/// 速度上限 [ERPM]（デフォルト値）
pub const DEFAULT_MAX_ERPM: f32 = 100_000.0;

/// フルブレーキを許可する最大速度 [ERPM]（デフォルト値）
pub const DEFAULT_MAX_ERPM_FBRAKE: f32 = 1500.0;

/// 入力電圧下限 [V]（デフォルト値）
pub const DEFAULT_MIN_INPUT_VOLTAGE: f32 = 8.0;

/// 入力電圧上限 [V]（デフォルト値）
pub const DEFAULT_MAX_INPUT_VOLTAGE: f32 = 50.0;

/// 過電流検出にフィルタ済み（低速）電流を使うか（デフォルト値）
pub const DEFAULT_SLOW_ABS_OVERCURRENT: bool = false;

/// 速度制限に負トルクを使うか（デフォルト値）
pub const DEFAULT_RPM_LIMIT_NEG_TORQUE: bool = true;

/// センサーレス運転を有効にするか（デフォルト値）
pub const DEFAULT_SENSORLESS: bool = true;

/// センサーレス運転の最小速度 [ERPM]（デフォルト値）
pub const DEFAULT_SL_MIN_ERPM: f32 = 150.0;

/// サイクル積分リミットを適用する最小速度 [ERPM]（デフォルト値）
pub const DEFAULT_SL_MIN_ERPM_CYCLE_INT_LIMIT: f32 = 1100.0;

/// フラックス積分リミット（検出シーケンスで自動調整される）（デフォルト値）
pub const DEFAULT_SL_CYCLE_INT_LIMIT: f32 = 62.0;

/// 高速域でのサイクル積分リミット係数（デフォルト値）
pub const DEFAULT_SL_CYCLE_INT_LIMIT_HIGH_FAC: f32 = 0.8;

/// START/LOW区間の境界速度 [ERPM]（デフォルト値）
pub const DEFAULT_SL_CYCLE_INT_RPM_BR: f32 = 80_000.0;

/// 逆起電力結合定数（検出シーケンスで自動調整される）（デフォルト値）
pub const DEFAULT_SL_BEMF_COUPLING_K: f32 = 600.0;

/// Hallセンサ方向（0または1）（デフォルト値）
pub const DEFAULT_HALL_DIR: u8 = 0;

/// Hallセンサ正転オフセット（0～5）（デフォルト値）
pub const DEFAULT_HALL_FWD_ADD: u8 = 0;

/// Hallセンサ逆転オフセット（0～5）（デフォルト値）
pub const DEFAULT_HALL_REV_ADD: u8 = 0;

/// 速度PIDの比例ゲイン（デフォルト値）
pub const DEFAULT_PID_KP: f32 = 0.0001;

/// 速度PIDの積分ゲイン（デフォルト値）
pub const DEFAULT_PID_KI: f32 = 0.002;

/// 速度PIDの微分ゲイン（デフォルト値）
pub const DEFAULT_PID_KD: f32 = 0.0;

/// 速度PID制御の最小速度 [ERPM]（デフォルト値）
pub const DEFAULT_PID_MIN_RPM: f32 = 1200.0;

/// 電流制御モードの始動ブーストデューティ比（デフォルト値）
pub const DEFAULT_CC_STARTUP_BOOST_DUTY: f32 = 0.01;

/// 電流制御モードの最小電流 [A]（デフォルト値）
pub const DEFAULT_CC_MIN_CURRENT: f32 = 1.0;

/// 電流制御ゲイン（デフォルト値）
pub const DEFAULT_CC_GAIN: f32 = 0.0046;
