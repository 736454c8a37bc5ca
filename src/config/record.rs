//! 設定レコード構造体
//!
//! モーター制御の全調整パラメータを固定レイアウトで保持します。
//! ストレージ層はフィールド名ではなくバイトオフセットでアクセスするため、
//! バイナリレイアウトとサイズはファームウェアビルドの寿命中安定である
//! ことが前提です（`#[repr(C)]`＋明示的パディング）。

use core::mem::{offset_of, size_of};

use super::params;
use crate::mcpwm::{CommMode, PwmMode};

/// モーター設定レコード
///
/// ブート時にストレージから読まれるか、読み取り失敗時にデフォルト初期化
/// されるかのどちらか一方で構築される。サブシステム間で共有されず、
/// 読み出し/書き戻し境界をまたぐときは常にコピーされる。
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    /// PWM生成モード
    pub pwm_mode: PwmMode,

    /// 転流モード
    pub comm_mode: CommMode,

    /// パディング（アライメント調整）
    _pad0: [u8; 2],

    // === 電流・電圧・速度リミット ===
    /// モーター電流上限 [A]
    pub max_current: f32,

    /// モーター電流下限（回生側）[A]
    pub min_current: f32,

    /// 入力電流上限 [A]
    pub max_input_current: f32,

    /// 入力電流下限（回生側）[A]
    pub min_input_current: f32,

    /// 絶対電流上限（過電流フォルトしきい値）[A]
    pub max_abs_current: f32,

    /// 速度下限 [ERPM]
    pub min_erpm: f32,

    /// 速度上限 [ERPM]
    pub max_erpm: f32,

    /// フルブレーキを許可する最大速度 [ERPM]
    pub max_erpm_fbrake: f32,

    /// 入力電圧下限 [V]
    pub min_input_voltage: f32,

    /// 入力電圧上限 [V]
    pub max_input_voltage: f32,

    /// 過電流検出にフィルタ済み電流を使うか
    pub slow_abs_overcurrent: bool,

    /// 速度制限に負トルクを使うか
    pub rpm_limit_neg_torque: bool,

    // === センサーレス制御 ===
    /// センサーレス運転有効フラグ
    pub sensorless: bool,

    /// パディング
    _pad1: u8,

    /// センサーレス運転の最小速度 [ERPM]
    pub sl_min_erpm: f32,

    /// サイクル積分リミットを適用する最小速度 [ERPM]
    pub sl_min_erpm_cycle_int_limit: f32,

    /// フラックス積分リミット（検出シーケンスの出力）
    pub sl_cycle_int_limit: f32,

    /// 高速域でのサイクル積分リミット係数
    pub sl_cycle_int_limit_high_fac: f32,

    /// START/LOW区間の境界速度 [ERPM]
    pub sl_cycle_int_rpm_br: f32,

    /// 逆起電力結合定数（検出シーケンスの出力）
    pub sl_bemf_coupling_k: f32,

    // === Hallセンサオフセット ===
    /// Hallセンサ方向（0または1）
    pub hall_dir: u8,

    /// Hallセンサ正転オフセット（0～5）
    pub hall_fwd_add: u8,

    /// Hallセンサ逆転オフセット（0～5）
    pub hall_rev_add: u8,

    /// パディング
    _pad2: u8,

    // === 速度PID ===
    /// 比例ゲイン
    pub pid_kp: f32,

    /// 積分ゲイン
    pub pid_ki: f32,

    /// 微分ゲイン
    pub pid_kd: f32,

    /// 速度PID制御の最小速度 [ERPM]
    pub pid_min_rpm: f32,

    // === 電流制御 ===
    /// 始動ブーストデューティ比
    pub cc_startup_boost_duty: f32,

    /// 電流制御モードの最小電流 [A]
    pub cc_min_current: f32,

    /// 電流制御ゲイン
    pub cc_gain: f32,
}

impl MotorConfig {
    /// レコードのバイトサイズ（ストレージ層のスロット割り当て基準）
    pub const BYTE_SIZE: usize = size_of::<Self>();

    /// デフォルト設定を生成（params.rsの値を使用）
    pub const fn default() -> Self {
        Self {
            pwm_mode: params::DEFAULT_PWM_MODE,
            comm_mode: params::DEFAULT_COMM_MODE,
            _pad0: [0; 2],
            max_current: params::DEFAULT_MAX_CURRENT,
            min_current: params::DEFAULT_MIN_CURRENT,
            max_input_current: params::DEFAULT_MAX_INPUT_CURRENT,
            min_input_current: params::DEFAULT_MIN_INPUT_CURRENT,
            max_abs_current: params::DEFAULT_MAX_ABS_CURRENT,
            min_erpm: params::DEFAULT_MIN_ERPM,
            max_erpm: params::DEFAULT_MAX_ERPM,
            max_erpm_fbrake: params::DEFAULT_MAX_ERPM_FBRAKE,
            min_input_voltage: params::DEFAULT_MIN_INPUT_VOLTAGE,
            max_input_voltage: params::DEFAULT_MAX_INPUT_VOLTAGE,
            slow_abs_overcurrent: params::DEFAULT_SLOW_ABS_OVERCURRENT,
            rpm_limit_neg_torque: params::DEFAULT_RPM_LIMIT_NEG_TORQUE,
            sensorless: params::DEFAULT_SENSORLESS,
            _pad1: 0,
            sl_min_erpm: params::DEFAULT_SL_MIN_ERPM,
            sl_min_erpm_cycle_int_limit: params::DEFAULT_SL_MIN_ERPM_CYCLE_INT_LIMIT,
            sl_cycle_int_limit: params::DEFAULT_SL_CYCLE_INT_LIMIT,
            sl_cycle_int_limit_high_fac: params::DEFAULT_SL_CYCLE_INT_LIMIT_HIGH_FAC,
            sl_cycle_int_rpm_br: params::DEFAULT_SL_CYCLE_INT_RPM_BR,
            sl_bemf_coupling_k: params::DEFAULT_SL_BEMF_COUPLING_K,
            hall_dir: params::DEFAULT_HALL_DIR,
            hall_fwd_add: params::DEFAULT_HALL_FWD_ADD,
            hall_rev_add: params::DEFAULT_HALL_REV_ADD,
            _pad2: 0,
            pid_kp: params::DEFAULT_PID_KP,
            pid_ki: params::DEFAULT_PID_KI,
            pid_kd: params::DEFAULT_PID_KD,
            pid_min_rpm: params::DEFAULT_PID_MIN_RPM,
            cc_startup_boost_duty: params::DEFAULT_CC_STARTUP_BOOST_DUTY,
            cc_min_current: params::DEFAULT_CC_MIN_CURRENT,
            cc_gain: params::DEFAULT_CC_GAIN,
        }
    }

    /// バイト配列として参照を取得（シリアライズ用）
    pub fn as_bytes(&self) -> &[u8] {
        let ptr = self as *const Self as *const u8;
        unsafe { core::slice::from_raw_parts(ptr, Self::BYTE_SIZE) }
    }

    /// バイト配列から構造体を復元
    ///
    /// 列挙型とbool相当のバイトを検証してからキャストする。破損イメージ
    /// （不正な判別子）は`None`を返し、呼び出し側のデフォルト代替パスに
    /// 乗せる。
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::BYTE_SIZE {
            return None;
        }
        if !Self::discriminants_valid(bytes) {
            return None;
        }

        // 判別子検証済みのため、repr(C)レイアウトの読み出しは健全
        let config = unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Self) };
        Some(config)
    }

    /// 列挙型・boolフィールドのバイト値が有効な判別子かチェック
    fn discriminants_valid(bytes: &[u8]) -> bool {
        let pwm_mode_ok = bytes[offset_of!(Self, pwm_mode)] <= PwmMode::Bipolar as u8;
        let comm_mode_ok = bytes[offset_of!(Self, comm_mode)] <= CommMode::Delay as u8;
        let bools_ok = [
            offset_of!(Self, slow_abs_overcurrent),
            offset_of!(Self, rpm_limit_neg_torque),
            offset_of!(Self, sensorless),
        ]
        .iter()
        .all(|&off| bytes[off] <= 1);

        pwm_mode_ok && comm_mode_ok && bools_ok
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self::default()
    }
}

// コンパイル時レイアウトチェック：2バイトスロット割り当てのため
// サイズは偶数でなければならない
const _: () = {
    assert!(
        MotorConfig::BYTE_SIZE % 2 == 0,
        "MotorConfig size must be even for 16-bit slot storage"
    );
};
