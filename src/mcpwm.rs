//! モーター制御ファサードインターフェース
//!
//! 転流/PWMエンジン（割り込み駆動で独立動作する実時間ループ）への
//! コマンド・テレメトリ面。検出シーケンサはこのトレイト越しにのみ
//! モーターへアクセスし、ハードウェアハンドルは一切保持しません。

use crate::config::MotorConfig;

/// 転流モード
///
/// レコードのバイナリレイアウトに含まれるため`#[repr(u8)]`で固定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommMode {
    /// サイクル積分によるセンサーレス転流検出
    Integrate = 0,
    /// 強制（遅延ベース）転流。オープンループ始動・検出シーケンス用
    Delay = 1,
}

/// PWM生成モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PwmMode {
    /// ハイサイドのみスイッチング
    Nonsynchronous = 0,
    /// 同期整流
    Synchronous = 1,
    /// バイポーラ駆動
    Bipolar = 2,
}

/// 名前付きアナログ入力チャネル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum InputChannel {
    /// 入力電圧センス
    VoltageSense,
}

/// モーター制御ファサード
///
/// すべてのメソッドは同期・非ブロッキングで、シーケンサのタスク
/// コンテキストから安全に呼び出せることを前提とする。
pub trait MotorControl {
    /// ファサードが現在適用している設定のスナップショットを返す
    ///
    /// 検出シーケンサはここから転流モードと最小ERPMを退避し、
    /// シーケンス終了時に復元する（設定ストアからではない）。
    fn configuration(&self) -> MotorConfig;

    /// 転流モードを切り替える
    fn set_comm_mode(&mut self, mode: CommMode);

    /// センサーレス運転の最小電気回転数を設定する [ERPM]
    fn set_min_erpm(&mut self, erpm: f32);

    /// 電流指令 [A]（0.0で無励磁）
    fn set_current(&mut self, current: f32);

    /// デューティ比を直接指令する（0.0～1.0）
    fn set_duty(&mut self, duty: f32);

    /// 現在の実デューティ比（0.0～1.0）
    fn duty_cycle_now(&self) -> f32;

    /// タコメーターカウント（転流エッジごとに単調増加）
    fn tachometer(&self, channel: u8) -> i32;

    /// 現在の電気回転数 [ERPM]
    fn rpm(&self) -> f32;

    /// サイクル積分アキュムレータを読み出してゼロに戻す
    ///
    /// アキュムレータは転流区間ごとの逆起電力積分の診断値。
    fn read_reset_cycle_integrator(&mut self) -> f32;

    /// 名前付き入力チャネルの読み値
    fn read_input(&self, channel: InputChannel) -> f32;
}
