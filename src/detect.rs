//! センサーレスパラメータ自動検出
//!
//! スクリプト化したオープンループシーケンス（スピンアップ→惰性解放→
//! 積分リミットサンプリング→デューティ整定→結合定数サンプリング）で
//! モーターを駆動し、フラックス積分リミットと逆起電力結合定数を導出します。
//!
//! 転流ループ自体は独立して動作する実時間クリティカルループであり、
//! 本モジュールは[`MotorControl`]ファサード越しに観測・指令するだけです。
//! 各フェーズはティック上限で自己制限され、外部からのキャンセルはありません
//! （最悪ケースは全フェーズタイムアウトで約18秒）。

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};

use crate::config::MotorConfig;
use crate::fmt::*;
use crate::mcpwm::{CommMode, InputChannel, MotorControl};

/// ポーリング間隔（1ティックの実時間）
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// スピンアップ完了とみなすデューティ比
const SPIN_UP_DUTY_THRESHOLD: f32 = 0.6;

/// 惰性回転の確認に必要なタコメーター増分
const COAST_TACHO_STEPS: i32 = 3;

/// 積分リミットサンプリング区間のタコメーター増分（約50転流）
const LIMIT_SAMPLE_TACHO_STEPS: i32 = 50;

/// 結合定数サンプリング区間のタコメーター増分（約100転流）
const COUPLING_SAMPLE_TACHO_STEPS: i32 = 100;

/// 各フェーズのティック上限（タイムアウト＝上限×ポーリング間隔）
const SPIN_UP_TIMEOUT_TICKS: u32 = 5000;
const COAST_TIMEOUT_TICKS: u32 = 2000;
const LIMIT_SAMPLE_TIMEOUT_TICKS: u32 = 3000;
const DUTY_SETTLE_TIMEOUT_TICKS: u32 = 5000;
const COUPLING_SAMPLE_TIMEOUT_TICKS: u32 = 3000;

/// フェーズ数（全フェーズが条件で抜けた場合のみ成功）
const PHASE_COUNT: u8 = 5;

/// 検出シーケンスのフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectPhase {
    /// 未開始
    Idle,
    /// 固定電流・強制転流でのスピンアップ
    SpinUp,
    /// 電流ゼロで惰性回転を確認
    CoastRelease,
    /// サイクル積分アキュムレータのサンプリング（積分リミット推定）
    LimitSampling,
    /// デューティ比が低デューティしきい値まで下がるのを待つ
    DutySettle,
    /// サイクル積分アキュムレータのサンプリング（結合定数推定）
    CouplingSampling,
    /// シーケンス完了（モーターは無励磁・設定復元済み）
    Completed,
}

/// 検出シーケンスの結果
///
/// 失敗時も両推定値はそこまでに採取できたデータから計算されて返る。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DetectionResult {
    /// フラックス積分リミット推定値
    pub cycle_int_limit: f32,

    /// 逆起電力結合定数推定値
    pub bemf_coupling_k: f32,

    /// 全5フェーズが条件で抜けた場合のみtrue
    pub success: bool,
}

/// ティック駆動の検出シーケンサ
///
/// `start`でシーケンスを開始し、以後ポーリング間隔ごとに`tick`を
/// 1回呼ぶ。既存の制御タスクに組み込む場合はこの型を直接駆動し、
/// 専用タスクで回す場合は[`detect_motor_parameters`]を使う。
///
/// 同一モーターに対する検出セッションは直列化すること。内部に排他は
/// 持たないため、並行呼び出しはファサード状態を破壊する
/// （[`detect_motor_parameters_locked`]参照）。
pub struct ParamDetector {
    phase: DetectPhase,
    /// 現フェーズ内の経過ティック
    ticks: u32,
    /// 条件で抜けたフェーズ数
    ok_steps: u8,
    /// スピンアップ電流指令 [A]
    target_current: f32,
    /// シーケンス中にファサードへ要求する最小ERPM
    min_erpm: f32,
    /// 低デューティしきい値（整定目標かつ保持点）
    low_duty: f32,
    /// シーケンス開始時点のファサード設定（終了時に復元）
    entry_config: MotorConfig,
    /// 現フェーズのタコメーター基準値
    tacho_base: i32,
    cycle_int_limit: f32,
    bemf_coupling_k: f32,
}

impl ParamDetector {
    /// 新しい検出セッションを作成
    ///
    /// # 引数
    /// * `target_current` - スピンアップに使う電流指令 [A]
    /// * `min_erpm` - シーケンス中の最小電気回転数 [ERPM]
    /// * `low_duty` - 整定待ちの低デューティしきい値（0.0～1.0）
    pub fn new(target_current: f32, min_erpm: f32, low_duty: f32) -> Self {
        Self {
            phase: DetectPhase::Idle,
            ticks: 0,
            ok_steps: 0,
            target_current,
            min_erpm,
            low_duty,
            entry_config: MotorConfig::default(),
            tacho_base: 0,
            cycle_int_limit: 0.0,
            bemf_coupling_k: 0.0,
        }
    }

    /// 現在のフェーズ
    pub fn phase(&self) -> DetectPhase {
        self.phase
    }

    /// シーケンスが完了したか
    pub fn is_completed(&self) -> bool {
        self.phase == DetectPhase::Completed
    }

    /// 検出結果を取得
    ///
    /// 完了前に呼んだ場合はその時点までの部分データが返る。
    pub fn result(&self) -> DetectionResult {
        DetectionResult {
            cycle_int_limit: self.cycle_int_limit,
            bemf_coupling_k: self.bemf_coupling_k,
            success: self.ok_steps == PHASE_COUNT,
        }
    }

    /// 検出シーケンスを開始
    ///
    /// ファサードの現在設定を退避し、最小ERPM・強制転流モード・
    /// スピンアップ電流を指令してスピンアップフェーズに入る。
    pub fn start<M: MotorControl>(&mut self, motor: &mut M) {
        info!(
            "Starting motor parameter detection: current={} A, min_erpm={}, low_duty={}",
            self.target_current, self.min_erpm, self.low_duty
        );

        self.entry_config = motor.configuration();
        self.ticks = 0;
        self.ok_steps = 0;
        self.tacho_base = 0;
        self.cycle_int_limit = 0.0;
        self.bemf_coupling_k = 0.0;

        motor.set_min_erpm(self.min_erpm);
        motor.set_comm_mode(CommMode::Delay);
        motor.set_current(self.target_current);
        self.phase = DetectPhase::SpinUp;
    }

    /// シーケンサを1ティック進める
    ///
    /// ポーリング間隔ごとに1回呼ぶこと（`start`の後）。戻り値は処理後の
    /// フェーズ。フェーズは条件成立またはティック上限で厳密に順番どおり
    /// 進み、タイムアウトしたフェーズも致命的ではなく次へ進む（成功
    /// カウントに加算されないだけ）。
    pub fn tick<M: MotorControl>(&mut self, motor: &mut M) -> DetectPhase {
        match self.phase {
            DetectPhase::Idle | DetectPhase::Completed => {}

            DetectPhase::SpinUp => {
                if motor.duty_cycle_now() >= SPIN_UP_DUTY_THRESHOLD {
                    self.tally();
                    self.enter_coast_release(motor);
                } else if self.timed_out(SPIN_UP_TIMEOUT_TICKS) {
                    warn!("Spin-up phase timed out");
                    self.enter_coast_release(motor);
                }
            }

            DetectPhase::CoastRelease => {
                if motor.tachometer(0) - self.tacho_base >= COAST_TACHO_STEPS {
                    self.tally();
                    self.enter_limit_sampling(motor);
                } else if self.timed_out(COAST_TIMEOUT_TICKS) {
                    warn!("Coast-release phase timed out (no spin-down detected)");
                    self.enter_limit_sampling(motor);
                }
            }

            DetectPhase::LimitSampling => {
                if motor.tachometer(0) - self.tacho_base >= LIMIT_SAMPLE_TACHO_STEPS {
                    self.tally();
                    self.enter_duty_settle(motor);
                } else if self.timed_out(LIMIT_SAMPLE_TIMEOUT_TICKS) {
                    warn!("Limit-sampling phase timed out");
                    self.enter_duty_settle(motor);
                }
            }

            DetectPhase::DutySettle => {
                if motor.duty_cycle_now() <= self.low_duty {
                    self.tally();
                    self.enter_coupling_sampling(motor);
                } else if self.timed_out(DUTY_SETTLE_TIMEOUT_TICKS) {
                    warn!("Duty-settle phase timed out");
                    self.enter_coupling_sampling(motor);
                }
            }

            DetectPhase::CouplingSampling => {
                if motor.tachometer(0) - self.tacho_base >= COUPLING_SAMPLE_TACHO_STEPS {
                    self.tally();
                    self.finish(motor);
                } else if self.timed_out(COUPLING_SAMPLE_TIMEOUT_TICKS) {
                    warn!("Coupling-sampling phase timed out");
                    self.finish(motor);
                }
            }
        }

        self.phase
    }

    fn tally(&mut self) {
        self.ok_steps += 1;
    }

    /// 現フェーズのティックを進め、上限到達でtrue
    fn timed_out(&mut self, limit: u32) -> bool {
        self.ticks += 1;
        self.ticks >= limit
    }

    fn enter_coast_release<M: MotorControl>(&mut self, motor: &mut M) {
        debug!("Detection: SpinUp -> CoastRelease");
        motor.set_current(0.0);
        self.tacho_base = motor.tachometer(0);
        self.ticks = 0;
        self.phase = DetectPhase::CoastRelease;
    }

    fn enter_limit_sampling<M: MotorControl>(&mut self, motor: &mut M) {
        debug!("Detection: CoastRelease -> LimitSampling");
        motor.read_reset_cycle_integrator();
        self.tacho_base = motor.tachometer(0);
        self.ticks = 0;
        self.phase = DetectPhase::LimitSampling;
    }

    fn enter_duty_settle<M: MotorControl>(&mut self, motor: &mut M) {
        self.cycle_int_limit = motor.read_reset_cycle_integrator();
        debug!(
            "Detection: LimitSampling -> DutySettle (int_limit={})",
            self.cycle_int_limit
        );
        self.ticks = 0;
        self.phase = DetectPhase::DutySettle;
    }

    fn enter_coupling_sampling<M: MotorControl>(&mut self, motor: &mut M) {
        debug!("Detection: DutySettle -> CouplingSampling");
        // タイムアウト時も低デューティ点へ強制し、保持点を確定させる
        motor.set_duty(self.low_duty);
        motor.read_reset_cycle_integrator();
        self.tacho_base = motor.tachometer(0);
        self.ticks = 0;
        self.phase = DetectPhase::CouplingSampling;
    }

    /// 最終フェーズの出口処理
    ///
    /// 結果の導出・無励磁化・退避設定の復元は成否によらずここを通る。
    fn finish<M: MotorControl>(&mut self, motor: &mut M) {
        let avg_cycle_integrator = motor.read_reset_cycle_integrator();
        let rpm = motor.rpm();

        motor.set_current(0.0);

        // 結合定数：静的リミット分を差し引いた積分値を供給電圧センスで
        // 正規化し、機械速度でスケールする
        let vin = motor.read_input(InputChannel::VoltageSense);
        self.bemf_coupling_k = (avg_cycle_integrator - self.cycle_int_limit) / vin * rpm;

        motor.set_comm_mode(self.entry_config.comm_mode);
        motor.set_min_erpm(self.entry_config.sl_min_erpm);
        self.phase = DetectPhase::Completed;

        if self.ok_steps == PHASE_COUNT {
            info!(
                "Motor parameter detection done: int_limit={}, bemf_coupling_k={}",
                self.cycle_int_limit, self.bemf_coupling_k
            );
        } else {
            error!(
                "Motor parameter detection failed: {}/{} phases completed",
                self.ok_steps, PHASE_COUNT
            );
        }
    }
}

/// 検出シーケンス全体を実行する
///
/// ポーリング間隔ごとに[`ParamDetector::tick`]を呼び、完了まで
/// ブロックする。各イテレーションのスリープが唯一のサスペンション
/// ポイントで、転流ループを飢餓させないようプロセッサを譲る。
///
/// 呼び出し側は同一モーターへの検出セッションを直列化すること
/// （[`detect_motor_parameters_locked`]はこれをロックで保証する）。
pub async fn detect_motor_parameters<M: MotorControl>(
    motor: &mut M,
    target_current: f32,
    min_erpm: f32,
    low_duty: f32,
) -> DetectionResult {
    let mut detector = ParamDetector::new(target_current, min_erpm, low_duty);
    detector.start(motor);

    while detector.tick(motor) != DetectPhase::Completed {
        Timer::after(POLL_INTERVAL).await;
    }

    detector.result()
}

/// ファサードのロックをシーケンス全体にわたって保持して検出を実行する
///
/// ガードが検出呼び出しの寿命と一致するため、同一モーターに対する
/// セッションはここで直列化される。
pub async fn detect_motor_parameters_locked<RM: RawMutex, M: MotorControl>(
    motor: &Mutex<RM, M>,
    target_current: f32,
    min_erpm: f32,
    low_duty: f32,
) -> DetectionResult {
    let mut motor = motor.lock().await;
    detect_motor_parameters(&mut *motor, target_current, min_erpm, low_duty).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcpwm::PwmMode;

    /// テスト用のスクリプト可能なファサード
    struct StubMotor {
        config: MotorConfig,
        duty: f32,
        tacho: i32,
        rpm: f32,
        integrator: f32,
        vin: f32,
        comm_mode: CommMode,
        min_erpm: f32,
        last_current: Option<f32>,
        last_duty_cmd: Option<f32>,
    }

    impl StubMotor {
        fn new() -> Self {
            Self {
                config: MotorConfig::default(),
                duty: 0.0,
                tacho: 0,
                rpm: 0.0,
                integrator: 0.0,
                vin: 12.0,
                comm_mode: CommMode::Integrate,
                min_erpm: 150.0,
                last_current: None,
                last_duty_cmd: None,
            }
        }
    }

    impl MotorControl for StubMotor {
        fn configuration(&self) -> MotorConfig {
            self.config
        }

        fn set_comm_mode(&mut self, mode: CommMode) {
            self.comm_mode = mode;
        }

        fn set_min_erpm(&mut self, erpm: f32) {
            self.min_erpm = erpm;
        }

        fn set_current(&mut self, current: f32) {
            self.last_current = Some(current);
        }

        fn set_duty(&mut self, duty: f32) {
            self.duty = duty;
            self.last_duty_cmd = Some(duty);
        }

        fn duty_cycle_now(&self) -> f32 {
            self.duty
        }

        fn tachometer(&self, _channel: u8) -> i32 {
            self.tacho
        }

        fn rpm(&self) -> f32 {
            self.rpm
        }

        fn read_reset_cycle_integrator(&mut self) -> f32 {
            let value = self.integrator;
            self.integrator = 0.0;
            value
        }

        fn read_input(&self, channel: InputChannel) -> f32 {
            match channel {
                InputChannel::VoltageSense => self.vin,
            }
        }
    }

    #[test]
    fn test_start_commands_detection_settings() {
        let mut motor = StubMotor::new();
        let mut detector = ParamDetector::new(10.0, 300.0, 0.05);

        detector.start(&mut motor);

        assert_eq!(detector.phase(), DetectPhase::SpinUp);
        assert_eq!(motor.comm_mode, CommMode::Delay);
        assert_eq!(motor.min_erpm, 300.0);
        assert_eq!(motor.last_current, Some(10.0));
    }

    #[test]
    fn test_full_sequence_success_and_coupling_formula() {
        let mut motor = StubMotor::new();
        let mut detector = ParamDetector::new(10.0, 300.0, 0.05);
        detector.start(&mut motor);

        // スピンアップ：しきい値未満の間はフェーズ維持
        assert_eq!(detector.tick(&mut motor), DetectPhase::SpinUp);
        assert_eq!(detector.tick(&mut motor), DetectPhase::SpinUp);
        motor.duty = 0.75;
        assert_eq!(detector.tick(&mut motor), DetectPhase::CoastRelease);
        // 惰性解放に入った時点で電流はゼロ指令済み
        assert_eq!(motor.last_current, Some(0.0));

        // 惰性回転：タコメーターが3カウント進む
        motor.tacho += 3;
        assert_eq!(detector.tick(&mut motor), DetectPhase::LimitSampling);

        // 積分リミットサンプリング：50カウントでアキュムレータ読み出し
        motor.integrator = 10.0;
        motor.tacho += 50;
        assert_eq!(detector.tick(&mut motor), DetectPhase::DutySettle);

        // デューティ整定：しきい値以下で次フェーズへ、保持点を強制
        motor.duty = 0.04;
        assert_eq!(detector.tick(&mut motor), DetectPhase::CouplingSampling);
        assert_eq!(motor.last_duty_cmd, Some(0.05));

        // 結合定数サンプリング：固定値で導出式を検証
        motor.integrator = 25.0;
        motor.vin = 40.0;
        motor.rpm = 2000.0;
        motor.tacho += 100;
        assert_eq!(detector.tick(&mut motor), DetectPhase::Completed);

        let result = detector.result();
        assert!(result.success);
        assert_eq!(result.cycle_int_limit, 10.0);
        // ((25.0 - 10.0) / 40.0) * 2000.0
        assert_eq!(result.bemf_coupling_k, 750.0);

        // 復元不変条件：転流モードと最小ERPMは呼び出し前の値に戻る
        assert_eq!(motor.comm_mode, CommMode::Integrate);
        assert_eq!(motor.min_erpm, 150.0);
        // 最終的に無励磁
        assert_eq!(motor.last_current, Some(0.0));
    }

    #[test]
    fn test_stalled_motor_times_out_every_phase() {
        let mut motor = StubMotor::new();
        // どのフェーズ条件も満たさない：デューティは0.6未満かつ
        // 0.05より上で固定、タコメーターは凍結
        motor.duty = 0.3;
        motor.config.comm_mode = CommMode::Integrate;

        let mut detector = ParamDetector::new(10.0, 300.0, 0.05);
        detector.start(&mut motor);

        let mut ticks: u32 = 0;
        loop {
            ticks += 1;
            assert!(ticks <= 20_000, "sequence must self-bound");
            if detector.tick(&mut motor) == DetectPhase::Completed {
                break;
            }
            // 整定フェーズの強制デューティ指令で条件が成立しないよう戻す
            motor.duty = 0.3;
        }

        // 総ティック数＝5フェーズのタイムアウト合計
        assert_eq!(ticks, 18_000);

        let result = detector.result();
        assert!(!result.success);
        // 失敗でも出力は採取済みデータから埋まる
        assert_eq!(result.cycle_int_limit, 0.0);
        assert_eq!(result.bemf_coupling_k, 0.0);

        // 失敗時も復元と無励磁化は行われる
        assert_eq!(motor.comm_mode, CommMode::Integrate);
        assert_eq!(motor.min_erpm, 150.0);
        assert_eq!(motor.last_current, Some(0.0));
        assert_eq!(motor.last_duty_cmd, Some(0.05));
    }

    #[test]
    fn test_partial_phase_completion_is_failure() {
        let mut motor = StubMotor::new();
        // スピンアップだけ即時成立、以降はすべてタイムアウト
        motor.duty = 0.8;

        let mut detector = ParamDetector::new(10.0, 300.0, 0.05);
        detector.start(&mut motor);

        let mut ticks: u32 = 0;
        while detector.tick(&mut motor) != DetectPhase::Completed {
            ticks += 1;
            assert!(ticks <= 20_000);
            motor.duty = 0.8;
        }

        let result = detector.result();
        assert!(!result.success);
    }

    #[test]
    fn test_restores_custom_entry_settings() {
        let mut motor = StubMotor::new();
        motor.config.comm_mode = CommMode::Delay;
        motor.config.sl_min_erpm = 420.0;
        motor.config.pwm_mode = PwmMode::Bipolar;
        motor.comm_mode = CommMode::Delay;
        motor.min_erpm = 420.0;
        motor.duty = 0.3;

        let mut detector = ParamDetector::new(5.0, 200.0, 0.1);
        detector.start(&mut motor);
        // シーケンス中は検出用設定が適用される
        assert_eq!(motor.min_erpm, 200.0);

        while detector.tick(&mut motor) != DetectPhase::Completed {
            motor.duty = 0.3;
        }

        assert_eq!(motor.comm_mode, CommMode::Delay);
        assert_eq!(motor.min_erpm, 420.0);
    }

    /// 指令に追従して自走するファサード（非同期ドライバ用）
    struct AutoMotor {
        inner: StubMotor,
        tacho: core::cell::Cell<i32>,
    }

    impl AutoMotor {
        fn new() -> Self {
            let mut inner = StubMotor::new();
            inner.rpm = 2000.0;
            inner.vin = 40.0;
            Self {
                inner,
                tacho: core::cell::Cell::new(0),
            }
        }
    }

    impl MotorControl for AutoMotor {
        fn configuration(&self) -> MotorConfig {
            self.inner.configuration()
        }

        fn set_comm_mode(&mut self, mode: CommMode) {
            self.inner.set_comm_mode(mode);
        }

        fn set_min_erpm(&mut self, erpm: f32) {
            self.inner.set_min_erpm(erpm);
        }

        fn set_current(&mut self, current: f32) {
            self.inner.set_current(current);
            // 励磁中はデューティが立ち、無励磁で降下する
            self.inner.duty = if current > 0.0 { 0.8 } else { 0.0 };
        }

        fn set_duty(&mut self, duty: f32) {
            self.inner.set_duty(duty);
        }

        fn duty_cycle_now(&self) -> f32 {
            self.inner.duty_cycle_now()
        }

        fn tachometer(&self, _channel: u8) -> i32 {
            // 読むたびに転流が進む回転中モーター
            let value = self.tacho.get() + 60;
            self.tacho.set(value);
            value
        }

        fn rpm(&self) -> f32 {
            self.inner.rpm()
        }

        fn read_reset_cycle_integrator(&mut self) -> f32 {
            self.inner.read_reset_cycle_integrator()
        }

        fn read_input(&self, channel: InputChannel) -> f32 {
            self.inner.read_input(channel)
        }
    }

    #[test]
    fn test_async_driver_runs_to_completion() {
        let mut motor = AutoMotor::new();
        let result = embassy_futures::block_on(detect_motor_parameters(
            &mut motor, 10.0, 300.0, 0.05,
        ));

        assert!(result.success);
        assert_eq!(motor.inner.comm_mode, CommMode::Integrate);
        assert_eq!(motor.inner.min_erpm, 150.0);
        assert_eq!(motor.inner.last_current, Some(0.0));
    }
}
