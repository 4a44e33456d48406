//! 循环定时器
//!
//! 固定频率循环的节拍器，提供：
//! - **绝对时间锚点**：下一拍 = 上一拍 + 周期，消除累积漂移
//! - **低抖动等待**：使用 `spin_sleep`（阻塞等待，不让出给协作式调度）
//! - **超时（Overrun）处理**：本拍开始时锚点已过期则不睡眠，并把锚点重置到当前时间，避免补拍
//! - **统计**：tick 耗时（两次等待之间的工作时间）与实际周期的 min / max / mean
//!
//! # 使用示例
//!
//! ```
//! use teleop_tools::{LoopConfig, LoopTimer};
//!
//! let config = LoopConfig {
//!     frequency_hz: 1000.0,
//!     initial_wait_us: 0,
//!     max_ticks: None,
//! };
//! let mut timer = LoopTimer::new(&config).unwrap();
//! for _ in 0..10 {
//!     timer.wait_for_next_loop();
//!     // ... 一拍的工作 ...
//! }
//! timer.stop();
//! let stats = timer.stats();
//! assert_eq!(stats.ticks, 10);
//! ```

use serde::{Deserialize, Serialize};
use spin_sleep::SpinSleeper;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{trace, warn};

/// 循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// 循环频率（Hz）
    pub frequency_hz: f64,

    /// 第一拍之前的等待时间（微秒）
    pub initial_wait_us: u64,

    /// 最大 tick 数（None 表示直到收到退出信号）
    ///
    /// 用于测试或定时运行。
    pub max_ticks: Option<u64>,
}

impl LoopConfig {
    /// 控制循环默认配置：1000 Hz，首拍前等待 1ms
    pub fn control() -> Self {
        Self {
            frequency_hz: 1000.0,
            initial_wait_us: 1000,
            max_ticks: None,
        }
    }

    /// 仿真循环默认配置：2000 Hz
    pub fn simulation() -> Self {
        Self {
            frequency_hz: 2000.0,
            initial_wait_us: 0,
            max_ticks: None,
        }
    }

    /// 标称周期
    ///
    /// 频率无效（未通过 [`validate`](Self::validate)）时饱和为 `Duration::MAX`。
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency_hz).unwrap_or(Duration::MAX)
    }

    /// 校验配置
    ///
    /// 频率必须为正且对应的周期可用 `Duration` 表示（非零、不溢出）。
    pub fn validate(&self) -> Result<(), LoopConfigError> {
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(LoopConfigError::InvalidFrequency(self.frequency_hz));
        }
        match Duration::try_from_secs_f64(1.0 / self.frequency_hz) {
            Ok(period) if !period.is_zero() => {},
            _ => return Err(LoopConfigError::InvalidFrequency(self.frequency_hz)),
        }
        if self.frequency_hz > 10000.0 {
            warn!(
                "Very high loop frequency: {} Hz. This may cause performance issues.",
                self.frequency_hz
            );
        }
        Ok(())
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::control()
    }
}

/// 循环配置错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoopConfigError {
    #[error("Invalid frequency_hz: {0} (must be > 0 with a representable period)")]
    InvalidFrequency(f64),
}

/// 时长累加器
#[derive(Debug, Clone, Copy, Default)]
struct DurationAccumulator {
    count: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
}

impl DurationAccumulator {
    fn record(&mut self, sample: Duration) {
        self.count += 1;
        self.total += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = self.max.max(sample);
    }

    fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.count as f64)
    }
}

/// 固定频率循环定时器
#[derive(Debug)]
pub struct LoopTimer {
    frequency_hz: f64,
    period: Duration,
    initial_wait: Duration,
    sleeper: SpinSleeper,

    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    next_tick: Option<Instant>,
    last_wake: Option<Instant>,

    ticks: u64,
    overruns: u64,
    work: DurationAccumulator,
    periods: DurationAccumulator,
}

impl LoopTimer {
    /// 创建定时器
    ///
    /// # 错误
    ///
    /// 频率非正或非有限值时返回 `LoopConfigError::InvalidFrequency`。
    pub fn new(config: &LoopConfig) -> Result<Self, LoopConfigError> {
        config.validate()?;
        Ok(Self {
            frequency_hz: config.frequency_hz,
            period: config.period(),
            initial_wait: Duration::from_micros(config.initial_wait_us),
            sleeper: SpinSleeper::default(),
            started_at: None,
            stopped_at: None,
            next_tick: None,
            last_wake: None,
            ticks: 0,
            overruns: 0,
            work: DurationAccumulator::default(),
            periods: DurationAccumulator::default(),
        })
    }

    /// 阻塞到下一拍
    ///
    /// 第一次调用时启动计时（并等待 `initial_wait`）。
    pub fn wait_for_next_loop(&mut self) {
        let now = Instant::now();

        let deadline = match self.next_tick {
            None => {
                self.started_at = Some(now);
                now + self.initial_wait
            },
            Some(next) => {
                if let Some(wake) = self.last_wake {
                    self.work.record(now - wake);
                }
                next
            },
        };

        let deadline = if deadline > now {
            self.sleeper.sleep(deadline - now);
            deadline
        } else {
            if self.ticks > 0 {
                self.overruns += 1;
                trace!(
                    "Loop overrun at tick {}: {:?} behind schedule",
                    self.ticks,
                    now - deadline
                );
            }
            // 重置锚点，避免后续补拍
            now
        };

        let wake = Instant::now();
        if let Some(previous) = self.last_wake {
            self.periods.record(wake - previous);
        }
        self.last_wake = Some(wake);
        self.next_tick = Some(deadline + self.period);
        self.ticks += 1;
    }

    /// 停止计时（之后的 `stats()` 使用停止时刻计算总时长）
    pub fn stop(&mut self) {
        let now = Instant::now();
        if let Some(wake) = self.last_wake
            && self.stopped_at.is_none()
        {
            self.work.record(now - wake);
        }
        self.stopped_at.get_or_insert(now);
    }

    /// 已完成的 tick 数
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 标称周期
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 逻辑时间（tick 数 / 频率，秒）
    pub fn elapsed_sim_time(&self) -> f64 {
        self.ticks as f64 / self.frequency_hz
    }

    /// 墙钟时间（自第一拍起）
    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(start) => self.stopped_at.unwrap_or_else(Instant::now) - start,
            None => Duration::ZERO,
        }
    }

    /// 当前统计快照
    pub fn stats(&self) -> LoopTimingStats {
        let elapsed = self.elapsed();
        let actual_rate_hz = if elapsed.is_zero() {
            0.0
        } else {
            self.ticks as f64 / elapsed.as_secs_f64()
        };

        LoopTimingStats {
            frequency_hz: self.frequency_hz,
            ticks: self.ticks,
            overruns: self.overruns,
            elapsed,
            actual_rate_hz,
            tick_min: self.work.min.unwrap_or(Duration::ZERO),
            tick_max: self.work.max,
            tick_mean: self.work.mean(),
            period_min: self.periods.min.unwrap_or(Duration::ZERO),
            period_max: self.periods.max,
            period_mean: self.periods.mean(),
        }
    }
}

/// 循环耗时统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopTimingStats {
    /// 标称频率（Hz）
    pub frequency_hz: f64,
    /// 完成的 tick 数
    pub ticks: u64,
    /// 超时次数（开始等待时锚点已过期）
    pub overruns: u64,
    /// 总墙钟时间
    pub elapsed: Duration,
    /// 实际频率（Hz）
    pub actual_rate_hz: f64,
    /// 单拍工作耗时
    pub tick_min: Duration,
    pub tick_max: Duration,
    pub tick_mean: Duration,
    /// 实际循环周期
    pub period_min: Duration,
    pub period_max: Duration,
    pub period_mean: Duration,
}

impl LoopTimingStats {
    /// 超时率（%）
    pub fn overrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.overruns as f64 / self.ticks as f64) * 100.0
    }
}

impl fmt::Display for LoopTimingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Loop frequency:   {:.1} Hz", self.frequency_hz)?;
        writeln!(f, "  Actual rate:      {:.1} Hz", self.actual_rate_hz)?;
        writeln!(f, "  Elapsed time:     {:.3} s", self.elapsed.as_secs_f64())?;
        writeln!(f, "  Ticks:            {}", self.ticks)?;
        writeln!(
            f,
            "  Overruns:         {} ({:.2}%)",
            self.overruns,
            self.overrun_rate()
        )?;
        writeln!(
            f,
            "  Tick duration:    min {:?} / max {:?} / mean {:?}",
            self.tick_min, self.tick_max, self.tick_mean
        )?;
        write!(
            f,
            "  Loop period:      min {:?} / max {:?} / mean {:?}",
            self.period_min, self.period_max, self.period_mean
        )
    }
}
