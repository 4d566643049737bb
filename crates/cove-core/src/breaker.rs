use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::CircuitBreakerConfig;
use crate::time::Clock;

/// 熔断器的三态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// 熔断器契约：`send` 前的准入闸门与结局记账。
///
/// # 契约说明（What）
/// - `allow` 在半开态会预留一个探针额度，调用方必须保证每次放行的分发
///   最终以 `record_success` 或 `record_failure` 之一结账；
/// - `Open` ⇒ `allow` 恒假；`HalfOpen` ⇒ 在途探针不超过
///   `half_open_probe_limit`；
/// - 实现内部自持同步：`allow` 可从任意调用方线程进入，记账由端点驱动
///   发起，两侧共享同一短临界区。
pub trait CircuitBreaker: Send + Sync + 'static {
    /// 是否放行一次分发。
    fn allow(&self) -> bool;

    /// 记一次成功样本。
    fn record_success(&self);

    /// 记一次失败样本。
    fn record_failure(&self);

    /// 清空窗口并闭合。端点在每次建立新物理通道后调用。
    fn reset(&self);

    /// 当前状态快照。
    fn state(&self) -> BreakerState;
}

/// 滚动窗口熔断器。
///
/// # 实现策略（How）
/// - 样本以 `(时间戳, 是否失败)` 追加进双端队列，每次变更先惰性驱逐
///   窗口外的过期样本，无后台任务；
/// - 闭合态下每记一次失败即评估：样本量达到 `volume_threshold` 且失败率
///   达到 `error_threshold_percent`（含等于）则翻转为打开态；
/// - 打开态经过 `sleep_window` 后，由下一次 `allow` 惰性晋升为半开并
///   当场预留探针；半开态一次探针成功即闭合且窗口延续不清空，
///   一次失败即重新打开并重置睡眠窗口。
///
/// # 并发（Concurrency）
/// - 全部状态居于单个互斥量之后；临界区只做队列追加、驱逐与整数比较，
///   不含任何等待点。
pub struct RollingCircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

struct BreakerInner {
    phase: Phase,
    samples: VecDeque<Sample>,
}

#[derive(Clone, Copy)]
enum Phase {
    Closed,
    Open { since: Instant },
    HalfOpen { probes_in_flight: u32 },
}

#[derive(Clone, Copy)]
struct Sample {
    at: Instant,
    failed: bool,
}

impl RollingCircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                phase: Phase::Closed,
                samples: VecDeque::new(),
            }),
        }
    }

    fn evict(&self, inner: &mut BreakerInner, now: Instant) {
        let horizon = now.checked_sub(self.config.rolling_window);
        let Some(horizon) = horizon else {
            return;
        };
        while let Some(front) = inner.samples.front() {
            if front.at < horizon {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn should_open(&self, inner: &BreakerInner) -> bool {
        let total = inner.samples.len() as u64;
        if total < u64::from(self.config.volume_threshold) {
            return false;
        }
        let failures = inner.samples.iter().filter(|s| s.failed).count() as u64;
        // 整数百分比，等于阈值时同样打开。
        failures * 100 >= total * u64::from(self.config.error_threshold_percent)
    }
}

impl CircuitBreaker for RollingCircuitBreaker {
    fn allow(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.evict(&mut inner, now);
        match inner.phase {
            Phase::Closed => true,
            Phase::Open { since } => {
                if now.saturating_duration_since(since) >= self.config.sleep_window {
                    inner.phase = Phase::HalfOpen {
                        probes_in_flight: 1,
                    };
                    true
                } else {
                    false
                }
            }
            Phase::HalfOpen {
                ref mut probes_in_flight,
            } => {
                if *probes_in_flight < self.config.half_open_probe_limit {
                    *probes_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.evict(&mut inner, now);
        match inner.phase {
            Phase::HalfOpen { .. } => {
                // 探针成功：仅闭合，窗口延续。
                inner.phase = Phase::Closed;
            }
            Phase::Closed => {
                inner.samples.push_back(Sample { at: now, failed: false });
            }
            // 打开态下到达的结局来自更早的分发，对状态无新证据价值。
            Phase::Open { .. } => {}
        }
    }

    fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.evict(&mut inner, now);
        match inner.phase {
            Phase::HalfOpen { .. } => {
                inner.phase = Phase::Open { since: now };
            }
            Phase::Closed => {
                inner.samples.push_back(Sample { at: now, failed: true });
                if self.should_open(&inner) {
                    inner.phase = Phase::Open { since: now };
                }
            }
            Phase::Open { .. } => {}
        }
    }

    fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Closed;
        inner.samples.clear();
    }

    fn state(&self) -> BreakerState {
        if !self.config.enabled {
            return BreakerState::Closed;
        }
        match self.inner.lock().phase {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

/// 禁用态熔断器：恒放行、记账为无操作。
///
/// `enabled = false` 的配置路径直接落到这里，端点无需在热路径上
/// 反复判断开关。
#[derive(Debug, Default)]
pub struct NoopCircuitBreaker;

impl CircuitBreaker for NoopCircuitBreaker {
    fn allow(&self) -> bool {
        true
    }

    fn record_success(&self) {}

    fn record_failure(&self) {}

    fn reset(&self) {}

    fn state(&self) -> BreakerState {
        BreakerState::Closed
    }
}
