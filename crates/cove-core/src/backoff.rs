use std::time::Duration;

use crate::config::BackoffConfig;

/// 满抖动指数退避：第 n 次失败后的等待取 `U[0, min(cap, base·factor^n))`。
///
/// # 设计背景（Why）
/// - 重连风暴下，满抖动比等比退避更快打散集体重试的相位；
/// - 抖动采用 SplitMix64 确定性伪随机：同一种子下序列完全可复现，
///   生命周期测试得以断言精确的事件计数，无需引入随机源依赖。
///
/// # 契约说明（What）
/// - `next_delay` 每调用一次视作一次失败尝试，上界按指数增长并夹紧于
///   `cap`；返回值严格小于当次上界；
/// - `reset` 将指数归零，用于连接成功后的下一轮重连。
#[derive(Debug)]
pub struct FullJitterBackoff {
    config: BackoffConfig,
    attempt: u32,
    rng_state: u64,
}

impl FullJitterBackoff {
    /// `fallback_seed` 在配置未注入种子时使用，端点以自身 ID 派生，
    /// 保证不同端点的重试相位互不相同。
    pub fn new(config: BackoffConfig, fallback_seed: u64) -> Self {
        let seed = config.jitter_seed.unwrap_or(fallback_seed);
        Self {
            config,
            attempt: 0,
            rng_state: seed,
        }
    }

    /// 当前已连续失败的尝试次数。
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// 下一次重试前的等待时长。
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.current_ceiling();
        self.attempt = self.attempt.saturating_add(1);
        let nanos = ceiling.as_nanos().min(u128::from(u64::MAX)) as u64;
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(scale(self.next_u64(), nanos))
    }

    fn current_ceiling(&self) -> Duration {
        let base = self.config.base.as_nanos();
        // 指数按 u128 计算并夹紧，指数位一旦超过 cap 即无需继续放大。
        let exponent = self.attempt.min(63);
        let scaled = base.saturating_mul(u128::from(self.config.factor).pow(exponent));
        let cap = self.config.cap.as_nanos();
        Duration::from_nanos(scaled.min(cap).min(u128::from(u64::MAX)) as u64)
    }

    fn next_u64(&mut self) -> u64 {
        self.rng_state = self.rng_state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        mix64(self.rng_state)
    }
}

/// 将 64 位随机值映射到 `[0, bound)`，取 53 位尾数构造单位区间再缩放。
/// 末端夹紧吸收浮点舍入，保证返回值严格小于 `bound`。
fn scale(value: u64, bound: u64) -> u64 {
    let unit = (value >> 11) as f64 / (1u64 << 53) as f64;
    ((bound as f64 * unit) as u64).min(bound - 1)
}

fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
