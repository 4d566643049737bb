use std::time::Duration;

/// 熔断器配置。
///
/// 默认值对齐集群客户端的出厂配置：启用、50% 失败率阈值、20 个样本量
/// 门槛、10 秒睡眠窗口、60 秒滚动窗口、单探针半开。
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub error_threshold_percent: u8,
    pub volume_threshold: u32,
    pub sleep_window: Duration,
    pub rolling_window: Duration,
    pub half_open_probe_limit: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            error_threshold_percent: 50,
            volume_threshold: 20,
            sleep_window: Duration::from_secs(10),
            rolling_window: Duration::from_secs(60),
            half_open_probe_limit: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 打开阈值，整数百分比，取值 0..=100，等于即触发。
    pub fn with_error_threshold_percent(mut self, percent: u8) -> Self {
        self.error_threshold_percent = percent.min(100);
        self
    }

    pub fn with_volume_threshold(mut self, volume: u32) -> Self {
        self.volume_threshold = volume;
        self
    }

    pub fn with_sleep_window(mut self, window: Duration) -> Self {
        self.sleep_window = window;
        self
    }

    pub fn with_rolling_window(mut self, window: Duration) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn with_half_open_probe_limit(mut self, limit: u32) -> Self {
        self.half_open_probe_limit = limit.max(1);
        self
    }
}

/// 重连退避配置：带满抖动的指数退避。
///
/// 抖动为确定性伪随机（SplitMix64），`jitter_seed` 未显式给定时由端点
/// ID 派生；测试注入固定种子即可让事件计数完全可复现。
#[derive(Clone, Copy, Debug)]
pub struct BackoffConfig {
    pub base: Duration,
    pub factor: u32,
    pub cap: Duration,
    pub jitter_seed: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(32),
            factor: 2,
            cap: Duration::from_millis(4_096),
            jitter_seed: None,
        }
    }
}

impl BackoffConfig {
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor.max(1);
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }
}

/// 端点选项。
///
/// # 字段语义（What）
/// - `connect_timeout`：单次连接尝试的截止时长，超时视作尝试失败而非
///   致命错误；
/// - `idle_http_timeout`：HTTP 通道空闲看门狗阈值，经管线服务传递给
///   空闲处理器，二进制（键值）通道不适用；
/// - `disconnect_timeout`：优雅停机时等待通道关闭的上限；
/// - `low_latency`：低时延模式下刷写控制器必须在让出驱动前冲刷，
///   不得跨请求合并批量。
#[derive(Clone, Copy, Debug)]
pub struct EndpointOptions {
    pub connect_timeout: Duration,
    pub idle_http_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub low_latency: bool,
    pub circuit: CircuitBreakerConfig,
    pub backoff: BackoffConfig,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(2_500),
            idle_http_timeout: Duration::from_millis(4_500),
            disconnect_timeout: Duration::from_secs(10),
            low_latency: true,
            circuit: CircuitBreakerConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl EndpointOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_http_timeout(mut self, timeout: Duration) -> Self {
        self.idle_http_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn with_low_latency(mut self, low_latency: bool) -> Self {
        self.low_latency = low_latency;
        self
    }

    pub fn with_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}
