//! 时间抽象：端点的重试节律、尝试超时与熔断窗口全部经由 [`Clock`] 注入，
//! 生产路径委托 Tokio 计时器，测试路径使用可手动推进的虚拟时钟。

mod clock;

pub use clock::{Clock, MockClock, Sleep, TokioClock};
