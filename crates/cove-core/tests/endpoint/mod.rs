//! 端点生命周期集成测试入口：连接、重连退避、断开竞态与请求分发。
//!
//! # 模块目的（Why）
//! - 汇集端点状态机的全部端到端场景，统一在暂停虚拟时间下运行，
//!   使尝试超时与退避睡眠按程序序触发，事件计数可做精确断言；
//! - 过滤路径对齐 `cargo test -p cove-core --test endpoint_lifecycle`。
//!
//! # 结构概览（What）
//! - `support`：收集总线 + 剧本连接器 + 内存管线的组装工具；
//! - `lifecycle`：连接/重试/断开/竞态场景；
//! - `dispatch`：分发、关联结账与熔断联动场景。

pub mod tests {
    pub mod endpoint {
        include!("support.rs");
        include!("lifecycle.rs");
        include!("dispatch.rs");
    }
}
