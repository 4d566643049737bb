#![deny(unsafe_code)]
#![doc = "cove-core: 分布式文档数据库客户端的连接端点核心。"]
#![doc = ""]
#![doc = "== 体系定位 =="]
#![doc = "端点是客户端进程到一个远端服务套接字（键值、查询、搜索、分析、视图、事件、管理）的单条长生命周期有序通道。"]
#![doc = "本 crate 覆盖端点的出生、保活、保护与拆除：生命周期状态机、前置熔断器、请求关联分发契约、事件可观测面与取消/超时传播。"]
#![doc = ""]
#![doc = "== 边界 =="]
#![doc = "各协议的编解码与传输适配居于管线实现 crate；拓扑发现、跨端点路由与用户面 API 居于上层。"]
#![doc = "端点核心只消费不透明的管线初始化器与连接器抽象，对协议一无所知。"]
#![doc = ""]
#![doc = "== 并发模型 =="]
#![doc = "每端点单驱动任务：状态变量、管线槽位与熔断记账的全部变更都发生在驱动上；"]
#![doc = "跨线程调用方经指令队列触达端点，状态读取走原子快照。"]

pub mod backoff;
pub mod breaker;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod event;
pub(crate) mod ids;
pub mod pipeline;
pub mod prelude;
pub mod request;
pub mod service;
pub mod test_stubs;
pub mod time;

pub use error::{CoreError, ErrorCategory};

/// 全 crate 统一的结果别名：错误位默认为 [`CoreError`]。
pub type Result<T, E = CoreError> = core::result::Result<T, E>;
