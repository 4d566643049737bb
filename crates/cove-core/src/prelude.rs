//! # cove-core Prelude
//!
//! ## 设计意图（Why）
//! - 为上层 crate（路由器、管线实现、用户面 API）提供稳定且浅路径的
//!   一站式导入面，`use cove_core::prelude::*;` 即可获得端点装配与
//!   请求分发所需的全部常用契约；
//! - 范围刻意收敛：只收录跨模块高频依赖的类型，边缘能力（测试桩、
//!   ID 发生器）仍走明确命名空间。
//!
//! ## 收录内容（What）
//! - 端点与生命周期：[`Endpoint`]、[`EndpointState`]、[`EndpointDiagnostics`]；
//! - 请求模型：[`Request`]、[`Response`]、[`ResponseFuture`]、[`CancellationReason`]；
//! - 管线契约：[`Pipeline`]、[`PipelineInitializer`]、[`PipelineServices`]、
//!   [`ChannelConnector`]、[`EndpointChannel`]、[`ConnectStep`]、[`FailureClassifier`]；
//! - 熔断与配置：[`CircuitBreaker`]、[`BreakerState`]、[`EndpointOptions`]、
//!   [`CircuitBreakerConfig`]、[`BackoffConfig`]；
//! - 上下文与环境：[`CoreContext`]、[`EndpointContext`]、[`RequestContext`]、
//!   [`CoreEnvironment`]、[`ContextMap`]；
//! - 可观测性：[`Event`]、[`EventBus`]、[`EventKind`]、[`EventSeverity`]；
//! - 时间与错误：[`Clock`]、[`TokioClock`]、[`MockClock`]、[`CoreError`]、[`Result`]。

pub use crate::backoff::FullJitterBackoff;
pub use crate::breaker::{BreakerState, CircuitBreaker, NoopCircuitBreaker, RollingCircuitBreaker};
pub use crate::config::{BackoffConfig, CircuitBreakerConfig, EndpointOptions};
pub use crate::context::{ContextMap, CoreContext, EndpointContext, RequestContext};
pub use crate::endpoint::{Endpoint, EndpointDiagnostics, EndpointState};
pub use crate::env::CoreEnvironment;
pub use crate::error::{CoreError, ErrorCategory, codes};
pub use crate::event::{DefaultEventBus, Event, EventBus, EventKind, EventSeverity, category};
pub use crate::pipeline::{
    ChannelConnector, CodecLabelClassifier, ConnectStep, CorrelationRegistry, DispatchObserver,
    EndpointChannel, FailureClassifier, LifecycleNotice, LifecycleSignal, NoopConnectStep,
    Pipeline, PipelineInitializer, PipelineServices,
};
pub use crate::request::{CancellationReason, Request, RequestOutcome, Response, ResponseFuture};
pub use crate::service::ServiceKind;
pub use crate::time::{Clock, MockClock, Sleep, TokioClock};
pub use crate::{Result, error};
