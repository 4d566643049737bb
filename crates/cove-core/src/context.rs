use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, Weak};

use crate::env::CoreEnvironment;
use crate::ids;
use crate::request::{CancellationReason, Request};
use crate::service::ServiceKind;

/// 上下文导出的规范形态：按键字典序排列的键值映射，
/// 日志、事件与诊断画布共享同一展示序。
pub type ContextMap = BTreeMap<Cow<'static, str>, String>;

/// 核心上下文：进程内一个客户端核心实例的身份与环境句柄。
///
/// # 设计背景（Why）
/// - 环境句柄走显式值语义：上下文沿每次操作线程化传递，
///   绝不落入线程局部存储或全局单例；
/// - 上下文自身不可变，可被自由克隆；可变侧挂（分发时延）留在请求上。
#[derive(Clone)]
pub struct CoreContext {
    core_id: u64,
    environment: Arc<CoreEnvironment>,
}

impl CoreContext {
    pub fn new(environment: Arc<CoreEnvironment>) -> Self {
        Self {
            core_id: ids::CORE_IDS.next(),
            environment,
        }
    }

    pub fn core_id(&self) -> u64 {
        self.core_id
    }

    pub fn environment(&self) -> &Arc<CoreEnvironment> {
        &self.environment
    }

    /// 导出规范键值映射。
    pub fn export_as_map(&self) -> ContextMap {
        let mut map = ContextMap::new();
        map.insert(Cow::Borrowed("core_id"), self.core_id.to_string());
        map
    }
}

/// 端点上下文：在核心上下文之上叠加端点身份四元组。
#[derive(Clone)]
pub struct EndpointContext {
    core: CoreContext,
    endpoint_id: u64,
    remote_host: Arc<str>,
    remote_port: u16,
    service: ServiceKind,
}

impl EndpointContext {
    pub fn new(core: CoreContext, remote_host: impl Into<Arc<str>>, remote_port: u16, service: ServiceKind) -> Self {
        Self {
            core,
            endpoint_id: ids::ENDPOINT_IDS.next(),
            remote_host: remote_host.into(),
            remote_port,
            service,
        }
    }

    pub fn core(&self) -> &CoreContext {
        &self.core
    }

    pub fn endpoint_id(&self) -> u64 {
        self.endpoint_id
    }

    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn export_as_map(&self) -> ContextMap {
        let mut map = self.core.export_as_map();
        map.insert(Cow::Borrowed("endpoint_id"), self.endpoint_id.to_string());
        map.insert(Cow::Borrowed("remote_host"), self.remote_host.to_string());
        map.insert(Cow::Borrowed("remote_port"), self.remote_port.to_string());
        map.insert(Cow::Borrowed("service"), self.service.as_str().to_string());
        map
    }
}

/// 请求上下文：请求身份、用户负载与一条只用于取消的弱回引。
///
/// # 设计背景（Why）
/// - 请求拥有上下文，上下文仅保留 `Weak` 回引，不构成强引用环；
///   除 `cancel` 外不得经由回引触达请求；
/// - 弱回引在 [`Request::new`](crate::request::Request::new) 内部注入，
///   单次赋值后不可变。
pub struct RequestContext {
    core: CoreContext,
    request_id: u64,
    payload: BTreeMap<String, String>,
    request: OnceLock<Weak<Request>>,
}

impl RequestContext {
    pub(crate) fn new(core: CoreContext, request_id: u64, payload: BTreeMap<String, String>) -> Self {
        Self {
            core,
            request_id,
            payload,
            request: OnceLock::new(),
        }
    }

    pub(crate) fn attach_request(&self, request: Weak<Request>) {
        // 单次赋值：重复注入是内部逻辑缺陷，静默忽略第二次即可保持不变量。
        let _ = self.request.set(request);
    }

    pub fn core(&self) -> &CoreContext {
        &self.core
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn payload(&self) -> &BTreeMap<String, String> {
        &self.payload
    }

    /// 经由上下文取消所属请求。
    ///
    /// 回引已失效（请求已完成且被释放）时为无操作，与
    /// “完成后取消是无操作”的完成句柄契约保持一致。
    pub fn cancel(&self, reason: CancellationReason) {
        if let Some(request) = self.request.get().and_then(Weak::upgrade) {
            request.cancel(reason);
        }
    }

    pub fn export_as_map(&self) -> ContextMap {
        let mut map = self.core.export_as_map();
        map.insert(Cow::Borrowed("request_id"), self.request_id.to_string());
        if let Some(request) = self.request.get().and_then(Weak::upgrade)
            && let Some(latency) = request.dispatch_latency()
        {
            map.insert(
                Cow::Borrowed("dispatch_latency_ns"),
                latency.as_nanos().to_string(),
            );
        }
        for (key, value) in &self.payload {
            map.insert(Cow::Owned(format!("payload.{key}")), value.clone());
        }
        map
    }
}
