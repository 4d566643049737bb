use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::context::EndpointContext;
use crate::event::EventBus;
use crate::request::{CancellationReason, Request, RequestOutcome, Response};
use crate::time::Clock;

/// 连接器：把端点身份变成一条活的传输通道。
///
/// # 契约说明（What）
/// - `connect` 返回的 Future 可被驱动在超时后丢弃，实现必须容忍取消并
///   自行回收半建立的套接字；
/// - 失败以传输类 [`CoreError`](crate::error::CoreError) 表达，驱动将其
///   吸收进重连环并以 Warn 事件上报，绝不致命。
pub trait ChannelConnector: Send + Sync + 'static {
    fn connect(
        &self,
        ctx: &EndpointContext,
    ) -> BoxFuture<'static, crate::Result<Box<dyn EndpointChannel>>>;
}

/// 传输通道的不透明句柄。
///
/// 核心只在两处触达它：交给管线初始化器包装，或在“迟到通道”竞态下
/// 直接关闭（连接期间收到断开指令、通道其后才就绪）。
pub trait EndpointChannel: Send + Sync + 'static {
    fn close(self: Box<Self>) -> BoxFuture<'static, crate::Result<()>>;
}

/// 管线契约：编解码、关联与刷写控制的对外表面。
///
/// # 契约说明（What）
/// - `write` 只做入队，绝不阻塞调用方；`opaque` 是驱动在关联表登记后
///   拿到的不透明 ID，编解码器将其写进帧头；返回的 Future 在字节移交
///   操作系统后完成；
/// - `flush` 冲刷合批缓冲。低时延模式下，驱动在每次 `write` 后、让出
///   之前调用它，实现不得推迟；
/// - `close` 排空未决写、以 `ChannelClosedWhileInFlight` 终结仍在关联表
///   中的请求、关闭传输；
/// - `is_writable` 报告是否还有接纳下一请求的写容量，支撑
///   [`Endpoint::free`](crate::endpoint::Endpoint::free)。
pub trait Pipeline: Send + Sync + 'static {
    fn write(&self, request: Arc<Request>, opaque: u64) -> BoxFuture<'static, crate::Result<()>>;

    fn flush(&self);

    fn close(&self) -> BoxFuture<'static, crate::Result<()>>;

    fn is_writable(&self) -> bool;
}

/// 管线初始化器：按服务协议装配处理链。
///
/// 实现按序安装：空闲看门狗（HTTP 通道，阈值取
/// [`PipelineServices::idle_http_timeout`]）、协议编解码器、关联处理器
/// （复用 [`PipelineServices::correlation`]）与刷写控制器。
/// 按服务差异化的行为全部居于实现内部，端点对协议一无所知。
pub trait PipelineInitializer: Send + Sync + 'static {
    fn initialize(
        &self,
        channel: Box<dyn EndpointChannel>,
        services: PipelineServices,
    ) -> crate::Result<Arc<dyn Pipeline>>;
}

/// 物理连接建立后、端点进入已连接态前执行一次的连接步骤。
///
/// 认证/SASL 握手经此接入；失败按连接尝试失败处理，进入重连环。
pub trait ConnectStep: Send + Sync + 'static {
    fn apply(
        &self,
        pipeline: &Arc<dyn Pipeline>,
        ctx: &EndpointContext,
    ) -> BoxFuture<'static, crate::Result<()>>;
}

/// 默认连接步骤：无操作。
#[derive(Debug, Default)]
pub struct NoopConnectStep;

impl ConnectStep for NoopConnectStep {
    fn apply(
        &self,
        _pipeline: &Arc<dyn Pipeline>,
        _ctx: &EndpointContext,
    ) -> BoxFuture<'static, crate::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// 按服务分类回调：判断一个已完成的响应是否指向服务端健康故障。
///
/// 按服务差异经组合注入而非子类化：端点持有分类器，
/// 交给关联表在结账时调用。
pub trait FailureClassifier: Send + Sync + 'static {
    fn is_transport_failure(&self, response: &Response) -> bool;
}

/// 默认分类：信任编解码器落在响应上的标注。
#[derive(Debug, Default)]
pub struct CodecLabelClassifier;

impl FailureClassifier for CodecLabelClassifier {
    fn is_transport_failure(&self, response: &Response) -> bool {
        response.is_server_fault()
    }
}

/// 分发结局观察者：关联表在每笔请求结账时回调，端点据此驱动熔断记账。
pub trait DispatchObserver: Send + Sync + 'static {
    fn on_outcome(&self, request: &Arc<Request>, is_failure: bool);
}

/// 管线生命周期通知。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleNotice {
    /// 通道失活（对端关闭、看门狗超时、写失败）。携带通道代数，
    /// 驱动据此忽略迟到的陈旧通知。
    ChannelInactive { generation: u64 },
}

/// 管线回投驱动的信号句柄，每条物理通道绑定一个代数。
#[derive(Clone)]
pub struct LifecycleSignal {
    tx: mpsc::UnboundedSender<LifecycleNotice>,
    generation: u64,
}

impl LifecycleSignal {
    pub(crate) fn new(tx: mpsc::UnboundedSender<LifecycleNotice>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// 报告通道失活。驱动可能已经换代或停机，投递失败静默忽略。
    pub fn channel_inactive(&self) {
        let _ = self.tx.send(LifecycleNotice::ChannelInactive {
            generation: self.generation,
        });
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// 交给管线初始化器的服务集：端点出借的能力与配置的只读快照。
#[derive(Clone)]
pub struct PipelineServices {
    pub correlation: Arc<CorrelationRegistry>,
    pub event_bus: Arc<dyn EventBus>,
    pub clock: Arc<dyn Clock>,
    pub lifecycle: LifecycleSignal,
    pub context: EndpointContext,
    pub idle_http_timeout: Duration,
    pub low_latency: bool,
}

/// 关联表：不透明 ID 到未决请求的映射。
///
/// # 不变量（Invariants）
/// - 不透明 ID 进程内单调分配，`BTreeMap` 的键序即登记的 FIFO 序，
///   `fail_all` 按该序终结请求；
/// - 每个条目至多被移除一次：响应结账与通道关闭清场在同一互斥量下
///   互斥，恰好一次完成的最终仲裁仍由请求完成槽兜底。
///
/// # 记账（Accounting）
/// - 结账时先经 [`FailureClassifier`] 与错误分类定性，再回调观察者；
/// - 通道关闭清场不回调观察者：这些请求未得到对端的健康证据，
///   计入熔断样本只会污染新通道的全新窗口。
pub struct CorrelationRegistry {
    pending: Mutex<BTreeMap<u64, Arc<Request>>>,
    next_opaque: AtomicU64,
    last_response_received: Mutex<Option<Instant>>,
    classifier: Arc<dyn FailureClassifier>,
    observer: Arc<dyn DispatchObserver>,
    clock: Arc<dyn Clock>,
}

impl CorrelationRegistry {
    pub fn new(
        classifier: Arc<dyn FailureClassifier>,
        observer: Arc<dyn DispatchObserver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            next_opaque: AtomicU64::new(1),
            last_response_received: Mutex::new(None),
            classifier,
            observer,
            clock,
        }
    }

    /// 登记未决请求，返回分配的不透明 ID。
    pub fn register(&self, request: Arc<Request>) -> u64 {
        let opaque = self.next_opaque.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(opaque, request);
        opaque
    }

    /// 以入站响应（或编解码器产出的按请求失败）结账。
    ///
    /// 返回假表示不透明 ID 已不在表中（请求先行被取消清场或 ID 陈旧），
    /// 调用方丢弃该响应即可。
    pub fn complete(&self, opaque: u64, outcome: RequestOutcome) -> bool {
        let Some(request) = self.pending.lock().remove(&opaque) else {
            return false;
        };
        self.mark_response_received();
        let is_failure = match &outcome {
            Ok(response) => self.classifier.is_transport_failure(response),
            Err(error) => error.counts_as_breaker_failure(),
        };
        self.observer.on_outcome(&request, is_failure);
        request.complete(outcome);
        true
    }

    /// 通道关闭清场：按登记序以 `ChannelClosedWhileInFlight` 终结全部
    /// 未决请求。
    pub fn fail_all_closed(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending).into_values().collect()
        };
        for request in drained {
            request.cancel(CancellationReason::ChannelClosedWhileInFlight);
        }
    }

    /// 标记一次响应到达。关联结账自动打点；服务端主动推送等
    /// 不走关联表的入站流量由管线显式调用，供空闲记账使用。
    pub fn mark_response_received(&self) {
        *self.last_response_received.lock() = Some(self.clock.now());
    }

    /// 当前未决请求数。
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// 最近一次响应到达时刻，供诊断快照使用。
    pub fn last_response_received(&self) -> Option<Instant> {
        *self.last_response_received.lock()
    }
}
