use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::context::{CoreContext, RequestContext};
use crate::error::{CoreError, codes};
use crate::ids;
use crate::service::ServiceKind;

/// 取消原因的穷举集合。
///
/// 每个原因映射到一个稳定错误码：超时与通道关闭分别归入超时/传输类
/// （计入熔断样本），其余归入取消类（不计入）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// 截止时间到期，由外部定时轮触发。
    TimedOut,
    /// 经由请求上下文显式取消。
    CancelledViaContext,
    /// 请求在进入端点前即被调用方停止。
    StoppedAtSource,
    /// 通道在请求在途时关闭。
    ChannelClosedWhileInFlight,
    /// 重试次数超出路由器预算。
    TooManyRequestsInRetry,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::TimedOut => "timed_out",
            CancellationReason::CancelledViaContext => "cancelled_via_context",
            CancellationReason::StoppedAtSource => "stopped_at_source",
            CancellationReason::ChannelClosedWhileInFlight => "channel_closed_while_in_flight",
            CancellationReason::TooManyRequestsInRetry => "too_many_requests_in_retry",
        }
    }

    /// 映射为终态错误。
    pub fn into_error(self) -> CoreError {
        match self {
            CancellationReason::TimedOut => {
                CoreError::new(codes::REQUEST_TIMED_OUT, "request exceeded its deadline")
            }
            CancellationReason::ChannelClosedWhileInFlight => CoreError::new(
                codes::TRANSPORT_CHANNEL_CLOSED,
                "channel closed while the request was in flight",
            ),
            reason => CoreError::new(
                codes::REQUEST_CANCELLED,
                format!("request cancelled: {}", reason.as_str()),
            ),
        }
    }
}

/// 响应对核心不透明：只保证携带关联不透明 ID，负载由上层编解码器解释。
///
/// `server_fault` 由编解码器标注：指向服务端健康问题的可重试失败计入
/// 熔断样本，应用级错误（鉴权失败、键不存在）不计入。
#[derive(Clone, Debug)]
pub struct Response {
    opaque: u64,
    body: Bytes,
    server_fault: bool,
}

impl Response {
    pub fn new(opaque: u64, body: Bytes) -> Self {
        Self {
            opaque,
            body,
            server_fault: false,
        }
    }

    /// 编解码器标注：该响应表示服务端侧可重试失败。
    pub fn with_server_fault(mut self) -> Self {
        self.server_fault = true;
        self
    }

    pub fn opaque(&self) -> u64 {
        self.opaque
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_server_fault(&self) -> bool {
        self.server_fault
    }
}

/// 请求的最终结局。
pub type RequestOutcome = Result<Response, CoreError>;

/// 抽象请求：携带完成句柄、取消标记、截止时间与服务类别。
///
/// # 不变量（Invariants）
/// - 完成句柄恰好被信号一次：正常完成、失败与取消在同一个取走式槽位上
///   竞争，任何后续信号都是无操作；
/// - 取消标记置位后 `is_active` 恒为假，`cancel` 再次调用为无操作；
/// - `dispatch_latency` 单次写入：首次刷写进通道时由驱动打点，之后不变。
///
/// # 所有权（Ownership）
/// - 请求拥有其 [`RequestContext`]；上下文仅持 `Weak` 回引用于取消，
///   不构成引用环；
/// - 端点、关联表与调用方共享 `Arc<Request>`；最后一个克隆释放时，
///   未完成的接收端会以 `StoppedAtSource` 观察到终态。
pub struct Request {
    id: u64,
    service: ServiceKind,
    created_at: Instant,
    deadline: Instant,
    context: RequestContext,
    cancelled: AtomicBool,
    cancel_reason: OnceLock<CancellationReason>,
    completed: AtomicBool,
    completion: Mutex<Option<oneshot::Sender<RequestOutcome>>>,
    dispatch_latency_ns: AtomicU64,
    retry_attempts: AtomicU32,
}

/// `dispatch_latency_ns` 的未写入哨兵。
const LATENCY_UNSET: u64 = u64::MAX;

impl Request {
    /// 创建请求并返回其响应 Future。
    ///
    /// # 契约说明（What）
    /// - `deadline` 为绝对时刻；到期通知由外部定时轮经
    ///   [`RequestContext::cancel`] 投递，核心自身不内置定时器；
    /// - `created_at` 取自环境时钟，分发时延以同一时钟打点，保证非负。
    pub fn new(
        core: CoreContext,
        service: ServiceKind,
        deadline: Instant,
        payload: BTreeMap<String, String>,
    ) -> (Arc<Self>, ResponseFuture) {
        let created_at = core.environment().clock().now();
        let id = ids::REQUEST_IDS.next();
        let context = RequestContext::new(core, id, payload);
        let (tx, rx) = oneshot::channel();
        let request = Arc::new(Self {
            id,
            service,
            created_at,
            deadline,
            context,
            cancelled: AtomicBool::new(false),
            cancel_reason: OnceLock::new(),
            completed: AtomicBool::new(false),
            completion: Mutex::new(Some(tx)),
            dispatch_latency_ns: AtomicU64::new(LATENCY_UNSET),
            retry_attempts: AtomicU32::new(0),
        });
        request.context.attach_request(Arc::downgrade(&request));
        (request, ResponseFuture { rx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// 单次赋值完成：第二次及以后的调用被忽略。
    pub fn complete(&self, outcome: RequestOutcome) {
        let sender = self.completion.lock().take();
        if let Some(sender) = sender {
            self.completed.store(true, Ordering::Release);
            // 接收端可能已被调用方丢弃，此时结局无人观察，丢弃即可。
            let _ = sender.send(outcome);
        }
    }

    /// 成功完成。
    pub fn succeed(&self, response: Response) {
        self.complete(Ok(response));
    }

    /// 失败完成。
    pub fn fail(&self, error: CoreError) {
        self.complete(Err(error));
    }

    /// 置取消标记；若完成句柄尚未信号，以取消错误终结请求。
    ///
    /// 完成与取消（定时轮、上下文、通道关闭）之间的竞争由取走式完成槽
    /// 仲裁：无论谁先到，句柄只信号一次。
    pub fn cancel(&self, reason: CancellationReason) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.cancel_reason.set(reason);
        self.complete(Err(reason.into_error()));
    }

    /// 完成句柄未信号且取消标记未置位。
    pub fn is_active(&self) -> bool {
        !self.completed.load(Ordering::Acquire) && !self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.cancel_reason.get().copied()
    }

    /// 驱动在首次刷写时打点分发时延；仅首次调用生效。
    pub(crate) fn stamp_dispatch_latency(&self, now: Instant) {
        let nanos = now
            .saturating_duration_since(self.created_at)
            .as_nanos()
            .min(u128::from(u64::MAX - 1)) as u64;
        let _ = self.dispatch_latency_ns.compare_exchange(
            LATENCY_UNSET,
            nanos,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }

    /// 分发时延（创建到刷写进通道）；尚未分发时为 `None`。
    pub fn dispatch_latency(&self) -> Option<Duration> {
        match self.dispatch_latency_ns.load(Ordering::Acquire) {
            LATENCY_UNSET => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.load(Ordering::Relaxed)
    }

    /// 路由器在同端点本地重试时递增；核心自身从不跨重连重试。
    pub fn increment_retry_attempts(&self) -> u32 {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// 请求结局的观察端：await 得到恰好一次的最终结果。
pub struct ResponseFuture {
    rx: oneshot::Receiver<RequestOutcome>,
}

impl Future for ResponseFuture {
    type Output = RequestOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // 发送端未信号即被整体释放：等价于请求在源头被停止。
            Poll::Ready(Err(_)) => Poll::Ready(Err(
                CancellationReason::StoppedAtSource.into_error(),
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}
