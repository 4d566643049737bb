use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::context::ContextMap;
use crate::error::CoreError;

/// 事件严重级别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventSeverity {
    Debug,
    Info,
    Warn,
    Error,
}

/// 事件种类：生命周期事件以枚举标识，便于测试与订阅方精确匹配，
/// 宿主扩展经 `Custom` 接入并遵循 `vendor.event_name` 命名。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventKind {
    EndpointConnected,
    EndpointConnectionFailed,
    EndpointConnectionAborted,
    EndpointConnectionIgnored,
    EndpointDisconnected,
    EndpointDisconnectionFailed,
    EventsDropped,
    Custom(&'static str),
}

/// 事件类别命名空间。
pub mod category {
    /// 端点生命周期事件。
    pub const ENDPOINT: &str = "cove.endpoint";
    /// 核心自身的诊断事件（如总线溢出恢复）。
    pub const CORE: &str = "cove.core";
}

/// 生命周期/诊断事件的统一载体。
///
/// # 契约说明（What）
/// - `kind`/`category`/`severity` 为必填；`duration` 携带尝试耗时或连接存活时长；
/// - `cause` 以 `Arc<CoreError>` 共享，事件可被克隆分发给多个订阅者而不复制根因；
/// - `context` 为有序键值快照，取自 [`crate::context::EndpointContext::export_as_map`]，
///   键序即画布与日志的展示序。
#[derive(Clone, Debug)]
pub struct Event {
    kind: EventKind,
    category: &'static str,
    severity: EventSeverity,
    duration: Option<Duration>,
    description: Cow<'static, str>,
    cause: Option<Arc<CoreError>>,
    context: ContextMap,
}

impl Event {
    pub fn new(
        kind: EventKind,
        severity: EventSeverity,
        category: &'static str,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            category,
            severity,
            duration: None,
            description: description.into(),
            cause: None,
            context: ContextMap::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_cause(mut self, cause: Arc<CoreError>) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_context(mut self, context: ContextMap) -> Self {
        self.context = context;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    pub fn severity(&self) -> EventSeverity {
        self.severity
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cause(&self) -> Option<&Arc<CoreError>> {
        self.cause.as_ref()
    }

    pub fn context(&self) -> &ContextMap {
        &self.context
    }
}

/// 事件总线契约。
///
/// # 契约说明（What）
/// - **前置条件**：`publish` 必须快速返回，且失败对生产者不可观测；
///   慢消费者与队列溢出都不得阻塞或回压端点驱动；
/// - **后置条件**：实现允许在溢出时丢弃事件，但必须维护丢弃计数并在恢复
///   容量时以 [`EventKind::EventsDropped`] 事件补报；
/// - 订阅回调运行在总线自有的执行器上，绝不在发布者线程内联执行。
pub trait EventBus: Send + Sync + 'static {
    /// 发布事件，非阻塞。
    fn publish(&self, event: Event);
}

type Subscriber = Box<dyn Fn(&Event) + Send + Sync + 'static>;

/// 默认事件总线：有界队列 + 独立分发任务。
///
/// # 实现策略（How）
/// - `publish` 走 `try_send`：队列满时事件被丢弃并累加丢弃计数；
/// - 下一次成功入队后，若存在未补报的丢弃，以一条 `EventsDropped` 事件
///   （Warn，描述携带计数）尝试补报；补报自身失败则计数滚回；
/// - 分发任务由构造时给定的运行时句柄承载，逐事件遍历订阅者回调；
///   总线被整体 Drop 后发送端关闭，分发任务随队列排空自然退出。
pub struct DefaultEventBus {
    tx: mpsc::Sender<Event>,
    dropped: AtomicU64,
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl DefaultEventBus {
    /// 默认队列容量，与事件风暴场景下的内存上限权衡得出。
    pub const DEFAULT_CAPACITY: usize = 16_384;

    pub fn new(executor: &Handle) -> Self {
        Self::with_capacity(executor, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(executor: &Handle, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));
        let subscribers: Arc<RwLock<Vec<Subscriber>>> = Arc::new(RwLock::new(Vec::new()));
        let dispatch_subscribers = Arc::clone(&subscribers);
        executor.spawn(async move {
            while let Some(event) = rx.recv().await {
                let guard = dispatch_subscribers.read();
                for subscriber in guard.iter() {
                    subscriber(&event);
                }
            }
        });
        Self {
            tx,
            dropped: AtomicU64::new(0),
            subscribers,
        }
    }

    /// 注册订阅回调。回调在总线分发任务上执行，应保持轻量；
    /// 重活请自行转投其他任务。
    pub fn subscribe(&self, subscriber: impl Fn(&Event) + Send + Sync + 'static) {
        self.subscribers.write().push(Box::new(subscriber));
    }

    /// 当前未补报的丢弃计数，供诊断查询。
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn overflow_notice(count: u64) -> Event {
        Event::new(
            EventKind::EventsDropped,
            EventSeverity::Warn,
            category::CORE,
            format!("event bus overflowed, {count} events dropped"),
        )
    }
}

impl EventBus for DefaultEventBus {
    fn publish(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {
                let pending = self.dropped.swap(0, Ordering::Relaxed);
                if pending > 0
                    && self
                        .tx
                        .try_send(Self::overflow_notice(pending))
                        .is_err()
                {
                    // 补报失败：计数滚回，等下一次容量恢复再报。
                    self.dropped.fetch_add(pending, Ordering::Relaxed);
                }
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
