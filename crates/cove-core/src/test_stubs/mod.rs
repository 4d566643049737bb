//! 测试桩命名空间：框架官方维护的事件总线、连接器与管线桩实现，
//! 供集成测试与下游实现的契约测试复用。
//!
//! 桩对象只依赖公开契约，不触达内部状态；当核心契约演进时，
//! 单点更新此处即可让所有测试同步适配。

pub mod events {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use crate::event::{Event, EventBus, EventKind};

    /// 收集型事件总线：同步追加、异步等待。
    ///
    /// 生命周期测试的标准姿势：注入本桩，驱动端点，随后
    /// `wait_until` 到达期望事件计数，再对快照做精确断言。
    #[derive(Default)]
    pub struct CollectingEventBus {
        events: Mutex<Vec<Event>>,
        notify: Notify,
    }

    impl CollectingEventBus {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// 事件快照（按发布序）。
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }

        /// 事件种类序列，便于对整条时间线做相等断言。
        pub fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().iter().map(Event::kind).collect()
        }

        pub fn count_of(&self, kind: EventKind) -> usize {
            self.events.lock().iter().filter(|e| e.kind() == kind).count()
        }

        /// 等待事件序列满足谓词。
        ///
        /// 先登记唤醒、再检查快照，避免“检查与发布交错”时错过通知。
        pub async fn wait_until(&self, predicate: impl Fn(&[Event]) -> bool) {
            loop {
                let notified = self.notify.notified();
                if predicate(&self.events.lock()) {
                    return;
                }
                notified.await;
            }
        }

        /// 等待某一种类的事件达到给定计数。
        pub async fn wait_for_count(&self, kind: EventKind, count: usize) {
            self.wait_until(|events| {
                events.iter().filter(|e| e.kind() == kind).count() >= count
            })
            .await;
        }
    }

    impl EventBus for CollectingEventBus {
        fn publish(&self, event: Event) {
            self.events.lock().push(event);
            self.notify.notify_waiters();
        }
    }
}

pub mod transport {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::BoxFuture;
    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use crate::error::{CoreError, codes};
    use crate::pipeline::{
        ChannelConnector, EndpointChannel, Pipeline, PipelineInitializer, PipelineServices,
    };
    use crate::request::{Request, RequestOutcome};
    use crate::time::Clock;

    /// 内存通道：无真实套接字，仅记录关闭与否。
    #[derive(Default)]
    pub struct MemoryChannel {
        closed: Arc<AtomicBool>,
    }

    impl MemoryChannel {
        pub fn with_close_flag(flag: Arc<AtomicBool>) -> Self {
            Self { closed: flag }
        }
    }

    impl EndpointChannel for MemoryChannel {
        fn close(self: Box<Self>) -> BoxFuture<'static, crate::Result<()>> {
            self.closed.store(true, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    /// 单次连接尝试的剧本。
    #[derive(Clone, Copy, Debug)]
    pub enum ConnectScript {
        /// 立即就绪。
        Ready,
        /// 睡眠给定时长后就绪。
        ReadyAfter(Duration),
        /// 立即失败。
        Fail,
        /// 永不完成（由尝试超时收割）。
        Never,
    }

    /// 剧本化连接器：按序消耗剧本，耗尽后执行兜底剧本。
    pub struct ScriptedConnector {
        clock: Arc<dyn Clock>,
        script: Mutex<VecDeque<ConnectScript>>,
        fallback: ConnectScript,
        attempts: AtomicUsize,
    }

    impl ScriptedConnector {
        pub fn new(
            clock: Arc<dyn Clock>,
            script: impl IntoIterator<Item = ConnectScript>,
            fallback: ConnectScript,
        ) -> Arc<Self> {
            Arc::new(Self {
                clock,
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                attempts: AtomicUsize::new(0),
            })
        }

        /// 已发起的尝试次数。
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl ChannelConnector for ScriptedConnector {
        fn connect(
            &self,
            _ctx: &crate::context::EndpointContext,
        ) -> BoxFuture<'static, crate::Result<Box<dyn EndpointChannel>>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().pop_front().unwrap_or(self.fallback);
            let clock = Arc::clone(&self.clock);
            Box::pin(async move {
                match step {
                    ConnectScript::Ready => {
                        Ok(Box::new(MemoryChannel::default()) as Box<dyn EndpointChannel>)
                    }
                    ConnectScript::ReadyAfter(delay) => {
                        clock.sleep(delay).await;
                        Ok(Box::new(MemoryChannel::default()) as Box<dyn EndpointChannel>)
                    }
                    ConnectScript::Fail => Err(CoreError::new(
                        codes::TRANSPORT_CONNECT_FAILED,
                        "scripted connect failure",
                    )),
                    ConnectScript::Never => {
                        std::future::pending::<()>().await;
                        unreachable!("pending future never resolves")
                    }
                }
            })
        }
    }

    /// 闸门连接器：尝试一直悬停，直到测试显式放行。
    ///
    /// 专用于“断开压过迟到连接”竞态：测试先下发断开，再放行闸门，
    /// 断言迟到通道被关闭而非晋升为已连接。
    pub struct GatedConnector {
        gate: Arc<Semaphore>,
        channel_closed: Arc<AtomicBool>,
    }

    impl GatedConnector {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Arc::new(Semaphore::new(0)),
                channel_closed: Arc::new(AtomicBool::new(false)),
            })
        }

        /// 放行一次连接尝试。
        pub fn release_one(&self) {
            self.gate.add_permits(1);
        }

        /// 本连接器产出的通道是否已被关闭。
        pub fn channel_was_closed(&self) -> bool {
            self.channel_closed.load(Ordering::SeqCst)
        }
    }

    impl ChannelConnector for GatedConnector {
        fn connect(
            &self,
            _ctx: &crate::context::EndpointContext,
        ) -> BoxFuture<'static, crate::Result<Box<dyn EndpointChannel>>> {
            let gate = Arc::clone(&self.gate);
            let closed = Arc::clone(&self.channel_closed);
            Box::pin(async move {
                let permit = gate
                    .acquire_owned()
                    .await
                    .map_err(|_| CoreError::new(codes::TRANSPORT_CONNECT_FAILED, "gate closed"))?;
                permit.forget();
                Ok(Box::new(MemoryChannel::with_close_flag(closed)) as Box<dyn EndpointChannel>)
            })
        }
    }

    /// 内存管线：把出站请求记在本地队列，响应由测试显式注入。
    pub struct MemoryPipeline {
        services: PipelineServices,
        written: Mutex<Vec<(u64, Arc<Request>)>>,
        flushes: AtomicUsize,
        writable: AtomicBool,
        closed: AtomicBool,
        close_error: Mutex<Option<CoreError>>,
    }

    impl MemoryPipeline {
        fn new(services: PipelineServices, close_error: Option<CoreError>) -> Arc<Self> {
            Arc::new(Self {
                services,
                written: Mutex::new(Vec::new()),
                flushes: AtomicUsize::new(0),
                writable: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                close_error: Mutex::new(close_error),
            })
        }

        /// 出站序列快照：(不透明 ID, 请求)。
        pub fn written(&self) -> Vec<(u64, Arc<Request>)> {
            self.written.lock().clone()
        }

        pub fn flush_count(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }

        pub fn set_writable(&self, writable: bool) {
            self.writable.store(writable, Ordering::SeqCst);
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        /// 注入一笔入站响应（或按请求失败），走真实的关联结账路径。
        pub fn respond(&self, opaque: u64, outcome: RequestOutcome) -> bool {
            self.services.correlation.complete(opaque, outcome)
        }

        /// 模拟通道失活（对端断开、看门狗超时）。
        pub fn trigger_inactive(&self) {
            self.services.lifecycle.channel_inactive();
        }
    }

    impl Pipeline for MemoryPipeline {
        fn write(
            &self,
            request: Arc<Request>,
            opaque: u64,
        ) -> BoxFuture<'static, crate::Result<()>> {
            if self.closed.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(CoreError::new(
                        codes::TRANSPORT_CHANNEL_CLOSED,
                        "memory pipeline is closed",
                    ))
                });
            }
            self.written.lock().push((opaque, request));
            Box::pin(async { Ok(()) })
        }

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) -> BoxFuture<'static, crate::Result<()>> {
            self.closed.store(true, Ordering::SeqCst);
            self.services.correlation.fail_all_closed();
            let result = match self.close_error.lock().take() {
                Some(error) => Err(error),
                None => Ok(()),
            };
            Box::pin(async move { result })
        }

        fn is_writable(&self) -> bool {
            self.writable.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
        }
    }

    /// 内存管线初始化器：记录最近装配的管线供测试取用。
    #[derive(Default)]
    pub struct MemoryPipelineInitializer {
        current: Mutex<Option<Arc<MemoryPipeline>>>,
        next_close_error: Mutex<Option<CoreError>>,
    }

    impl MemoryPipelineInitializer {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// 最近一次装配出的管线。
        pub fn current(&self) -> Option<Arc<MemoryPipeline>> {
            self.current.lock().clone()
        }

        /// 让下一条管线的 `close` 以给定错误失败。
        pub fn fail_next_close_with(&self, error: CoreError) {
            *self.next_close_error.lock() = Some(error);
        }
    }

    impl PipelineInitializer for MemoryPipelineInitializer {
        fn initialize(
            &self,
            _channel: Box<dyn EndpointChannel>,
            services: PipelineServices,
        ) -> crate::Result<Arc<dyn Pipeline>> {
            let pipeline = MemoryPipeline::new(services, self.next_close_error.lock().take());
            *self.current.lock() = Some(Arc::clone(&pipeline));
            Ok(pipeline)
        }
    }
}
