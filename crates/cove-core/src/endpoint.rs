use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backoff::FullJitterBackoff;
use crate::breaker::{BreakerState, CircuitBreaker, NoopCircuitBreaker, RollingCircuitBreaker};
use crate::config::EndpointOptions;
use crate::context::EndpointContext;
use crate::error::{CoreError, codes};
use crate::event::{Event, EventKind, EventSeverity, category};
use crate::pipeline::{
    ChannelConnector, CodecLabelClassifier, ConnectStep, CorrelationRegistry, DispatchObserver,
    EndpointChannel, FailureClassifier, LifecycleNotice, LifecycleSignal, NoopConnectStep,
    Pipeline, PipelineInitializer, PipelineServices,
};
use crate::request::Request;

/// 端点生命周期状态。
///
/// 已连接态细分三档熔断子态；状态变量始终恰为其一，全部迁移发生在
/// 驱动任务上，跨线程读取经原子快照进行（可能轻微滞后）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EndpointState {
    Disconnected = 0,
    Connecting = 1,
    ConnectedCircuitClosed = 2,
    ConnectedCircuitOpen = 3,
    ConnectedCircuitHalfOpen = 4,
    Disconnecting = 5,
}

impl EndpointState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EndpointState::Connecting,
            2 => EndpointState::ConnectedCircuitClosed,
            3 => EndpointState::ConnectedCircuitOpen,
            4 => EndpointState::ConnectedCircuitHalfOpen,
            5 => EndpointState::Disconnecting,
            _ => EndpointState::Disconnected,
        }
    }

    /// 是否处于任一已连接子态。
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            EndpointState::ConnectedCircuitClosed
                | EndpointState::ConnectedCircuitOpen
                | EndpointState::ConnectedCircuitHalfOpen
        )
    }
}

/// 端点诊断快照，供运维画布与健康检查拉取。
#[derive(Clone, Debug)]
pub struct EndpointDiagnostics {
    pub endpoint_id: u64,
    pub remote_host: String,
    pub remote_port: u16,
    pub service: crate::service::ServiceKind,
    pub state: EndpointState,
    pub outstanding_requests: usize,
    pub last_connected_at: Option<Instant>,
    pub last_response_received: Option<Instant>,
}

/// 驱动指令：跨线程调用方与驱动任务之间唯一的通信形态。
enum Command {
    Connect,
    Disconnect,
    Dispatch(Arc<Request>),
    Outcome { is_failure: bool },
}

/// 端点：到一个远端服务套接字的单条长生命周期有序通道。
///
/// # 架构（Architecture）
/// - 每个端点恰有一个驱动任务，固定运行在环境的事件循环池上；状态变量、
///   管线槽位与熔断记账的全部变更都发生在驱动上；
/// - 外部调用方（路由器、用户线程、定时轮）只通过三条受控指令触达端点：
///   [`connect`](Self::connect)、[`disconnect`](Self::disconnect) 与
///   [`send`](Self::send)，指令经无界队列投递，从不阻塞；
/// - 传输细节被 [`PipelineInitializer`] 策略完全封装，按服务差异经组合
///   注入，端点自身不含任何协议分支。
///
/// # 生命周期（Lifecycle）
/// - `connect` 仅在断开态生效，进入带满抖动指数退避的重连环；单次尝试
///   受 `connect_timeout` 约束，超时计为尝试失败而非致命错误；
/// - 连接期间收到 `disconnect` 后若通道仍然就绪，驱动在同一临界区内
///   复核状态，关闭迟到通道并发布 `EndpointConnectionIgnored`，绝不进入
///   已连接态；
/// - `disconnect` 终结在途请求（`ChannelClosedWhileInFlight`）并在
///   `disconnect_timeout` 内排空关闭；端点层不存在致命错误，只有显式
///   `disconnect` 能终结端点。
pub struct Endpoint {
    context: EndpointContext,
    options: EndpointOptions,
    state: Arc<AtomicU8>,
    breaker: Arc<dyn CircuitBreaker>,
    correlation: Arc<CorrelationRegistry>,
    pipeline_slot: Arc<Mutex<Option<Arc<dyn Pipeline>>>>,
    last_connected_at: Arc<Mutex<Option<Instant>>>,
    commands: mpsc::UnboundedSender<Command>,
}

/// 关联表结账回投：把每笔分发结局转发回驱动做熔断记账。
struct OutcomeRelay {
    commands: mpsc::UnboundedSender<Command>,
}

impl DispatchObserver for OutcomeRelay {
    fn on_outcome(&self, _request: &Arc<Request>, is_failure: bool) {
        // 驱动可能已停机；此时记账对象（熔断器）也随之失去意义。
        let _ = self.commands.send(Command::Outcome { is_failure });
    }
}

impl Endpoint {
    /// 以默认连接步骤与编解码器标注分类器装配端点。
    pub fn new(
        context: EndpointContext,
        connector: Arc<dyn ChannelConnector>,
        initializer: Arc<dyn PipelineInitializer>,
        options: EndpointOptions,
    ) -> Arc<Self> {
        Self::with_parts(
            context,
            connector,
            initializer,
            Arc::new(NoopConnectStep),
            Arc::new(CodecLabelClassifier),
            options,
        )
    }

    /// 完整装配入口：显式注入连接步骤（认证握手）与失败分类器。
    pub fn with_parts(
        context: EndpointContext,
        connector: Arc<dyn ChannelConnector>,
        initializer: Arc<dyn PipelineInitializer>,
        connect_step: Arc<dyn ConnectStep>,
        classifier: Arc<dyn FailureClassifier>,
        options: EndpointOptions,
    ) -> Arc<Self> {
        let environment = context.core().environment();
        let clock = Arc::clone(environment.clock());
        let event_bus = Arc::clone(environment.event_bus());
        let executor = environment.executor().clone();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let breaker: Arc<dyn CircuitBreaker> = if options.circuit.enabled {
            Arc::new(RollingCircuitBreaker::new(options.circuit, Arc::clone(&clock)))
        } else {
            Arc::new(NoopCircuitBreaker)
        };
        let correlation = Arc::new(CorrelationRegistry::new(
            classifier,
            Arc::new(OutcomeRelay {
                commands: commands_tx.clone(),
            }),
            Arc::clone(&clock),
        ));

        let state = Arc::new(AtomicU8::new(EndpointState::Disconnected as u8));
        let pipeline_slot = Arc::new(Mutex::new(None));
        let last_connected_at = Arc::new(Mutex::new(None));

        let backoff = FullJitterBackoff::new(options.backoff, context.endpoint_id());
        let driver = EndpointDriver {
            context: context.clone(),
            options,
            connector,
            initializer,
            connect_step,
            clock,
            event_bus,
            breaker: Arc::clone(&breaker),
            correlation: Arc::clone(&correlation),
            state: Arc::clone(&state),
            pipeline_slot: Arc::clone(&pipeline_slot),
            last_connected_at: Arc::clone(&last_connected_at),
            commands: commands_rx,
            notices_tx,
            notices_rx,
            backoff,
            generation: 0,
        };
        executor.spawn(driver.run());

        Arc::new(Self {
            context,
            options,
            state,
            breaker,
            correlation,
            pipeline_slot,
            last_connected_at,
            commands: commands_tx,
        })
    }

    pub fn context(&self) -> &EndpointContext {
        &self.context
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }

    /// 发起连接。幂等：仅在断开态生效，其余状态下指令被驱动忽略。
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// 发起断开。幂等：任意非终结状态下有效，重复指令合并为一次。
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// 提交请求。
    ///
    /// # 契约说明（What）
    /// - 同步返回接受与否：状态不在可分发子态或熔断器拒绝时返回
    ///   [`codes::ENDPOINT_NOT_AVAILABLE`]，由路由器决定是否换端点重试；
    /// - 接受仅表示进入驱动队列；最终结局经请求自身的完成句柄交付。
    ///
    /// # 并发（Concurrency）
    /// - 状态读取为原子快照。快照显示熔断打开时仍会咨询熔断器本体：
    ///   睡眠窗口刚过的瞬间，熔断器可能已晋升半开而快照尚未刷新，
    ///   此时按半开放行一支探针。
    pub fn send(&self, request: Arc<Request>) -> crate::Result<()> {
        if !self.state().is_connected() {
            return Err(not_available("endpoint is not connected"));
        }
        if !self.breaker.allow() {
            return Err(not_available("circuit breaker rejected the dispatch"));
        }
        self.commands
            .send(Command::Dispatch(request))
            .map_err(|_| not_available("endpoint driver has terminated"))
    }

    /// 当前状态快照（可能滞后于驱动一拍）。
    pub fn state(&self) -> EndpointState {
        EndpointState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 管线是否还有接纳下一请求的写容量。未连接时恒为假。
    pub fn free(&self) -> bool {
        self.pipeline_slot
            .lock()
            .as_ref()
            .is_some_and(|pipeline| pipeline.is_writable())
    }

    /// 当前在关联表中的在途请求数。
    pub fn outstanding_requests(&self) -> usize {
        self.correlation.outstanding()
    }

    /// 诊断快照。
    pub fn diagnostics(&self) -> EndpointDiagnostics {
        EndpointDiagnostics {
            endpoint_id: self.context.endpoint_id(),
            remote_host: self.context.remote_host().to_string(),
            remote_port: self.context.remote_port(),
            service: self.context.service(),
            state: self.state(),
            outstanding_requests: self.correlation.outstanding(),
            last_connected_at: *self.last_connected_at.lock(),
            last_response_received: self.correlation.last_response_received(),
        }
    }
}

fn not_available(message: &'static str) -> CoreError {
    CoreError::new(codes::ENDPOINT_NOT_AVAILABLE, message)
}

/// 单次连接尝试的出口。
enum AttemptOutcome {
    Ready(Box<dyn EndpointChannel>),
    Failed(CoreError),
    TimedOut,
}

/// 连接环的出口。
enum ConnectExit {
    Connected,
    Idle,
    Terminated,
}

/// 服务环的出口。
enum ServeExit {
    Reconnect,
    Idle,
    Terminated,
}

/// 会话（连接环 + 服务环）的出口。
enum SessionExit {
    Idle,
    Terminated,
}

struct EndpointDriver {
    context: EndpointContext,
    options: EndpointOptions,
    connector: Arc<dyn ChannelConnector>,
    initializer: Arc<dyn PipelineInitializer>,
    connect_step: Arc<dyn ConnectStep>,
    clock: Arc<dyn crate::time::Clock>,
    event_bus: Arc<dyn crate::event::EventBus>,
    breaker: Arc<dyn CircuitBreaker>,
    correlation: Arc<CorrelationRegistry>,
    state: Arc<AtomicU8>,
    pipeline_slot: Arc<Mutex<Option<Arc<dyn Pipeline>>>>,
    last_connected_at: Arc<Mutex<Option<Instant>>>,
    commands: mpsc::UnboundedReceiver<Command>,
    notices_tx: mpsc::UnboundedSender<LifecycleNotice>,
    notices_rx: mpsc::UnboundedReceiver<LifecycleNotice>,
    backoff: FullJitterBackoff,
    generation: u64,
}

impl EndpointDriver {
    async fn run(mut self) {
        loop {
            // 断开态：只有 Connect 有意义，其余指令按契约消化。
            match self.commands.recv().await {
                None => return,
                Some(Command::Connect) => match self.drive_session().await {
                    SessionExit::Idle => {}
                    SessionExit::Terminated => return,
                },
                Some(Command::Disconnect) => {}
                Some(Command::Dispatch(request)) => {
                    request.fail(not_available("endpoint is disconnected"));
                }
                Some(Command::Outcome { .. }) => {}
            }
        }
    }

    /// 一次完整会话：重连环直到连上，服务直到断开或通道失活。
    async fn drive_session(&mut self) -> SessionExit {
        loop {
            self.set_state(EndpointState::Connecting);
            match self.connect_loop().await {
                ConnectExit::Connected => {}
                ConnectExit::Idle => return SessionExit::Idle,
                ConnectExit::Terminated => return SessionExit::Terminated,
            }
            match self.serve().await {
                ServeExit::Reconnect => continue,
                ServeExit::Idle => return SessionExit::Idle,
                ServeExit::Terminated => return SessionExit::Terminated,
            }
        }
    }

    /// 重连环：逐次尝试直至成功、被断开或驱动被整体释放。
    async fn connect_loop(&mut self) -> ConnectExit {
        loop {
            let attempt_started = self.clock.now();
            let mut attempt = self.connector.connect(&self.context);
            let mut deadline = self.clock.sleep(self.options.connect_timeout);
            let mut disconnect_requested = false;
            let mut handles_dropped = false;

            let outcome = loop {
                tokio::select! {
                    biased;
                    // 指令通道一旦关闭，recv 会立即重复返回 None；
                    // 关断本分支，余下由尝试结果或截止时间收束。
                    command = self.commands.recv(), if !handles_dropped => match command {
                        None => {
                            // 所有句柄已释放：收尾后终止驱动。
                            handles_dropped = true;
                            disconnect_requested = true;
                        }
                        Some(Command::Disconnect) => {
                            // 不立刻丢弃在途尝试：若通道赶在尝试窗口内
                            // 就绪，须走“忽略迟到通道”的路径。
                            disconnect_requested = true;
                        }
                        Some(Command::Connect) => {}
                        Some(Command::Dispatch(request)) => {
                            request.fail(not_available("endpoint is still connecting"));
                        }
                        Some(Command::Outcome { .. }) => {}
                    },
                    result = &mut attempt => break match result {
                        Ok(channel) => AttemptOutcome::Ready(channel),
                        Err(error) => AttemptOutcome::Failed(error),
                    },
                    _ = &mut deadline => break AttemptOutcome::TimedOut,
                }
            };
            let attempt_elapsed = self.clock.now().saturating_duration_since(attempt_started);

            match outcome {
                AttemptOutcome::Ready(channel) => {
                    if disconnect_requested {
                        self.ignore_late_channel(channel).await;
                        return self.connect_exit_after_disconnect(handles_dropped);
                    }
                    match self.install_channel(channel, attempt_elapsed).await {
                        Ok(()) => return ConnectExit::Connected,
                        Err(error) => {
                            self.emit_attempt_failure(error, attempt_started);
                        }
                    }
                }
                AttemptOutcome::Failed(error) => {
                    if disconnect_requested {
                        self.abort_connecting();
                        return self.connect_exit_after_disconnect(handles_dropped);
                    }
                    self.emit_attempt_failure(error, attempt_started);
                }
                AttemptOutcome::TimedOut => {
                    if disconnect_requested {
                        self.abort_connecting();
                        return self.connect_exit_after_disconnect(handles_dropped);
                    }
                    let error = CoreError::new(
                        codes::TRANSPORT_CONNECT_TIMEOUT,
                        "connect attempt exceeded its deadline",
                    );
                    self.emit_attempt_failure(error, attempt_started);
                }
            }

            // 退避等待，断开指令可即时打断。
            let delay = self.backoff.next_delay();
            let mut sleep = self.clock.sleep(delay);
            loop {
                tokio::select! {
                    biased;
                    command = self.commands.recv() => match command {
                        None => {
                            self.abort_connecting();
                            return ConnectExit::Terminated;
                        }
                        Some(Command::Disconnect) => {
                            self.abort_connecting();
                            return ConnectExit::Idle;
                        }
                        Some(Command::Connect) => {}
                        Some(Command::Dispatch(request)) => {
                            request.fail(not_available("endpoint is still connecting"));
                        }
                        Some(Command::Outcome { .. }) => {}
                    },
                    _ = &mut sleep => break,
                }
            }
        }
    }

    fn connect_exit_after_disconnect(&self, handles_dropped: bool) -> ConnectExit {
        if handles_dropped {
            ConnectExit::Terminated
        } else {
            ConnectExit::Idle
        }
    }

    /// 迟到通道：断开已被请求，关闭刚就绪的通道并保持断开语义。
    async fn ignore_late_channel(&mut self, channel: Box<dyn EndpointChannel>) {
        self.emit(self.lifecycle_event(
            EventKind::EndpointConnectionIgnored,
            EventSeverity::Info,
            "channel became ready after disconnect was requested",
        ));
        if let Err(error) = channel.close().await {
            warn!(
                endpoint_id = self.context.endpoint_id(),
                error = %error,
                "failed to close ignored late channel",
            );
        }
        self.emit(self.lifecycle_event(
            EventKind::EndpointDisconnected,
            EventSeverity::Debug,
            "Endpoint disconnected successfully",
        ));
        self.set_state(EndpointState::Disconnected);
    }

    /// 连接中被断开且无迟到通道：中止本轮尝试。
    fn abort_connecting(&mut self) {
        self.emit(self.lifecycle_event(
            EventKind::EndpointConnectionAborted,
            EventSeverity::Debug,
            "connect was aborted by disconnect",
        ));
        self.set_state(EndpointState::Disconnected);
        self.backoff.reset();
    }

    fn emit_attempt_failure(&mut self, error: CoreError, attempt_started: Instant) {
        let elapsed = self.clock.now().saturating_duration_since(attempt_started);
        warn!(
            endpoint_id = self.context.endpoint_id(),
            remote = %self.context.remote_host(),
            attempt = self.backoff.attempt() + 1,
            error = %error,
            "connect attempt failed",
        );
        self.emit(
            self.lifecycle_event(
                EventKind::EndpointConnectionFailed,
                EventSeverity::Warn,
                "connect attempt failed",
            )
            .with_duration(elapsed)
            .with_cause(Arc::new(error)),
        );
    }

    /// 通道就绪后的装配：初始化管线、执行连接步骤、发布已连接。
    async fn install_channel(
        &mut self,
        channel: Box<dyn EndpointChannel>,
        attempt_elapsed: Duration,
    ) -> crate::Result<()> {
        self.generation += 1;
        let signal = LifecycleSignal::new(self.notices_tx.clone(), self.generation);
        let services = PipelineServices {
            correlation: Arc::clone(&self.correlation),
            event_bus: Arc::clone(&self.event_bus),
            clock: Arc::clone(&self.clock),
            lifecycle: signal,
            context: self.context.clone(),
            idle_http_timeout: self.options.idle_http_timeout,
            low_latency: self.options.low_latency,
        };
        let pipeline = self.initializer.initialize(channel, services)?;
        if let Err(error) = self.connect_step.apply(&pipeline, &self.context).await {
            // 认证失败按尝试失败处理：回收半成品管线后进入退避。
            let _ = pipeline.close().await;
            return Err(error);
        }

        self.breaker.reset();
        self.backoff.reset();
        *self.pipeline_slot.lock() = Some(pipeline);
        *self.last_connected_at.lock() = Some(self.clock.now());
        self.set_state(EndpointState::ConnectedCircuitClosed);
        debug!(
            endpoint_id = self.context.endpoint_id(),
            remote = %self.context.remote_host(),
            service = %self.context.service(),
            "endpoint connected",
        );
        self.emit(
            self.lifecycle_event(
                EventKind::EndpointConnected,
                EventSeverity::Debug,
                "endpoint connected",
            )
            .with_duration(attempt_elapsed),
        );
        Ok(())
    }

    /// 服务环：分发请求、记账熔断、响应失活与断开。
    async fn serve(&mut self) -> ServeExit {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None => {
                        self.shutdown().await;
                        return ServeExit::Terminated;
                    }
                    Some(Command::Disconnect) => {
                        self.shutdown().await;
                        return ServeExit::Idle;
                    }
                    Some(Command::Connect) => {}
                    Some(Command::Dispatch(request)) => {
                        // 准入侧可能刚把熔断器从打开晋升为半开，
                        // 先把快照对齐到熔断器现状。
                        self.refresh_circuit_substate();
                        if self.dispatch(request).await.is_err() {
                            self.channel_lost();
                            return ServeExit::Reconnect;
                        }
                    }
                    Some(Command::Outcome { is_failure }) => {
                        if is_failure {
                            self.breaker.record_failure();
                        } else {
                            self.breaker.record_success();
                        }
                        self.refresh_circuit_substate();
                    }
                },
                notice = self.notices_rx.recv() => {
                    if let Some(LifecycleNotice::ChannelInactive { generation }) = notice
                        && generation == self.generation
                    {
                        self.channel_lost();
                        return ServeExit::Reconnect;
                    }
                    // 陈旧代数的失活通知来自已被替换的通道，忽略。
                }
            }
        }
    }

    /// 分发一笔已被准入的请求。返回错误表示通道已不可写，须重连。
    async fn dispatch(&mut self, request: Arc<Request>) -> Result<(), ()> {
        // 写前复查取消标记：定时轮可能已经终结该请求。
        if !request.is_active() {
            return Ok(());
        }
        let pipeline = match self.pipeline_slot.lock().as_ref() {
            Some(pipeline) => Arc::clone(pipeline),
            None => {
                request.fail(not_available("endpoint lost its channel"));
                return Ok(());
            }
        };
        request.stamp_dispatch_latency(self.clock.now());
        let opaque = self.correlation.register(Arc::clone(&request));
        let write = pipeline.write(Arc::clone(&request), opaque);
        if self.options.low_latency {
            // 低时延模式：让出驱动前必须冲刷。
            pipeline.flush();
        }
        match write.await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(
                    endpoint_id = self.context.endpoint_id(),
                    opaque,
                    error = %error,
                    "write failed, recycling channel",
                );
                self.correlation.complete(
                    opaque,
                    Err(CoreError::new(
                        codes::TRANSPORT_CHANNEL_CLOSED,
                        "channel closed while writing the request",
                    )
                    .with_boxed_cause(Box::new(error))),
                );
                Err(())
            }
        }
    }

    /// 通道失活：终结在途请求、发布断连事件并回到连接环。
    fn channel_lost(&mut self) {
        *self.pipeline_slot.lock() = None;
        self.correlation.fail_all_closed();
        let connected_at = *self.last_connected_at.lock();
        let connected_for = connected_at
            .map(|at| self.clock.now().saturating_duration_since(at))
            .unwrap_or_default();
        let mut event = self.lifecycle_event(
            EventKind::EndpointDisconnected,
            EventSeverity::Debug,
            "channel went inactive, reconnecting",
        );
        event = event.with_duration(connected_for);
        self.emit(event);
        debug!(
            endpoint_id = self.context.endpoint_id(),
            connected_for_ms = connected_for.as_millis() as u64,
            "channel inactive, entering reconnect",
        );
    }

    /// 显式断开：排空关闭管线，终结在途请求，落回断开态。
    async fn shutdown(&mut self) {
        self.set_state(EndpointState::Disconnecting);
        let pipeline = self.pipeline_slot.lock().take();
        let close_result = match pipeline {
            Some(pipeline) => {
                let mut close = pipeline.close();
                let mut deadline = self.clock.sleep(self.options.disconnect_timeout);
                tokio::select! {
                    result = &mut close => result,
                    _ = &mut deadline => Err(CoreError::new(
                        codes::TRANSPORT_CLOSE_FAILED,
                        "close did not finish within disconnect_timeout",
                    )),
                }
            }
            None => Ok(()),
        };
        // 管线关闭应已清场；兜底保证“每笔被接受的请求恰好完成一次”。
        self.correlation.fail_all_closed();

        match close_result {
            Ok(()) => {
                self.emit(self.lifecycle_event(
                    EventKind::EndpointDisconnected,
                    EventSeverity::Debug,
                    "Endpoint disconnected successfully",
                ));
            }
            Err(error) => {
                warn!(
                    endpoint_id = self.context.endpoint_id(),
                    error = %error,
                    "endpoint disconnect failed",
                );
                self.emit(
                    self.lifecycle_event(
                        EventKind::EndpointDisconnectionFailed,
                        EventSeverity::Warn,
                        "endpoint disconnect failed",
                    )
                    .with_cause(Arc::new(error)),
                );
            }
        }
        self.set_state(EndpointState::Disconnected);
        self.backoff.reset();
    }

    /// 按熔断器现状刷新已连接子态。仅在已连接期间调用。
    fn refresh_circuit_substate(&self) {
        let current = EndpointState::from_u8(self.state.load(Ordering::Acquire));
        if !current.is_connected() {
            return;
        }
        let target = match self.breaker.state() {
            BreakerState::Closed => EndpointState::ConnectedCircuitClosed,
            BreakerState::Open => EndpointState::ConnectedCircuitOpen,
            BreakerState::HalfOpen => EndpointState::ConnectedCircuitHalfOpen,
        };
        if target != current {
            self.set_state(target);
        }
    }

    fn set_state(&self, state: EndpointState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn lifecycle_event(
        &self,
        kind: EventKind,
        severity: EventSeverity,
        description: &'static str,
    ) -> Event {
        Event::new(kind, severity, category::ENDPOINT, description)
            .with_context(self.context.export_as_map())
    }

    fn emit(&self, event: Event) {
        self.event_bus.publish(event);
    }
}
