use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{CoreError, codes};
use crate::event::{DefaultEventBus, EventBus};
use crate::time::{Clock, TokioClock};

/// 核心环境：端点共享的执行器、事件总线与时钟。
///
/// # 设计背景（Why）
/// - 事件循环线程池、事件总线与时钟是进程级共享资源，端点只持有引用计数
///   句柄，绝不独占；
/// - 环境可能由调用方显式构建（注入自有运行时），也可能在集群初始化时
///   隐式创建。仅隐式创建的环境在最后一个持有者释放时负责回收自己的
///   运行时；显式注入的运行时归调用方所有。
///
/// # 契约说明（What）
/// - `executor` 返回承载端点驱动任务的运行时句柄；
/// - 环境经 `Arc` 共享；[`Drop`] 只在 `implicit` 构造路径上回收运行时，
///   且使用后台停机以允许在异步上下文中释放最后一个句柄。
pub struct CoreEnvironment {
    executor: Handle,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    owned_runtime: Option<Runtime>,
}

impl CoreEnvironment {
    /// 以调用方提供的执行器与能力组装环境。运行时生命周期归调用方管理。
    pub fn custom(
        executor: Handle,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor,
            event_bus,
            clock,
            owned_runtime: None,
        })
    }

    /// 隐式创建环境：自建一个小型多线程运行时作为事件循环池，
    /// 并在其上装配默认事件总线与生产时钟。
    ///
    /// # 错误（Errors）
    /// - 运行时构建失败（线程资源耗尽等）映射为配置类错误同步返回。
    pub fn implicit() -> crate::Result<Arc<Self>> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("cove-io")
            .enable_time()
            .build()
            .map_err(|err| {
                CoreError::new(
                    codes::CONFIG_ENVIRONMENT,
                    "failed to build implicit event-loop runtime",
                )
                .with_cause(err)
            })?;
        let executor = runtime.handle().clone();
        let event_bus: Arc<dyn EventBus> = Arc::new(DefaultEventBus::new(&executor));
        Ok(Arc::new(Self {
            executor,
            event_bus,
            clock: Arc::new(TokioClock),
            owned_runtime: Some(runtime),
        }))
    }

    pub fn executor(&self) -> &Handle {
        &self.executor
    }

    pub fn event_bus(&self) -> &Arc<dyn EventBus> {
        &self.event_bus
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl Drop for CoreEnvironment {
    fn drop(&mut self) {
        // 后台停机：最后一个句柄可能在异步上下文中释放，
        // 同步 shutdown 会触发运行时自毁死锁。
        if let Some(runtime) = self.owned_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
