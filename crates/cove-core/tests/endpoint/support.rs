pub mod support {
    //! 场景组装工具：一个端点 + 收集总线 + 内存管线的最小挽具。

    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::runtime::Handle;

    use cove_core::env::CoreEnvironment;
    use cove_core::event::EventBus;
    use cove_core::prelude::*;
    use cove_core::test_stubs::events::CollectingEventBus;
    use cove_core::test_stubs::transport::MemoryPipelineInitializer;

    pub struct Harness {
        pub endpoint: Arc<Endpoint>,
        pub bus: Arc<CollectingEventBus>,
        pub initializer: Arc<MemoryPipelineInitializer>,
    }

    /// 以给定连接器与选项装配端点，事件总线与管线初始化器随挽具返回。
    pub fn harness(connector: Arc<dyn ChannelConnector>, options: EndpointOptions) -> Harness {
        let bus = CollectingEventBus::new();
        let environment = CoreEnvironment::custom(
            Handle::current(),
            Arc::clone(&bus) as Arc<dyn EventBus>,
            Arc::new(TokioClock),
        );
        let core = CoreContext::new(environment);
        let context = EndpointContext::new(core, "db1.example.com", 11210, ServiceKind::Kv);
        let initializer = MemoryPipelineInitializer::new();
        let endpoint = Endpoint::new(
            context,
            connector,
            Arc::clone(&initializer) as Arc<dyn PipelineInitializer>,
            options,
        );
        Harness {
            endpoint,
            bus,
            initializer,
        }
    }

    /// 默认选项加固定抖动种子，让退避序列可复现。
    pub fn seeded_options() -> EndpointOptions {
        EndpointOptions::default().with_backoff(BackoffConfig::default().with_jitter_seed(7))
    }

    /// 以让出（不推进虚拟时间）的方式等待状态快照到位。
    ///
    /// 只用于不依赖计时器的紧邻迁移；需要时间推进的进度一律经总线
    /// 事件等待，让运行时在空闲时自动推进到下一个计时器。
    pub async fn wait_for_state(endpoint: &Endpoint, target: EndpointState) {
        for _ in 0..10_000 {
            if endpoint.state() == target {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!(
            "endpoint never reached {target:?}, still in {:?}",
            endpoint.state()
        );
    }

    /// 让驱动消化已入队的指令。
    pub async fn settle() {
        for _ in 0..64 {
            tokio::task::yield_now().await;
        }
    }

    /// 以端点自身的上下文与时钟构造一笔请求，截止时间取 75 秒。
    pub fn new_request(endpoint: &Endpoint) -> (Arc<Request>, ResponseFuture) {
        let core = endpoint.context().core().clone();
        let deadline = core.environment().clock().now() + Duration::from_secs(75);
        Request::new(
            core,
            endpoint.context().service(),
            deadline,
            BTreeMap::new(),
        )
    }
}
