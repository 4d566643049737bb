//! 请求完成句柄的并发不变量：被接受的请求恰好完成一次，
//! 任何“完成 × 取消”的交错都不得产生第二次信号或丢失信号。

pub mod tests {
    pub mod request {
        use std::collections::BTreeMap;
        use std::sync::Arc;
        use std::time::Duration;

        use bytes::Bytes;
        use tokio::runtime::Handle;

        use cove_core::env::CoreEnvironment;
        use cove_core::error::codes;
        use cove_core::event::EventBus;
        use cove_core::prelude::*;

        struct NullBus;

        impl EventBus for NullBus {
            fn publish(&self, _event: Event) {}
        }

        fn request_on_current_runtime() -> (Arc<Request>, ResponseFuture) {
            let environment = CoreEnvironment::custom(
                Handle::current(),
                Arc::new(NullBus),
                Arc::new(TokioClock),
            );
            let core = CoreContext::new(environment);
            let deadline = core.environment().clock().now() + Duration::from_secs(75);
            Request::new(core, ServiceKind::Query, deadline, BTreeMap::new())
        }

        /// 完成与取消从两个任务同时进攻：结果必须是两者之一，
        /// 且响应 Future 恰好解析一次。
        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn completion_and_cancel_race_resolves_exactly_once() {
            for _ in 0..256 {
                let (request, response) = request_on_current_runtime();
                let completer = {
                    let request = Arc::clone(&request);
                    tokio::spawn(async move {
                        request.succeed(Response::new(1, Bytes::from_static(b"fast")));
                    })
                };
                let canceller = {
                    let request = Arc::clone(&request);
                    tokio::spawn(async move {
                        request.cancel(CancellationReason::TimedOut);
                    })
                };
                let (left, right) = tokio::join!(completer, canceller);
                left.expect("completer does not panic");
                right.expect("canceller does not panic");

                match response.await {
                    Ok(body) => assert_eq!(body.body().as_ref(), b"fast"),
                    Err(err) => assert_eq!(err.code(), codes::REQUEST_TIMED_OUT),
                }
                assert!(!request.is_active(), "terminal either way");
            }
        }

        /// 多路取消（定时轮、上下文、通道关闭）并发抢跑：
        /// 只有一个原因胜出，且此后请求保持终态。
        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn concurrent_cancels_pick_a_single_reason() {
            let reasons = [
                CancellationReason::TimedOut,
                CancellationReason::CancelledViaContext,
                CancellationReason::ChannelClosedWhileInFlight,
            ];
            for _ in 0..128 {
                let (request, response) = request_on_current_runtime();
                let mut tasks = Vec::new();
                for reason in reasons {
                    let request = Arc::clone(&request);
                    tasks.push(tokio::spawn(async move {
                        request.cancel(reason);
                    }));
                }
                for task in tasks {
                    task.await.expect("cancel does not panic");
                }
                let winner = request.cancellation_reason().expect("one reason recorded");
                assert!(reasons.contains(&winner));
                assert!(response.await.is_err());
            }
        }

        /// 全部持有者在未完成时释放：观察端以“源头停止”收尾，
        /// 而非悬挂等待。
        #[tokio::test]
        async fn dropping_an_unfinished_request_resolves_stopped_at_source() {
            let (request, response) = request_on_current_runtime();
            drop(request);
            let err = response.await.expect_err("no completion ever arrives");
            assert_eq!(err.code(), codes::REQUEST_CANCELLED);
        }

        /// 上下文导出：规范键序 + 负载前缀，分发时延在打点前缺席。
        #[tokio::test]
        async fn context_export_keeps_canonical_order() {
            let environment = CoreEnvironment::custom(
                Handle::current(),
                Arc::new(NullBus),
                Arc::new(TokioClock),
            );
            let core = CoreContext::new(environment);
            let deadline = core.environment().clock().now() + Duration::from_secs(1);
            let mut payload = BTreeMap::new();
            payload.insert("collection".to_string(), "users".to_string());
            let (request, _response) = Request::new(core, ServiceKind::Kv, deadline, payload);

            let map = request.context().export_as_map();
            assert!(!map.contains_key("dispatch_latency_ns"));
            let keys: Vec<_> = map.keys().map(|k| k.as_ref()).collect();
            assert_eq!(keys, vec!["core_id", "payload.collection", "request_id"]);
        }
    }
}
