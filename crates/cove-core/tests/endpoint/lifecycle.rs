pub mod lifecycle {
    //! 生命周期场景：连接、重试、断开与连接-断开竞态。
    //!
    //! # 确定性（How）
    //! - 全部测试运行在 `start_paused` 的虚拟时间下：尝试超时与退避睡眠
    //!   只在所有任务空闲时按序触发，事件计数与时长均可精确断言；
    //! - 退避抖动取固定种子（见 `support::seeded_options`）。

    use std::sync::Arc;
    use std::time::Duration;

    use cove_core::error::codes;
    use cove_core::prelude::*;
    use cove_core::test_stubs::transport::{ConnectScript, GatedConnector, ScriptedConnector};

    use super::support::{harness, new_request, seeded_options, settle, wait_for_state};

    #[derive(Debug, thiserror::Error)]
    #[error("socket already torn down")]
    struct CloseCause;

    /// 幸福路径：通道 5 毫秒后就绪，事件日志恰为一条已连接（Debug）。
    #[tokio::test(start_paused = true)]
    async fn happy_connect_emits_single_connected_event() {
        let h = harness(
            ScriptedConnector::new(
                Arc::new(TokioClock),
                [ConnectScript::ReadyAfter(Duration::from_millis(5))],
                ConnectScript::Fail,
            ),
            seeded_options(),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;
        wait_for_state(&h.endpoint, EndpointState::ConnectedCircuitClosed).await;

        let events = h.bus.events();
        assert_eq!(h.bus.kinds(), vec![EventKind::EndpointConnected]);
        assert_eq!(events[0].severity(), EventSeverity::Debug);
        assert_eq!(events[0].duration(), Some(Duration::from_millis(5)));
    }

    /// 三次失败后成功：恰好 3 条失败（Warn）加 1 条已连接（Debug）。
    #[tokio::test(start_paused = true)]
    async fn retries_until_supplier_succeeds() {
        let h = harness(
            ScriptedConnector::new(
                Arc::new(TokioClock),
                [
                    ConnectScript::Fail,
                    ConnectScript::Fail,
                    ConnectScript::Fail,
                    ConnectScript::Ready,
                ],
                ConnectScript::Fail,
            ),
            seeded_options(),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;
        wait_for_state(&h.endpoint, EndpointState::ConnectedCircuitClosed).await;

        assert_eq!(
            h.bus.kinds(),
            vec![
                EventKind::EndpointConnectionFailed,
                EventKind::EndpointConnectionFailed,
                EventKind::EndpointConnectionFailed,
                EventKind::EndpointConnected,
            ]
        );
        for event in &h.bus.events()[..3] {
            assert_eq!(event.severity(), EventSeverity::Warn);
            let cause = event.cause().expect("failure carries its cause");
            assert_eq!(cause.code(), codes::TRANSPORT_CONNECT_FAILED);
        }
    }

    /// 尝试超时按失败计：每条失败事件的时长都精确等于尝试超时。
    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_failure_with_exact_duration() {
        let h = harness(
            ScriptedConnector::new(
                Arc::new(TokioClock),
                [
                    ConnectScript::Never,
                    ConnectScript::Never,
                    ConnectScript::Never,
                    ConnectScript::Ready,
                ],
                ConnectScript::Never,
            ),
            seeded_options().with_connect_timeout(Duration::from_millis(10)),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;

        let events = h.bus.events();
        let failures: Vec<_> = events
            .iter()
            .filter(|e| e.kind() == EventKind::EndpointConnectionFailed)
            .collect();
        assert_eq!(failures.len(), 3);
        for failure in failures {
            assert_eq!(failure.duration(), Some(Duration::from_millis(10)));
            let cause = failure.cause().expect("timeout failure carries a cause");
            assert_eq!(cause.code(), codes::TRANSPORT_CONNECT_TIMEOUT);
        }
    }

    /// 连接-断开竞态：断开指令先行，迟到通道必须被关闭并忽略，
    /// 端点绝不进入已连接态。
    #[tokio::test(start_paused = true)]
    async fn disconnect_overrides_late_connect_completion() {
        let connector = GatedConnector::new();
        let h = harness(Arc::clone(&connector) as Arc<dyn ChannelConnector>, seeded_options());

        h.endpoint.connect();
        wait_for_state(&h.endpoint, EndpointState::Connecting).await;

        h.endpoint.disconnect();
        settle().await;
        // 断开已被驱动记账，现在才放行通道：典型的迟到就绪。
        connector.release_one();

        h.bus
            .wait_for_count(EventKind::EndpointDisconnected, 1)
            .await;
        wait_for_state(&h.endpoint, EndpointState::Disconnected).await;

        assert_eq!(
            h.bus.kinds(),
            vec![
                EventKind::EndpointConnectionIgnored,
                EventKind::EndpointDisconnected,
            ]
        );
        let events = h.bus.events();
        assert_eq!(events[0].severity(), EventSeverity::Info);
        assert_eq!(events[1].description(), "Endpoint disconnected successfully");
        assert!(connector.channel_was_closed(), "late channel must be closed");
    }

    /// 重试期间断开：恰好 3 条失败与 1 条中止，绝无已连接。
    #[tokio::test(start_paused = true)]
    async fn disconnect_during_retry_aborts_cleanly() {
        let h = harness(
            ScriptedConnector::new(Arc::new(TokioClock), [], ConnectScript::Never),
            seeded_options().with_connect_timeout(Duration::from_millis(10)),
        );

        h.endpoint.connect();
        h.bus
            .wait_for_count(EventKind::EndpointConnectionFailed, 3)
            .await;
        h.endpoint.disconnect();
        h.bus
            .wait_for_count(EventKind::EndpointConnectionAborted, 1)
            .await;
        wait_for_state(&h.endpoint, EndpointState::Disconnected).await;

        assert_eq!(h.bus.count_of(EventKind::EndpointConnectionFailed), 3);
        assert_eq!(h.bus.count_of(EventKind::EndpointConnectionAborted), 1);
        assert_eq!(h.bus.count_of(EventKind::EndpointConnected), 0);
        let events = h.bus.events();
        assert_eq!(events.last().map(|e| e.severity()), Some(EventSeverity::Debug));
    }

    /// 连接后立即断开（通道从未就绪）：以中止收尾。
    #[tokio::test(start_paused = true)]
    async fn connect_then_immediate_disconnect_settles_disconnected() {
        let connector = GatedConnector::new();
        let h = harness(Arc::clone(&connector) as Arc<dyn ChannelConnector>, seeded_options());

        h.endpoint.connect();
        wait_for_state(&h.endpoint, EndpointState::Connecting).await;
        h.endpoint.disconnect();

        h.bus
            .wait_for_count(EventKind::EndpointConnectionAborted, 1)
            .await;
        wait_for_state(&h.endpoint, EndpointState::Disconnected).await;
        assert_eq!(h.bus.kinds(), vec![EventKind::EndpointConnectionAborted]);
    }

    /// 断开幂等：N 次断开表现如一次。
    #[tokio::test(start_paused = true)]
    async fn disconnect_is_idempotent() {
        let h = harness(
            ScriptedConnector::new(Arc::new(TokioClock), [], ConnectScript::Ready),
            seeded_options(),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;

        h.endpoint.disconnect();
        h.endpoint.disconnect();
        h.endpoint.disconnect();
        h.bus
            .wait_for_count(EventKind::EndpointDisconnected, 1)
            .await;
        wait_for_state(&h.endpoint, EndpointState::Disconnected).await;
        settle().await;

        assert_eq!(
            h.bus.kinds(),
            vec![EventKind::EndpointConnected, EventKind::EndpointDisconnected]
        );
    }

    /// 通道失活触发重连：断连事件携带存活时长，随后自动连回。
    #[tokio::test(start_paused = true)]
    async fn channel_inactive_triggers_reconnect() {
        let h = harness(
            ScriptedConnector::new(Arc::new(TokioClock), [], ConnectScript::Ready),
            seeded_options(),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;
        let first_pipeline = h.initializer.current().expect("pipeline installed");

        // 在途请求随失活一并终结。
        let (request, response) = new_request(&h.endpoint);
        h.endpoint.send(request).expect("dispatch accepted");
        settle().await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        first_pipeline.trigger_inactive();

        h.bus.wait_for_count(EventKind::EndpointConnected, 2).await;
        wait_for_state(&h.endpoint, EndpointState::ConnectedCircuitClosed).await;

        assert_eq!(
            h.bus.kinds(),
            vec![
                EventKind::EndpointConnected,
                EventKind::EndpointDisconnected,
                EventKind::EndpointConnected,
            ]
        );
        let disconnected = &h.bus.events()[1];
        assert_eq!(disconnected.duration(), Some(Duration::from_millis(250)));

        let err = response.await.expect_err("in-flight request fails");
        assert_eq!(err.code(), codes::TRANSPORT_CHANNEL_CLOSED);
        assert_eq!(h.endpoint.outstanding_requests(), 0);

        let second_pipeline = h.initializer.current().expect("fresh pipeline");
        assert!(!Arc::ptr_eq(&first_pipeline, &second_pipeline));
    }

    /// 关闭失败：最终仍落回断开态，最后一条事件为 Warn 并携带根因。
    #[tokio::test(start_paused = true)]
    async fn disconnect_failure_emits_warn_with_cause() {
        let h = harness(
            ScriptedConnector::new(Arc::new(TokioClock), [], ConnectScript::Ready),
            seeded_options(),
        );
        h.initializer.fail_next_close_with(
            CoreError::new(codes::TRANSPORT_CLOSE_FAILED, "close handshake failed")
                .with_cause(CloseCause),
        );

        h.endpoint.connect();
        h.bus.wait_for_count(EventKind::EndpointConnected, 1).await;

        h.endpoint.disconnect();
        h.bus
            .wait_for_count(EventKind::EndpointDisconnectionFailed, 1)
            .await;
        wait_for_state(&h.endpoint, EndpointState::Disconnected).await;

        let events = h.bus.events();
        let last = events.last().expect("events recorded");
        assert_eq!(last.kind(), EventKind::EndpointDisconnectionFailed);
        assert_eq!(last.severity(), EventSeverity::Warn);
        let cause = last.cause().expect("failure carries its cause");
        assert_eq!(cause.code(), codes::TRANSPORT_CLOSE_FAILED);
        assert!(cause.cause().is_some(), "underlying close cause preserved");
    }
}
