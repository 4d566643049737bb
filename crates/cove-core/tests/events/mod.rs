//! 默认事件总线的契约：发布非阻塞、订阅者隔离、溢出补报。

pub mod tests {
    pub mod events {
        use std::sync::Arc;

        use tokio::runtime::Handle;
        use tokio::sync::mpsc;

        use cove_core::event::{DefaultEventBus, Event, EventBus, EventKind, EventSeverity, category};

        fn probe_event(label: &'static str) -> Event {
            Event::new(
                EventKind::Custom(label),
                EventSeverity::Debug,
                category::CORE,
                label,
            )
        }

        /// 发布路径不等待订阅者：慢订阅者只拖慢分发任务，
        /// `publish` 始终立即返回。
        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn publish_returns_without_waiting_for_subscribers() {
            let bus = DefaultEventBus::new(&Handle::current());
            bus.subscribe(|_event| {
                std::thread::sleep(std::time::Duration::from_millis(50));
            });
            let started = std::time::Instant::now();
            for _ in 0..32 {
                bus.publish(probe_event("tests.slow_subscriber"));
            }
            assert!(
                started.elapsed() < std::time::Duration::from_millis(50),
                "publish must not ride on subscriber latency"
            );
        }

        /// 溢出后恢复容量：丢弃计数以一条 `EventsDropped` 事件补报。
        #[tokio::test]
        async fn overflow_is_reported_once_capacity_recovers() {
            let bus = DefaultEventBus::with_capacity(&Handle::current(), 2);
            let (tx, mut rx) = mpsc::unbounded_channel();
            bus.subscribe(move |event| {
                let _ = tx.send((event.kind(), event.description().to_string()));
            });

            // current_thread 运行时：分发任务在本任务让出前不会消费，
            // 队列容量 2 吞下前两条，其余进入丢弃计数。
            for _ in 0..8 {
                bus.publish(probe_event("tests.flood"));
            }
            assert_eq!(bus.dropped_events(), 6);

            // 让分发任务排空队列，再发布一条触发补报。
            for _ in 0..2 {
                rx.recv().await.expect("flood events delivered");
            }
            bus.publish(probe_event("tests.after_recovery"));

            let mut seen_drop_notice = false;
            for _ in 0..2 {
                let (kind, description) = rx.recv().await.expect("post-recovery events");
                if kind == EventKind::EventsDropped {
                    assert!(description.contains('6'), "notice carries the count: {description}");
                    seen_drop_notice = true;
                }
            }
            assert!(seen_drop_notice, "EventsDropped must be published after recovery");
            assert_eq!(bus.dropped_events(), 0);
        }
    }
}
