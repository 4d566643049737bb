//! 熔断器数值不变量：样本量门槛、禁用旁路与任意交错下的状态合法性。

pub mod tests {
    pub mod breaker {
        use std::sync::Arc;
        use std::time::Duration;

        use proptest::prelude::*;

        use cove_core::prelude::*;

        fn breaker(config: CircuitBreakerConfig) -> (RollingCircuitBreaker, MockClock) {
            let clock = MockClock::new();
            let instance = RollingCircuitBreaker::new(config, Arc::new(clock.clone()));
            (instance, clock)
        }

        proptest! {
            /// 窗口内样本量低于门槛时，无论失败构成如何都保持闭合。
            #[test]
            fn below_volume_threshold_never_opens(
                failures in proptest::collection::vec(any::<bool>(), 0..19)
            ) {
                let (breaker, _clock) = breaker(
                    CircuitBreakerConfig::default().with_volume_threshold(20),
                );
                for failed in failures {
                    if failed {
                        breaker.record_failure();
                    } else {
                        breaker.record_success();
                    }
                }
                prop_assert_eq!(breaker.state(), BreakerState::Closed);
                prop_assert!(breaker.allow());
            }

            /// 禁用态：任意记账序列下 `allow` 恒真。
            #[test]
            fn disabled_breaker_allows_every_call(
                failures in proptest::collection::vec(any::<bool>(), 0..256)
            ) {
                let (breaker, _clock) = breaker(
                    CircuitBreakerConfig::default().with_enabled(false),
                );
                for failed in failures {
                    if failed {
                        breaker.record_failure();
                    } else {
                        breaker.record_success();
                    }
                    prop_assert!(breaker.allow());
                }
            }

            /// 任意交错的记账与时间推进后，打开态必然意味着
            /// 窗口内曾同时满足样本量与失败率两个门槛。
            #[test]
            fn open_state_requires_both_thresholds(
                steps in proptest::collection::vec((any::<bool>(), 0u64..500), 1..64)
            ) {
                let config = CircuitBreakerConfig::default()
                    .with_volume_threshold(8)
                    .with_rolling_window(Duration::from_secs(10));
                let (breaker, clock) = breaker(config);
                let mut window: Vec<(Duration, bool)> = Vec::new();
                let mut elapsed = Duration::ZERO;
                for (failed, advance_ms) in steps {
                    clock.advance(Duration::from_millis(advance_ms));
                    elapsed += Duration::from_millis(advance_ms);
                    if failed {
                        breaker.record_failure();
                    } else {
                        breaker.record_success();
                    }
                    if breaker.state() == BreakerState::Open {
                        window.retain(|(at, _)| elapsed.saturating_sub(*at) <= Duration::from_secs(10));
                        window.push((elapsed, failed));
                        let total = window.len() as u64;
                        let fails = window.iter().filter(|(_, f)| *f).count() as u64;
                        prop_assert!(total >= 8, "opened with only {} samples", total);
                        prop_assert!(fails * 100 >= total * 50);
                        break;
                    }
                    window.retain(|(at, _)| elapsed.saturating_sub(*at) <= Duration::from_secs(10));
                    window.push((elapsed, failed));
                }
            }
        }

        /// 半开探针额度大于一时，允许并发探针到上限为止。
        #[test]
        fn half_open_honours_probe_limit_above_one() {
            let config = CircuitBreakerConfig::default()
                .with_volume_threshold(2)
                .with_half_open_probe_limit(2)
                .with_sleep_window(Duration::from_secs(1));
            let (breaker, clock) = breaker(config);
            breaker.record_failure();
            breaker.record_failure();
            assert_eq!(breaker.state(), BreakerState::Open);

            clock.advance(Duration::from_secs(1));
            assert!(breaker.allow(), "first probe");
            assert!(breaker.allow(), "second probe within limit");
            assert!(!breaker.allow(), "third probe beyond limit");
        }
    }
}
