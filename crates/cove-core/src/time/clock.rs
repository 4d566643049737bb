use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 时钟接口返回的统一延迟 Future 形态。
///
/// 以 `Pin<Box<dyn Future>>` 表达，避免将具体运行时渗透进端点契约；
/// Future 完成即表示指定时长已经过去。
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 可注入的时钟：统一“读当前时间”与“等待一段时间”两种能力。
///
/// # 设计背景（Why）
/// - 重连退避、尝试超时与熔断窗口都依赖时间来源；直接调用系统时钟会让
///   生命周期测试无法复现精确的事件计数；
/// - 经 `Arc<dyn Clock>` 注入后，生产环境使用 [`TokioClock`]，无运行时的
///   单元测试注入 [`MockClock`] 并手动推进。
///
/// # 契约说明（What）
/// - `now` 返回单调时间点，实现必须保证不回退；
/// - `sleep` 返回的 Future 完成前至少等待所给时长。
pub trait Clock: Send + Sync + 'static {
    /// 当前单调时间点。
    fn now(&self) -> Instant;

    /// 在指定时长后完成的睡眠 Future。
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// 生产时钟：委托 Tokio 计时器。
///
/// `now` 取自 `tokio::time::Instant`，因此在 `start_paused` 测试运行时中，
/// 读数与睡眠共同遵循虚拟时间，尝试耗时可被精确断言。
#[derive(Clone, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// 虚拟时钟：手动推进时间，在无运行时的单元测试中复现确定性的唤醒序列。
///
/// # 行为概览（How）
/// - 内部维护自构造起的虚拟偏移与登记在册的睡眠项；
/// - [`MockClock::advance`] 增加偏移并唤醒所有到期睡眠；
/// - 睡眠项以 `Weak` 登记，Future 被提前 Drop 后在下次推进时自然清除。
#[derive(Clone)]
pub struct MockClock {
    inner: Arc<MockClockInner>,
}

struct MockClockInner {
    origin: Instant,
    state: Mutex<MockClockState>,
}

struct MockClockState {
    elapsed: Duration,
    sleepers: Vec<Weak<SleepEntry>>,
}

struct SleepEntry {
    deadline: Duration,
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockClockInner {
                origin: Instant::now(),
                state: Mutex::new(MockClockState {
                    elapsed: Duration::ZERO,
                    sleepers: Vec::new(),
                }),
            }),
        }
    }

    /// 推进虚拟时间并唤醒到期的睡眠 Future。
    ///
    /// 唤醒在释放内部锁之后进行，避免被唤醒任务立刻回调 `sleep` 造成死锁。
    pub fn advance(&self, delta: Duration) {
        let mut pending = Vec::new();
        {
            let mut state = self.inner.state.lock();
            state.elapsed = state.elapsed.saturating_add(delta);
            let elapsed = state.elapsed;
            state.sleepers.retain(|weak| match weak.upgrade() {
                Some(entry) => {
                    if elapsed >= entry.deadline {
                        entry.fired.store(true, Ordering::Release);
                        if let Some(waker) = entry.waker.lock().take() {
                            pending.push(waker);
                        }
                        false
                    } else {
                        true
                    }
                }
                None => false,
            });
        }
        for waker in pending {
            waker.wake();
        }
    }

    /// 自构造起累计的虚拟时间。
    pub fn elapsed(&self) -> Duration {
        self.inner.state.lock().elapsed
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.inner.origin + self.inner.state.lock().elapsed
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        let entry = {
            let mut state = self.inner.state.lock();
            let entry = Arc::new(SleepEntry {
                deadline: state.elapsed.saturating_add(duration),
                fired: AtomicBool::new(duration.is_zero()),
                waker: Mutex::new(None),
            });
            state.sleepers.push(Arc::downgrade(&entry));
            entry
        };
        Box::pin(MockSleep { entry })
    }
}

struct MockSleep {
    entry: Arc<SleepEntry>,
}

impl Future for MockSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.entry.fired.load(Ordering::Acquire) {
            return Poll::Ready(());
        }
        *self.entry.waker.lock() = Some(cx.waker().clone());
        // 登记 waker 与 advance 之间存在窗口，重查一次避免错过唤醒。
        if self.entry.fired.load(Ordering::Acquire) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
