use std::sync::atomic::{AtomicU64, Ordering};

/// 进程级单调自增 ID 发生器。
///
/// # 设计背景（Why）
/// - 核心、端点、请求与关联不透明 ID 都要求“进程内唯一、单调递增”，
///   以便日志可按创建顺序排序、关联表可按 ID 序视作 FIFO；
/// - 不要求跨进程重启唯一，因此无需持久化或随机化。
///
/// # 契约说明（What）
/// - `next` 从 1 开始递增，`Relaxed` 序即可满足唯一性（fetch_add 本身原子）；
/// - 回绕需要 2^64 次分配，按每秒十亿次计算仍超过五百年，视为不可达。
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 核心实例 ID。
pub static CORE_IDS: IdGenerator = IdGenerator::new();
/// 端点 ID。
pub static ENDPOINT_IDS: IdGenerator = IdGenerator::new();
/// 请求 ID。
pub static REQUEST_IDS: IdGenerator = IdGenerator::new();
