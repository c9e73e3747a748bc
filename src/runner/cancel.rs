use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 运行取消标志，可在线程间共享（例如 Ctrl-C 处理器）
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 清除取消标志，用于下一次运行
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
