//! 一次性完成单元
//!
//! 后台线程（例如文件夹选择对话框）写入结果，轮询线程在下一个周期取走。
//! 基于 `ArcSwapOption`，读写双方都不加锁。

use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// 跨线程传递单个结果的单元
#[derive(Debug)]
pub struct CompletionCell<T> {
    value: ArcSwapOption<T>,
}

impl<T> CompletionCell<T> {
    pub fn new() -> Self {
        Self {
            value: ArcSwapOption::empty(),
        }
    }

    /// 写入结果
    ///
    /// 已有未取走的结果时保留原结果并返回 `false`。
    pub fn complete(&self, value: T) -> bool {
        let previous = self
            .value
            .compare_and_swap(&None::<Arc<T>>, Some(Arc::new(value)));
        previous.is_none()
    }

    /// 是否有待取走的结果
    pub fn is_ready(&self) -> bool {
        self.value.load().is_some()
    }
}

impl<T> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> CompletionCell<T> {
    /// 取走结果，单元恢复为空
    pub fn take(&self) -> Option<T> {
        self.value
            .swap(None)
            .map(|value| Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
    }
}
