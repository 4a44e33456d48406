//! 单槽邮箱
//!
//! 覆盖写语义：新值直接替换旧值，不排队、不保留历史。
//! 用于交互线程（渲染 / UI 拖拽）向仿真循环发布交互力矩。
//!
//! 实现上是一个短作用域的锁保护 `Option<T>`。
//! `with_latest()` 在回调期间持有锁，保证“读取 + 施加到物理”看到同一份快照。

use parking_lot::Mutex;

/// 单槽邮箱
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    /// 创建空邮箱
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// 创建带初值的邮箱
    pub fn with_value(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
        }
    }

    /// 发布新值，覆盖未被消费的旧值
    ///
    /// 返回被覆盖的旧值（如果有）。
    pub fn post(&self, value: T) -> Option<T> {
        self.slot.lock().replace(value)
    }

    /// 取出当前值，邮箱变为空
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// 在持锁状态下访问当前值
    ///
    /// 回调返回前，其他线程无法 `post()`。
    pub fn with_latest<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let slot = self.slot.lock();
        f(slot.as_ref())
    }

    /// 是否有值
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl<T: Clone> Mailbox<T> {
    /// 当前值的副本（不取出）
    pub fn latest(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}
