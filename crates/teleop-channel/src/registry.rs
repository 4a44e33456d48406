//! 类型化端点注册表
//!
//! `SharedChannel` 把稳定的逻辑键名映射到一个类型化的槽位。
//! 槽位本身是 `ArcSwapOption<T>`，读写都是无锁的；
//! 注册表的 `RwLock` 只在注册端点时使用，循环的热路径从不触碰它。
//!
//! # 示例
//!
//! ```
//! use teleop_channel::SharedChannel;
//!
//! let channel = SharedChannel::new();
//! let flag = channel.endpoint::<i64>("teleop::replay_ready").unwrap();
//! flag.set(1);
//! assert_eq!(flag.get().unwrap(), 1);
//! ```

use crate::error::ChannelError;
use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 注册表中的一项：类型名 + 类型擦除后的槽位
struct Registered {
    type_name: &'static str,
    slot: Arc<dyn Any + Send + Sync>,
}

/// 进程内共享通道
///
/// Clone 是轻量的（Arc 指针），所有克隆共享同一个注册表。
#[derive(Clone, Default)]
pub struct SharedChannel {
    entries: Arc<RwLock<HashMap<String, Registered>>>,
}

impl SharedChannel {
    /// 创建空通道
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（必要时注册）键 `key` 的类型化端点
    ///
    /// 同一个键的所有端点共享同一个槽位。
    ///
    /// # 错误
    ///
    /// 该键已经以其他值类型注册时返回 `ChannelError::TypeMismatch`。
    pub fn endpoint<T>(&self, key: &str) -> Result<Endpoint<T>, ChannelError>
    where
        T: Clone + Send + Sync + 'static,
    {
        // 快路径：已注册
        if let Some(registered) = self.entries.read().get(key) {
            return Self::downcast(key, registered);
        }

        let mut entries = self.entries.write();
        let registered = entries.entry(key.to_string()).or_insert_with(|| {
            trace!("Registering channel key '{}' as {}", key, type_name::<T>());
            Registered {
                type_name: type_name::<T>(),
                slot: Arc::new(ArcSwapOption::<T>::empty()),
            }
        });
        Self::downcast(key, registered)
    }

    fn downcast<T>(key: &str, registered: &Registered) -> Result<Endpoint<T>, ChannelError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let slot = Arc::clone(&registered.slot)
            .downcast::<ArcSwapOption<T>>()
            .map_err(|_| ChannelError::TypeMismatch {
                key: key.to_string(),
                registered: registered.type_name,
                requested: type_name::<T>(),
            })?;
        Ok(Endpoint {
            key: Arc::from(key),
            slot,
        })
    }

    /// 是否已注册该键
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// 已注册的所有键（按字典序）
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedChannel")
            .field("keys", &self.keys())
            .finish()
    }
}

/// 某个键的类型化读写句柄
///
/// 读写语义：原子的 last-writer-wins，不排队。
pub struct Endpoint<T> {
    key: Arc<str>,
    slot: Arc<ArcSwapOption<T>>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("key", &self.key)
            .field("type", &type_name::<T>())
            .field("is_set", &self.slot.load().is_some())
            .finish()
    }
}

impl<T: Clone> Endpoint<T> {
    /// 键名
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 读取最新值
    ///
    /// # 错误
    ///
    /// 键从未写入时返回 `ChannelError::Unset`。
    pub fn get(&self) -> Result<T, ChannelError> {
        self.slot.load().as_deref().cloned().ok_or_else(|| ChannelError::Unset {
            key: self.key.to_string(),
        })
    }

    /// 读取最新值的共享快照（不克隆数据）
    pub fn load(&self) -> Option<Arc<T>> {
        self.slot.load_full()
    }

    /// 写入新值（覆盖旧值）
    pub fn set(&self, value: T) {
        self.slot.store(Some(Arc::new(value)));
    }

    /// 清空该键
    pub fn clear(&self) {
        self.slot.store(None);
    }

    /// 是否已写入过
    pub fn is_set(&self) -> bool {
        self.slot.load().is_some()
    }
}
