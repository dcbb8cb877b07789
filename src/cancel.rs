//! 显式取消信号
//!
//! 将调用方上下文取消表达为可克隆的令牌：编排器在挂起点检查它，
//! 批量校验的工作单元与它竞争等待。基于 `tokio::sync::watch` 实现。

use std::sync::Arc;

use tokio::sync::watch;

/// 取消令牌
///
/// 克隆开销很小，所有克隆共享同一个信号。一旦触发不可复位。
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// 创建未触发的令牌
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// 触发取消信号
    pub fn cancel(&self) {
        // 所有接收端都会观察到；重复触发无副作用
        let _ = self.sender.send(true);
    }

    /// 检查是否已取消
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// 等待取消信号
    ///
    /// 已取消时立即返回；未取消时挂起直到 [`cancel`](Self::cancel) 被调用。
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // 发送端只在令牌全部析构时消失，此时不可能再触发取消
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        // 已取消的令牌立即返回
        clone.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let woken = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("等待取消信号超时")
            .unwrap();
        assert!(woken);
    }
}
