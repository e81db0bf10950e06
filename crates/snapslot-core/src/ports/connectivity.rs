//! Connectivity port - 端末がオンラインかどうか
//!
//! オフライン時はパスを開始してもストアに触れずに終わります。

use std::sync::atomic::{AtomicBool, Ordering};

pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// 常にオンライン（CLI など、OS の通知が取れない環境用）
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// 環境アダプタが書き換えるフラグ
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Returns `true` when this call flipped offline -> online.
    pub fn set_online(&self, online: bool) -> bool {
        let was = self.online.swap(online, Ordering::AcqRel);
        online && !was
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl<C: Connectivity + ?Sized> Connectivity for std::sync::Arc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_online_reports_restoration_once() {
        let flag = ConnectivityFlag::new(false);
        assert!(!flag.is_online());

        assert!(flag.set_online(true));
        assert!(!flag.set_online(true));
        assert!(flag.is_online());

        assert!(!flag.set_online(false));
        assert!(!flag.is_online());
    }
}
