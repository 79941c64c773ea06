//! Connectivity detection.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Remote billing state can be verified.
    Online,
    /// Network unreachable; only cached tenant data is available.
    Offline,
}

impl Connectivity {
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

/// Connectivity probe (`isOnline()`).
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;

    fn connectivity(&self) -> Connectivity {
        Connectivity::from_online(self.is_online())
    }
}

/// Probe driven by the host's network events.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            tracing::info!("connectivity lost; billing checks relaxed to cached data");
        }
    }

    pub fn set_online(&self) {
        if !self.online.swap(true, Ordering::SeqCst) {
            tracing::info!("connectivity restored");
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }
}

impl ConnectivityProbe for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
