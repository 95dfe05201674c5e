//! In-process collaborator implementations
//!
//! Hosts without their own consent store or lifecycle tracking can use these
//! flags: the host flips them, the tracker reads them.

use std::sync::atomic::{AtomicBool, Ordering};

use omnitel_core::ports::{IConsentProvider, ILifecycleProvider};

/// User consent held in memory
#[derive(Debug, Default)]
pub struct ConsentFlag {
    granted: AtomicBool,
}

impl ConsentFlag {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl IConsentProvider for ConsentFlag {
    fn has_consent(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Foreground/background state held in memory
#[derive(Debug)]
pub struct ForegroundState {
    foreground: AtomicBool,
}

impl ForegroundState {
    pub fn new(foreground: bool) -> Self {
        Self {
            foreground: AtomicBool::new(foreground),
        }
    }

    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }
}

impl Default for ForegroundState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ILifecycleProvider for ForegroundState {
    fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }
}
