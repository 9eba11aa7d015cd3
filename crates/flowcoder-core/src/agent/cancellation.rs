//! Cooperative interruption for a running turn

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag set by the front end (e.g. on Ctrl-C) and polled by the
/// orchestrator at phase boundaries and before every tool execution.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = InterruptFlag::new();
        let other = flag.clone();
        other.interrupt();
        assert!(flag.is_set());
        flag.clear();
        assert!(!other.is_set());
    }
}
