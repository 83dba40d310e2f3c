use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin rotation over the configured map API keys.
/// Every external call takes the next key so load spreads across keys.
#[derive(Debug)]
pub struct ApiKeyRing {
    keys: Vec<String>,
    next: AtomicUsize,
}

impl ApiKeyRing {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    /// Return the current key and advance to the next one.
    pub fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(self.keys[idx].as_str())
    }

    /// Peek at the key the next call will receive, without rotating.
    pub fn current_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.next.load(Ordering::Relaxed) % self.keys.len();
        Some(self.keys[idx].as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Clone for ApiKeyRing {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            next: AtomicUsize::new(self.next.load(Ordering::Relaxed)),
        }
    }
}
