use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Cancellation tokens grouped by caller-chosen tags.
///
/// Every call token descends from a root token, so `cancel_all` reaches
/// untagged calls too.
pub struct TagRegistry {
    root: Mutex<CancellationToken>,
    tags: Mutex<HashMap<String, CancellationToken>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(CancellationToken::new()),
            tags: Mutex::new(HashMap::new()),
        }
    }

    fn root(&self) -> CancellationToken {
        self.root
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// A fresh token for one call.
    pub fn token_for(&self, tag: Option<&str>) -> CancellationToken {
        let Some(tag) = tag else {
            return self.root().child_token();
        };
        let root = self.root();
        let mut tags = self.tags.lock().unwrap_or_else(|p| p.into_inner());
        let parent = tags
            .entry(tag.to_string())
            .or_insert_with(|| root.child_token());
        if parent.is_cancelled() {
            *parent = root.child_token();
        }
        parent.child_token()
    }

    /// Cancel every in-flight call carrying `tag`. Later calls with the same
    /// tag are unaffected.
    pub fn cancel_tag(&self, tag: &str) -> bool {
        let removed = self
            .tags
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(tag);
        match removed {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight call.
    pub fn cancel_all(&self) {
        let old = {
            let mut root = self.root.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *root, CancellationToken::new())
        };
        self.tags.lock().unwrap_or_else(|p| p.into_inner()).clear();
        old.cancel();
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_tag_only_hits_that_tag() {
        let reg = TagRegistry::new();
        let a = reg.token_for(Some("feed"));
        let b = reg.token_for(Some("detail"));
        let c = reg.token_for(None);
        assert!(reg.cancel_tag("feed"));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!c.is_cancelled());
        assert!(!reg.cancel_tag("feed"));
    }

    #[test]
    fn cancelling_a_tag_wakes_its_waiters() {
        let reg = TagRegistry::new();
        let token = reg.token_for(Some("feed"));
        let mut waiter = tokio_test::task::spawn(token.cancelled());
        tokio_test::assert_pending!(waiter.poll());
        reg.cancel_tag("feed");
        assert!(waiter.is_woken());
        tokio_test::assert_ready!(waiter.poll());
    }

    #[test]
    fn tag_is_reusable_after_cancel() {
        let reg = TagRegistry::new();
        reg.token_for(Some("feed"));
        reg.cancel_tag("feed");
        assert!(!reg.token_for(Some("feed")).is_cancelled());
    }

    #[test]
    fn cancel_all_reaches_everything_then_resets() {
        let reg = TagRegistry::new();
        let a = reg.token_for(Some("feed"));
        let b = reg.token_for(None);
        reg.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(!reg.token_for(None).is_cancelled());
        assert!(!reg.token_for(Some("feed")).is_cancelled());
    }
}
