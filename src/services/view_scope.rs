//! View lifetimes.
//!
//! A [`ViewScope`] stands for one mounted UI view. Pollers and other
//! background work created for the view hang off its cancellation token,
//! so ending the scope (explicitly or by dropping it) tears all of them
//! down on every exit path.

use tokio_util::sync::CancellationToken;

/// Lifetime of one mounted view.
#[derive(Debug)]
pub struct ViewScope {
    name: String,
    token: CancellationToken,
}

impl ViewScope {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        log::debug!("[view] Mounted '{}'", name);
        Self {
            name,
            token: CancellationToken::new(),
        }
    }

    /// A nested scope (e.g. a tab inside a page) that ends with its parent.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        log::debug!("[view] Mounted '{}' inside '{}'", name, self.name);
        Self {
            name,
            token: self.token.child_token(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token cancelled when this view ends.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.token.is_cancelled()
    }

    /// End the view now. Idempotent.
    pub fn end(&self) {
        if !self.token.is_cancelled() {
            log::debug!("[view] Unmounted '{}'", self.name);
            self.token.cancel();
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_cancels_token() {
        let scope = ViewScope::new("tags");
        let token = scope.token();
        assert!(!token.is_cancelled());

        drop(scope);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_ends_with_parent() {
        let parent = ViewScope::new("repository");
        let child = parent.child("builds");

        parent.end();
        assert!(child.is_ended());
    }

    #[test]
    fn test_child_end_leaves_parent_running() {
        let parent = ViewScope::new("repository");
        let child = parent.child("builds");

        child.end();
        child.end();
        assert!(!parent.is_ended());
    }
}
