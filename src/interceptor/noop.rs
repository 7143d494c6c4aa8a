//! Fallback for platforms without a global mouse hook.
//!
//! This exists so the crate (and binary) build everywhere. Installing always
//! fails with [`InterceptorError::Unsupported`], which leaves the tracking
//! service running with counting disabled.

use crate::interceptor::types::{InputInterceptor, InterceptorError, PrimaryButtonCallback};

/// An interceptor that cannot be installed.
#[derive(Debug, Default)]
pub struct NoopInterceptor;

impl NoopInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl InputInterceptor for NoopInterceptor {
    fn install(&mut self, _on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError> {
        Err(InterceptorError::Unsupported)
    }

    fn uninstall(&mut self) {}

    fn is_installed(&self) -> bool {
        false
    }
}

/// There is no hook to grant access to on this platform.
pub fn check_permission() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_install_is_unsupported() {
        let mut interceptor = NoopInterceptor::new();
        assert_eq!(
            interceptor.install(Arc::new(|| {})),
            Err(InterceptorError::Unsupported)
        );
        assert!(!interceptor.is_installed());
        interceptor.uninstall();
    }
}
