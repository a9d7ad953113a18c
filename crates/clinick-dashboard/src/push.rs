//! Push notification token registration

use clinick_client::ReportBackend;
use tracing::{info, warn};

/// Register `token` with the backend
///
/// Best effort: failures are logged and reported as `false`, never retried.
pub async fn register_push_token(backend: &dyn ReportBackend, token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        warn!("Empty push token; skipping registration");
        return false;
    }

    match backend.save_push_token(token).await {
        Ok(()) => {
            info!(backend = backend.name(), "Push token registered");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to register push token");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinick_client::MockBackend;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_registers_trimmed_token() {
        let backend = MockBackend::new();
        assert!(register_push_token(&backend, " fcm-123 ").await);
        assert_eq!(backend.push_tokens(), vec!["fcm-123".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_token_is_skipped() {
        let backend = MockBackend::new();
        assert!(!register_push_token(&backend, "   ").await);
        assert!(backend.push_tokens().is_empty());
    }
}
