//! The single polling primitive every readiness wait in the engine goes
//! through (§9: "expose a single `pollForReadiness` primitive; forbid
//! ad-hoc sleep loops anywhere else").

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, timeout};

use crate::error::InstallerError;

/// Poll `predicate` at `interval` until it returns `Ok(true)`, surfacing
/// predicate errors immediately, and returning
/// [`InstallerError::ReadinessTimeout`] if `timeout_after` elapses first.
pub async fn poll_for_readiness<F, Fut>(
    label: &str,
    timeout_after: Duration,
    tick: Duration,
    mut predicate: F,
) -> Result<(), InstallerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, InstallerError>>,
{
    let wait = async {
        let mut ticker = interval(tick);
        loop {
            ticker.tick().await;
            if predicate().await? {
                return Ok(());
            }
        }
    };

    match timeout(timeout_after, wait).await {
        Ok(result) => result,
        Err(_) => Err(InstallerError::ReadinessTimeout(label.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_on_first_true() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = poll_for_readiness(
            "test",
            Duration::from_secs(1),
            Duration::from_millis(1),
            move || {
                let calls = calls_clone.clone();
                async move {
                    let count = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(count >= 2)
                }
            },
        )
        .await;

        assert!(result.is_ok());
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn surfaces_predicate_errors_immediately() {
        let result = poll_for_readiness(
            "test",
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async { Err(InstallerError::Helm("boom".to_string())) },
        )
        .await;

        assert!(matches!(result, Err(InstallerError::Helm(_))));
    }

    #[tokio::test]
    async fn times_out_when_predicate_never_succeeds() {
        let result = poll_for_readiness(
            "never-ready",
            Duration::from_millis(20),
            Duration::from_millis(5),
            || async { Ok(false) },
        )
        .await;

        assert!(matches!(result, Err(InstallerError::ReadinessTimeout(_))));
    }
}
