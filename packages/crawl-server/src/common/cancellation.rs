//! Cancellation for store round-trips.
//!
//! Every public operation takes a [`CancellationToken`]. When the token fires
//! first, the in-flight future is dropped and the caller gets
//! [`CoreError::Cancelled`]. Each store mutation is a single statement, so a
//! dropped future never leaves a half-applied change behind.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::common::CoreError;

pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    if token.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CoreError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_passes_result_through() {
        let token = CancellationToken::new();
        let value = cancellable(&token, async { Ok::<_, CoreError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_polls() {
        let token = CancellationToken::new();
        token.cancel();
        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = cancellable(&token, async {
            polled.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, CoreError>(())
        })
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_slow_future() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, CoreError>(())
        })
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
