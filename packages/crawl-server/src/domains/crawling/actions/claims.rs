//! Work-queue claiming for crawl workers.
//!
//! `claim_pending_sessions` hands out fresh work; `claim_stalled_sessions`
//! recovers sessions whose worker went quiet. Both are exclusive: a session
//! is returned to at most one concurrent caller.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::common::{cancellable, CoreError, SessionId};
use crate::domains::crawling::models::CrawlingSession;
use crate::kernel::CoreDeps;

pub async fn claim_pending_sessions(
    queue: i32,
    limit: i64,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<Vec<CrawlingSession>, CoreError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let sessions = cancellable(token, deps.sessions.claim_pending(queue, limit)).await?;

    if sessions.is_empty() {
        debug!(queue, limit, "No pending crawling sessions to claim");
    } else {
        info!(
            queue,
            claimed = sessions.len(),
            session_ids = ?sessions.iter().map(|s| s.id.as_i64()).collect::<Vec<_>>(),
            "Claimed pending crawling sessions"
        );
    }

    Ok(sessions)
}

/// Reclaim processing sessions idle for longer than `stall_threshold`.
/// `exclude` lists sessions the caller is still working on.
pub async fn claim_stalled_sessions(
    queue: i32,
    exclude: &[SessionId],
    stall_threshold: Duration,
    limit: i64,
    token: &CancellationToken,
    deps: &CoreDeps,
) -> Result<Vec<CrawlingSession>, CoreError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let sessions = cancellable(
        token,
        deps.sessions
            .claim_stalled(queue, exclude, stall_threshold, limit),
    )
    .await?;

    if !sessions.is_empty() {
        info!(
            queue,
            reclaimed = sessions.len(),
            stall_threshold_secs = stall_threshold.as_secs(),
            "Reclaimed stalled crawling sessions"
        );
    }

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SkuId;
    use crate::domains::crawling::actions::create_session;
    use crate::domains::crawling::models::{CrawlingSessionStatus, NewCrawlingSession};
    use crate::kernel::TestDependencies;
    use std::collections::HashSet;

    async fn seed(deps: &CoreDeps, count: i64, queue: i32) -> Vec<SessionId> {
        let token = CancellationToken::new();
        let mut ids = Vec::new();
        for sku in 1..=count {
            let input = NewCrawlingSession::builder()
                .search_keyword_url_id(SkuId::from_i64(sku))
                .url(format!("https://site-{sku}.example"))
                .queue(queue)
                .build();
            ids.push(create_session(input, &token, deps).await.unwrap().id);
        }
        ids
    }

    #[tokio::test]
    async fn test_claims_oldest_first_and_marks_processing() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let ids = seed(&deps, 3, 1).await;
        let token = CancellationToken::new();

        let claimed = claim_pending_sessions(1, 2, &token, &deps).await.unwrap();

        assert_eq!(claimed.iter().map(|s| s.id).collect::<Vec<_>>(), ids[..2].to_vec());
        for session in &claimed {
            assert_eq!(session.status, CrawlingSessionStatus::Processing);
            assert!(session.started_at.is_some());
        }
    }

    #[tokio::test]
    async fn test_non_positive_limit_claims_nothing() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 2, 1).await;
        let token = CancellationToken::new();

        assert!(claim_pending_sessions(1, 0, &token, &deps).await.unwrap().is_empty());
        assert!(claim_pending_sessions(1, -3, &token, &deps).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queues_are_isolated() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 2, 2).await;
        let token = CancellationToken::new();

        assert!(claim_pending_sessions(1, 5, &token, &deps).await.unwrap().is_empty());
        assert_eq!(claim_pending_sessions(2, 5, &token, &deps).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_disjoint() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 10, 1).await;

        let (a, b) = tokio::join!(
            async {
                claim_pending_sessions(1, 4, &CancellationToken::new(), &deps)
                    .await
                    .unwrap()
            },
            async {
                claim_pending_sessions(1, 5, &CancellationToken::new(), &deps)
                    .await
                    .unwrap()
            }
        );

        let ids: HashSet<_> = a.iter().chain(b.iter()).map(|s| s.id).collect();
        assert_eq!(a.len() + b.len(), 9);
        assert_eq!(ids.len(), 9);
    }

    #[tokio::test]
    async fn test_stalled_respects_threshold_and_excludes() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 3, 1).await;
        let token = CancellationToken::new();

        let claimed = claim_pending_sessions(1, 3, &token, &deps).await.unwrap();
        let threshold = Duration::from_secs(600);

        // Nothing is stale yet
        let fresh = claim_stalled_sessions(1, &[], threshold, 10, &token, &deps)
            .await
            .unwrap();
        assert!(fresh.is_empty());

        for session in &claimed {
            test_deps
                .sessions
                .backdate_started_at(session.id, Duration::from_secs(3600));
        }

        let excluded = claimed[0].id;
        let reclaimed = claim_stalled_sessions(1, &[excluded], threshold, 10, &token, &deps)
            .await
            .unwrap();

        assert_eq!(reclaimed.len(), 2);
        assert!(reclaimed.iter().all(|s| s.id != excluded));
        assert!(reclaimed
            .iter()
            .all(|s| s.status == CrawlingSessionStatus::Processing));

        // Re-stamped, so an immediate second sweep finds nothing but the excluded one
        let again = claim_stalled_sessions(1, &[], threshold, 10, &token, &deps)
            .await
            .unwrap();
        assert_eq!(again.iter().map(|s| s.id).collect::<Vec<_>>(), vec![excluded]);
    }

    #[tokio::test]
    async fn test_pending_sessions_are_never_stalled() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 1, 1).await;
        let token = CancellationToken::new();

        let stalled = claim_stalled_sessions(1, &[], Duration::ZERO, 10, &token, &deps)
            .await
            .unwrap();
        assert!(stalled.is_empty());
    }

    #[tokio::test]
    async fn test_huge_stall_threshold_claims_nothing() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        seed(&deps, 2, 1).await;
        let token = CancellationToken::new();
        claim_pending_sessions(1, 2, &token, &deps).await.unwrap();

        let stalled = claim_stalled_sessions(1, &[], Duration::MAX, 10, &token, &deps)
            .await
            .unwrap();
        assert!(stalled.is_empty());
    }
}
