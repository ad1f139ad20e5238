mod common;

use algomart_trials::{
    AntiAbuseGuard, DenyReason, MemoryTrialRepository, RateLimiter, TrialConfig, TrialError,
    TrialRepository,
};
use algomart_types::{ProductId, ProductInfo, TrialStatus, UserId};
use chrono::Duration;
use common::{at, make_trial, StaticCatalog, StaticSubscriptions};
use std::sync::Arc;

fn guard_with(
    repo: Arc<MemoryTrialRepository>,
    catalog: StaticCatalog,
    subscriptions: StaticSubscriptions,
) -> AntiAbuseGuard {
    AntiAbuseGuard::new(
        repo,
        Arc::new(catalog),
        Arc::new(subscriptions),
        &TrialConfig::default(),
    )
}

// ── Eligibility ──────────────────────────────────────────────────

#[test]
fn unknown_product_denied() {
    let (catalog, _) = StaticCatalog::single(14);
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::none(),
    );

    let result = guard.authorize(
        &UserId::new(),
        &ProductId::new(),
        "203.0.113.7",
        at("2024-05-01T00:00:00Z"),
    );
    assert!(matches!(
        result,
        Err(TrialError::Denied(DenyReason::NotEligible))
    ));
}

#[test]
fn ineligible_product_denied() {
    let product_id = ProductId::new();
    let catalog = StaticCatalog::with(vec![ProductInfo {
        id: product_id,
        trial_duration_days: 14,
        trial_eligible: false,
    }]);
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::none(),
    );

    let result = guard.authorize(
        &UserId::new(),
        &product_id,
        "203.0.113.7",
        at("2024-05-01T00:00:00Z"),
    );
    assert!(matches!(
        result,
        Err(TrialError::Denied(DenyReason::NotEligible))
    ));
}

#[test]
fn zero_duration_product_denied() {
    let product_id = ProductId::new();
    let catalog = StaticCatalog::with(vec![ProductInfo {
        id: product_id,
        trial_duration_days: 0,
        trial_eligible: true,
    }]);
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::none(),
    );

    let result = guard.authorize(
        &UserId::new(),
        &product_id,
        "203.0.113.7",
        at("2024-05-01T00:00:00Z"),
    );
    assert!(matches!(
        result,
        Err(TrialError::Denied(DenyReason::NotEligible))
    ));
}

// ── Existing grants ──────────────────────────────────────────────

#[test]
fn active_trial_denied() {
    let user = UserId::new();
    let (catalog, product_id) = StaticCatalog::single(14);
    let repo = Arc::new(MemoryTrialRepository::new());
    let now = at("2024-05-01T00:00:00Z");
    repo.insert(&make_trial(user, product_id, now - Duration::days(3), 14))
        .unwrap();

    let guard = guard_with(Arc::clone(&repo), catalog, StaticSubscriptions::none());
    let result = guard.authorize(&user, &product_id, "203.0.113.7", now);
    assert!(matches!(
        result,
        Err(TrialError::Denied(DenyReason::AlreadyActive))
    ));
}

#[test]
fn expired_prior_trial_does_not_block() {
    let user = UserId::new();
    let (catalog, product_id) = StaticCatalog::single(14);
    let repo = Arc::new(MemoryTrialRepository::new());

    // a trial that ran out long ago, already swept
    let mut old = make_trial(user, product_id, at("2023-01-01T00:00:00Z"), 14);
    old.status = TrialStatus::Expired;
    repo.insert(&old).unwrap();

    let guard = guard_with(Arc::clone(&repo), catalog, StaticSubscriptions::none());
    let result = guard.authorize(&user, &product_id, "203.0.113.7", at("2024-05-01T00:00:00Z"));
    assert!(result.is_ok());
}

#[test]
fn active_subscription_denied() {
    let user = UserId::new();
    let (catalog, product_id) = StaticCatalog::single(14);
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::with(vec![(user, product_id)]),
    );

    let result = guard.authorize(&user, &product_id, "203.0.113.7", at("2024-05-01T00:00:00Z"));
    assert!(matches!(
        result,
        Err(TrialError::Denied(DenyReason::AlreadySubscribed))
    ));
}

#[test]
fn subscription_on_other_product_is_fine() {
    let user = UserId::new();
    let (catalog, product_id) = StaticCatalog::single(14);
    let other_product = ProductId::new();
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::with(vec![(user, other_product)]),
    );

    let result = guard.authorize(&user, &product_id, "203.0.113.7", at("2024-05-01T00:00:00Z"));
    assert!(result.is_ok());
}

// ── Rate limiting ────────────────────────────────────────────────

#[test]
fn sixth_attempt_from_origin_within_hour_denied() {
    let (catalog, product_id) = StaticCatalog::single(14);
    let guard = guard_with(
        Arc::new(MemoryTrialRepository::new()),
        catalog,
        StaticSubscriptions::none(),
    );
    let base = at("2024-05-01T00:00:00Z");

    // 5 attempts from the same origin, different users each time
    for i in 0..5 {
        let now = base + Duration::minutes(i * 5);
        let result = guard.authorize(&UserId::new(), &product_id, "203.0.113.7", now);
        assert!(result.is_ok(), "attempt {i} should pass");
    }

    let sixth = guard.authorize(
        &UserId::new(),
        &product_id,
        "203.0.113.7",
        base + Duration::minutes(30),
    );
    assert!(matches!(
        sixth,
        Err(TrialError::Denied(DenyReason::RateLimited))
    ));

    // a different origin is unaffected
    let other = guard.authorize(
        &UserId::new(),
        &product_id,
        "198.51.100.2",
        base + Duration::minutes(30),
    );
    assert!(other.is_ok());
}

#[test]
fn window_slides_attempts_age_out() {
    let limiter = RateLimiter::new(5, 3600);
    let base = at("2024-05-01T00:00:00Z");

    for i in 0..5 {
        assert!(limiter.register("origin", base + Duration::minutes(i)));
    }
    assert!(!limiter.register("origin", base + Duration::minutes(10)));

    // an hour after the first attempts, the budget has recovered
    assert!(limiter.register("origin", base + Duration::hours(2)));
}

#[test]
fn denied_attempts_still_count_against_the_window() {
    let limiter = RateLimiter::new(2, 3600);
    let base = at("2024-05-01T00:00:00Z");

    assert!(limiter.register("origin", base));
    assert!(limiter.register("origin", base + Duration::minutes(1)));
    // every evaluation registers, including the ones over budget
    assert!(!limiter.register("origin", base + Duration::minutes(2)));
    assert!(!limiter.register("origin", base + Duration::minutes(3)));
}
