use std::time::Duration;

use assert_matches::assert_matches;
use boson_catalog::InvalidResourceReason;
use boson_primitives::{
    AuthContext, Clock, Limit, ParamBindings, ParamName, ReservationState, ResourceKind,
    ResourceName,
};
use boson_quota::QuotaScope;
use boson_reservation::{ReservationBatch, ReservationError};
use boson_usage::UsageConfig;

use crate::common::{Harness, node};

fn acme() -> AuthContext {
    AuthContext::new("acme")
}

#[test]
fn test_end_to_end_admission() {
    let h = Harness::new();
    let instances = h.reservable("instances", &[], 3);
    h.report(&node("a"), &instances, 2);

    let single = || {
        ReservationBatch::new(acme(), node("a")).with_item(instances.clone(), ParamBindings::new(), 1)
    };

    let first = h.engine.create_reservations(single()).unwrap();
    assert_eq!(h.usage(&instances).total(), 3);

    assert_matches!(
        h.engine.create_reservations(single()),
        Err(ReservationError::QuotaExceeded { limit: 3, current: 3, delta: 1, .. })
    );

    h.engine.rollback(&[first[0].id], &acme()).unwrap();
    assert_eq!(h.usage(&instances).total(), 2);

    let third = h.engine.create_reservations(single()).unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].state, ReservationState::Pending);
}

#[test]
fn test_commit_moves_delta_into_use() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 2);
    let before = h.usage(&vms);

    let ids: Vec<_> = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("b")).with_item(vms.clone(), ParamBindings::new(), 3),
        )
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    let pending = h.usage(&vms);
    assert_eq!(pending.reserved, 3);
    assert_eq!(pending.pending, 1);

    let committed = h.engine.commit(&ids, &acme()).unwrap();
    assert_eq!(committed[0].state, ReservationState::Committed);
    assert_eq!(committed[0].resolved_at, Some(1_000_000));

    let after = h.usage(&vms);
    assert_eq!(after.in_use(), before.in_use() + 3);
    assert_eq!(after.reserved, 0);
    assert_eq!(after.pending, 0);
    assert_eq!(after.total(), pending.total());
    assert_eq!(after.instances[&node("b")].in_use, 3);
    assert_eq!(after.instances[&node("b")].reported_at, None);
}

#[test]
fn test_rollback_restores_aggregate() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 4);
    let before = h.usage(&vms);

    let records = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a"))
                .with_item(vms.clone(), ParamBindings::new(), 2)
                .with_item(vms.clone(), ParamBindings::new(), 1),
        )
        .unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id).collect();
    h.engine.rollback(&ids, &acme()).unwrap();

    let after = h.usage(&vms);
    assert_eq!(after.in_use(), before.in_use());
    assert_eq!(after.reserved, before.reserved);
    assert_eq!(after.pending, before.pending);
}

#[test]
fn test_resolution_is_idempotent() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 0);

    let batch = || ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1);
    let committed = h.engine.create_reservations(batch()).unwrap()[0].id;
    let rolled_back = h.engine.create_reservations(batch()).unwrap()[0].id;

    let first = h.engine.commit(&[committed], &acme()).unwrap();
    let usage = h.usage(&vms);
    let second = h.engine.commit(&[committed], &acme()).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.usage(&vms).in_use(), usage.in_use());

    let first = h.engine.rollback(&[rolled_back], &acme()).unwrap();
    let usage = h.usage(&vms);
    let second = h.engine.rollback(&[rolled_back], &acme()).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.usage(&vms), usage);

    assert_matches!(
        h.engine.commit(&[rolled_back], &acme()),
        Err(ReservationError::InvalidState { state: ReservationState::RolledBack, expired: false, .. })
    );
    assert_matches!(
        h.engine.rollback(&[committed], &acme()),
        Err(ReservationError::InvalidState { state: ReservationState::Committed, .. })
    );
}

#[test]
fn test_resolution_requires_same_principal() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 0);

    let id = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme().with_user("alice"), node("a")).with_item(
                vms.clone(),
                ParamBindings::new(),
                1,
            ),
        )
        .unwrap()[0]
        .id;

    assert_matches!(
        h.engine.commit(&[id], &acme()),
        Err(ReservationError::AuthorizationFailure { id: denied }) if denied == id
    );
    assert_matches!(
        h.engine.rollback(&[id], &AuthContext::new("globex").with_user("alice")),
        Err(ReservationError::AuthorizationFailure { .. })
    );
    h.engine.commit(&[id], &acme().with_user("alice")).unwrap();
}

#[test]
fn test_failed_resolution_changes_nothing() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 0);

    let batch = || ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1);
    let good = h.engine.create_reservations(batch()).unwrap()[0].id;
    let other = h
        .engine
        .create_reservations(
            ReservationBatch::new(AuthContext::new("globex"), node("a")).with_item(
                vms.clone(),
                ParamBindings::new(),
                1,
            ),
        )
        .unwrap()[0]
        .id;

    let usage = h.usage(&vms);
    assert_matches!(
        h.engine.commit(&[good, other], &acme()),
        Err(ReservationError::AuthorizationFailure { .. })
    );
    assert_eq!(h.usage(&vms), usage);
    assert_eq!(h.engine.get_reservation(&good).unwrap().state, ReservationState::Pending);
}

#[test]
fn test_stale_usage_rejects_whole_batch() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    let disks = h.reservable("disks", &[], 10);
    h.report(&node("a"), &vms, 0);
    h.report(&node("a"), &disks, 0);

    h.clock.advance(Duration::from_secs(30));
    h.report(&node("a"), &vms, 0);
    h.clock.advance(Duration::from_secs(31));

    let batch = ReservationBatch::new(acme(), node("a"))
        .with_item(vms.clone(), ParamBindings::new(), 1)
        .with_item(disks.clone(), ParamBindings::new(), 1);
    let err = h.engine.create_reservations(batch.clone()).unwrap_err();
    assert_matches!(
        &err,
        ReservationError::StaleUsage { resources } if resources.len() == 1 && resources[0].resource == disks
    );
    assert_eq!(h.usage(&vms).pending, 0);
    assert_eq!(h.usage(&disks).pending, 0);

    h.report(&node("a"), &disks, 0);
    assert_eq!(h.engine.create_reservations(batch).unwrap().len(), 2);
}

#[test]
fn test_quota_exceeded_rejects_whole_batch() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    let disks = h.reservable("disks", &[], 1);
    h.report(&node("a"), &vms, 0);
    h.report(&node("a"), &disks, 1);

    let batch = ReservationBatch::new(acme(), node("a"))
        .with_correlation_id("req-42")
        .with_item(vms.clone(), ParamBindings::new(), 1)
        .with_item(disks.clone(), ParamBindings::new(), 1);
    assert_matches!(
        h.engine.create_reservations(batch),
        Err(ReservationError::QuotaExceeded { resource, limit: 1, current: 1, delta: 1 })
            if resource.resource == disks
    );

    let usage = h.usage(&vms);
    assert_eq!(usage.pending, 0);
    assert_eq!(usage.reserved, 0);
    assert!(h.engine.list_reservations("req-42").unwrap().is_empty());
}

#[test]
fn test_refresh_countdown_forces_report() {
    let h = Harness::with_usage(UsageConfig {
        refresh_after: Some(2),
        ..UsageConfig::default()
    });
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 0);
    let batch = || ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1);

    h.engine.create_reservations(batch()).unwrap();
    h.engine.create_reservations(batch()).unwrap();
    assert_eq!(h.usage(&vms).until_refresh, Some(0));
    assert_matches!(
        h.engine.create_reservations(batch()),
        Err(ReservationError::StaleUsage { resources }) if resources.len() == 1
    );

    h.report(&node("a"), &vms, 0);
    h.engine.create_reservations(batch()).unwrap();
    assert_eq!(h.usage(&vms).until_refresh, Some(1));
}

#[test]
fn test_pending_without_reports_is_stale() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    let batch = || ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1);

    // Nothing recorded yet, so the first reservation is admitted.
    h.engine.create_reservations(batch()).unwrap();
    assert_matches!(
        h.engine.create_reservations(batch()),
        Err(ReservationError::StaleUsage { .. })
    );

    h.report(&node("a"), &vms, 0);
    h.engine.create_reservations(batch()).unwrap();
}

#[test]
fn test_expiry_rolls_back_once() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 1);
    let before = h.usage(&vms);

    let short = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a"))
                .with_item(vms.clone(), ParamBindings::new(), 2)
                .with_ttl(Duration::from_secs(10)),
        )
        .unwrap()[0]
        .id;
    let long = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 3),
        )
        .unwrap()[0]
        .id;

    let now = h.clock.now() + 10_000;
    assert_eq!(h.engine.expire_reservations(now - 1).unwrap(), 0);
    assert_eq!(h.engine.expire_reservations(now).unwrap(), 1);
    assert_eq!(h.engine.expire_reservations(now).unwrap(), 0);

    let expired = h.engine.get_reservation(&short).unwrap();
    assert_eq!(expired.state, ReservationState::RolledBack);
    assert_eq!(expired.resolved_at, Some(now));
    assert_eq!(h.engine.get_reservation(&long).unwrap().state, ReservationState::Pending);

    let usage = h.usage(&vms);
    assert_eq!(usage.in_use(), before.in_use());
    assert_eq!(usage.reserved, 3);
    assert_eq!(usage.pending, 1);

    // An explicit rollback of the expired reservation is a no-op.
    h.engine.rollback(&[short], &acme()).unwrap();
    assert_eq!(h.usage(&vms), usage);
}

#[test]
fn test_lapsed_reservation_does_not_block_admission() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 1);
    h.report(&node("a"), &vms, 0);

    let abandoned = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a"))
                .with_item(vms.clone(), ParamBindings::new(), 1)
                .with_ttl(Duration::from_secs(5)),
        )
        .unwrap()[0]
        .id;

    h.clock.advance(Duration::from_secs(10));
    h.report(&node("a"), &vms, 0);
    let admitted = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1),
        )
        .unwrap();
    assert_eq!(admitted.len(), 1);

    let lapsed = h.engine.get_reservation(&abandoned).unwrap();
    assert_eq!(lapsed.state, ReservationState::RolledBack);
    assert_eq!(lapsed.resolved_at, Some(h.clock.now()));

    let usage = h.usage(&vms);
    assert_eq!(usage.reserved, 1);
    assert_eq!(usage.pending, 1);
    assert_eq!(h.engine.expire_due().unwrap(), 0);
}

#[test]
fn test_lapsed_reservation_rollback_is_discarded_with_batch() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 1);
    h.report(&node("a"), &vms, 0);

    let abandoned = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a"))
                .with_item(vms.clone(), ParamBindings::new(), 1)
                .with_ttl(Duration::from_secs(5)),
        )
        .unwrap()[0]
        .id;

    h.clock.advance(Duration::from_secs(10));
    h.report(&node("a"), &vms, 0);
    assert_matches!(
        h.engine.create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 2),
        ),
        Err(ReservationError::QuotaExceeded { current: 0, delta: 2, .. })
    );

    assert_eq!(h.engine.get_reservation(&abandoned).unwrap().state, ReservationState::Pending);
    assert_eq!(h.engine.expire_due().unwrap(), 1);
    assert_eq!(h.usage(&vms).reserved, 0);
}

#[test]
fn test_usage_overflow_is_rejected() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, u64::MAX);
    h.report(&node("b"), &vms, u64::MAX);

    let reserve = |delta| {
        h.engine.create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), delta),
        )
    };

    let saturated = 2 * i128::from(i64::MAX);
    assert_matches!(
        reserve(1),
        Err(ReservationError::QuotaExceeded { current, .. }) if current == saturated
    );

    h.quotas.register_quota(&vms, QuotaScope::Default, Limit::Unlimited).unwrap();
    reserve(i64::MAX).unwrap();
    assert_matches!(
        reserve(i64::MAX),
        Err(ReservationError::UsageOverflow { delta, .. }) if delta == i64::MAX
    );

    let usage = h.usage(&vms);
    assert_eq!(usage.reserved, i64::MAX);
    assert_eq!(usage.pending, 1);
    assert_eq!(usage.total(), 3 * i128::from(i64::MAX));
}

#[test]
fn test_auto_commit_releases() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 10);
    h.report(&node("a"), &vms, 5);

    let records = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a"))
                .with_auto_commit_releases(true)
                .with_item(vms.clone(), ParamBindings::new(), -2)
                .with_item(vms.clone(), ParamBindings::new(), 1),
        )
        .unwrap();
    assert_eq!(records[0].state, ReservationState::Committed);
    assert_eq!(records[1].state, ReservationState::Pending);

    let usage = h.usage(&vms);
    assert_eq!(usage.in_use(), 3);
    assert_eq!(usage.reserved, 1);
    assert_eq!(usage.pending, 1);
}

#[test]
fn test_pending_release_does_not_free_room() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], 5);
    h.report(&node("a"), &vms, 5);

    let release = h
        .engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), -2),
        )
        .unwrap()[0]
        .id;
    assert_matches!(
        h.engine.create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1),
        ),
        Err(ReservationError::QuotaExceeded { .. })
    );

    h.engine.commit(&[release], &acme()).unwrap();
    assert_eq!(h.usage(&vms).in_use(), 3);
    h.engine
        .create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(vms.clone(), ParamBindings::new(), 1),
        )
        .unwrap();
}

#[test]
fn test_invalid_resources_are_rejected() {
    let h = Harness::new();
    let vms = h.reservable("vms", &["zone"], 10);
    let cores = h
        .catalog
        .register_resource(&h.service, &ResourceName::new("cores").unwrap(), [], ResourceKind::Absolute)
        .unwrap()
        .key;

    let reserve = |key, params| {
        h.engine.create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(key, params, 1),
        )
    };

    assert_matches!(
        reserve(vms.clone(), ParamBindings::new()),
        Err(ReservationError::InvalidResource { reason: InvalidResourceReason::Abstract { .. }, .. })
    );
    assert_matches!(
        reserve(cores, ParamBindings::new()),
        Err(ReservationError::InvalidResource { reason: InvalidResourceReason::Absolute, .. })
    );
    assert_matches!(
        reserve(
            vms.clone(),
            ParamBindings::new()
                .with(ParamName::new("zone").unwrap(), "eu")
                .with(ParamName::new("rack").unwrap(), "r1"),
        ),
        Err(ReservationError::InvalidParameters { unknown, .. })
            if unknown == vec![ParamName::new("rack").unwrap()]
    );

    let missing = boson_primitives::ResourceKey::new(
        h.service.clone(),
        ResourceName::new("gpus").unwrap(),
    );
    assert_matches!(
        reserve(missing, ParamBindings::new()),
        Err(ReservationError::ResourceNotFound { .. })
    );
}

#[test]
fn test_no_applicable_quota() {
    let h = Harness::new();
    let gpus = h
        .catalog
        .register_resource(&h.service, &ResourceName::new("gpus").unwrap(), [], ResourceKind::Reservable)
        .unwrap()
        .key;

    assert_matches!(
        h.engine.create_reservations(
            ReservationBatch::new(acme(), node("a")).with_item(gpus, ParamBindings::new(), 1),
        ),
        Err(ReservationError::NoApplicableQuota { .. })
    );
}
