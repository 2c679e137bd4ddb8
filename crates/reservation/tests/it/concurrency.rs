use std::thread;

use assert_matches::assert_matches;
use boson_primitives::{AuthContext, ParamBindings, ReservationId};
use boson_reservation::{ReservationBatch, ReservationConfig, ReservationEngine, ReservationError};
use boson_usage::FreshnessGate;
use proptest::prelude::*;

use crate::common::{Harness, node};

const LIMIT: u64 = 20;

/// An engine per thread, as if every thread were a separate service
/// instance sharing the database.
fn engine(h: &Harness) -> ReservationEngine {
    ReservationEngine::new(
        h.db.clone(),
        h.clock.clone(),
        FreshnessGate::new(h.ledger.gate().threshold()),
        ReservationConfig {
            max_attempts: 1_000,
            ..ReservationConfig::default()
        },
    )
}

#[test]
fn test_concurrent_admission_never_exceeds_limit() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], LIMIT);
    h.report(&node("a"), &vms, 4);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine(&h);
            let vms = vms.clone();
            thread::spawn(move || {
                let mut admitted = 0;
                for _ in 0..10 {
                    let batch = ReservationBatch::new(AuthContext::new("acme"), node(&format!("n{i}")))
                        .with_item(vms.clone(), ParamBindings::new(), 1);
                    match engine.create_reservations(batch) {
                        Ok(records) => admitted += records.len() as i64,
                        Err(err) => assert_matches!(err, ReservationError::QuotaExceeded { .. }),
                    }
                }
                admitted
            })
        })
        .collect();

    let admitted: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let usage = h.usage(&vms);
    assert_eq!(admitted, LIMIT as i64 - 4);
    assert_eq!(usage.reserved, admitted);
    assert_eq!(usage.total(), i128::from(LIMIT));
}

#[test]
fn test_concurrent_sweeps_expire_once() {
    let h = Harness::new();
    let vms = h.reservable("vms", &[], LIMIT);
    h.report(&node("a"), &vms, 0);

    for _ in 0..10 {
        h.engine
            .create_reservations(
                ReservationBatch::new(AuthContext::new("acme"), node("a"))
                    .with_item(vms.clone(), ParamBindings::new(), 1)
                    .with_ttl(std::time::Duration::from_secs(1)),
            )
            .unwrap();
    }
    let now = boson_primitives::Clock::now(&h.clock) + 1_000;

    let sweepers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine(&h);
            thread::spawn(move || engine.expire_reservations(now).unwrap())
        })
        .collect();
    let expired: usize = sweepers.into_iter().map(|s| s.join().unwrap()).sum();

    assert_eq!(expired, 10);
    let usage = h.usage(&vms);
    assert_eq!(usage.reserved, 0);
    assert_eq!(usage.pending, 0);
}

#[derive(Debug, Clone)]
enum Op {
    Reserve(i64),
    Commit(usize),
    Rollback(usize),
    Report(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-3i64..=5).prop_map(Op::Reserve),
        2 => any::<usize>().prop_map(Op::Commit),
        2 => any::<usize>().prop_map(Op::Rollback),
        1 => (0u64..=10).prop_map(Op::Report),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_pending_total_stays_within_limit(ops in proptest::collection::vec(op(), 1..40)) {
        let h = Harness::new();
        let vms = h.reservable("vms", &[], LIMIT);
        let auth = AuthContext::new("acme");
        h.report(&node("a"), &vms, 0);

        let mut ids: Vec<ReservationId> = Vec::new();
        for op in ops {
            let before = h.usage(&vms);
            match op {
                Op::Reserve(delta) => {
                    let batch = ReservationBatch::new(auth.clone(), node("a"))
                        .with_item(vms.clone(), ParamBindings::new(), delta);
                    match h.engine.create_reservations(batch) {
                        Ok(records) => ids.extend(records.iter().map(|r| r.id)),
                        Err(ReservationError::QuotaExceeded { .. }) => {
                            prop_assert!(delta > 0);
                            prop_assert_eq!(h.usage(&vms), before.clone());
                        }
                        Err(err) => prop_assert!(false, "unexpected error {err}"),
                    }
                }
                Op::Commit(_) | Op::Rollback(_) if ids.is_empty() => {}
                Op::Commit(i) => {
                    let id = ids[i % ids.len()];
                    let _ = h.engine.commit(&[id], &auth);
                    // Committed releases lower the total, nothing raises it.
                    prop_assert!(h.usage(&vms).total() <= before.total());
                }
                Op::Rollback(i) => {
                    let id = ids[i % ids.len()];
                    let _ = h.engine.rollback(&[id], &auth);
                }
                Op::Report(in_use) => h.report(&node("a"), &vms, in_use),
            }

            // Reported usage may exceed the limit on its own; reservations
            // only ever add headroom-checked deltas.
            let usage = h.usage(&vms);
            prop_assert!(usage.reserved >= 0);
            if usage.reserved > before.reserved {
                prop_assert!(usage.total() <= i128::from(LIMIT));
            }
        }
    }
}
