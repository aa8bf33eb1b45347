mod common;

use std::sync::Barrier;
use std::thread;

use burnote_store::Retrieval;
use chrono::Duration;

const READERS: usize = 8;

fn race<F>(readers: usize, f: F) -> Vec<Retrieval>
where
    F: Fn() -> Retrieval + Sync,
{
    let barrier = Barrier::new(readers);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..readers)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    f()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

fn count_revealed(results: &[Retrieval]) -> usize {
    results
        .iter()
        .filter(|r| matches!(r, Retrieval::Revealed(_)))
        .count()
}

#[test]
fn concurrent_reads_reveal_exactly_once() {
    let (store, _clock) = common::store_with_clock(None);
    let id = store.create("race me", None, None).unwrap();

    let results = race(READERS, || store.retrieve_and_consume(&id, None).unwrap());

    assert_eq!(count_revealed(&results), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| **r == Retrieval::NotFound)
            .count(),
        READERS - 1
    );
    assert!(!store.check_exists(&id).exists);
}

#[test]
fn concurrent_password_reads_reveal_exactly_once() {
    let (store, _clock) = common::store_with_clock(None);
    let id = store.create("guarded", Some("pw"), None).unwrap();

    let results = race(READERS, || {
        store.retrieve_and_consume(&id, Some("pw")).unwrap()
    });

    assert_eq!(count_revealed(&results), 1);
    assert!(results
        .iter()
        .all(|r| matches!(r, Retrieval::Revealed(_) | Retrieval::NotFound)));
}

#[test]
fn wrong_guesses_leave_record_intact() {
    let (store, _clock) = common::store_with_clock(None);
    let id = store.create("guarded", Some("right"), None).unwrap();

    let results = race(READERS, || {
        store.retrieve_and_consume(&id, Some("wrong")).unwrap()
    });
    assert!(results.iter().all(|r| *r == Retrieval::AuthenticationFailed));

    assert!(store.check_exists(&id).exists);
    assert!(matches!(
        store.retrieve_and_consume(&id, Some("right")).unwrap(),
        Retrieval::Revealed(_)
    ));
}

#[test]
fn read_racing_delete_never_double_counts() {
    for _ in 0..10 {
        let (store, _clock) = common::store_with_clock(None);
        let id = store.create("contested", None, None).unwrap();

        let (revealed, deleted) = thread::scope(|scope| {
            let reader = scope.spawn(|| store.retrieve_and_consume(&id, None).unwrap());
            let deleter = scope.spawn(|| store.delete(&id));
            (reader.join().unwrap(), deleter.join().unwrap())
        });

        // Exactly one of the two actors consumed the record.
        assert_ne!(matches!(revealed, Retrieval::Revealed(_)), deleted);
        assert_eq!(store.stats().total_records, 0);
    }
}

#[test]
fn read_racing_sweep_after_expiry() {
    let (store, clock) = common::store_with_clock(None);
    let ids: Vec<String> = (0..4)
        .map(|i| store.create(format!("payload-{i}"), None, Some(1)).unwrap())
        .collect();
    clock.advance(Duration::minutes(2));

    let store = &store;
    let (pruned, results) = thread::scope(|scope| {
        let sweeper = scope.spawn(move || store.prune());
        let readers: Vec<_> = ids
            .iter()
            .map(|id| scope.spawn(move || store.retrieve_and_consume(id, None).unwrap()))
            .collect();
        let results: Vec<Retrieval> = readers.into_iter().map(|h| h.join().unwrap()).collect();
        (sweeper.join().unwrap(), results)
    });

    assert!(results.iter().all(|r| *r == Retrieval::NotFound));
    assert!(pruned <= ids.len());
    assert_eq!(store.stats().total_records, 0);
}
