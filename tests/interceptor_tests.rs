/// Interceptor lifecycle tests
///
/// Drive the interceptor against a scripted connection source and check the
/// exact sequence of begin/commit/rollback/release calls.
mod common;

use common::{AppError, Event, Faults, ScriptedSource, interceptor};
use memotx::{ConnectionResolver, DbError, Statement, TransactionContext, TxError, Value};
use std::time::Duration;

async fn write() -> Result<(), AppError> {
    let connection = ConnectionResolver::current_connection().ok_or(TxError::ContextUnavailable)?;
    connection
        .execute(&Statement::insert("t", vec![Value::from(1)]))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_commit_exactly_once_and_release() {
    let source = ScriptedSource::new();
    let interceptor = interceptor(source.clone());

    interceptor
        .invoke(async {
            write().await?;
            write().await
        })
        .await
        .unwrap();

    assert_eq!(
        source.events(),
        vec![
            Event::Acquire(1),
            Event::SetAutoCommit(1, false),
            Event::Execute(1),
            Event::Execute(1),
            Event::Commit(1),
            Event::SetAutoCommit(1, true),
            Event::Release(1),
        ]
    );
    assert_eq!(source.outstanding(), 0);
}

#[tokio::test]
async fn test_rollback_exactly_once_on_error() {
    let source = ScriptedSource::new();
    let interceptor = interceptor(source.clone());

    let err = interceptor
        .invoke(async {
            write().await?;
            Err::<(), _>(AppError::Rejected("no".into()))
        })
        .await
        .unwrap_err();

    let AppError::Tx(tx) = err else {
        panic!("expected a transaction error, got {err:?}");
    };
    assert!(matches!(tx.business_error::<AppError>(), Some(AppError::Rejected(msg)) if msg == "no"));
    assert!(tx.suppressed().is_none());

    assert_eq!(source.count(|e| matches!(e, Event::Rollback(_))), 1);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 0);
    assert_eq!(source.count(|e| matches!(e, Event::Release(_))), 1);
    assert_eq!(source.events().last(), Some(&Event::Release(1)));
}

#[tokio::test]
async fn test_nested_calls_do_not_commit() {
    let source = ScriptedSource::new();
    let outer = interceptor(source.clone());
    let inner = outer.clone();

    outer
        .invoke(async {
            for _ in 0..3 {
                inner.invoke(write()).await?;
                // Still inside the outer transaction
                assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 0);
            }
            Ok::<_, AppError>(())
        })
        .await
        .unwrap();

    assert_eq!(source.count(|e| matches!(e, Event::Acquire(_))), 1);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 1);
    assert_eq!(outer.manager().stats().joined, 3);
}

#[tokio::test]
async fn test_inner_failure_caught_by_outer_still_commits() {
    let source = ScriptedSource::new();
    let outer = interceptor(source.clone());
    let inner = outer.clone();

    outer
        .invoke(async {
            let nested = inner
                .invoke(async { Err::<(), _>(AppError::Rejected("inner".into())) })
                .await;
            // Joined calls pass the error through unwrapped
            assert!(matches!(nested, Err(AppError::Rejected(_))));
            write().await
        })
        .await
        .unwrap();

    assert_eq!(source.count(|e| matches!(e, Event::Rollback(_))), 0);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 1);
}

#[tokio::test]
async fn test_rollback_failure_keeps_primary_cause() {
    let source = ScriptedSource::with_faults(Faults {
        rollback: true,
        ..Faults::default()
    });
    let interceptor = interceptor(source.clone());

    let err = interceptor
        .invoke(async { Err::<(), _>(AppError::Rejected("primary".into())) })
        .await
        .unwrap_err();

    let AppError::Tx(tx) = err else {
        panic!("expected a transaction error, got {err:?}");
    };
    assert!(matches!(tx.business_error::<AppError>(), Some(AppError::Rejected(msg)) if msg == "primary"));
    assert!(matches!(tx.suppressed(), Some(DbError::ExecutionError(msg)) if msg == "rollback refused"));
    assert!(tx.to_string().contains("primary"));

    // Rolled back once, auto-commit restored, released once
    assert_eq!(source.count(|e| matches!(e, Event::Rollback(_))), 1);
    assert_eq!(source.count(|e| matches!(e, Event::SetAutoCommit(_, true))), 1);
    assert_eq!(source.outstanding(), 0);
}

#[tokio::test]
async fn test_commit_failure_rolls_back_and_reports() {
    let source = ScriptedSource::with_faults(Faults {
        commit: true,
        ..Faults::default()
    });
    let interceptor = interceptor(source.clone());

    let err = interceptor
        .invoke(async { write().await })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Tx(TxError::Commit { .. })));
    assert_eq!(source.count(|e| matches!(e, Event::Rollback(_))), 1);
    assert_eq!(source.outstanding(), 0);
    assert_eq!(interceptor.manager().stats().rolled_back, 1);
}

#[tokio::test]
async fn test_begin_failure_releases_connection() {
    let source = ScriptedSource::with_faults(Faults {
        begin: true,
        ..Faults::default()
    });
    let interceptor = interceptor(source.clone());
    let mut ran = false;

    let err = interceptor
        .invoke(async {
            ran = true;
            Ok::<_, AppError>(())
        })
        .await
        .unwrap_err();

    assert!(!ran);
    assert!(matches!(err, AppError::Tx(TxError::Begin { .. })));
    assert_eq!(source.count(|e| matches!(e, Event::Release(_))), 1);
    assert!(!ConnectionResolver::in_transaction());
}

#[tokio::test]
async fn test_acquisition_failure_skips_call() {
    let source = ScriptedSource::with_faults(Faults {
        acquire: true,
        ..Faults::default()
    });
    let interceptor = interceptor(source.clone());

    let err = interceptor
        .invoke(async { Ok::<_, AppError>(()) })
        .await
        .unwrap_err();

    match err {
        AppError::Tx(TxError::ConnectionAcquisition { manager, .. }) => {
            assert_eq!(manager, "default")
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(source.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_chains_are_isolated() {
    let source = ScriptedSource::new();
    let interceptor = interceptor(source.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let interceptor = interceptor.clone();
            tokio::spawn(async move {
                interceptor
                    .invoke(async {
                        let first = ConnectionResolver::current_connection().unwrap();
                        tokio::task::yield_now().await;
                        write().await?;
                        let second = ConnectionResolver::current_connection().unwrap();
                        assert!(first.same_connection(&second));
                        Ok::<_, AppError>(first.id())
                    })
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    // Every chain ran on its own connection
    assert_eq!(ids.len(), 8);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 8);
    assert_eq!(source.outstanding(), 0);
}

#[tokio::test]
async fn test_joined_futures_in_one_scope_open_separate_transactions() {
    let source = ScriptedSource::new();
    let interceptor = interceptor(source.clone());

    let (first, second) = TransactionContext::scope(async {
        futures::join!(
            interceptor.invoke(async {
                write().await?;
                tokio::time::sleep(Duration::from_millis(30)).await;
                write().await?;
                Ok::<_, AppError>(ConnectionResolver::current_transaction_id())
            }),
            interceptor.invoke(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                write().await?;
                Ok::<_, AppError>(ConnectionResolver::current_transaction_id())
            })
        )
    })
    .await;

    let (first, second) = (first.unwrap().unwrap(), second.unwrap().unwrap());
    assert_ne!(first, second);
    assert_eq!(source.count(|e| matches!(e, Event::Acquire(_))), 2);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 2);
    assert_eq!(interceptor.manager().stats().joined, 0);
    assert_eq!(source.outstanding(), 0);
}

#[tokio::test]
async fn test_cancelled_call_with_failing_restore_still_releases() {
    let source = ScriptedSource::with_faults(Faults {
        restore: true,
        ..Faults::default()
    });
    let interceptor = interceptor(source.clone());

    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        interceptor.invoke(async {
            write().await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, AppError>(())
        }),
    )
    .await;
    assert!(outcome.is_err());

    let mut waited = Duration::ZERO;
    while source.outstanding() > 0 {
        assert!(waited < Duration::from_secs(2), "connection never released");
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += Duration::from_millis(5);
    }

    assert_eq!(source.count(|e| matches!(e, Event::Rollback(_))), 1);
    assert_eq!(source.count(|e| matches!(e, Event::SetAutoCommit(_, true))), 0);
    assert_eq!(source.count(|e| matches!(e, Event::Commit(_))), 0);
    assert_eq!(source.count(|e| matches!(e, Event::Release(_))), 1);
}
