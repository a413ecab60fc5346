mod common;

use common::{ObserverHarness, id_counts, product};
use iapdemo::application::observer::RestoredPolicy;
use iapdemo::domain::ports::QueueEvent;
use iapdemo::domain::transaction::{
    PaymentErrorCode, Transaction, TransactionError, TransactionId, TransactionState,
};
use iapdemo::error::StoreError;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::mpsc;

fn purchased(id: &str, product: &str) -> Transaction {
    Transaction::new(id, product, TransactionState::Purchased)
}

#[tokio::test]
async fn test_duplicate_purchased_before_ack_finishes_once() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![purchased("t1", "pro.monthly")])
        .await
        .unwrap();
    h.observer
        .on_transactions_updated(vec![purchased("t1", "pro.monthly")])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("t1"), 1);
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_duplicate_purchased_after_ack_is_ignored() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![purchased("t1", "pro.monthly")])
        .await
        .unwrap();
    h.main.flush().await;
    h.observer
        .on_transactions_updated(vec![purchased("t1", "pro.monthly")])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("t1"), 1);
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_cancelled_failure_is_silent_but_finished() {
    let h = ObserverHarness::new();
    let cancelled = Transaction::new("t1", "pro.monthly", TransactionState::Failed)
        .with_error(TransactionError::new(PaymentErrorCode::PaymentCancelled));

    h.observer.on_transactions_updated(vec![cancelled]).await.unwrap();
    h.main.flush().await;

    assert!(h.listener.purchase_messages.lock().unwrap().is_empty());
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_failure_notifies_once_and_finishes_once() {
    let h = ObserverHarness::new();
    let failed = Transaction::new("t1", "pro.monthly", TransactionState::Failed)
        .with_error(TransactionError::new(PaymentErrorCode::CloudServiceNetworkConnectionFailed));

    h.observer
        .on_transactions_updated(vec![failed.clone()])
        .await
        .unwrap();
    h.observer.on_transactions_updated(vec![failed]).await.unwrap();
    h.main.flush().await;

    let messages = h.listener.purchase_messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec!["Purchase of pro.monthly failed.\nError: Cannot connect to the store.".to_string()]
    );
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_failure_without_error_still_reported() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![Transaction::new("t1", "a", TransactionState::Failed)])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(
        *h.listener.purchase_messages.lock().unwrap(),
        vec!["Purchase of a failed.".to_string()]
    );
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_unknown_state_is_fatal_and_finishes_nothing() {
    let h = ObserverHarness::new();

    let result = h
        .observer
        .on_transactions_updated(vec![
            purchased("t1", "a"),
            Transaction::new("t2", "b", TransactionState::Unrecognized("revoked".into())),
        ])
        .await;
    h.main.flush().await;

    match result {
        Err(StoreError::UnknownTransactionState { state, transaction }) => {
            assert_eq!(state, "revoked");
            assert_eq!(transaction, TransactionId::from("t2"));
        }
        other => panic!("expected UnknownTransactionState, got {other:?}"),
    }
    assert_eq!(h.queue.total_finished(), 0);
    assert_eq!(h.listener.delivery_count("t1"), 0);
}

#[tokio::test]
async fn test_deferred_then_purchased_delivers_once() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![
            Transaction::new("t1", "a", TransactionState::Purchasing),
            Transaction::new("t1", "a", TransactionState::Deferred),
        ])
        .await
        .unwrap();
    h.main.flush().await;
    assert_eq!(h.listener.delivery_count("t1"), 0);
    assert_eq!(h.queue.total_finished(), 0);

    h.observer
        .on_transactions_updated(vec![purchased("t1", "a")])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("t1"), 1);
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_deferred_does_not_block_rest_of_batch() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![
            Transaction::new("t1", "a", TransactionState::Deferred),
            purchased("t2", "b"),
        ])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("t2"), 1);
    assert_eq!(h.queue.finish_count("t2"), 1);
    assert_eq!(h.queue.finish_count("t1"), 0);
}

#[tokio::test]
async fn test_failed_delivery_is_left_pending_and_retried() {
    let h = ObserverHarness::new();
    h.listener.set_fail_delivery(true);

    h.observer
        .on_transactions_updated(vec![purchased("t1", "a")])
        .await
        .unwrap();
    h.main.flush().await;
    assert_eq!(h.queue.total_finished(), 0);

    // The queue hands the unfinished transaction back later.
    h.listener.set_fail_delivery(false);
    h.observer
        .on_transactions_updated(vec![purchased("t1", "a")])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("t1"), 2);
    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_dropped_listener_leaves_transaction_pending() {
    let h = ObserverHarness::new();
    let ObserverHarness {
        queue,
        listener,
        main,
        observer,
    } = h;
    drop(listener);

    observer
        .on_transactions_updated(vec![purchased("t1", "a")])
        .await
        .unwrap();
    main.flush().await;

    assert_eq!(queue.total_finished(), 0);
}

// Restored transactions are delivered like purchases unless configured
// otherwise.
#[tokio::test]
async fn test_restored_delivered_by_default() {
    let h = ObserverHarness::new();

    h.observer
        .on_transactions_updated(vec![Transaction::new("r1", "a", TransactionState::Restored)])
        .await
        .unwrap();
    h.main.flush().await;

    assert_eq!(h.listener.delivery_count("r1"), 1);
    assert_eq!(h.queue.finish_count("r1"), 1);
}

#[tokio::test]
async fn test_restored_ignored_when_configured() {
    let ObserverHarness {
        queue,
        listener,
        main,
        observer,
    } = ObserverHarness::new();
    let observer = observer.with_restored_policy(RestoredPolicy::Ignore);

    observer
        .on_transactions_updated(vec![Transaction::new("r1", "a", TransactionState::Restored)])
        .await
        .unwrap();
    main.flush().await;

    assert_eq!(listener.delivery_count("r1"), 0);
    assert_eq!(queue.total_finished(), 0);
}

#[tokio::test]
async fn test_removed_batch_has_no_side_effects() {
    let h = ObserverHarness::new();

    h.observer.on_transactions_removed(&[purchased("t1", "a")]);
    h.main.flush().await;

    assert_eq!(h.queue.total_finished(), 0);
    assert_eq!(h.listener.delivery_count("t1"), 0);
}

#[tokio::test]
async fn test_submit_purchase_hands_payment_to_queue() {
    let h = ObserverHarness::new();

    assert!(h.observer.is_purchase_allowed());
    h.observer.submit_purchase(&product("pro.monthly"));

    let payments = h.queue.payments.lock().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].product_id.as_str(), "pro.monthly");
    assert_eq!(payments[0].quantity, 1);
}

#[tokio::test]
async fn test_at_least_once_delivery_finishes_each_transaction_once() {
    let h = ObserverHarness::new();
    let mut rng = rand::thread_rng();

    // Every transaction shows up one to four times, shuffled into batches.
    let mut stream = Vec::new();
    for i in 0..50 {
        let repeats = rng.gen_range(1..=4);
        for _ in 0..repeats {
            stream.push(purchased(&format!("t{i}"), &format!("p{}", i % 5)));
        }
    }
    stream.shuffle(&mut rng);

    while !stream.is_empty() {
        let take = rng.gen_range(1..=stream.len().min(7));
        let batch: Vec<_> = stream.drain(..take).collect();
        h.observer.on_transactions_updated(batch).await.unwrap();
        if rng.gen_bool(0.3) {
            h.main.flush().await;
        }
    }
    h.main.flush().await;

    let finished = id_counts(&h.queue.finished.lock().unwrap());
    let delivered = id_counts(&h.listener.deliveries.lock().unwrap());
    assert_eq!(finished.len(), 50);
    assert!(finished.values().all(|&n| n == 1));
    assert!(delivered.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_run_consumes_until_channel_closes() {
    let h = ObserverHarness::new();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(QueueEvent::Updated(vec![purchased("t1", "a")])).unwrap();
    tx.send(QueueEvent::Removed(vec![purchased("t1", "a")])).unwrap();
    drop(tx);

    h.observer.run(rx).await.unwrap();
    h.main.flush().await;

    assert_eq!(h.queue.finish_count("t1"), 1);
}

#[tokio::test]
async fn test_run_stops_on_unknown_state() {
    let h = ObserverHarness::new();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(QueueEvent::Updated(vec![Transaction::new(
        "t1",
        "a",
        TransactionState::Unrecognized("7".into()),
    )]))
    .unwrap();
    tx.send(QueueEvent::Updated(vec![purchased("t2", "a")])).unwrap();

    let result = h.observer.run(rx).await;
    h.main.flush().await;

    assert!(matches!(result, Err(StoreError::UnknownTransactionState { .. })));
    assert_eq!(h.listener.delivery_count("t2"), 0);
}
