use crate::domain::ports::{PaymentQueue, QueueEvent};
use crate::domain::product::ProductIdentifier;
use crate::domain::transaction::{
    Payment, PaymentErrorCode, Transaction, TransactionError, TransactionId, TransactionState,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Scripted result of a payment submitted to the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxOutcome {
    #[default]
    Purchase,
    Fail(PaymentErrorCode),
    /// Needs approval from someone else; stays deferred until approved.
    AskToBuy,
}

/// A deterministic stand-in for the platform payment queue.
///
/// Every payment produces a `purchasing` update followed by the outcome
/// scripted for its product. Transactions stay pending until finished;
/// finishing removes them and emits a removal batch.
pub struct SandboxPaymentQueue {
    events: mpsc::UnboundedSender<QueueEvent>,
    authorized: bool,
    outcomes: HashMap<ProductIdentifier, SandboxOutcome>,
    pending: Mutex<BTreeMap<TransactionId, Transaction>>,
    finished: Mutex<Vec<TransactionId>>,
    next_id: AtomicU64,
}

impl SandboxPaymentQueue {
    /// Creates the queue and the receiving end of its event stream.
    pub fn new(authorized: bool) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let queue = Self {
            events,
            authorized,
            outcomes: HashMap::new(),
            pending: Mutex::new(BTreeMap::new()),
            finished: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        };
        (queue, rx)
    }

    pub fn with_outcome(mut self, product: ProductIdentifier, outcome: SandboxOutcome) -> Self {
        self.outcomes.insert(product, outcome);
        self
    }

    /// Approves every deferred transaction, turning it into a purchase.
    pub fn approve_deferred(&self) -> usize {
        let approved: Vec<Transaction> = {
            let mut pending = lock(&self.pending);
            pending
                .values_mut()
                .filter(|tx| tx.state == TransactionState::Deferred)
                .map(|tx| {
                    tx.state = TransactionState::Purchased;
                    tx.clone()
                })
                .collect()
        };

        let count = approved.len();
        if count > 0 {
            self.emit(QueueEvent::Updated(approved));
        }
        count
    }

    /// Re-presents a previously completed purchase of `product`.
    pub fn restore(&self, product: ProductIdentifier) -> TransactionId {
        let tx = Transaction::new(self.next_transaction_id(), product, TransactionState::Restored);
        let id = tx.id.clone();
        lock(&self.pending).insert(id.clone(), tx.clone());
        self.emit(QueueEvent::Updated(vec![tx]));
        id
    }

    /// Emits every unfinished purchased or restored transaction again, as the
    /// platform does when the app starts a new session.
    pub fn redeliver_pending(&self) -> usize {
        let unfinished: Vec<Transaction> = lock(&self.pending)
            .values()
            .filter(|tx| {
                matches!(
                    tx.state,
                    TransactionState::Purchased | TransactionState::Restored
                )
            })
            .cloned()
            .collect();

        let count = unfinished.len();
        if count > 0 {
            self.emit(QueueEvent::Updated(unfinished));
        }
        count
    }

    /// Every transaction id passed to `finish_transaction`, in call order.
    pub fn finished(&self) -> Vec<TransactionId> {
        lock(&self.finished).clone()
    }

    pub fn pending(&self) -> Vec<Transaction> {
        lock(&self.pending).values().cloned().collect()
    }

    fn next_transaction_id(&self) -> TransactionId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        TransactionId::from(format!("sandbox-{n}"))
    }

    fn emit(&self, event: QueueEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no observer attached to the sandbox queue");
        }
    }
}

impl PaymentQueue for SandboxPaymentQueue {
    fn can_make_payments(&self) -> bool {
        self.authorized
    }

    fn add_payment(&self, payment: Payment) {
        let mut tx = Transaction::new(
            self.next_transaction_id(),
            payment.product_id.clone(),
            TransactionState::Purchasing,
        );
        self.emit(QueueEvent::Updated(vec![tx.clone()]));

        let outcome = self
            .outcomes
            .get(&payment.product_id)
            .copied()
            .unwrap_or_default();
        match outcome {
            SandboxOutcome::Purchase => tx.state = TransactionState::Purchased,
            SandboxOutcome::Fail(code) => {
                tx.state = TransactionState::Failed;
                tx.error = Some(TransactionError::new(code));
            }
            SandboxOutcome::AskToBuy => tx.state = TransactionState::Deferred,
        }

        lock(&self.pending).insert(tx.id.clone(), tx.clone());
        self.emit(QueueEvent::Updated(vec![tx]));
    }

    fn finish_transaction(&self, transaction: &Transaction) {
        lock(&self.finished).push(transaction.id.clone());

        let removed = lock(&self.pending).remove(&transaction.id);
        if let Some(tx) = removed {
            self.emit(QueueEvent::Removed(vec![tx]));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
