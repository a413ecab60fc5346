use super::main_context::MainContext;
use super::purchase::PurchaseInitiator;
use crate::domain::ledger::{Claim, DeliveryLedger};
use crate::domain::ports::{PaymentQueueRef, QueueEvent, TransactionListener};
use crate::domain::product::Product;
use crate::domain::transaction::{Transaction, TransactionState};
use crate::error::{Result, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// How `restored` transactions are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoredPolicy {
    /// Re-deliver the content and finish, exactly like a purchase.
    #[default]
    Deliver,
    /// Leave restored transactions untouched.
    Ignore,
}

/// Consumes transaction updates from the payment queue and drives every
/// transaction to an acknowledged outcome.
///
/// Content delivery and its completion run on the [`MainContext`]; the
/// observer itself never waits for them. The [`DeliveryLedger`] is the only
/// shared state and guarantees that a transaction is delivered and finished
/// at most once, even when the queue repeats it.
pub struct StoreObserver {
    queue: PaymentQueueRef,
    initiator: PurchaseInitiator,
    main: MainContext,
    listener: Weak<dyn TransactionListener>,
    ledger: Arc<Mutex<DeliveryLedger>>,
    restored_policy: RestoredPolicy,
    halted: AtomicBool,
}

impl StoreObserver {
    /// Creates an observer reporting to `listener`.
    ///
    /// The listener is not kept alive by the observer; once its owner drops
    /// it, deliveries are treated as failed and left pending.
    pub fn new(
        queue: PaymentQueueRef,
        main: MainContext,
        listener: Weak<dyn TransactionListener>,
    ) -> Self {
        Self {
            initiator: PurchaseInitiator::new(Arc::clone(&queue)),
            queue,
            main,
            listener,
            ledger: Arc::new(Mutex::new(DeliveryLedger::new())),
            restored_policy: RestoredPolicy::default(),
            halted: AtomicBool::new(false),
        }
    }

    pub fn with_restored_policy(mut self, policy: RestoredPolicy) -> Self {
        self.restored_policy = policy;
        self
    }

    /// Whether the user is allowed to make payments at all.
    pub fn is_purchase_allowed(&self) -> bool {
        self.queue.can_make_payments()
    }

    pub fn submit_purchase(&self, product: &Product) {
        self.initiator.submit(product);
    }

    /// Consumes queue events until the channel closes.
    ///
    /// Batches are handled one after the other. An unknown transaction state
    /// stops the loop.
    pub async fn run(&self, mut events: UnboundedReceiver<QueueEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    /// Handles every queued event and waits for the main context, repeating
    /// until neither has work left. Returns the number of events handled.
    pub async fn drain(&self, events: &mut UnboundedReceiver<QueueEvent>) -> Result<usize> {
        let mut handled = 0;
        let mut flushed = false;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.handle_event(event).await?;
                    handled += 1;
                    flushed = false;
                }
                Err(TryRecvError::Empty) if !flushed => {
                    self.main.flush().await;
                    flushed = true;
                }
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) => {
                    self.main.flush().await;
                    return Ok(handled);
                }
            }
        }
    }

    pub async fn handle_event(&self, event: QueueEvent) -> Result<()> {
        match event {
            QueueEvent::Updated(transactions) => self.on_transactions_updated(transactions).await,
            QueueEvent::Removed(transactions) => {
                self.on_transactions_removed(&transactions);
                Ok(())
            }
        }
    }

    /// Reacts to a batch of transaction updates, in order.
    ///
    /// A batch containing an unrecognized state is rejected as a whole before
    /// anything is delivered or finished. The observer stays halted afterwards
    /// and refuses every later batch.
    pub async fn on_transactions_updated(&self, transactions: Vec<Transaction>) -> Result<()> {
        if self.halted.load(Ordering::SeqCst) {
            return Err(StoreError::ObserverHalted);
        }
        if let Some(transaction) = transactions
            .iter()
            .find(|t| matches!(t.state, TransactionState::Unrecognized(_)))
        {
            return Err(self.unknown_state(transaction));
        }

        for transaction in transactions {
            match transaction.state {
                TransactionState::Purchasing => {
                    tracing::debug!(transaction = %transaction.id, "transaction is being processed");
                }
                TransactionState::Deferred => {
                    tracing::info!(
                        product = %transaction.product_id,
                        "purchase deferred. Allow the user to continue using your app."
                    );
                }
                TransactionState::Purchased => self.handle_purchased(transaction).await,
                TransactionState::Failed => self.handle_failed(transaction).await,
                TransactionState::Restored => match self.restored_policy {
                    RestoredPolicy::Deliver => self.handle_purchased(transaction).await,
                    RestoredPolicy::Ignore => {
                        tracing::debug!(transaction = %transaction.id, "ignoring restored transaction");
                    }
                },
                TransactionState::Unrecognized(_) => return Err(self.unknown_state(&transaction)),
            }
        }
        Ok(())
    }

    /// Reports transactions the queue no longer tracks.
    pub fn on_transactions_removed(&self, transactions: &[Transaction]) {
        for transaction in transactions {
            tracing::info!(
                transaction = %transaction.id,
                "{} was removed from the payment queue.",
                transaction.product_id
            );
        }
    }

    async fn handle_purchased(&self, transaction: Transaction) {
        match self.ledger.lock().await.claim(&transaction.id) {
            Claim::Granted => {}
            Claim::InFlight => {
                tracing::debug!(transaction = %transaction.id, "delivery already in flight");
                return;
            }
            Claim::AlreadyFinished => {
                tracing::debug!(transaction = %transaction.id, "transaction already finished");
                return;
            }
        }

        tracing::info!(
            product = %transaction.product_id,
            transaction = %transaction.id,
            "deliver content for {}",
            transaction.product_id
        );

        let listener = self.listener.clone();
        let ledger = Arc::clone(&self.ledger);
        let queue = Arc::clone(&self.queue);
        self.main.dispatch(async move {
            let delivered = match listener.upgrade() {
                Some(listener) => listener.deliver_content(&transaction).await,
                None => {
                    tracing::warn!(transaction = %transaction.id, "no listener to deliver content");
                    false
                }
            };

            let mut ledger = ledger.lock().await;
            if !delivered {
                // Left pending: the queue hands it back on a later session.
                ledger.release(&transaction.id);
                tracing::warn!(
                    product = %transaction.product_id,
                    transaction = %transaction.id,
                    "content could not be delivered; transaction stays pending"
                );
            } else if ledger.complete(&transaction.id) {
                queue.finish_transaction(&transaction);
            }
        });
    }

    async fn handle_failed(&self, transaction: Transaction) {
        if !self.ledger.lock().await.complete(&transaction.id) {
            tracing::debug!(transaction = %transaction.id, "failed transaction already finished");
            return;
        }

        if transaction.is_cancelled() {
            let cancelled = StoreError::TransactionCancelled {
                product: transaction.product_id.clone(),
            };
            tracing::debug!(transaction = %transaction.id, "{cancelled}");
        } else {
            let failure = StoreError::TransactionFailed {
                product: transaction.product_id.clone(),
                reason: transaction.error.as_ref().map(|e| e.description.clone()),
            };
            tracing::warn!(transaction = %transaction.id, "{failure}");

            let message = failure.to_string();
            let listener = self.listener.clone();
            self.main.dispatch(async move {
                if let Some(listener) = listener.upgrade() {
                    listener.purchase_message(&message);
                }
            });
        }

        self.queue.finish_transaction(&transaction);
    }

    fn unknown_state(&self, transaction: &Transaction) -> StoreError {
        self.halted.store(true, Ordering::SeqCst);
        let err = StoreError::UnknownTransactionState {
            state: transaction.state.to_string(),
            transaction: transaction.id.clone(),
        };
        tracing::error!("{err}");
        err
    }
}
