use super::transaction::TransactionId;
use std::collections::HashSet;

/// Result of asking the ledger whether a transaction may be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns delivery for this transaction.
    Granted,
    /// Another delivery for the same transaction has not completed yet.
    InFlight,
    /// The transaction was already finished in this session.
    AlreadyFinished,
}

/// Pending-transaction bookkeeping for the observer.
///
/// The payment queue delivers at-least-once, so the same transaction can
/// reach the observer several times before (and even after) it has been
/// acknowledged. The ledger makes content delivery and `finish` happen at
/// most once per transaction id.
///
/// Finished ids are kept for the lifetime of the ledger, so its size is
/// bounded by the number of transactions seen in one session.
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    in_flight: HashSet<TransactionId>,
    finished: HashSet<TransactionId>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a transaction for content delivery.
    pub fn claim(&mut self, id: &TransactionId) -> Claim {
        if self.finished.contains(id) {
            Claim::AlreadyFinished
        } else if !self.in_flight.insert(id.clone()) {
            Claim::InFlight
        } else {
            Claim::Granted
        }
    }

    /// Marks a transaction finished, after a successful delivery or when no
    /// delivery is needed. Returns false if it was already finished.
    pub fn complete(&mut self, id: &TransactionId) -> bool {
        self.in_flight.remove(id);
        self.finished.insert(id.clone())
    }

    /// Drops a claim after a failed delivery so a redelivery can retry it.
    pub fn release(&mut self, id: &TransactionId) {
        self.in_flight.remove(id);
    }

    pub fn is_finished(&self, id: &TransactionId) -> bool {
        self.finished.contains(id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
