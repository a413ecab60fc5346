use crate::domain::ports::PaymentQueueRef;
use crate::domain::product::Product;
use crate::domain::transaction::Payment;

/// Hands purchase intents to the payment queue.
///
/// Submission is fire-and-forget: failures only show up later as a `failed`
/// transaction on the observer.
pub struct PurchaseInitiator {
    queue: PaymentQueueRef,
}

impl PurchaseInitiator {
    pub fn new(queue: PaymentQueueRef) -> Self {
        Self { queue }
    }

    pub fn submit(&self, product: &Product) {
        let payment = Payment::new(product);
        tracing::info!(product = %payment.product_id, "added product to payment queue");
        self.queue.add_payment(payment);
    }
}
