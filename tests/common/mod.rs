#![allow(dead_code)]

use async_trait::async_trait;
use iapdemo::application::catalog::ProductCatalogClient;
use iapdemo::application::main_context::MainContext;
use iapdemo::application::observer::StoreObserver;
use iapdemo::domain::ports::{
    CatalogListener, CatalogServiceRef, PaymentQueue, PaymentQueueRef, TransactionListener,
};
use iapdemo::domain::product::{Price, Product, ProductIdentifier};
use iapdemo::domain::transaction::{Payment, Transaction, TransactionId};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

pub fn product(id: &str) -> Product {
    Product {
        identifier: ProductIdentifier::from(id),
        title: format!("Title of {id}"),
        price: Price::new(dec!(0.99)).unwrap(),
        currency: "USD".to_string(),
        locale: "en_US".to_string(),
    }
}

/// Payment queue that records every call and emits nothing.
pub struct RecordingQueue {
    pub authorized: bool,
    pub payments: Mutex<Vec<Payment>>,
    pub finished: Mutex<Vec<TransactionId>>,
}

impl RecordingQueue {
    pub fn new(authorized: bool) -> Self {
        Self {
            authorized,
            payments: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn finish_count(&self, id: &str) -> usize {
        let id = TransactionId::from(id);
        self.finished.lock().unwrap().iter().filter(|f| **f == id).count()
    }

    pub fn total_finished(&self) -> usize {
        self.finished.lock().unwrap().len()
    }
}

impl PaymentQueue for RecordingQueue {
    fn can_make_payments(&self) -> bool {
        self.authorized
    }

    fn add_payment(&self, payment: Payment) {
        self.payments.lock().unwrap().push(payment);
    }

    fn finish_transaction(&self, transaction: &Transaction) {
        self.finished.lock().unwrap().push(transaction.id.clone());
    }
}

/// Listener recording every callback it receives.
#[derive(Default)]
pub struct RecordingListener {
    pub fail_delivery: AtomicBool,
    pub deliveries: Mutex<Vec<TransactionId>>,
    pub purchase_messages: Mutex<Vec<String>>,
    pub products: Mutex<Vec<Vec<ProductIdentifier>>>,
    pub single_products: Mutex<Vec<ProductIdentifier>>,
    pub catalog_messages: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn delivery_count(&self, id: &str) -> usize {
        let id = TransactionId::from(id);
        self.deliveries.lock().unwrap().iter().filter(|d| **d == id).count()
    }

    pub fn set_fail_delivery(&self, fail: bool) {
        self.fail_delivery.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionListener for RecordingListener {
    async fn deliver_content(&self, transaction: &Transaction) -> bool {
        self.deliveries.lock().unwrap().push(transaction.id.clone());
        !self.fail_delivery.load(Ordering::SeqCst)
    }

    fn purchase_message(&self, message: &str) {
        self.purchase_messages.lock().unwrap().push(message.to_string());
    }
}

impl CatalogListener for RecordingListener {
    fn products_received(&self, products: &[Product]) {
        self.products
            .lock()
            .unwrap()
            .push(products.iter().map(|p| p.identifier.clone()).collect());
    }

    fn product_received(&self, product: &Product) {
        self.single_products.lock().unwrap().push(product.identifier.clone());
    }

    fn catalog_message(&self, message: &str) {
        self.catalog_messages.lock().unwrap().push(message.to_string());
    }
}

/// Observer wired to a recording queue and listener.
pub struct ObserverHarness {
    pub queue: Arc<RecordingQueue>,
    pub listener: Arc<RecordingListener>,
    pub main: MainContext,
    pub observer: StoreObserver,
}

impl ObserverHarness {
    pub fn new() -> Self {
        let queue = Arc::new(RecordingQueue::new(true));
        let listener = Arc::new(RecordingListener::default());
        let (main, _handle) = MainContext::spawn();
        let payment_queue: PaymentQueueRef = queue.clone();
        let observer = StoreObserver::new(
            payment_queue,
            main.clone(),
            Arc::downgrade(&listener) as Weak<dyn TransactionListener>,
        );
        Self {
            queue,
            listener,
            main,
            observer,
        }
    }
}

pub fn catalog_client(
    service: CatalogServiceRef,
    listener: &Arc<RecordingListener>,
) -> (Arc<ProductCatalogClient>, MainContext) {
    let (main, _handle) = MainContext::spawn();
    let client = ProductCatalogClient::new(
        service,
        main.clone(),
        Arc::downgrade(listener) as Weak<dyn CatalogListener>,
    );
    (Arc::new(client), main)
}

pub fn id_counts(ids: &[TransactionId]) -> HashMap<TransactionId, usize> {
    let mut counts = HashMap::new();
    for id in ids {
        *counts.entry(id.clone()).or_insert(0) += 1;
    }
    counts
}
