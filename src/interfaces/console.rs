use crate::domain::ports::{CatalogListener, TransactionListener};
use crate::domain::product::{Product, ProductIdentifier};
use crate::domain::transaction::Transaction;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Text front end for the store: prints catalog results and purchase
/// outcomes, and grants the purchased content.
pub struct ConsoleListener {
    out: Mutex<Box<dyn Write + Send>>,
    undeliverable: HashSet<ProductIdentifier>,
    entitlements: Mutex<BTreeSet<ProductIdentifier>>,
}

impl ConsoleListener {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            undeliverable: HashSet::new(),
            entitlements: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Content for these products cannot be provided, so their purchases
    /// are never acknowledged.
    pub fn with_undeliverable(mut self, products: impl IntoIterator<Item = ProductIdentifier>) -> Self {
        self.undeliverable.extend(products);
        self
    }

    /// Products whose content has been granted.
    pub fn entitlements(&self) -> Vec<ProductIdentifier> {
        lock(&self.entitlements).iter().cloned().collect()
    }

    fn emit(&self, line: fmt::Arguments<'_>) {
        let mut out = lock(&self.out);
        if let Err(err) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %err, "failed to write to console");
        }
    }
}

#[async_trait]
impl TransactionListener for ConsoleListener {
    async fn deliver_content(&self, transaction: &Transaction) -> bool {
        let product = &transaction.product_id;
        if self.undeliverable.contains(product) {
            self.emit(format_args!("Unable to deliver content for {product}."));
            return false;
        }

        if lock(&self.entitlements).insert(product.clone()) {
            self.emit(format_args!("Deliver content for {product}."));
        } else {
            self.emit(format_args!("Content for {product} is already unlocked."));
        }
        true
    }

    fn purchase_message(&self, message: &str) {
        self.emit(format_args!("Purchase Status: {message}"));
    }
}

impl CatalogListener for ConsoleListener {
    fn products_received(&self, products: &[Product]) {
        self.emit(format_args!("Products:"));
        for product in products {
            self.emit(format_args!(
                "  {} - {} ({})",
                product.identifier,
                product.title,
                product.regular_price()
            ));
        }
    }

    fn product_received(&self, product: &Product) {
        self.emit(format_args!(
            "Product: {} - {} ({})",
            product.identifier,
            product.title,
            product.regular_price()
        ));
    }

    fn catalog_message(&self, message: &str) {
        self.emit(format_args!("Product Request Status: {message}"));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
