use super::product::{Product, ProductIdentifier};
use super::transaction::{Payment, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Answer of the catalog service to a product lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogResponse {
    /// Products recognized by the store; these can be purchased.
    pub products: Vec<Product>,
    /// Requested identifiers the store did not recognize.
    pub invalid_identifiers: Vec<ProductIdentifier>,
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn lookup(&self, identifiers: &BTreeSet<ProductIdentifier>) -> Result<CatalogResponse>;
}

/// Notifications emitted by the payment queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Updated(Vec<Transaction>),
    Removed(Vec<Transaction>),
}

/// The platform payment queue.
///
/// Every call returns immediately; outcomes arrive later as `QueueEvent`s.
pub trait PaymentQueue: Send + Sync {
    fn can_make_payments(&self) -> bool;
    fn add_payment(&self, payment: Payment);
    fn finish_transaction(&self, transaction: &Transaction);
}

/// Receives purchase outcomes on the main context.
#[async_trait]
pub trait TransactionListener: Send + Sync {
    /// Provides the purchased content. Resolves to true once it was granted.
    async fn deliver_content(&self, transaction: &Transaction) -> bool;
    fn purchase_message(&self, message: &str);
}

/// Receives catalog results on the main context.
pub trait CatalogListener: Send + Sync {
    fn products_received(&self, products: &[Product]);
    fn product_received(&self, product: &Product);
    fn catalog_message(&self, message: &str);
}

pub type CatalogServiceRef = Arc<dyn CatalogService>;
pub type PaymentQueueRef = Arc<dyn PaymentQueue>;
