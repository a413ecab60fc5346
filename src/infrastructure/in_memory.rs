use crate::domain::ports::{CatalogResponse, CatalogService};
use crate::domain::product::{Product, ProductIdentifier};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A catalog service answering from an in-memory product map.
///
/// Can be told to fail every lookup, which stands in for a transport or
/// service outage.
#[derive(Debug, Default)]
pub struct InMemoryCatalogService {
    products: HashMap<ProductIdentifier, Product>,
    failure: Option<String>,
    lookups: AtomicUsize,
}

impl InMemoryCatalogService {
    /// Creates a new, empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|p| (p.identifier.clone(), p))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.identifier.clone(), product);
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn lookup(&self, identifiers: &BTreeSet<ProductIdentifier>) -> Result<CatalogResponse> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(StoreError::CatalogLookupFailed(reason.clone()));
        }

        let mut response = CatalogResponse::default();
        for identifier in identifiers {
            match self.products.get(identifier) {
                Some(product) => response.products.push(product.clone()),
                None => response.invalid_identifiers.push(identifier.clone()),
            }
        }
        Ok(response)
    }
}
