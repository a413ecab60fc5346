use super::main_context::MainContext;
use crate::domain::ports::{CatalogListener, CatalogResponse, CatalogServiceRef};
use crate::domain::product::{Product, ProductIdentifier};
use crate::error::{Result, StoreError};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct CatalogState {
    available_products: Vec<Product>,
    invalid_identifiers: Vec<ProductIdentifier>,
}

#[derive(Debug, Clone)]
enum Expectation {
    Any,
    Single(ProductIdentifier),
}

/// Retrieves product information from the catalog service.
///
/// Only the most recent request counts: starting a new request while one is
/// outstanding supersedes it, and the older response is discarded when it
/// arrives.
pub struct ProductCatalogClient {
    service: CatalogServiceRef,
    main: MainContext,
    listener: Weak<dyn CatalogListener>,
    latest_request: AtomicU64,
    state: Mutex<CatalogState>,
}

impl ProductCatalogClient {
    pub fn new(
        service: CatalogServiceRef,
        main: MainContext,
        listener: Weak<dyn CatalogListener>,
    ) -> Self {
        Self {
            service,
            main,
            listener,
            latest_request: AtomicU64::new(0),
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Starts a lookup for `identifiers`.
    ///
    /// Recognized products are reported through
    /// [`CatalogListener::products_received`]; unrecognized identifiers are
    /// only tracked.
    pub fn request_products<I>(self: &Arc<Self>, identifiers: I) -> JoinHandle<()>
    where
        I: IntoIterator<Item = ProductIdentifier>,
    {
        self.start(identifiers.into_iter().collect(), Expectation::Any)
    }

    /// Starts a lookup for one product the caller expects back.
    pub fn request_product(self: &Arc<Self>, identifier: ProductIdentifier) -> JoinHandle<()> {
        let identifiers = BTreeSet::from([identifier.clone()]);
        self.start(identifiers, Expectation::Single(identifier))
    }

    pub async fn available_products(&self) -> Vec<Product> {
        self.state.lock().await.available_products.clone()
    }

    pub async fn invalid_identifiers(&self) -> Vec<ProductIdentifier> {
        self.state.lock().await.invalid_identifiers.clone()
    }

    /// Finds a product among the ones received so far.
    pub async fn product(&self, identifier: &ProductIdentifier) -> Option<Product> {
        self.state
            .lock()
            .await
            .available_products
            .iter()
            .find(|p| &p.identifier == identifier)
            .cloned()
    }

    fn start(
        self: &Arc<Self>,
        identifiers: BTreeSet<ProductIdentifier>,
        expectation: Expectation,
    ) -> JoinHandle<()> {
        let request = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(request, count = identifiers.len(), "starting product request");

        let client = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = client.service.lookup(&identifiers).await;
            client.complete(request, expectation, outcome).await;
        })
    }

    async fn complete(&self, request: u64, expectation: Expectation, outcome: Result<CatalogResponse>) {
        // Checked and applied under the state lock; a response that waited
        // for the lock sees every request started in the meantime.
        let mut state = self.state.lock().await;
        if self.latest_request.load(Ordering::SeqCst) != request {
            tracing::debug!(request, "discarding response of a superseded product request");
            return;
        }

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                let failure = match err {
                    StoreError::CatalogLookupFailed(_) => err,
                    other => StoreError::CatalogLookupFailed(other.to_string()),
                };
                tracing::warn!("{failure}");
                self.notify(move |listener| listener.catalog_message(&failure.to_string()));
                return;
            }
        };

        if !response.invalid_identifiers.is_empty() {
            tracing::warn!(
                invalid = ?response.invalid_identifiers,
                "catalog did not recognize some product identifiers"
            );
            state.invalid_identifiers = response.invalid_identifiers;
        }

        match expectation {
            Expectation::Any => {
                if !response.products.is_empty() {
                    state.available_products = response.products.clone();
                    let products = response.products;
                    self.notify(move |listener| listener.products_received(&products));
                }
            }
            Expectation::Single(expected) => match response.products.into_iter().next() {
                Some(product) if product.identifier == expected => {
                    state.available_products = vec![product.clone()];
                    self.notify(move |listener| listener.product_received(&product));
                }
                Some(product) => {
                    let mismatch = StoreError::CatalogMismatch {
                        expected,
                        received: product.identifier,
                    };
                    tracing::warn!("{mismatch}");
                    self.notify(move |listener| listener.catalog_message(&mismatch.to_string()));
                }
                None => {
                    tracing::debug!(product = %expected, "no sellable product returned");
                }
            },
        }
    }

    fn notify<F>(&self, callback: F)
    where
        F: FnOnce(&dyn CatalogListener) + Send + 'static,
    {
        let listener = self.listener.clone();
        self.main.dispatch(async move {
            if let Some(listener) = listener.upgrade() {
                callback(listener.as_ref());
            }
        });
    }
}
