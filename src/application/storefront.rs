use super::catalog::ProductCatalogClient;
use super::observer::StoreObserver;
use crate::config::ProductIdsResource;
use crate::domain::product::Product;
use crate::error::{Result, StoreError};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Composes the observer and the catalog client for the presentation layer.
pub struct Storefront {
    observer: Arc<StoreObserver>,
    catalog: Arc<ProductCatalogClient>,
}

impl Storefront {
    pub fn new(observer: Arc<StoreObserver>, catalog: Arc<ProductCatalogClient>) -> Self {
        Self { observer, catalog }
    }

    pub fn observer(&self) -> &Arc<StoreObserver> {
        &self.observer
    }

    pub fn catalog(&self) -> &Arc<ProductCatalogClient> {
        &self.catalog
    }

    /// Startup flow: queries the catalog for the configured product ids.
    ///
    /// Nothing is requested when payments are not allowed or the resource is
    /// missing or empty; those cases are logged as warnings and returned so
    /// the caller can carry on without a catalog.
    pub fn request_catalog(&self, resource: &ProductIdsResource) -> Result<JoinHandle<()>> {
        if !self.observer.is_purchase_allowed() {
            let err = StoreError::PurchaseNotAuthorized;
            tracing::warn!("{err}");
            return Err(err);
        }

        let identifiers = resource.load().inspect_err(|err| tracing::warn!("{err}"))?;
        Ok(self.catalog.request_products(identifiers))
    }

    /// Submits a purchase for `product` if the user may pay.
    pub fn purchase(&self, product: &Product) -> Result<()> {
        if !self.observer.is_purchase_allowed() {
            let err = StoreError::PurchaseNotAuthorized;
            tracing::warn!(product = %product.identifier, "{err}");
            return Err(err);
        }
        self.observer.submit_purchase(product);
        Ok(())
    }
}
