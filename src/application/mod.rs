//! Application layer orchestrating the purchase flow.
//!
//! `StoreObserver` reconciles transaction updates from the payment queue,
//! `ProductCatalogClient` looks up product metadata and `Storefront` wires
//! both together for the presentation layer. Every listener callback is
//! marshalled onto the `MainContext`.

pub mod catalog;
pub mod main_context;
pub mod observer;
pub mod purchase;
pub mod storefront;
