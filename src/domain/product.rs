use crate::error::StoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key identifying a sellable item, as configured for the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductIdentifier(String);

impl ProductIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Price of a product in its store currency.
///
/// Wraps `rust_decimal::Decimal` and rejects negative values, so a catalog
/// entry can never advertise a credit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub fn new(value: Decimal) -> Result<Self, StoreError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(StoreError::ValidationError(
                "Price must not be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = StoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

/// A sellable item as returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub identifier: ProductIdentifier,
    pub title: String,
    pub price: Price,
    pub currency: String,
    pub locale: String,
}

impl Product {
    /// The price followed by its currency code, e.g. `0.99 USD`.
    pub fn regular_price(&self) -> String {
        format!("{:.2} {}", self.price.value(), self.currency)
    }
}
