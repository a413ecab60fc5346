use super::product::{Product, ProductIdentifier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle the payment queue assigns to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a transaction, as reported by the payment queue.
///
/// States the queue may add in the future deserialize into `Unrecognized`
/// rather than failing, so the observer can refuse them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionState {
    Purchasing,
    Deferred,
    Purchased,
    Failed,
    Restored,
    Unrecognized(String),
}

impl TransactionState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Purchasing => "purchasing",
            Self::Deferred => "deferred",
            Self::Purchased => "purchased",
            Self::Failed => "failed",
            Self::Restored => "restored",
            Self::Unrecognized(state) => state,
        }
    }
}

impl From<String> for TransactionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "purchasing" => Self::Purchasing,
            "deferred" => Self::Deferred,
            "purchased" => Self::Purchased,
            "failed" => Self::Failed,
            "restored" => Self::Restored,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<TransactionState> for String {
    fn from(state: TransactionState) -> Self {
        match state {
            TransactionState::Unrecognized(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    Unknown,
    ClientInvalid,
    PaymentCancelled,
    PaymentInvalid,
    PaymentNotAllowed,
    StoreProductNotAvailable,
    CloudServiceNetworkConnectionFailed,
}

impl PaymentErrorCode {
    /// Default human-readable description for the code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unknown => "An unknown error occurred.",
            Self::ClientInvalid => "The client is not allowed to issue the request.",
            Self::PaymentCancelled => "The user cancelled the payment request.",
            Self::PaymentInvalid => "The purchase identifier was invalid.",
            Self::PaymentNotAllowed => "This device is not allowed to make the payment.",
            Self::StoreProductNotAvailable => "The product is not available in the current storefront.",
            Self::CloudServiceNetworkConnectionFailed => "Cannot connect to the store.",
        }
    }
}

/// Error attached by the payment queue to a failed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionError {
    pub code: PaymentErrorCode,
    pub description: String,
}

impl TransactionError {
    pub fn new(code: PaymentErrorCode) -> Self {
        Self {
            code,
            description: code.description().to_string(),
        }
    }

    /// The user dismissed the purchase; not an error worth surfacing.
    pub fn is_cancellation(&self) -> bool {
        self.code == PaymentErrorCode::PaymentCancelled
    }
}

/// A purchase intent handed to the payment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub product_id: ProductIdentifier,
    pub quantity: u32,
}

impl Payment {
    pub fn new(product: &Product) -> Self {
        Self {
            product_id: product.identifier.clone(),
            quantity: 1,
        }
    }
}

/// A single purchase attempt tracked by the payment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub product_id: ProductIdentifier,
    pub state: TransactionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TransactionError>,
}

impl Transaction {
    pub fn new(
        id: impl Into<TransactionId>,
        product_id: impl Into<ProductIdentifier>,
        state: TransactionState,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            state,
            error: None,
        }
    }

    pub fn with_error(mut self, error: TransactionError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(TransactionError::is_cancellation)
    }
}
