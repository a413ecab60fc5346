use crate::domain::product::ProductIdentifier;
use crate::domain::transaction::TransactionId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not find resource file: {}.", .0.display())]
    ConfigurationMissing(PathBuf),
    #[error(
        "{} is empty. Update it with your product identifiers to retrieve product information.",
        .0.display()
    )]
    ConfigurationEmpty(PathBuf),
    #[error("Product request failed: {0}")]
    CatalogLookupFailed(String),
    #[error(
        "Product Identifier from the App Store didn't match with local identifier (expected {expected}, received {received})."
    )]
    CatalogMismatch {
        expected: ProductIdentifier,
        received: ProductIdentifier,
    },
    #[error(
        "You are not authorized to make payments. In-App Purchases may be restricted on your device."
    )]
    PurchaseNotAuthorized,
    #[error("Purchase of {product} failed.{}", error_suffix(.reason))]
    TransactionFailed {
        product: ProductIdentifier,
        reason: Option<String>,
    },
    #[error("Purchase of {product} was cancelled.")]
    TransactionCancelled { product: ProductIdentifier },
    #[error("Unknown payment transaction case '{state}' for transaction {transaction}.")]
    UnknownTransactionState {
        state: String,
        transaction: TransactionId,
    },
    #[error("Transaction observer stopped after an unknown transaction state.")]
    ObserverHalted,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn error_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("\nError: {reason}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
