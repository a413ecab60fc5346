//! Domain types of the store: products, transactions and the ports through
//! which the observer talks to the platform.

pub mod ledger;
pub mod ports;
pub mod product;
pub mod transaction;
