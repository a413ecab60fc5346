use clap::{Parser, ValueEnum};
use iapdemo::application::catalog::ProductCatalogClient;
use iapdemo::application::main_context::MainContext;
use iapdemo::application::observer::{RestoredPolicy, StoreObserver};
use iapdemo::application::storefront::Storefront;
use iapdemo::config::ProductIdsResource;
use iapdemo::domain::ports::{CatalogListener, CatalogServiceRef, PaymentQueueRef, TransactionListener};
use iapdemo::domain::product::ProductIdentifier;
use iapdemo::domain::transaction::PaymentErrorCode;
use iapdemo::infrastructure::in_memory::InMemoryCatalogService;
use iapdemo::infrastructure::sandbox::{SandboxOutcome, SandboxPaymentQueue};
use iapdemo::interfaces::console::ConsoleListener;
use iapdemo::interfaces::csv::product_reader::ProductReader;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing_subscriber::EnvFilter;

/// Runs a purchase session against a sandbox store.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file listing the product identifiers to query
    #[arg(long, default_value = ProductIdsResource::DEFAULT_FILE_NAME)]
    product_ids: PathBuf,

    /// Catalog CSV (identifier, title, price, currency, locale)
    #[arg(long)]
    catalog: PathBuf,

    /// Products to buy, in order
    #[arg(long = "buy", value_name = "PRODUCT")]
    buy: Vec<String>,

    /// Products whose payment fails
    #[arg(long = "fail", value_name = "PRODUCT")]
    fail: Vec<String>,

    /// Products whose payment the user cancels
    #[arg(long = "cancel", value_name = "PRODUCT")]
    cancel: Vec<String>,

    /// Products that need approval before they are purchased
    #[arg(long = "ask-to-buy", value_name = "PRODUCT")]
    ask_to_buy: Vec<String>,

    /// Approve pending ask-to-buy requests after the purchases
    #[arg(long)]
    approve: bool,

    /// Products whose content cannot be delivered
    #[arg(long = "undeliverable", value_name = "PRODUCT")]
    undeliverable: Vec<String>,

    /// Previously purchased products to restore
    #[arg(long = "restore", value_name = "PRODUCT")]
    restore: Vec<String>,

    /// How restored transactions are handled
    #[arg(long, value_enum, default_value_t = RestoredArg::Deliver)]
    restored_policy: RestoredArg,

    /// Simulate a device that is not allowed to make payments
    #[arg(long)]
    deny_payments: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RestoredArg {
    /// Deliver and finish restored transactions like purchases
    Deliver,
    /// Leave restored transactions untouched
    Ignore,
}

impl From<RestoredArg> for RestoredPolicy {
    fn from(arg: RestoredArg) -> Self {
        match arg {
            RestoredArg::Deliver => RestoredPolicy::Deliver,
            RestoredArg::Ignore => RestoredPolicy::Ignore,
        }
    }
}

fn ids(values: &[String]) -> impl Iterator<Item = ProductIdentifier> + '_ {
    values.iter().map(|v| ProductIdentifier::from(v.as_str()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut catalog_service = InMemoryCatalogService::new();
    let file = File::open(&cli.catalog).into_diagnostic()?;
    for product in ProductReader::new(file).products() {
        match product {
            Ok(product) => catalog_service.insert(product),
            Err(e) => tracing::warn!("Error reading product: {e}"),
        }
    }

    let (mut queue, mut events) = SandboxPaymentQueue::new(!cli.deny_payments);
    for product in ids(&cli.fail) {
        queue = queue.with_outcome(product, SandboxOutcome::Fail(PaymentErrorCode::PaymentInvalid));
    }
    for product in ids(&cli.cancel) {
        queue = queue.with_outcome(product, SandboxOutcome::Fail(PaymentErrorCode::PaymentCancelled));
    }
    for product in ids(&cli.ask_to_buy) {
        queue = queue.with_outcome(product, SandboxOutcome::AskToBuy);
    }
    let queue = Arc::new(queue);

    let (main, _main_task) = MainContext::spawn();
    let console = Arc::new(ConsoleListener::stdout().with_undeliverable(ids(&cli.undeliverable)));

    let payment_queue: PaymentQueueRef = queue.clone();
    let transaction_listener = Arc::downgrade(&console) as Weak<dyn TransactionListener>;
    let observer = Arc::new(
        StoreObserver::new(payment_queue, main.clone(), transaction_listener)
            .with_restored_policy(cli.restored_policy.into()),
    );

    let catalog_service: CatalogServiceRef = Arc::new(catalog_service);
    let catalog_listener = Arc::downgrade(&console) as Weak<dyn CatalogListener>;
    let catalog = Arc::new(ProductCatalogClient::new(catalog_service, main.clone(), catalog_listener));

    let storefront = Storefront::new(Arc::clone(&observer), Arc::clone(&catalog));

    // Missing configuration or payment restrictions are not fatal.
    if let Ok(request) = storefront.request_catalog(&ProductIdsResource::new(&cli.product_ids)) {
        request.await.into_diagnostic()?;
        main.flush().await;
    }

    for product_id in ids(&cli.buy) {
        match catalog.product(&product_id).await {
            Some(product) => {
                if let Err(e) = storefront.purchase(&product) {
                    tracing::warn!(product = %product_id, "Error submitting purchase: {e}");
                }
            }
            None => tracing::warn!(product = %product_id, "product is not available for sale"),
        }
        observer.drain(&mut events).await.into_diagnostic()?;
    }

    if cli.approve && queue.approve_deferred() > 0 {
        observer.drain(&mut events).await.into_diagnostic()?;
    }

    for product_id in ids(&cli.restore) {
        queue.restore(product_id);
        observer.drain(&mut events).await.into_diagnostic()?;
    }

    let entitlements: Vec<String> = console.entitlements().iter().map(ToString::to_string).collect();
    println!("Entitlements: {}", entitlements.join(", "));
    println!("Pending transactions: {}", queue.pending().len());

    Ok(())
}
