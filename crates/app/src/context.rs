//! Shop Context
//!
//! Everything a request needs, wired once at startup: settings, the pricing pipeline, the cache,
//! catalog providers, the event bus and every persistence service. Cloning is cheap.

use std::sync::Arc;

use reqwest::Client;
use shopcart::{modifiers::Pipeline, settings::CartSettings};
use thiserror::Error;
use tracing::info;

use crate::{
    cache::{CacheError, CacheNamespace, CacheStore, MemoryCache, cart_key, checkout_key},
    catalog::CatalogRegistry,
    checkout::StepRegistry,
    clock::Clock,
    database::{self, Db},
    domain::{
        accounting::{AccountingService, PgAccountingService},
        addresses::{AddressesService, AddressesServiceError, PgAddressesService},
        credits::{CreditsService, PgCreditsService},
        history::{HistoryService, HistoryServiceError, PgHistoryService},
        invoices::{InvoicesService, PgInvoicesService},
        ledger::{LedgerService, PgLedgerService},
        reservations::{PgReservationsService, ReservationsService, ReservationsServiceError},
    },
    events::{EventBus, EventObserver, TracingEventObserver},
    invoicing::{
        InvoiceError, InvoiceObserver, InvoiceProvider, LocalInvoiceProvider, RestInvoiceConfig,
        RestInvoiceProvider,
    },
    memory::MemoryStore,
    tasks::{PgTaskScheduler, TaskScheduler},
    vat::VatNumberChecker,
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to apply migrations")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("failed to set up invoicing")]
    Invoicing(#[from] InvoiceError),
}

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error(transparent)]
    History(#[from] HistoryServiceError),

    #[error(transparent)]
    Reservations(#[from] ReservationsServiceError),

    #[error(transparent)]
    Addresses(#[from] AddressesServiceError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What was removed for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErasureReport {
    pub history_rows: u64,
    pub addresses: u64,
    pub reservation: bool,
}

#[derive(Clone)]
pub struct ShopContext {
    pub settings: Arc<CartSettings>,
    pub pipeline: Arc<Pipeline>,
    pub clock: Arc<dyn Clock>,
    pub cache: Arc<dyn CacheStore>,
    pub catalog: CatalogRegistry,
    pub events: EventBus,
    pub tasks: Arc<dyn TaskScheduler>,
    pub history: Arc<dyn HistoryService>,
    pub ledger: Arc<dyn LedgerService>,
    pub credits: Arc<dyn CreditsService>,
    pub accounting: Arc<dyn AccountingService>,
    pub reservations: Arc<dyn ReservationsService>,
    pub invoices: Arc<dyn InvoicesService>,
    pub addresses: Arc<dyn AddressesService>,
    pub vat: VatNumberChecker,
    pub steps: StepRegistry,
    pub invoice_provider: Arc<dyn InvoiceProvider>,
}

impl ShopContext {
    /// A shop backed by a fresh [`MemoryStore`].
    pub fn in_memory(settings: CartSettings, catalog: CatalogRegistry, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));

        Self::from_memory_store(settings, catalog, clock, store)
    }

    /// A shop on an existing [`MemoryStore`], which serves every persistence port.
    pub fn from_memory_store(
        settings: CartSettings,
        catalog: CatalogRegistry,
        clock: Arc<dyn Clock>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let invoice_provider = Arc::new(LocalInvoiceProvider::new(
            store.clone(),
            store.clone(),
            settings.invoice_prefix.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            pipeline: Arc::new(Pipeline::standard()),
            events: standard_events(store.clone(), clock.clone()),
            clock,
            cache: Arc::new(MemoryCache::new()),
            catalog,
            tasks: store.clone(),
            history: store.clone(),
            ledger: store.clone(),
            credits: store.clone(),
            accounting: store.clone(),
            reservations: store.clone(),
            invoices: store.clone(),
            addresses: store,
            vat: VatNumberChecker::with_client(Client::new()),
            steps: StepRegistry::standard(),
            invoice_provider,
        }
    }

    /// Build a shop on `PostgreSQL`, applying pending migrations.
    ///
    /// Invoices are numbered locally unless a REST invoicing system is configured.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be reached or migrated, or the invoicing
    /// client cannot be built.
    pub async fn from_database_url(
        url: &str,
        settings: CartSettings,
        catalog: CatalogRegistry,
        clock: Arc<dyn Clock>,
        invoicing: Option<RestInvoiceConfig>,
    ) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        database::migrate(&pool).await?;

        let db = Db::new(pool);

        let history: Arc<dyn HistoryService> = Arc::new(PgHistoryService::new(db.clone()));
        let invoices: Arc<dyn InvoicesService> = Arc::new(PgInvoicesService::new(db.clone()));
        let tasks: Arc<dyn TaskScheduler> = Arc::new(PgTaskScheduler::new(db.clone()));

        let invoice_provider: Arc<dyn InvoiceProvider> = match invoicing {
            Some(config) => Arc::new(RestInvoiceProvider::new(
                config,
                history.clone(),
                invoices.clone(),
                clock.clone(),
            )?),
            None => Arc::new(LocalInvoiceProvider::new(
                history.clone(),
                invoices.clone(),
                settings.invoice_prefix.clone(),
            )),
        };

        info!(invoicing = invoice_provider.name(), "shop context ready");

        Ok(Self {
            settings: Arc::new(settings),
            pipeline: Arc::new(Pipeline::standard()),
            events: standard_events(tasks.clone(), clock.clone()),
            clock,
            cache: Arc::new(MemoryCache::new()),
            catalog,
            tasks,
            history,
            ledger: Arc::new(PgLedgerService::new(db.clone())),
            credits: Arc::new(PgCreditsService::new(db.clone())),
            accounting: Arc::new(PgAccountingService::new(db.clone())),
            reservations: Arc::new(PgReservationsService::new(db.clone())),
            invoices,
            addresses: Arc::new(PgAddressesService::new(db)),
            vat: VatNumberChecker::with_client(Client::new()),
            steps: StepRegistry::standard(),
            invoice_provider,
        })
    }

    /// Add an event observer after the standard ones.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.events = self.events.with_observer(observer);
        self
    }

    /// Remove a user's purchase history, reservation, addresses and cached state.
    ///
    /// Ledger and credit rows are kept.
    ///
    /// # Errors
    ///
    /// Returns an error when one of the stores fails; earlier deletions are not rolled back.
    pub async fn erase_user(&self, userid: u64) -> Result<ErasureReport, PrivacyError> {
        let report = ErasureReport {
            history_rows: self.history.erase_user(userid).await?,
            reservation: self.reservations.delete_reservation(userid).await?,
            addresses: self.addresses.erase_user(userid).await?,
        };

        self.cache
            .delete(CacheNamespace::ShoppingCart, &cart_key(userid))
            .await?;
        self.cache
            .delete(CacheNamespace::CheckoutSession, &checkout_key(userid))
            .await?;

        info!(userid, history_rows = report.history_rows, "user data erased");

        Ok(report)
    }
}

fn standard_events(tasks: Arc<dyn TaskScheduler>, clock: Arc<dyn Clock>) -> EventBus {
    EventBus::new()
        .with_observer(Arc::new(TracingEventObserver))
        .with_observer(Arc::new(InvoiceObserver::new(tasks, clock)))
}

impl std::fmt::Debug for ShopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopContext")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .field("events", &self.events)
            .field("invoicing", &self.invoice_provider.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::{
        catalog::InMemoryCatalog,
        domain::addresses::models::NewAddress,
        test::helpers::TestShop,
    };

    use super::*;

    #[tokio::test]
    async fn erasure_keeps_the_ledger() -> TestResult {
        let shop = TestShop::new(CartSettings::default(), InMemoryCatalog::new())?;

        shop.paid_purchase(7, 1, dec!(30)).await?;
        shop.paid_purchase(8, 1, dec!(30)).await?;
        AddressesService::create(
            &*shop.store,
            NewAddress {
                userid: 7,
                name: "Ada".to_string(),
                street: "Main St 1".to_string(),
                city: "Vienna".to_string(),
                zip: "1010".to_string(),
                country: "AT".to_string(),
            },
        )
        .await?;

        let report = shop.context.erase_user(7).await?;

        assert_eq!(report.history_rows, 1);
        assert_eq!(report.addresses, 1);
        assert!(HistoryService::list_for_user(&*shop.store, 7).await?.is_empty());
        assert_eq!(HistoryService::list_for_user(&*shop.store, 8).await?.len(), 1);
        assert_eq!(LedgerService::list_for_user(&*shop.store, 7).await?.len(), 1);

        Ok(())
    }
}
