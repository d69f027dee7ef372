//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{
    Directory, InMemoryDirectory, InMemoryOrderStore, InMemoryPaymentLedger, OrderStore,
    PaymentLedger, PgDirectory, PgOrderStore, PgPaymentLedger,
};
use crate::services::checkout::CheckoutService;
use crate::services::email::EmailService;
use crate::services::gateway::{GatewayError, PaymentGateway, RazorpayClient};
use crate::services::notification::{
    ConfirmationSender, LogNotifier, NotificationError, Notifier,
};
use crate::services::orders::OrderService;
use crate::services::signature::SignatureVerifier;

/// Error wiring up external integrations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("email service: {0}")]
    Email(#[from] NotificationError),
}

/// Storage backends behind the persistence ports.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub payments: Arc<dyn PaymentLedger>,
    pub directory: Arc<dyn Directory>,
    /// Present when backed by `PostgreSQL`.
    pub pool: Option<PgPool>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            payments: Arc::new(PgPaymentLedger::new(pool.clone())),
            directory: Arc::new(PgDirectory::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Empty in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            orders: Arc::new(InMemoryOrderStore::new()),
            payments: Arc::new(InMemoryPaymentLedger::new()),
            directory: Arc::new(InMemoryDirectory::new()),
            pool: None,
        }
    }
}

/// Outbound collaborators: gateway, signature secret and notifier.
#[derive(Clone)]
pub struct Integrations {
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub verifier: Option<SignatureVerifier>,
    pub notifier: Arc<dyn Notifier>,
    pub notification_timeout: Duration,
}

impl Integrations {
    /// Build the integrations described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the gateway or SMTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, StateError> {
        let (gateway, verifier) = match &config.gateway {
            Some(gateway) => (
                Some(Arc::new(RazorpayClient::new(gateway.clone())?) as Arc<dyn PaymentGateway>),
                Some(SignatureVerifier::new(gateway.key_secret.clone())),
            ),
            None => {
                tracing::warn!("Payment gateway not configured, online payments will be refused");
                (None, None)
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => Arc::new(EmailService::new(email)?),
            None => {
                tracing::info!("SMTP not configured, order confirmations will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            gateway,
            verifier,
            notifier,
            notification_timeout: config.notification_timeout,
        })
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the order and checkout services and the stores behind them.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    checkout: CheckoutService,
    orders: OrderService,
    payments: Arc<dyn PaymentLedger>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    directory: Arc<dyn Directory>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(stores: Stores, integrations: Integrations) -> Self {
        let confirmations = ConfirmationSender::new(
            Arc::clone(&stores.directory),
            integrations.notifier,
            integrations.notification_timeout,
        );
        let checkout = CheckoutService::new(
            Arc::clone(&stores.orders),
            Arc::clone(&stores.payments),
            integrations.verifier,
            confirmations,
        );
        let orders = OrderService::new(stores.orders, Arc::clone(&stores.directory));

        Self {
            inner: Arc::new(AppStateInner {
                checkout,
                orders,
                payments: stores.payments,
                gateway: integrations.gateway,
                directory: stores.directory,
                pool: stores.pool,
            }),
        }
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the payment ledger.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentLedger {
        self.inner.payments.as_ref()
    }

    /// The payment gateway client, if configured.
    #[must_use]
    pub fn gateway(&self) -> Option<&dyn PaymentGateway> {
        self.inner.gateway.as_deref()
    }

    #[must_use]
    pub fn directory(&self) -> &dyn Directory {
        self.inner.directory.as_ref()
    }

    /// Get a reference to the database connection pool, when there is one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
