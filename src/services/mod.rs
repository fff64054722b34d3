pub mod admin;
pub mod checkout;
pub mod delivery;
pub mod payments;
pub mod webhook;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

/// Services layer that encapsulates business logic used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<checkout::CheckoutService>,
    pub webhook: Arc<webhook::WebhookProcessor>,
    pub delivery: Arc<delivery::DeliveryService>,
    pub admin: Arc<admin::AdminService>,
    pub ledger: Arc<payments::PaymentLedgerService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, config: &AppConfig, event_sender: EventSender) -> Self {
        let ledger = Arc::new(payments::PaymentLedgerService::new(db.clone()));
        let checkout = Arc::new(checkout::CheckoutService::new(
            db.clone(),
            config.gateway.clone(),
            config.currency.clone(),
            event_sender.clone(),
        ));
        let webhook = Arc::new(webhook::WebhookProcessor::new(
            db.clone(),
            config.gateway.clone(),
            ledger.clone(),
            event_sender.clone(),
        ));
        let delivery = Arc::new(delivery::DeliveryService::new(
            db.clone(),
            ledger.clone(),
            event_sender.clone(),
        ));
        let admin = Arc::new(admin::AdminService::new(
            db,
            ledger.clone(),
            event_sender,
        ));

        Self {
            checkout,
            webhook,
            delivery,
            admin,
            ledger,
        }
    }
}
