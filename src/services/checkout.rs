use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    config::{GatewayConfig, GatewayMode},
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
        PaymentMethod, PaymentStatus,
    },
    entities::order_item::{self, ActiveModel as OrderItemActiveModel},
    entities::status_history::ActiveModel as HistoryActiveModel,
    errors::ServiceError,
    events::{Event, EventSender},
    signature,
};

/// One cart line captured at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartItemInput {
    #[validate(length(min = 1, message = "Product reference is required"))]
    pub product_ref: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    #[validate]
    #[validate(length(min = 1, message = "Cart must not be empty"))]
    pub items: Vec<CartItemInput>,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1))]
    pub ship_name: String,
    #[validate(length(min = 1))]
    pub ship_phone: String,
    #[validate(length(min = 1))]
    pub ship_address: String,
    #[validate(length(min = 1))]
    pub ship_city: String,
}

/// Signed payload the buyer's browser posts to the gateway redirect.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub merchant_id: String,
    pub order_id: String,
    /// Formatted with exactly two decimals, as hashed.
    pub amount: String,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
    pub notify_url: String,
    pub signature: String,
    pub sandbox: bool,
}

/// Creates orders and negotiates the signed gateway payment request.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    gateway: Option<GatewayConfig>,
    currency: String,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Option<GatewayConfig>,
        currency: String,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            currency,
            event_sender,
        }
    }

    /// Creates an order in Pending/Pending and, for gateway orders, builds
    /// the signed payment request. COD orders carry no signature and await
    /// delivery-side collection.
    #[instrument(skip(self, request), fields(customer_id = %customer.id))]
    pub async fn create_order(
        &self,
        customer: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<(OrderModel, Option<PaymentRequest>), ServiceError> {
        request.validate()?;

        if request.total_amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidAmount(format!(
                "Order total must be positive, got {}",
                request.total_amount
            )));
        }
        if request
            .items
            .iter()
            .any(|item| item.unit_price < Decimal::ZERO)
        {
            return Err(ServiceError::InvalidAmount(
                "Item prices must not be negative".to_string(),
            ));
        }

        // Fail fast on missing merchant credentials before any write.
        if request.payment_method == PaymentMethod::Gateway && self.gateway.is_none() {
            error!("gateway checkout requested but merchant credentials are not configured");
            return Err(ServiceError::ConfigurationError(
                "payment gateway credentials are not configured".to_string(),
            ));
        }

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number(order_id);
        // Same rounding as the signature codec, so the stored total always
        // matches the amount the gateway hash is computed over.
        let total_amount = round_money(request.total_amount);

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_id: Set(customer.id),
            order_status: Set(OrderStatus::Pending),
            payment_method: Set(request.payment_method.clone()),
            payment_status: Set(PaymentStatus::Pending),
            total_amount: Set(total_amount),
            currency: Set(self.currency.clone()),
            gateway_payment_ref: Set(None),
            assigned_to: Set(None),
            ship_name: Set(request.ship_name),
            ship_phone: Set(request.ship_phone),
            ship_address: Set(request.ship_address),
            ship_city: Set(request.ship_city),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order = order_active.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        for item in &request.items {
            let item_active = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_ref: Set(item.product_ref.clone()),
                title: Set(item.title.clone()),
                unit_price: Set(round_money(item.unit_price)),
                quantity: Set(item.quantity),
            };
            item_active.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "failed to snapshot cart item");
                ServiceError::DatabaseError(e)
            })?;
        }

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            actor: Set(format!("checkout:{}", customer.id)),
            note: Set(None),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to write initial status history");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, method = %order.payment_method, total = %order.total_amount, "order created");

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(error = %e, order_id = %order_id, "failed to send order created event");
        }

        let payment_request = match order.payment_method {
            PaymentMethod::Gateway => Some(self.build_payment_request(&order)?),
            PaymentMethod::CashOnDelivery => None,
        };

        Ok((order, payment_request))
    }

    /// Buyer-facing lookup for the return-URL polling surface.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<(OrderModel, Vec<order_item::Model>), ServiceError> {
        let db = &*self.db;
        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order
            .find_related(order_item::Entity)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((order, items))
    }

    fn build_payment_request(&self, order: &OrderModel) -> Result<PaymentRequest, ServiceError> {
        let gateway = self.gateway.as_ref().ok_or_else(|| {
            ServiceError::ConfigurationError(
                "payment gateway credentials are not configured".to_string(),
            )
        })?;

        let order_id = order.id.to_string();
        let amount = signature::format_amount(order.total_amount);
        let sig = signature::compute_checkout_signature(
            &gateway.merchant_id,
            &order_id,
            &amount,
            &order.currency,
            &gateway.merchant_secret,
        );

        Ok(PaymentRequest {
            merchant_id: gateway.merchant_id.clone(),
            order_id,
            amount,
            currency: order.currency.clone(),
            return_url: gateway.return_url.clone(),
            cancel_url: gateway.cancel_url.clone(),
            notify_url: gateway.notify_url.clone(),
            signature: sig,
            sandbox: gateway.mode == GatewayMode::Sandbox,
        })
    }
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn generate_order_number(order_id: Uuid) -> String {
    let simple = order_id.simple().to_string().to_uppercase();
    format!("ORD-{}", &simple[..12])
}
