//! Cart-to-order conversion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::{Identity, Money, OrderId, ProductId};
use domain::{
    Cart, NewOrder, Order, OrderError, OrderLine, PaymentMethod, PricingEngine, Product,
    ShippingAddress, ShippingAddressInput, normalize_notes,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{Store, StoreError, Transaction};

use crate::clock::{Clock, SystemClock};
use crate::error::{FulfillmentError, Result};
use crate::sequencer::{OrderSequencer, SequenceError};

/// Checkout input as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Option<ShippingAddressInput>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// Price summary of the current cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPreview {
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
    pub free_shipping_threshold: Money,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone)]
struct ValidatedCheckout {
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    notes: Option<String>,
}

impl TryFrom<CheckoutRequest> for ValidatedCheckout {
    type Error = FulfillmentError;

    fn try_from(request: CheckoutRequest) -> Result<Self> {
        let shipping_address = request
            .shipping_address
            .and_then(|input| ShippingAddress::try_from(input).ok())
            .ok_or_else(|| {
                FulfillmentError::InvalidArgument(
                    "Please provide complete shipping address".to_string(),
                )
            })?;

        let payment_method = request
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .ok_or_else(|| {
                FulfillmentError::InvalidArgument("Please select a payment method".to_string())
            })?
            .parse::<PaymentMethod>()?;

        let notes = normalize_notes(request.notes)?;

        Ok(Self {
            shipping_address,
            payment_method,
            notes,
        })
    }
}

/// Outcome of a single checkout transaction.
enum AttemptError {
    /// The transaction lost a race and may be retried from the start.
    Conflict(StoreError),
    Failed(FulfillmentError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            AttemptError::Conflict(err)
        } else {
            AttemptError::Failed(err.into())
        }
    }
}

impl From<FulfillmentError> for AttemptError {
    fn from(err: FulfillmentError) -> Self {
        AttemptError::Failed(err)
    }
}

impl From<OrderError> for AttemptError {
    fn from(err: OrderError) -> Self {
        AttemptError::Failed(err.into())
    }
}

impl From<SequenceError> for AttemptError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::Exhausted(day) => AttemptError::Failed(
                FulfillmentError::SequencerExhausted(format!("no order numbers left for {day}")),
            ),
            SequenceError::Store(err) => err.into(),
        }
    }
}

/// Turns a cart into an order.
///
/// Each checkout runs in one store transaction: the cart's products are
/// locked and re-validated, the order is priced, numbered and persisted,
/// stock is decremented and the cart is cleared. Either all of it happens or
/// none of it does.
#[derive(Debug, Clone)]
pub struct CheckoutService<S: Store> {
    store: S,
    pricing: PricingEngine,
    sequencer: OrderSequencer,
    clock: Arc<dyn Clock>,
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: S, pricing: PricingEngine, sequencer: OrderSequencer) -> Self {
        Self {
            store,
            pricing,
            sequencer,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    /// Places an order for everything in the identity's cart.
    #[tracing::instrument(skip(self, request), fields(identity = %identity))]
    pub async fn create_order(&self, identity: &Identity, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let result = self.checkout(identity, request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("checkout_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order.id(),
                    order_number = %order.order_number(),
                    total = %order.total_price(),
                    "order placed"
                );
            }
            Err(err) => {
                let kind = err.kind();
                metrics::counter!("checkout_failures_total", "kind" => kind.as_str())
                    .increment(1);
                if kind.is_retryable() {
                    tracing::error!(error = %err, "checkout rolled back");
                } else {
                    tracing::info!(error = %err, kind = %kind, "checkout rejected");
                }
            }
        }

        result
    }

    /// Prices the identity's cart without changing anything.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn preview(&self, identity: &Identity) -> Result<CheckoutPreview> {
        let cart = self
            .store
            .load_cart(identity)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(FulfillmentError::EmptyCart)?;

        let quote = self.pricing.quote(cart.total_amount());
        let config = self.pricing.config();
        Ok(CheckoutPreview {
            items_price: quote.items,
            shipping_price: quote.shipping,
            tax_price: quote.tax,
            total_price: quote.total().ok_or(OrderError::TotalOverflow)?,
            free_shipping_threshold: config.free_shipping_threshold,
            tax_rate: config.tax_rate,
        })
    }

    async fn checkout(&self, identity: &Identity, request: CheckoutRequest) -> Result<Order> {
        let checkout = ValidatedCheckout::try_from(request)?;
        let max_attempts = self.sequencer.config().max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.attempt(identity, &checkout).await {
                Ok(order) => return Ok(order),
                Err(AttemptError::Failed(err)) => return Err(err),
                Err(AttemptError::Conflict(err)) => {
                    metrics::counter!("order_number_conflicts_total").increment(1);
                    tracing::warn!(attempt, max_attempts, error = %err, "checkout conflicted, retrying");
                }
            }
        }

        Err(FulfillmentError::SequencerExhausted(format!(
            "order number still conflicting after {max_attempts} attempts"
        )))
    }

    async fn attempt(
        &self,
        identity: &Identity,
        checkout: &ValidatedCheckout,
    ) -> std::result::Result<Order, AttemptError> {
        let mut tx = self.store.begin().await?;

        // Cart first, then products: every checkout takes locks in this order
        let mut cart = tx
            .lock_cart(identity)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(FulfillmentError::EmptyCart)?;

        let products = lock_products(&mut tx, &cart).await?;
        let lines = order_lines(&cart, &products)?;

        let now = self.clock.now();
        let order_number = self.sequencer.next(&mut tx, now).await?;
        let (order, events) = Order::create(NewOrder {
            order_id: OrderId::new(),
            identity: identity.clone(),
            order_number,
            lines,
            shipping_address: checkout.shipping_address.clone(),
            payment_method: checkout.payment_method,
            price: self.pricing.quote(cart.total_amount()),
            notes: checkout.notes.clone(),
            placed_at: now,
        })?;

        tx.insert_order(&order, &events).await?;
        for line in order.lines() {
            tx.adjust_stock(&line.product_id, -i64::from(line.quantity))
                .await?;
        }
        cart.clear();
        tx.save_cart(&cart).await?;
        tx.commit().await?;

        Ok(order)
    }
}

/// Locks every product in the cart, in id order so concurrent checkouts
/// acquire locks in the same sequence.
async fn lock_products<T: Transaction>(
    tx: &mut T,
    cart: &Cart,
) -> std::result::Result<HashMap<ProductId, Product>, StoreError> {
    let mut ids: Vec<&ProductId> = cart.lines().iter().map(|line| &line.product_id).collect();
    ids.sort();
    ids.dedup();

    let mut products = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(product) = tx.lock_product(id).await? {
            products.insert(id.clone(), product);
        }
    }
    Ok(products)
}

/// Snapshots the cart lines against live catalog state.
fn order_lines(cart: &Cart, products: &HashMap<ProductId, Product>) -> Result<Vec<OrderLine>> {
    cart.lines()
        .iter()
        .map(|line| {
            let product =
                products
                    .get(&line.product_id)
                    .ok_or_else(|| FulfillmentError::ProductGone {
                        product_id: line.product_id.clone(),
                        product: line.name.clone(),
                    })?;
            if !product.has_stock_for(line.quantity) {
                return Err(FulfillmentError::InsufficientStock {
                    product: product.name.clone(),
                    requested: line.quantity,
                    available: product.stock,
                });
            }
            Ok(OrderLine {
                product_id: line.product_id.clone(),
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                image: product.image.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use common::SessionToken;
    use store::InMemoryStore;

    fn address() -> ShippingAddressInput {
        ShippingAddressInput {
            full_name: Some("Jane Doe".into()),
            phone: Some("0900000000".into()),
            address_line: Some("1 Main St".into()),
            city: Some("Hanoi".into()),
            ..Default::default()
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: Some(address()),
            payment_method: Some("cod".into()),
            notes: None,
        }
    }

    #[test]
    fn validation_order_is_address_then_payment_then_notes() {
        let err = ValidatedCheckout::try_from(CheckoutRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "Please provide complete shipping address");

        let incomplete = CheckoutRequest {
            shipping_address: Some(ShippingAddressInput {
                city: Some("   ".into()),
                ..address()
            }),
            ..request()
        };
        let err = ValidatedCheckout::try_from(incomplete).unwrap_err();
        assert_eq!(err.to_string(), "Please provide complete shipping address");

        let no_payment = CheckoutRequest {
            payment_method: Some(" ".into()),
            notes: Some("x".repeat(600)),
            ..request()
        };
        let err = ValidatedCheckout::try_from(no_payment).unwrap_err();
        assert_eq!(err.to_string(), "Please select a payment method");

        let bad_payment = CheckoutRequest {
            payment_method: Some("bitcoin".into()),
            ..request()
        };
        let err = ValidatedCheckout::try_from(bad_payment).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let long_notes = CheckoutRequest {
            notes: Some("x".repeat(501)),
            ..request()
        };
        let err = ValidatedCheckout::try_from(long_notes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn valid_request_is_normalized() {
        let checkout = ValidatedCheckout::try_from(CheckoutRequest {
            payment_method: Some(" bank-transfer ".into()),
            notes: Some("  leave at door ".into()),
            ..request()
        })
        .unwrap();
        assert_eq!(checkout.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(checkout.notes.as_deref(), Some("leave at door"));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_after_input_validation() {
        let service = CheckoutService::new(
            InMemoryStore::new(),
            PricingEngine::default(),
            OrderSequencer::default(),
        );
        let identity = Identity::Guest(SessionToken::new("empty").unwrap());

        let err = service.create_order(&identity, request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCart);
        assert_eq!(err.to_string(), "Your cart is empty");

        let err = service
            .create_order(&identity, CheckoutRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = service.preview(&identity).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCart);
    }

    #[test]
    fn preview_serializes_tax_rate_as_number() {
        let preview = CheckoutPreview {
            items_price: Money::new(100),
            shipping_price: Money::new(30_000),
            tax_price: Money::new(10),
            total_price: Money::new(30_110),
            free_shipping_threshold: Money::new(500_000),
            tax_rate: Decimal::new(10, 2),
        };
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["taxRate"], serde_json::json!(0.1));
        assert_eq!(json["totalPrice"], serde_json::json!(30_110));
    }
}
