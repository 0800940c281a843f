//! Per-identity shopping carts.

use common::{Identity, LineId, ProductId};
use domain::{Cart, CartError};
use store::Store;

use crate::error::{FulfillmentError, Result};

/// Reads and mutates carts.
///
/// Each mutation loads the cart, applies the change and saves it whole, so
/// concurrent mutations of the same cart are last-writer-wins.
#[derive(Debug, Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the identity's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn get(&self, identity: &Identity) -> Result<Cart> {
        if let Some(cart) = self.store.load_cart(identity).await? {
            return Ok(cart);
        }
        let cart = Cart::new(identity.clone());
        self.store.save_cart(&cart).await?;
        tracing::debug!("created empty cart");
        Ok(cart)
    }

    /// Adds units of a product, merging into an existing line for it.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::ProductNotFound(product_id.clone()))?;

        let mut cart = self.load_or_new(identity).await?;
        cart.add_item(&product, quantity)?;
        self.save(&cart, "add").await?;
        Ok(cart)
    }

    /// Sets the quantity of a line, bounded by the product's live stock.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn update_item(
        &self,
        identity: &Identity,
        line_id: LineId,
        quantity: u32,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }
        let mut cart = self.load_or_new(identity).await?;
        let product_id = cart
            .line(line_id)
            .map(|line| line.product_id.clone())
            .ok_or(FulfillmentError::LineNotFound(line_id))?;
        let product = self
            .store
            .get_product(&product_id)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;

        cart.update_item(line_id, quantity, &product)?;
        self.save(&cart, "update").await?;
        Ok(cart)
    }

    /// Removes a line. Removing a line that is not there is not an error.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn remove_item(&self, identity: &Identity, line_id: LineId) -> Result<Cart> {
        let mut cart = self.load_or_new(identity).await?;
        if cart.remove_item(line_id)? {
            self.save(&cart, "remove").await?;
        }
        Ok(cart)
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self), fields(identity = %identity))]
    pub async fn clear(&self, identity: &Identity) -> Result<Cart> {
        let mut cart = self.load_or_new(identity).await?;
        cart.clear();
        self.save(&cart, "clear").await?;
        Ok(cart)
    }

    async fn load_or_new(&self, identity: &Identity) -> Result<Cart> {
        Ok(self
            .store
            .load_cart(identity)
            .await?
            .unwrap_or_else(|| Cart::new(identity.clone())))
    }

    async fn save(&self, cart: &Cart, op: &'static str) -> Result<()> {
        self.store.save_cart(cart).await?;
        metrics::counter!("cart_mutations_total", "op" => op).increment(1);
        Ok(())
    }
}
