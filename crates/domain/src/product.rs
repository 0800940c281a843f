//! Catalog product as seen by the fulfillment core.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// Current catalog state of a product.
///
/// Owned by the catalog. The core reads it to price cart lines, validate stock
/// and snapshot order lines; it never keeps a copy beyond those snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl Product {
    /// Creates a product record.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            image: None,
        }
    }

    /// Sets the product image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Returns true if `quantity` units can be taken from current stock.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}
