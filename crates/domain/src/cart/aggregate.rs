//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Identity, LineId, Money, ProductId};
use serde::{Deserialize, Serialize};

use super::CartError;
use crate::product::Product;

/// One product entry in a cart.
///
/// `unit_price` and `name` are captured when the product was first added;
/// they are not re-synced with later catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    #[serde(default)]
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartLine {
    /// Returns `unit_price * quantity`.
    ///
    /// Exact for lines held by a [`Cart`], whose totals are overflow-checked.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(self.quantity)
    }
}

/// Sums quantities and line totals, failing instead of overflowing.
fn totals(lines: &[CartLine]) -> Result<(u32, Money), CartError> {
    lines
        .iter()
        .try_fold((0u32, Money::zero()), |(items, amount), line| {
            let items = items.checked_add(line.quantity)?;
            let amount = line
                .unit_price
                .checked_mul(line.quantity)
                .and_then(|total| amount.checked_add(total))?;
            Some((items, amount))
        })
        .ok_or(CartError::TotalOverflow)
}

/// Cart aggregate root.
///
/// One cart per identity. Lines are kept in insertion order and hold at most
/// one entry per product. `total_items` and `total_amount` are derived from the
/// lines and recomputed after every mutation; nothing else writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    identity: Identity,
    lines: Vec<CartLine>,
    total_items: u32,
    total_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for an identity.
    pub fn new(identity: Identity) -> Self {
        let now = Utc::now();
        Self {
            identity,
            lines: Vec::new(),
            total_items: 0,
            total_amount: Money::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a cart from persisted lines. Totals are recomputed.
    pub fn restore(
        identity: Identity,
        lines: Vec<CartLine>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, CartError> {
        let (total_items, total_amount) = totals(&lines)?;
        Ok(Self {
            identity,
            lines,
            total_items,
            total_amount,
            created_at,
            updated_at,
        })
    }
}

// Query methods
impl Cart {
    /// Returns the identity owning this cart.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns a line by its id.
    pub fn line(&self, line_id: LineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.line_id == line_id)
    }

    /// Returns the sum of all line quantities.
    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    /// Returns the sum of `unit_price * quantity` over all lines.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns when the cart was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the cart was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Mutations
impl Cart {
    /// Adds `quantity` units of a product.
    ///
    /// Merges into the existing line for the product (keeping its original
    /// price snapshot) or appends a new line priced at the product's current
    /// catalog price. The cumulative quantity must fit in current stock.
    pub fn add_item(&mut self, product: &Product, quantity: u32) -> Result<LineId, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let mut lines = self.lines.clone();
        let existing = lines.iter_mut().find(|line| line.product_id == product.id);
        let requested = existing
            .as_ref()
            .map_or(0, |line| line.quantity)
            .saturating_add(quantity);

        if !product.has_stock_for(requested) {
            return Err(CartError::InsufficientStock {
                product_name: product.name.clone(),
                requested,
                available: product.stock,
            });
        }

        let line_id = match existing {
            Some(line) => {
                line.quantity = requested;
                line.line_id
            }
            None => {
                let line_id = LineId::new();
                lines.push(CartLine {
                    line_id,
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    quantity,
                    unit_price: product.price,
                });
                line_id
            }
        };

        self.replace_lines(lines)?;
        Ok(line_id)
    }

    /// Sets the quantity of an existing line.
    ///
    /// `product` is the live catalog record of the line's product and bounds
    /// the new quantity.
    pub fn update_item(
        &mut self,
        line_id: LineId,
        quantity: u32,
        product: &Product,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        let mut lines = self.lines.clone();
        let line = lines
            .iter_mut()
            .find(|line| line.line_id == line_id)
            .ok_or(CartError::LineNotFound { line_id })?;

        if !product.has_stock_for(quantity) {
            return Err(CartError::InsufficientStock {
                product_name: product.name.clone(),
                requested: quantity,
                available: product.stock,
            });
        }

        line.quantity = quantity;
        self.replace_lines(lines)
    }

    /// Removes a line. Removing an absent line changes nothing.
    ///
    /// Returns true if a line was removed.
    pub fn remove_item(&mut self, line_id: LineId) -> Result<bool, CartError> {
        if self.line(line_id).is_none() {
            return Ok(false);
        }
        let lines = self
            .lines
            .iter()
            .filter(|line| line.line_id != line_id)
            .cloned()
            .collect();
        self.replace_lines(lines)?;
        Ok(true)
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.total_items = 0;
        self.total_amount = Money::zero();
        self.updated_at = Utc::now();
    }

    /// Swaps in new lines once their totals are known to be representable.
    fn replace_lines(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        let (total_items, total_amount) = totals(&lines)?;
        self.lines = lines;
        self.total_items = total_items;
        self.total_amount = total_amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SessionToken;

    fn guest() -> Identity {
        Identity::Guest(SessionToken::new("sess-1").unwrap())
    }

    fn product(id: &str, price: i64, stock: u32) -> Product {
        Product::new(id, format!("Product {id}"), Money::new(price), stock)
    }

    fn assert_totals_derived(cart: &Cart) {
        let items: u32 = cart.lines().iter().map(|l| l.quantity).sum();
        let amount = Money::checked_sum(cart.lines().iter().map(|l| l.line_total())).unwrap();
        assert_eq!(cart.total_items(), items);
        assert_eq!(cart.total_amount(), amount);
    }

    #[test]
    fn new_cart_is_empty() {
        let cart = Cart::new(guest());
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert!(cart.total_amount().is_zero());
    }

    #[test]
    fn add_item_snapshots_price() {
        let mut cart = Cart::new(guest());
        let p1 = product("P1", 100_000, 10);

        cart.add_item(&p1, 2).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].unit_price, Money::new(100_000));
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_amount(), Money::new(200_000));
        assert_totals_derived(&cart);
    }

    #[test]
    fn adding_same_product_merges_and_keeps_snapshot() {
        let mut cart = Cart::new(guest());
        let mut p1 = product("P1", 100_000, 10);

        let first = cart.add_item(&p1, 1).unwrap();
        p1.price = Money::new(150_000);
        let second = cart.add_item(&p1, 2).unwrap();

        assert_eq!(first, second);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.lines()[0].unit_price, Money::new(100_000));
        assert_eq!(cart.total_amount(), Money::new(300_000));
        assert_totals_derived(&cart);
    }

    #[test]
    fn add_item_checks_cumulative_quantity_against_stock() {
        let mut cart = Cart::new(guest());
        let p1 = product("P1", 1_000, 3);

        cart.add_item(&p1, 2).unwrap();
        let before = cart.clone();
        let err = cart.add_item(&p1, 2).unwrap_err();

        assert_eq!(
            err,
            CartError::InsufficientStock {
                product_name: "Product P1".to_string(),
                requested: 4,
                available: 3,
            }
        );
        assert_eq!(cart, before);
    }

    #[test]
    fn add_item_over_stock_leaves_cart_unchanged() {
        let mut cart = Cart::new(guest());
        let p1 = product("P1", 1_000, 1);

        let err = cart.add_item(&p1, 5).unwrap_err();

        assert!(matches!(err, CartError::InsufficientStock { .. }));
        assert!(cart.is_empty());
        assert_totals_derived(&cart);
    }

    #[test]
    fn add_item_zero_quantity_fails() {
        let mut cart = Cart::new(guest());
        let err = cart.add_item(&product("P1", 1, 1), 0).unwrap_err();
        assert_eq!(err, CartError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut cart = Cart::new(guest());
        cart.add_item(&product("B", 10, 5), 1).unwrap();
        cart.add_item(&product("A", 20, 5), 1).unwrap();
        cart.add_item(&product("B", 10, 5), 1).unwrap();

        let ids: Vec<_> = cart.lines().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        assert_totals_derived(&cart);
    }

    #[test]
    fn update_item_sets_quantity() {
        let mut cart = Cart::new(guest());
        let p1 = product("P1", 500, 10);
        let line_id = cart.add_item(&p1, 2).unwrap();

        cart.update_item(line_id, 7, &p1).unwrap();

        assert_eq!(cart.line(line_id).unwrap().quantity, 7);
        assert_eq!(cart.total_amount(), Money::new(3_500));
        assert_totals_derived(&cart);
    }

    #[test]
    fn update_item_validations() {
        let mut cart = Cart::new(guest());
        let p1 = product("P1", 500, 3);
        let line_id = cart.add_item(&p1, 1).unwrap();

        assert!(matches!(
            cart.update_item(line_id, 0, &p1),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            cart.update_item(LineId::new(), 1, &p1),
            Err(CartError::LineNotFound { .. })
        ));
        assert!(matches!(
            cart.update_item(line_id, 4, &p1),
            Err(CartError::InsufficientStock { available: 3, .. })
        ));
        assert_eq!(cart.line(line_id).unwrap().quantity, 1);
    }

    #[test]
    fn remove_absent_line_is_noop() {
        let mut cart = Cart::new(guest());
        cart.add_item(&product("P1", 500, 3), 1).unwrap();
        let before = cart.clone();

        assert!(!cart.remove_item(LineId::new()).unwrap());
        assert_eq!(cart, before);
    }

    #[test]
    fn remove_and_clear_recompute_totals() {
        let mut cart = Cart::new(guest());
        let a = cart.add_item(&product("A", 100, 5), 2).unwrap();
        cart.add_item(&product("B", 300, 5), 1).unwrap();

        assert!(cart.remove_item(a).unwrap());
        assert_eq!(cart.total_items(), 1);
        assert_eq!(cart.total_amount(), Money::new(300));
        assert_totals_derived(&cart);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert!(cart.total_amount().is_zero());
    }

    #[test]
    fn restore_recomputes_totals() {
        let lines = vec![
            CartLine {
                line_id: LineId::new(),
                product_id: "A".into(),
                name: "Product A".into(),
                quantity: 2,
                unit_price: Money::new(50),
            },
            CartLine {
                line_id: LineId::new(),
                product_id: "B".into(),
                name: "Product B".into(),
                quantity: 1,
                unit_price: Money::new(25),
            },
        ];
        let now = Utc::now();
        let cart = Cart::restore(guest(), lines, now, now).unwrap();
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_amount(), Money::new(125));
    }

    #[test]
    fn add_item_snapshots_name() {
        let mut cart = Cart::new(guest());
        let mut p1 = product("P1", 100, 5);
        cart.add_item(&p1, 1).unwrap();

        p1.name = "Renamed".into();
        cart.add_item(&p1, 1).unwrap();
        assert_eq!(cart.lines()[0].name, "Product P1");
    }

    #[test]
    fn amount_overflow_is_rejected_without_change() {
        let mut cart = Cart::new(guest());
        let big = product("BIG", i64::MAX / 2, 3);

        let err = cart.add_item(&big, 3).unwrap_err();
        assert_eq!(err, CartError::TotalOverflow);
        assert!(cart.is_empty());

        let line_id = cart.add_item(&big, 2).unwrap();
        let before = cart.clone();
        assert_eq!(
            cart.update_item(line_id, 3, &big).unwrap_err(),
            CartError::TotalOverflow
        );
        assert_eq!(cart, before);

        let err = cart.add_item(&product("MORE", i64::MAX / 2, 1), 1).unwrap_err();
        assert_eq!(err, CartError::TotalOverflow);
        assert_eq!(cart, before);
    }

    #[test]
    fn restore_rejects_unrepresentable_totals() {
        let line = |id: &str| CartLine {
            line_id: LineId::new(),
            product_id: id.into(),
            name: id.into(),
            quantity: u32::MAX,
            unit_price: Money::new(1),
        };
        let now = Utc::now();
        let err = Cart::restore(guest(), vec![line("A"), line("B")], now, now).unwrap_err();
        assert_eq!(err, CartError::TotalOverflow);
    }
}
