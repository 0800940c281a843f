//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the tables before
//! each test, so they are marked `#[serial]`. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{Identity, Money, OrderId, ProductId, SessionToken, UserId, Version};
use domain::{
    Aggregate, Cart, NewOrder, Order, OrderLine, OrderNumber, OrderStatus, PaymentMethod,
    PriceBreakdown, Product, ShippingAddress, ShippingAddressInput,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{CatalogGateway, OrderQuery, PostgresStore, Store, StoreError, Transaction};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_events, orders, carts, products, order_sequences")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn address() -> ShippingAddress {
    ShippingAddress::try_from(ShippingAddressInput {
        full_name: Some("Jane Doe".into()),
        phone: Some("0900000000".into()),
        address_line: Some("1 Main St".into()),
        city: Some("Hanoi".into()),
        ..Default::default()
    })
    .unwrap()
}

fn placed_order(identity: &Identity, number: OrderNumber, total: i64) -> (Order, Vec<domain::OrderEvent>) {
    Order::create(NewOrder {
        order_id: OrderId::new(),
        identity: identity.clone(),
        order_number: number,
        lines: vec![OrderLine {
            product_id: "P1".into(),
            name: "Widget".into(),
            quantity: 1,
            unit_price: Money::new(total),
            image: None,
        }],
        shipping_address: address(),
        payment_method: PaymentMethod::Cod,
        price: PriceBreakdown::new(Money::new(total), Money::zero(), Money::zero()),
        notes: None,
        placed_at: Utc::now(),
    })
    .unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[tokio::test]
#[serial]
async fn product_upsert_and_stock_adjustment() {
    let store = get_test_store().await;
    let id = ProductId::new("P1");
    store
        .upsert_product(&Product::new("P1", "Widget", Money::new(1_000), 3))
        .await
        .unwrap();

    assert_eq!(store.adjust_stock(&id, -2).await.unwrap(), 1);
    let err = store.adjust_stock(&id, -2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));
    assert_eq!(store.get_product(&id).await.unwrap().unwrap().stock, 1);

    let err = store
        .adjust_stock(&ProductId::new("missing"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(_)));
}

#[tokio::test]
#[serial]
async fn cart_roundtrip_recomputes_totals() {
    let store = get_test_store().await;
    let identity = Identity::Guest(SessionToken::new("sess-1").unwrap());
    let product = Product::new("P1", "Widget", Money::new(250), 10);

    let mut cart = Cart::new(identity.clone());
    cart.add_item(&product, 3).unwrap();
    store.save_cart(&cart).await.unwrap();

    let loaded = store.load_cart(&identity).await.unwrap().unwrap();
    assert_eq!(loaded.lines(), cart.lines());
    assert_eq!(loaded.total_items(), 3);
    assert_eq!(loaded.total_amount(), Money::new(750));
}

#[tokio::test]
#[serial]
async fn sequences_roll_back_with_transaction() {
    let store = get_test_store().await;

    {
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_order_sequence(day()).await.unwrap(), 1);
        // dropped without commit
    }

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.next_order_sequence(day()).await.unwrap(), 1);
    assert_eq!(tx.next_order_sequence(day()).await.unwrap(), 2);
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.next_order_sequence(day()).await.unwrap(), 3);
}

#[tokio::test]
#[serial]
async fn insert_and_find_order_with_history() {
    let store = get_test_store().await;
    let identity = Identity::User(UserId::new());
    let number = OrderNumber::new(day(), 1).unwrap();
    let (order, events) = placed_order(&identity, number, 5_000);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order, &events).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.find_order(order.id()).await.unwrap(), Some(order.clone()));
    assert_eq!(
        store.find_order_by_number(&number).await.unwrap(),
        Some(order.clone())
    );

    let history = store.order_events(order.id()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, "OrderPlaced");
    assert_eq!(history[0].version, Version::first());
}

#[tokio::test]
#[serial]
async fn duplicate_order_number_is_a_conflict() {
    let store = get_test_store().await;
    let identity = Identity::User(UserId::new());
    let number = OrderNumber::new(day(), 7).unwrap();

    let (first, events) = placed_order(&identity, number, 100);
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&first, &events).await.unwrap();
    tx.commit().await.unwrap();

    let (second, events) = placed_order(&identity, number, 200);
    let mut tx = store.begin().await.unwrap();
    let err = tx.insert_order(&second, &events).await.unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {err:?}");
}

#[tokio::test]
#[serial]
async fn update_order_checks_version() {
    let store = get_test_store().await;
    let identity = Identity::User(UserId::new());
    let (mut order, events) = placed_order(&identity, OrderNumber::new(day(), 1).unwrap(), 100);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order, &events).await.unwrap();
    tx.commit().await.unwrap();

    let stale = order.clone();
    let events = order.start_processing(Utc::now()).unwrap();
    order.apply_events(events.clone());

    let mut tx = store.begin().await.unwrap();
    tx.update_order(&order, &events).await.unwrap();
    tx.commit().await.unwrap();

    // A second writer that started from the old version loses
    let mut other = stale;
    let events = other.cancel(&identity, None, Utc::now()).unwrap();
    other.apply_events(events.clone());
    let mut tx = store.begin().await.unwrap();
    let err = tx.update_order(&other, &events).await.unwrap_err();
    assert!(err.is_conflict());
    drop(tx);

    let stored = store.find_order(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Processing);
    assert_eq!(store.order_events(order.id()).await.unwrap().len(), 2);
}

#[tokio::test]
#[serial]
async fn list_and_stats_are_scoped_to_identity() {
    let store = get_test_store().await;
    let alice = Identity::User(UserId::new());
    let bob = Identity::Guest(SessionToken::new("bob").unwrap());

    let mut tx = store.begin().await.unwrap();
    let mut placed = Vec::new();
    for (seq, identity, total) in [(1, &alice, 100), (2, &alice, 200), (3, &bob, 400)] {
        let (order, events) = placed_order(identity, OrderNumber::new(day(), seq).unwrap(), total);
        tx.insert_order(&order, &events).await.unwrap();
        placed.push(order);
    }
    tx.commit().await.unwrap();

    // A cancelled order still counts towards the amount spent
    let mut cancelled = placed.swap_remove(1);
    let events = cancelled.cancel(&alice, None, Utc::now()).unwrap();
    cancelled.apply_events(events.clone());
    let mut tx = store.begin().await.unwrap();
    tx.update_order(&cancelled, &events).await.unwrap();
    tx.commit().await.unwrap();

    let page = store
        .list_orders(&alice, &OrderQuery::new().limit(1))
        .await
        .unwrap();
    assert_eq!(page.total_orders, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.orders.len(), 1);

    let filtered = store
        .list_orders(&alice, &OrderQuery::new().status(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(filtered.total_orders, 1);

    let stats = store.order_stats(&alice).await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.cancelled_orders, 1);
    assert_eq!(stats.total_spent, Money::new(300));
}
