//! Checkout races against PostgreSQL.
//!
//! These tests share one PostgreSQL container and truncate the tables before
//! each test, so they are marked `#[serial]`. Run with:
//!
//! ```bash
//! cargo test -p fulfillment --test postgres_checkout
//! ```

use std::sync::Arc;

use common::{Identity, Money, ProductId, SessionToken, UserId};
use domain::{OrderStatus, PricingEngine, Product, ShippingAddressInput};
use fulfillment::{
    CartService, CheckoutRequest, CheckoutService, ErrorKind, OrderLifecycle, OrderSequencer,
    SequencerConfig,
};
use futures_util::future::join_all;
use serial_test::serial;
use sqlx::PgPool;
use store::{CatalogGateway, OrderQuery, PostgresStore, Store};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

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

struct Services {
    store: PostgresStore,
    cart: CartService<PostgresStore>,
    checkout: CheckoutService<PostgresStore>,
    lifecycle: OrderLifecycle<PostgresStore>,
}

impl Services {
    async fn new(products: impl IntoIterator<Item = Product>) -> Self {
        let info = get_container_info().await;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&info.connection_string)
            .await
            .unwrap();
        sqlx::query("TRUNCATE TABLE order_events, orders, carts, products, order_sequences")
            .execute(&pool)
            .await
            .unwrap();

        let store = PostgresStore::new(pool);
        for product in products {
            store.upsert_product(&product).await.unwrap();
        }

        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(
                store.clone(),
                PricingEngine::default(),
                OrderSequencer::new(SequencerConfig::default()),
            ),
            lifecycle: OrderLifecycle::new(store.clone()),
            store,
        }
    }

    async fn stock(&self, id: &str) -> u32 {
        self.store
            .get_product(&ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn order_count(&self, identity: &Identity) -> u64 {
        self.store
            .list_orders(identity, &OrderQuery::new())
            .await
            .unwrap()
            .total_orders
    }
}

fn widget(stock: u32) -> Product {
    Product::new("P1", "Widget", Money::new(100_000), stock)
}

fn guest(token: &str) -> Identity {
    Identity::Guest(SessionToken::new(token).unwrap())
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: Some(ShippingAddressInput {
            full_name: Some("Jane Doe".into()),
            phone: Some("0900000000".into()),
            address_line: Some("1 Main St".into()),
            city: Some("Hanoi".into()),
            ..Default::default()
        }),
        payment_method: Some("cod".into()),
        notes: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn last_unit_goes_to_exactly_one_buyer() {
    let s = Services::new([widget(1)]).await;
    let alice = guest("alice");
    let bob = Identity::User(UserId::new());
    s.cart.add_item(&alice, &"P1".into(), 1).await.unwrap();
    s.cart.add_item(&bob, &"P1".into(), 1).await.unwrap();

    let (a, b) = tokio::join!(
        s.checkout.create_order(&alice, request()),
        s.checkout.create_order(&bob, request()),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert_eq!(err.to_string(), "Not enough stock for Widget. Available: 0");

    assert_eq!(s.stock("P1").await, 0);
    assert_eq!(s.order_count(&alice).await + s.order_count(&bob).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn double_submit_places_one_order() {
    let s = Services::new([widget(10)]).await;
    let buyer = guest("double-click");
    s.cart.add_item(&buyer, &"P1".into(), 3).await.unwrap();

    let results = join_all((0..3).map(|_| s.checkout.create_order(&buyer, request()))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::EmptyCart);
    }
    assert_eq!(s.stock("P1").await, 7);
    assert_eq!(s.order_count(&buyer).await, 1);
    assert!(s.cart.get(&buyer).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn cancel_racing_checkout_keeps_stock_exact() {
    let s = Services::new([widget(10)]).await;

    let mut expected = 10;
    for round in 0..3 {
        let canceller = guest(&format!("canceller-{round}"));
        let buyer = guest(&format!("buyer-{round}"));

        s.cart.add_item(&canceller, &"P1".into(), 3).await.unwrap();
        let placed = s.checkout.create_order(&canceller, request()).await.unwrap();
        s.cart.add_item(&buyer, &"P1".into(), 2).await.unwrap();
        assert_eq!(s.stock("P1").await, expected - 3);

        let (cancelled, bought) = tokio::join!(
            s.lifecycle.cancel(&canceller, placed.id(), None),
            s.checkout.create_order(&buyer, request()),
        );

        assert_eq!(cancelled.unwrap().status(), OrderStatus::Cancelled);
        assert_eq!(bought.unwrap().lines()[0].quantity, 2);
        expected -= 2;
        assert_eq!(s.stock("P1").await, expected);
    }
}
