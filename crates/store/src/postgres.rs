use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{Identity, OrderId, ProductId, Version};
use domain::{Aggregate, Cart, CartLine, Order, OrderEvent, OrderNumber, Product};
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CatalogGateway, EventId, EventRecord, OrderPage, OrderQuery, OrderStats, Result, Store,
    StoreError, Transaction,
};

const ORDER_NUMBER_CONSTRAINT: &str = "unique_order_number";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps constraint and concurrency failures to `Conflict`.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some(ORDER_NUMBER_CONSTRAINT) || db_err.is_unique_violation() {
            tracing::warn!(
                constraint = db_err.constraint().unwrap_or_default(),
                error = db_err.message(),
                "unique constraint conflict"
            );
            return StoreError::Conflict(db_err.message().to_string());
        }
        if let Some(code) = db_err.code()
            && (code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED)
        {
            tracing::warn!(code = %code, error = db_err.message(), "transaction conflict");
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Database(e)
}

fn to_u32(value: i64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{what} out of range: {value}")))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    let stock: i64 = row.try_get("stock")?;
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        price: row.try_get::<i64, _>("price")?.into(),
        stock: to_u32(stock, "stock")?,
        image: row.try_get("image")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let data: serde_json::Value = row.try_get("data")?;
    Ok(serde_json::from_value(data)?)
}

fn row_to_event(row: PgRow) -> Result<EventRecord> {
    let payload: serde_json::Value = row.try_get("payload")?;
    Ok(EventRecord {
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        version: Version::new(row.try_get("version")?),
        event_type: row.try_get("event_type")?,
        occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
        payload: serde_json::from_value(payload)?,
    })
}

async fn fetch_product(conn: &mut PgConnection, id: &ProductId, lock: bool) -> Result<Option<Product>> {
    let sql = if lock {
        "SELECT id, name, price, stock, image FROM products WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, name, price, stock, image FROM products WHERE id = $1"
    };
    let row = sqlx::query(sql)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;
    row.map(row_to_product).transpose()
}

async fn adjust_stock_on(conn: &mut PgConnection, id: &ProductId, delta: i64) -> Result<u32> {
    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1 AND stock + $2 >= 0
        RETURNING stock
        "#,
    )
    .bind(id.as_str())
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?;

    if let Some(stock) = updated {
        return to_u32(stock, "stock");
    }

    // Either the product is gone or the decrement was refused
    match fetch_product(conn, id, false).await? {
        None => Err(StoreError::ProductNotFound(id.clone())),
        Some(product) => {
            tracing::warn!(
                product_id = %id,
                delta,
                available = product.stock,
                "stock adjustment refused"
            );
            Err(StoreError::InsufficientStock {
                product_id: id.clone(),
                requested: u32::try_from(-delta).unwrap_or(u32::MAX),
                available: product.stock,
            })
        }
    }
}

async fn load_cart_on(
    conn: &mut PgConnection,
    identity: &Identity,
    lock: bool,
) -> Result<Option<Cart>> {
    let sql = if lock {
        "SELECT lines, created_at, updated_at FROM carts \
         WHERE identity_kind = $1 AND identity_key = $2 FOR UPDATE"
    } else {
        "SELECT lines, created_at, updated_at FROM carts \
         WHERE identity_kind = $1 AND identity_key = $2"
    };
    let row = sqlx::query(sql)
        .bind(identity.kind())
        .bind(identity.key())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?;

    match row {
        Some(row) => {
            let lines: serde_json::Value = row.try_get("lines")?;
            let lines: Vec<CartLine> = serde_json::from_value(lines)?;
            let cart = Cart::restore(
                identity.clone(),
                lines,
                row.try_get("created_at")?,
                row.try_get("updated_at")?,
            )
            .map_err(|e| StoreError::Corrupt(format!("cart of {identity}: {e}")))?;
            Ok(Some(cart))
        }
        None => Ok(None),
    }
}

async fn save_cart_on(conn: &mut PgConnection, cart: &Cart) -> Result<()> {
    let lines = serde_json::to_value(cart.lines())?;
    sqlx::query(
        r#"
        INSERT INTO carts (identity_kind, identity_key, lines, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (identity_kind, identity_key) DO UPDATE SET
            lines = EXCLUDED.lines,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(cart.identity().kind())
    .bind(cart.identity().key())
    .bind(lines)
    .bind(cart.created_at())
    .bind(cart.updated_at())
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

async fn append_events_on(
    conn: &mut PgConnection,
    order: &Order,
    events: &[OrderEvent],
) -> Result<()> {
    for record in EventRecord::for_applied(order, events) {
        let payload = serde_json::to_value(&record.payload)?;
        sqlx::query(
            r#"
            INSERT INTO order_events (id, order_id, version, event_type, occurred_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.event_id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.version.as_i64())
        .bind(&record.event_type)
        .bind(record.occurred_at)
        .bind(payload)
        .execute(&mut *conn)
        .await
        .map_err(map_db_error)?;
    }
    Ok(())
}

#[async_trait]
impl CatalogGateway for PostgresStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id, false).await
    }

    async fn adjust_stock(&self, id: &ProductId, delta: i64) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock_on(&mut conn, id, delta).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, stock, image)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                image = EXCLUDED.image,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.minor_units())
        .bind(i64::from(product.stock))
        .bind(&product.image)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn load_cart(&self, identity: &Identity) -> Result<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        load_cart_on(&mut conn, identity, false).await
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        save_cart_on(&mut conn, cart).await
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data FROM orders WHERE order_number = $1")
            .bind(number.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_orders(&self, identity: &Identity, query: &OrderQuery) -> Result<OrderPage> {
        let mut filter = String::from("WHERE identity_kind = $1 AND identity_key = $2");
        let mut param_count = 2;

        // Build dynamic filter
        if query.status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.payment_status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND payment_status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders {filter}");
        let page_sql = format!(
            "SELECT data FROM orders {filter} ORDER BY created_at DESC, order_number DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(identity.kind())
            .bind(identity.key());
        let mut page_query = sqlx::query(&page_sql)
            .bind(identity.kind())
            .bind(identity.key());

        if let Some(status) = query.status {
            count_query = count_query.bind(status.as_str());
            page_query = page_query.bind(status.as_str());
        }
        if let Some(status) = query.payment_status {
            count_query = count_query.bind(status.as_str());
            page_query = page_query.bind(status.as_str());
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = page_query
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        Ok(OrderPage::new(
            orders,
            query,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn order_stats(&self, identity: &Identity) -> Result<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                LEAST(COALESCE(SUM(total_price), 0), 9223372036854775807)::BIGINT AS total_spent,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing_orders,
                COUNT(*) FILTER (WHERE status = 'shipped') AS shipped_orders,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders
            FROM orders
            WHERE identity_kind = $1 AND identity_key = $2
            "#,
        )
        .bind(identity.kind())
        .bind(identity.key())
        .fetch_one(&self.pool)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or_default())
        };

        Ok(OrderStats {
            total_orders: count("total_orders")?,
            total_spent: row.try_get::<i64, _>("total_spent")?.into(),
            pending_orders: count("pending_orders")?,
            processing_orders: count("processing_orders")?,
            shipped_orders: count("shipped_orders")?,
            delivered_orders: count("delivered_orders")?,
            cancelled_orders: count("cancelled_orders")?,
        })
    }

    async fn order_events(&self, id: OrderId) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, version, event_type, occurred_at, payload
            FROM order_events
            WHERE order_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }
}

/// Transaction over a [`PostgresStore`].
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        fetch_product(&mut self.tx, id, true).await
    }

    async fn adjust_stock(&mut self, id: &ProductId, delta: i64) -> Result<u32> {
        adjust_stock_on(&mut self.tx, id, delta).await
    }

    async fn lock_cart(&mut self, identity: &Identity) -> Result<Option<Cart>> {
        load_cart_on(&mut self.tx, identity, true).await
    }

    async fn save_cart(&mut self, cart: &Cart) -> Result<()> {
        save_cart_on(&mut self.tx, cart).await
    }

    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (day, last_value)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_value = order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        Ok(u32::try_from(value).unwrap_or(u32::MAX))
    }

    async fn insert_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()> {
        let data = serde_json::to_value(order)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, identity_kind, identity_key, status,
                                payment_status, total_price, created_at, updated_at, version, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().to_string())
        .bind(order.identity().kind())
        .bind(order.identity().key())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total_price().minor_units())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(order.version().as_i64())
        .bind(data)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        append_events_on(&mut self.tx, order, events).await
    }

    async fn load_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn update_order(&mut self, order: &Order, events: &[OrderEvent]) -> Result<()> {
        let expected = EventRecord::expected_version(order, events);
        let data = serde_json::to_value(order)?;
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, total_price = $4, updated_at = $5,
                version = $6, data = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total_price().minor_units())
        .bind(order.updated_at())
        .bind(order.version().as_i64())
        .bind(data)
        .bind(expected.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "order {}: expected version {expected}",
                order.id()
            )));
        }

        append_events_on(&mut self.tx, order, events).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }
}
