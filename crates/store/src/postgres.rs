use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{PackageId, PackageStatus, ProductId, TrackingCode, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::{
    NewShipmentEvent, Package, PackageProduct, PackageStore, PackageTx, PackageWithDetails, Result,
    ShipmentEvent, StoreError,
};

/// PostgreSQL-backed package repository.
#[derive(Clone)]
pub struct PostgresPackageStore {
    pool: PgPool,
}

impl PostgresPackageStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` with a small pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::debug!("running package tracker migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_package(row: &PgRow) -> Result<Package> {
        let status_text: String = row.try_get("status").map_err(StoreError::from)?;
        let status = PackageStatus::parse(&status_text)
            .ok_or_else(|| StoreError::CorruptStatus(status_text))?;

        Ok(Package {
            id: PackageId::new(row.try_get("id").map_err(StoreError::from)?),
            tracking_code: TrackingCode::new(
                row.try_get::<String, _>("tracking_code")
                    .map_err(StoreError::from)?,
            ),
            user_id: UserId::new(row.try_get("user_id").map_err(StoreError::from)?),
            destination_address: row
                .try_get("destination_address")
                .map_err(StoreError::from)?,
            status,
            created_at: row.try_get("created_at").map_err(StoreError::from)?,
            shipped_at: row.try_get("shipped_at").map_err(StoreError::from)?,
            delivered_at: row.try_get("delivered_at").map_err(StoreError::from)?,
        })
    }

    fn row_to_event(row: &PgRow) -> Result<ShipmentEvent> {
        Ok(ShipmentEvent {
            id: row.try_get("id").map_err(StoreError::from)?,
            package_id: PackageId::new(row.try_get("package_id").map_err(StoreError::from)?),
            user_id: row
                .try_get::<Option<i64>, _>("user_id")
                .map_err(StoreError::from)?
                .map(UserId::new),
            label: row.try_get("label").map_err(StoreError::from)?,
            location: row.try_get("location").map_err(StoreError::from)?,
            notes: row.try_get("notes").map_err(StoreError::from)?,
            event_timestamp: row.try_get("event_timestamp").map_err(StoreError::from)?,
        })
    }
}

#[async_trait]
impl PackageStore for PostgresPackageStore {
    async fn begin(&self) -> Result<Box<dyn PackageTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresPackageTx { tx }))
    }

    async fn find_package(&self, tracking_code: &TrackingCode) -> Result<Option<Package>> {
        let row = sqlx::query("SELECT * FROM packages WHERE tracking_code = $1")
            .bind(tracking_code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_package).transpose()
    }

    async fn find_package_with_details(
        &self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<PackageWithDetails>> {
        let Some(package) = self.find_package(tracking_code).await? else {
            return Ok(None);
        };

        // Newest first: this is the display ordering for history views.
        let event_rows = sqlx::query(
            r#"
            SELECT id, package_id, user_id, label, location, notes, event_timestamp
            FROM shipment_events
            WHERE package_id = $1
            ORDER BY event_timestamp DESC, id DESC
            "#,
        )
        .bind(package.id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let history = event_rows
            .iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;

        let product_rows = sqlx::query(
            "SELECT package_id, product_id, quantity FROM package_products WHERE package_id = $1",
        )
        .bind(package.id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let products = product_rows
            .iter()
            .map(|row| {
                Ok(PackageProduct {
                    package_id: PackageId::new(row.try_get("package_id")?),
                    product_id: ProductId::new(row.try_get("product_id")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(PackageWithDetails {
            package,
            history,
            products,
        }))
    }

    async fn find_packages_not_in_transit(&self, cutoff: DateTime<Utc>) -> Result<Vec<Package>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM packages p
            WHERE (p.status = 'pending' AND p.created_at < $1)
               OR (p.status = 'ready_for_shipping'
                   AND COALESCE(
                         (SELECT MAX(e.event_timestamp) FROM shipment_events e
                           WHERE e.package_id = p.id AND e.label = 'Returned to Warehouse'),
                         (SELECT MAX(e.event_timestamp) FROM shipment_events e
                           WHERE e.package_id = p.id AND e.label = 'Package Ready'),
                         p.created_at
                       ) < $1)
            ORDER BY p.created_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_package).collect()
    }

    async fn find_same_day_returned(&self) -> Result<Vec<Package>> {
        let rows = sqlx::query(
            r#"
            SELECT p.* FROM packages p
            WHERE p.status = 'ready_for_shipping'
              AND p.shipped_at IS NOT NULL
              AND p.delivered_at IS NULL
              AND EXISTS (
                SELECT 1
                FROM shipment_events t
                JOIN shipment_events r ON r.package_id = t.package_id
                WHERE t.package_id = p.id
                  AND t.label = 'In Transit'
                  AND r.label = 'Returned to Warehouse'
                  AND DATE(t.event_timestamp) = DATE(r.event_timestamp)
              )
            ORDER BY p.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_package).collect()
    }
}

/// One open PostgreSQL transaction.
struct PostgresPackageTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PackageTx for PostgresPackageTx {
    async fn find_available_product(&mut self, product_id: ProductId) -> Result<bool> {
        // Lock the product row first so a concurrent create on the same
        // product blocks here, then check the reservation table with the
        // lock held.
        let locked = sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        if locked.is_none() {
            return Ok(false);
        }

        let reserved: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM package_products WHERE product_id = $1)",
        )
        .bind(product_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(!reserved)
    }

    async fn insert_package(
        &mut self,
        tracking_code: &TrackingCode,
        user_id: UserId,
        destination_address: &str,
    ) -> Result<Package> {
        let row = sqlx::query(
            r#"
            INSERT INTO packages (tracking_code, user_id, destination_address, status, shipped_at, delivered_at)
            VALUES ($1, $2, $3, 'pending', NULL, NULL)
            RETURNING *
            "#,
        )
        .bind(tracking_code.as_str())
        .bind(user_id.as_i64())
        .bind(destination_address)
        .fetch_one(&mut *self.tx)
        .await?;

        PostgresPackageStore::row_to_package(&row)
    }

    async fn find_package_for_update(
        &mut self,
        tracking_code: &TrackingCode,
    ) -> Result<Option<Package>> {
        let row = sqlx::query("SELECT * FROM packages WHERE tracking_code = $1 FOR UPDATE")
            .bind(tracking_code.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(PostgresPackageStore::row_to_package).transpose()
    }

    async fn update_status_if_matches(
        &mut self,
        package_id: PackageId,
        expected: PackageStatus,
        new_status: PackageStatus,
        shipped_at: Option<DateTime<Utc>>,
        delivered_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Package>> {
        // COALESCE keeps an already-set timestamp: shipped_at is stamped on
        // the first entry into transit only.
        let row = sqlx::query(
            r#"
            UPDATE packages
            SET status = $3,
                shipped_at = COALESCE(shipped_at, $4),
                delivered_at = COALESCE(delivered_at, $5)
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(package_id.as_i64())
        .bind(expected.as_str())
        .bind(new_status.as_str())
        .bind(shipped_at)
        .bind(delivered_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(PostgresPackageStore::row_to_package).transpose()
    }

    async fn bind_product(
        &mut self,
        package_id: PackageId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO package_products (package_id, product_id, quantity) VALUES ($1, $2, $3)",
        )
        .bind(package_id.as_i64())
        .bind(product_id.as_i64())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_event(&mut self, event: NewShipmentEvent<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shipment_events (package_id, user_id, label, location, notes, event_timestamp)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(event.package_id.as_i64())
        .bind(event.user_id.map(|u| u.as_i64()))
        .bind(event.label.as_str())
        .bind(event.location)
        .bind(event.notes)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
