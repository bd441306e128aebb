//! SQLite implementation of the `DurableStore` trait.
//!
//! The tracker is a single-node system, so the durable store is an embedded
//! SQLite database. Timestamps are stored as RFC 3339 UTC text, identifiers
//! as hyphenated UUID text; the `seq` autoincrement column provides the
//! insertion-order tiebreak the operation chain requires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use uuid::Uuid;

use stockroom_core::error::LedgerError;
use stockroom_core::material::Material;
use stockroom_core::operation::{NewOperation, Operation, OperationKind};
use stockroom_core::store::DurableStore;

use crate::schema::CREATE_SCHEMA;

/// SQLite-backed durable store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to the database at `url` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StorageUnavailable` if the connection or the
    /// schema statements fail.
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .map_err(storage)?;
        Self::with_pool(pool).await
    }

    /// Opens a private in-memory database, used by tests.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StorageUnavailable` if the pool or schema
    /// setup fails.
    pub async fn open_in_memory() -> Result<Self, LedgerError> {
        // One connection only: each SQLite in-memory connection is its own
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage)?;
        Self::with_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::StorageUnavailable` if the schema statements
    /// fail.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, LedgerError> {
        sqlx::raw_sql(CREATE_SCHEMA)
            .execute(&pool)
            .await
            .map_err(storage)?;
        Ok(Self { pool })
    }

    async fn fetch_materials(&self, sql: &str) -> Result<Vec<Material>, LedgerError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(material_from_row).collect()
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::StorageUnavailable(err.to_string())
}

fn barcode_conflict(barcode: &str) -> impl Fn(sqlx::Error) -> LedgerError + '_ {
    move |err| {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            return LedgerError::DuplicateBarcode(barcode.to_owned());
        }
        storage(err)
    }
}

fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid, LedgerError> {
    let text: String = row.try_get(column).map_err(storage)?;
    Uuid::parse_str(&text)
        .map_err(|e| LedgerError::StorageUnavailable(format!("corrupt uuid in {column}: {e}")))
}

fn timestamp_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, LedgerError> {
    let text: String = row.try_get(column).map_err(storage)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| LedgerError::StorageUnavailable(format!("corrupt timestamp in {column}: {e}")))
}

fn material_from_row(row: &SqliteRow) -> Result<Material, LedgerError> {
    Ok(Material {
        id: uuid_column(row, "id")?,
        barcode: row.try_get("barcode").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        specification: row.try_get("specification").map_err(storage)?,
        unit: row.try_get("unit").map_err(storage)?,
        current_stock: row.try_get("current_stock").map_err(storage)?,
        min_stock: row.try_get("min_stock").map_err(storage)?,
        max_stock: row.try_get("max_stock").map_err(storage)?,
        location: row.try_get("location").map_err(storage)?,
        category: row.try_get("category").map_err(storage)?,
        description: row.try_get("description").map_err(storage)?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn operation_from_row(row: &SqliteRow) -> Result<Operation, LedgerError> {
    let kind_text: String = row.try_get("kind").map_err(storage)?;
    let kind = OperationKind::parse(&kind_text).ok_or_else(|| {
        LedgerError::StorageUnavailable(format!("corrupt operation kind: {kind_text}"))
    })?;
    Ok(Operation {
        id: uuid_column(row, "id")?,
        sequence: row.try_get("seq").map_err(storage)?,
        material_id: uuid_column(row, "material_id")?,
        material_barcode: row.try_get("material_barcode").map_err(storage)?,
        material_name: row.try_get("material_name").map_err(storage)?,
        kind,
        quantity: row.try_get("quantity").map_err(storage)?,
        previous_stock: row.try_get("previous_stock").map_err(storage)?,
        current_stock: row.try_get("current_stock").map_err(storage)?,
        operator: row.try_get("operator").map_err(storage)?,
        reason: row.try_get("reason").map_err(storage)?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn insert_material(&self, material: &Material) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO materials \
             (id, barcode, name, specification, unit, current_stock, min_stock, max_stock, \
              location, category, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(material.id.to_string())
        .bind(&material.barcode)
        .bind(&material.name)
        .bind(&material.specification)
        .bind(&material.unit)
        .bind(material.current_stock)
        .bind(material.min_stock)
        .bind(material.max_stock)
        .bind(&material.location)
        .bind(&material.category)
        .bind(&material.description)
        .bind(material.created_at.to_rfc3339())
        .bind(material.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(barcode_conflict(&material.barcode))?;
        Ok(())
    }

    async fn update_material(&self, material: &Material) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE materials SET \
             barcode = ?, name = ?, specification = ?, unit = ?, current_stock = ?, \
             min_stock = ?, max_stock = ?, location = ?, category = ?, description = ?, \
             updated_at = ? \
             WHERE id = ?",
        )
        .bind(&material.barcode)
        .bind(&material.name)
        .bind(&material.specification)
        .bind(&material.unit)
        .bind(material.current_stock)
        .bind(material.min_stock)
        .bind(material.max_stock)
        .bind(&material.location)
        .bind(&material.category)
        .bind(&material.description)
        .bind(material.updated_at.to_rfc3339())
        .bind(material.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(barcode_conflict(&material.barcode))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(material.id));
        }
        Ok(())
    }

    async fn delete_material(&self, id: Uuid) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM materials WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    async fn material_by_id(&self, id: Uuid) -> Result<Option<Material>, LedgerError> {
        let row = sqlx::query("SELECT * FROM materials WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(material_from_row).transpose()
    }

    async fn material_by_barcode(&self, barcode: &str) -> Result<Option<Material>, LedgerError> {
        let row = sqlx::query("SELECT * FROM materials WHERE barcode = ?")
            .bind(barcode)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(material_from_row).transpose()
    }

    async fn list_materials(&self) -> Result<Vec<Material>, LedgerError> {
        self.fetch_materials("SELECT * FROM materials ORDER BY name ASC, barcode ASC")
            .await
    }

    async fn search_materials(&self, keyword: &str) -> Result<Vec<Material>, LedgerError> {
        let pattern = format!("%{keyword}%");
        let rows = sqlx::query(
            "SELECT * FROM materials \
             WHERE name LIKE ? OR barcode LIKE ? OR specification LIKE ? OR location LIKE ? \
             ORDER BY name ASC, barcode ASC",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(material_from_row).collect()
    }

    async fn materials_by_category(&self, category: &str) -> Result<Vec<Material>, LedgerError> {
        let rows =
            sqlx::query("SELECT * FROM materials WHERE category = ? ORDER BY name ASC, barcode ASC")
                .bind(category)
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
        rows.iter().map(material_from_row).collect()
    }

    async fn list_low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        self.fetch_materials(
            "SELECT * FROM materials WHERE current_stock <= min_stock \
             ORDER BY current_stock ASC, name ASC",
        )
        .await
    }

    async fn list_categories(&self) -> Result<Vec<String>, LedgerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT category FROM materials WHERE category != '' ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter()
            .map(|row| row.try_get("category").map_err(storage))
            .collect()
    }

    async fn list_locations(&self) -> Result<Vec<String>, LedgerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT location FROM materials WHERE location != '' ORDER BY location ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter()
            .map(|row| row.try_get("location").map_err(storage))
            .collect()
    }

    async fn insert_operation(&self, operation: NewOperation) -> Result<Operation, LedgerError> {
        let result = sqlx::query(
            "INSERT INTO operations \
             (id, material_id, material_barcode, material_name, kind, quantity, \
              previous_stock, current_stock, operator, reason, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(operation.id.to_string())
        .bind(operation.material_id.to_string())
        .bind(&operation.material_barcode)
        .bind(&operation.material_name)
        .bind(operation.kind.as_str())
        .bind(operation.quantity)
        .bind(operation.previous_stock)
        .bind(operation.current_stock)
        .bind(&operation.operator)
        .bind(operation.reason.as_deref())
        .bind(operation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(operation.into_operation(result.last_insert_rowid()))
    }

    async fn operations_by_material(
        &self,
        material_id: Uuid,
    ) -> Result<Vec<Operation>, LedgerError> {
        let rows = sqlx::query(
            "SELECT * FROM operations WHERE material_id = ? \
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(material_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(operation_from_row).collect()
    }

    async fn list_operations(&self, limit: Option<usize>) -> Result<Vec<Operation>, LedgerError> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(
                    "SELECT * FROM operations ORDER BY created_at DESC, seq DESC LIMIT ?",
                )
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM operations ORDER BY created_at DESC, seq DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(storage)?;
        rows.iter().map(operation_from_row).collect()
    }

    async fn count_operations_today(&self, now: DateTime<Utc>) -> Result<u64, LedgerError> {
        // Day bounds are computed here so the TEXT comparison stays a plain
        // lexicographic range scan over RFC 3339 values.
        let start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let end = start + chrono::Duration::days(1);

        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM operations WHERE created_at >= ? AND created_at < ?",
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        let count: i64 = row.try_get("count").map_err(storage)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
