use async_trait::async_trait;
use chrono::{DateTime, Utc};
use equipment_core::{
    Dataset, DatasetId, DatasetRecord, DatasetStore, Distribution, EquipmentError, EquipmentRow, NewDataset,
    Owner, Result, Summary,
};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

// 7 binds per row keeps each statement well under the 65535 parameter limit
const ROW_CHUNK: usize = 5_000;

pub struct PgDatasetStore {
    pool: PgPool,
}

impl PgDatasetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DatasetRow {
    id: Uuid,
    name: String,
    owner_id: String,
    owner_name: String,
    created_at: DateTime<Utc>,
    source_hash: String,
    total_count: i64,
    avg_flowrate: f64,
    avg_pressure: f64,
    avg_temperature: f64,
    type_distribution: JsonValue,
}

impl TryFrom<DatasetRow> for DatasetRecord {
    type Error = EquipmentError;

    fn try_from(r: DatasetRow) -> Result<Self> {
        let total_count = u64::try_from(r.total_count)
            .map_err(|_| EquipmentError::Storage(format!("dataset {}: negative total_count", r.id)))?;
        let record = DatasetRecord {
            id: r.id,
            name: r.name,
            created_at: r.created_at,
            owner: Owner::new(r.owner_id, r.owner_name),
            source_hash: r.source_hash,
            summary: Summary {
                total_count,
                avg_flowrate: r.avg_flowrate,
                avg_pressure: r.avg_pressure,
                avg_temperature: r.avg_temperature,
                distribution: Distribution::from_json(r.type_distribution)?,
            },
        };
        record.check_consistency()?;
        Ok(record)
    }
}

#[derive(sqlx::FromRow)]
struct EquipmentDbRow {
    position: i32,
    equipment_name: String,
    equipment_type: String,
    flowrate: f64,
    pressure: f64,
    temperature: f64,
}

impl From<EquipmentDbRow> for EquipmentRow {
    fn from(r: EquipmentDbRow) -> Self {
        Self {
            position: r.position as u32,
            name: r.equipment_name,
            category: r.equipment_type,
            flowrate: r.flowrate,
            pressure: r.pressure,
            temperature: r.temperature,
        }
    }
}

const SELECT_DATASET: &str = r#"
    SELECT id, name, owner_id, owner_name, created_at, source_hash,
           total_count, avg_flowrate, avg_pressure, avg_temperature, type_distribution
    FROM datasets
"#;

async fn insert_rows(tx: &mut Transaction<'_, Postgres>, dataset_id: Uuid, rows: &[EquipmentRow]) -> sqlx::Result<()> {
    for chunk in rows.chunks(ROW_CHUNK) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO equipment_rows \
             (dataset_id, position, equipment_name, equipment_type, flowrate, pressure, temperature) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(dataset_id)
                .push_bind(row.position as i32)
                .push_bind(&row.name)
                .push_bind(&row.category)
                .push_bind(row.flowrate)
                .push_bind(row.pressure)
                .push_bind(row.temperature);
        });
        qb.build().execute(&mut **tx).await?;
    }
    Ok(())
}

#[async_trait]
impl DatasetStore for PgDatasetStore {
    async fn insert(&self, new: NewDataset) -> Result<Dataset> {
        let id = Uuid::new_v4();
        let total_count = i64::try_from(new.summary.total_count).map_err(EquipmentError::storage)?;

        let mut tx = self.pool.begin().await.map_err(EquipmentError::storage)?;

        // same-owner inserts commit one at a time, so created_at and seq follow commit order
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&new.owner.id)
            .execute(&mut *tx)
            .await
            .map_err(EquipmentError::storage)?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO datasets
                (id, name, owner_id, owner_name, source_hash,
                 total_count, avg_flowrate, avg_pressure, avg_temperature, type_distribution, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, clock_timestamp())
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(&new.name)
        .bind(&new.owner.id)
        .bind(&new.owner.display_name)
        .bind(&new.source_hash)
        .bind(total_count)
        .bind(new.summary.avg_flowrate)
        .bind(new.summary.avg_pressure)
        .bind(new.summary.avg_temperature)
        .bind(new.summary.distribution.to_json())
        .fetch_one(&mut *tx)
        .await
        .map_err(EquipmentError::storage)?;

        insert_rows(&mut tx, id, &new.equipment).await.map_err(EquipmentError::storage)?;

        // dropping `tx` on any error above rolls the whole ingestion back
        tx.commit().await.map_err(EquipmentError::storage)?;

        Ok(Dataset {
            record: DatasetRecord {
                id,
                name: new.name,
                created_at,
                owner: new.owner,
                source_hash: new.source_hash,
                summary: new.summary,
            },
            equipment: new.equipment,
        })
    }

    async fn get(&self, id: DatasetId) -> Result<Dataset> {
        // one snapshot for parent and children; a concurrent delete shows up as NotFound
        let mut tx = self.pool.begin().await.map_err(EquipmentError::storage)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(EquipmentError::storage)?;

        let row: Option<DatasetRow> = sqlx::query_as(&format!("{SELECT_DATASET} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(EquipmentError::storage)?;
        let record = DatasetRecord::try_from(row.ok_or(EquipmentError::NotFound(id))?)?;

        let equipment: Vec<EquipmentDbRow> = sqlx::query_as(
            r#"
            SELECT position, equipment_name, equipment_type, flowrate, pressure, temperature
            FROM equipment_rows
            WHERE dataset_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(EquipmentError::storage)?;

        tx.commit().await.map_err(EquipmentError::storage)?;

        if equipment.len() as u64 != record.summary.total_count {
            return Err(EquipmentError::Storage(format!(
                "dataset {id}: {} rows stored, total_count is {}",
                equipment.len(),
                record.summary.total_count
            )));
        }

        Ok(Dataset { record, equipment: equipment.into_iter().map(EquipmentRow::from).collect() })
    }

    async fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<DatasetRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<DatasetRow> = sqlx::query_as(&format!(
            "{SELECT_DATASET} WHERE owner_id = $1 ORDER BY created_at DESC, seq DESC LIMIT $2"
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(EquipmentError::storage)?;

        rows.into_iter().map(DatasetRecord::try_from).collect()
    }

    async fn delete(&self, id: DatasetId) -> Result<()> {
        let res = sqlx::query("DELETE FROM datasets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(EquipmentError::storage)?;

        if res.rows_affected() == 0 {
            return Err(EquipmentError::NotFound(id));
        }
        Ok(())
    }
}
