use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{Dataset, DatasetId, DatasetRecord, Distribution, EquipmentRow};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquipmentView {
    /// Source position of the row, unique within its dataset.
    pub id: u32,
    pub equipment_name: String,
    pub equipment_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// History entry: everything but the equipment rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BriefView {
    pub id: DatasetId,
    pub name: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub uploaded_by_username: String,
    pub total_count: u64,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub type_distribution: Distribution,
    pub source_hash: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FullView {
    #[serde(flatten)]
    pub summary: BriefView,
    pub equipment: Vec<EquipmentView>,
}

pub fn brief(record: &DatasetRecord) -> BriefView {
    BriefView {
        id: record.id,
        name: record.name.clone(),
        uploaded_at: record.created_at,
        uploaded_by: record.owner.id.clone(),
        uploaded_by_username: record.owner.display_name.clone(),
        total_count: record.summary.total_count,
        avg_flowrate: record.summary.avg_flowrate,
        avg_pressure: record.summary.avg_pressure,
        avg_temperature: record.summary.avg_temperature,
        type_distribution: record.summary.distribution.clone(),
        source_hash: record.source_hash.clone(),
    }
}

pub fn full(dataset: &Dataset) -> FullView {
    FullView {
        summary: brief(&dataset.record),
        equipment: dataset.equipment.iter().map(equipment).collect(),
    }
}

fn equipment(row: &EquipmentRow) -> EquipmentView {
    EquipmentView {
        id: row.position,
        equipment_name: row.name.clone(),
        equipment_type: row.category.clone(),
        flowrate: row.flowrate,
        pressure: row.pressure,
        temperature: row.temperature,
    }
}
