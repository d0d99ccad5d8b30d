use crate::error::{EquipmentError, Result};
use crate::schema::{
    Distribution, EquipmentRow, Summary, COL_FLOWRATE, COL_NAME, COL_PRESSURE, COL_TEMPERATURE, COL_TYPE,
};
use crate::validator::Table;

#[derive(Clone, Debug)]
pub struct Aggregate {
    pub summary: Summary,
    pub rows: Vec<EquipmentRow>,
}

struct Columns {
    name: usize,
    category: usize,
    flowrate: usize,
    pressure: usize,
    temperature: usize,
}

impl Columns {
    fn locate(table: &Table) -> Result<Self> {
        let find = |label: &str| {
            table.column(label).ok_or_else(|| EquipmentError::Validation { missing: vec![label.to_string()] })
        };
        Ok(Self {
            name: find(COL_NAME)?,
            category: find(COL_TYPE)?,
            flowrate: find(COL_FLOWRATE)?,
            pressure: find(COL_PRESSURE)?,
            temperature: find(COL_TEMPERATURE)?,
        })
    }
}

/// Consumes a validated table and produces the equipment rows together with
/// count, per-column means and the type distribution.
///
/// Fails on an empty table and on the first numeric cell that is not a finite
/// number; nothing partial is returned.
pub fn aggregate(table: Table) -> Result<Aggregate> {
    let cols = Columns::locate(&table)?;
    if table.is_empty() {
        return Err(EquipmentError::EmptyDataset);
    }

    let mut rows = Vec::with_capacity(table.len());
    let mut distribution = Distribution::new();

    for (i, mut cells) in table.rows.into_iter().enumerate() {
        let row_no = i + 1;
        let flowrate = parse_number(&cells, cols.flowrate, row_no, COL_FLOWRATE)?;
        let pressure = parse_number(&cells, cols.pressure, row_no, COL_PRESSURE)?;
        let temperature = parse_number(&cells, cols.temperature, row_no, COL_TEMPERATURE)?;

        let category = take_cell(&mut cells, cols.category);
        let name = take_cell(&mut cells, cols.name);
        distribution.increment(&category);

        rows.push(EquipmentRow {
            position: i as u32,
            name,
            category,
            flowrate,
            pressure,
            temperature,
        });
    }

    let summary = Summary {
        total_count: rows.len() as u64,
        avg_flowrate: mean(&rows, |r| r.flowrate),
        avg_pressure: mean(&rows, |r| r.pressure),
        avg_temperature: mean(&rows, |r| r.temperature),
        distribution,
    };

    Ok(Aggregate { summary, rows })
}

/// Arithmetic mean of finite values; always finite for a non-empty slice.
fn mean(rows: &[EquipmentRow], field: fn(&EquipmentRow) -> f64) -> f64 {
    let n = rows.len() as f64;
    let sum: f64 = rows.iter().map(field).sum();
    if sum.is_finite() {
        return sum / n;
    }
    // the plain sum left f64 range; scale each term before adding
    rows.iter().map(|r| field(r) / n).sum()
}

fn take_cell(cells: &mut [String], idx: usize) -> String {
    cells.get_mut(idx).map(std::mem::take).unwrap_or_default()
}

fn parse_number(cells: &[String], idx: usize, row: usize, column: &str) -> Result<f64> {
    let raw = cells.get(idx).map(String::as_str).unwrap_or("");
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(EquipmentError::MalformedRow {
            row,
            column: Some(column.to_string()),
            value: raw.to_string(),
        }),
    }
}
