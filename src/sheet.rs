//! Input sheet loading (Excel/ODS workbooks and CSV).

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info};

use crate::config::InputConfig;
use crate::models::{GeoPoint, Record};

/// Records read from a sheet
#[derive(Debug, Clone)]
pub struct SheetData {
    pub records: Vec<Record>,
    /// Whether the sheet carries its own lat/lon columns
    pub has_coordinates: bool,
    /// Whether an address column was found
    pub has_addresses: bool,
}

impl SheetData {
    /// Whether addresses must be geocoded; errors when there is nothing to geocode from
    pub fn needs_geocoding(&self, columns: &InputConfig) -> Result<bool> {
        if self.has_coordinates {
            return Ok(false);
        }
        if !self.has_addresses {
            bail!(
                "Neither '{}'/'{}' nor address column '{}' found",
                columns.lat_col,
                columns.lon_col,
                columns.address_col
            );
        }
        Ok(true)
    }
}

/// Read the first worksheet (or the CSV file) into records
pub fn read_records(path: &Path, columns: &InputConfig) -> Result<SheetData> {
    info!("Reading sheet {}", path.display());

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("csv"));

    let rows = if is_csv {
        read_csv_rows(path)?
    } else {
        read_workbook_rows(path)?
    };

    let data = records_from_rows(rows, columns)?;
    info!("Loaded {} rows", data.records.len());
    Ok(data)
}

fn read_workbook_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("Failed to open workbook {}: {}", path.display(), e))?;

    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no sheets")?
        .map_err(|e| anyhow!("Failed to read first sheet: {}", e))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV sheet")?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(String::from).collect());
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Whole numbers (house numbers, ids) without a trailing ".0"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Map raw rows (first row is the header) to records
pub fn records_from_rows(rows: Vec<Vec<String>>, columns: &InputConfig) -> Result<SheetData> {
    let mut rows = rows.into_iter();
    let header = match rows.next() {
        Some(h) => h,
        None => bail!("Sheet is empty"),
    };

    let find = |name: &str| header.iter().position(|h| h.trim() == name);

    let address_idx = find(&columns.address_col);
    let category_idx = find(&columns.category_col);
    let name_idx = find(&columns.name_col);
    let coords_idx = find(&columns.lat_col).zip(find(&columns.lon_col));

    debug!(
        "Columns: address={:?} category={:?} name={:?} coords={:?}",
        address_idx, category_idx, name_idx, coords_idx
    );

    let mut records = Vec::new();
    for row in rows {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        // Addresses stay exactly as written: they are the cache key
        let raw_cell = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| row.get(i))
                .filter(|c| !c.trim().is_empty())
                .cloned()
        };
        let cell = |idx: Option<usize>| raw_cell(idx).map(|c| c.trim().to_string());

        let mut record = Record::new(raw_cell(address_idx), cell(category_idx), cell(name_idx));

        if let Some((lat_idx, lon_idx)) = coords_idx {
            record.location = GeoPoint::from_parts(
                cell(Some(lat_idx)).and_then(|v| parse_number(&v)),
                cell(Some(lon_idx)).and_then(|v| parse_number(&v)),
            );
        }

        records.push(record);
    }

    Ok(SheetData {
        records,
        has_coordinates: coords_idx.is_some(),
        has_addresses: address_idx.is_some(),
    })
}

/// Parse a number, accepting a decimal comma
fn parse_number(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}
