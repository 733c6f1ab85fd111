//! Surcharge lookup used to derive the yearly property tax (onroerende voorheffing).
//!
//! The dataset is two `;`-delimited files, one keyed by municipality and one by province,
//! with surcharges written in either decimal notation (`7,35` or `7.35`). It is loaded once
//! and shared read-only afterwards.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use thiserror::Error;

/// Flemish base rate applied to the indexed cadastral income.
pub const BASE_RATE: f64 = 0.025;

const MUNICIPALITY_COLUMNS: (&str, &str) = ("Gemeente", "Gemeentelijke Opcentiemen");
const PROVINCE_COLUMNS: (&str, &str) = ("Provincie", "Provinciale Opcentiemen");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("unknown municipality: {0}")]
    UnknownMunicipality(String),
    #[error("unknown province: {0}")]
    UnknownProvince(String),
}

#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    municipalities: BTreeMap<String, f64>,
    provinces: BTreeMap<String, f64>,
}

impl RegionTable {
    pub fn load(municipalities: &Path, provinces: &Path) -> Result<Self> {
        let municipality_file = File::open(municipalities)
            .with_context(|| format!("Cannot open {}", municipalities.display()))?;
        let province_file = File::open(provinces)
            .with_context(|| format!("Cannot open {}", provinces.display()))?;
        Self::from_readers(municipality_file, province_file).with_context(|| {
            format!(
                "Cannot load surcharges from {} and {}",
                municipalities.display(),
                provinces.display()
            )
        })
    }

    pub fn from_readers<M: Read, P: Read>(municipalities: M, provinces: P) -> Result<Self> {
        let municipalities =
            read_surcharges(municipalities, MUNICIPALITY_COLUMNS, normalize_municipality)
                .context("municipal surcharges")?;
        let provinces = read_surcharges(provinces, PROVINCE_COLUMNS, normalize_province)
            .context("provincial surcharges")?;
        Ok(Self {
            municipalities,
            provinces,
        })
    }

    /// Municipal surcharge in percent. Names match case-insensitively.
    pub fn municipal_surcharge(&self, name: &str) -> Result<f64, RegionError> {
        self.municipalities
            .get(&normalize_municipality(name))
            .copied()
            .ok_or_else(|| RegionError::UnknownMunicipality(name.trim().to_string()))
    }

    /// Provincial surcharge in percent.
    pub fn provincial_surcharge(&self, name: &str) -> Result<f64, RegionError> {
        self.provinces
            .get(&normalize_province(name))
            .copied()
            .ok_or_else(|| RegionError::UnknownProvince(name.trim().to_string()))
    }

    /// Municipality names in sorted order, upper-cased.
    pub fn municipalities(&self) -> impl Iterator<Item = &str> + '_ {
        self.municipalities.keys().map(String::as_str)
    }

    pub fn provinces(&self) -> impl Iterator<Item = &str> + '_ {
        self.provinces.keys().map(String::as_str)
    }

    pub fn property_tax(
        &self,
        indexed_cadastral_income: f64,
        municipality: &str,
        province: &str,
    ) -> Result<f64, RegionError> {
        let municipal = self.municipal_surcharge(municipality)?;
        let provincial = self.provincial_surcharge(province)?;
        Ok(property_tax(indexed_cadastral_income, municipal, provincial))
    }
}

/// Yearly property tax for an indexed cadastral income and surcharges given in percent.
pub fn property_tax(
    indexed_cadastral_income: f64,
    municipal_surcharge_pct: f64,
    provincial_surcharge_pct: f64,
) -> f64 {
    let base = indexed_cadastral_income * BASE_RATE;
    base * (1.0 + municipal_surcharge_pct / 100.0 + provincial_surcharge_pct / 100.0)
}

fn normalize_municipality(name: &str) -> String {
    name.trim().to_uppercase()
}

fn normalize_province(name: &str) -> String {
    name.trim().to_string()
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn read_surcharges<R: Read>(
    reader: R,
    (name_column, value_column): (&str, &str),
    normalize: fn(&str) -> String,
) -> Result<BTreeMap<String, f64>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}') == wanted)
            .with_context(|| format!("missing column {wanted:?}"))
    };
    let name_idx = column(name_column)?;
    let value_idx = column(value_column)?;

    let mut table = BTreeMap::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let name = record.get(name_idx).unwrap_or("");
        if name.is_empty() {
            continue;
        }
        let raw = record.get(value_idx).unwrap_or("");
        let Some(value) = parse_decimal(raw) else {
            // header is line 1
            bail!("line {}: cannot parse surcharge {raw:?} for {name}", row + 2);
        };
        table.insert(normalize(name), value);
    }

    if table.is_empty() {
        bail!("no surcharge rows found");
    }
    Ok(table)
}
