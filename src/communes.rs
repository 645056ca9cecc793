//! Per-commune profile: housing figures joined with median income, the table
//! the dashboard consumes.

use anyhow::{ensure, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use tracing::{info, warn};

use crate::{dataset::DatasetKind, load::clean::parse_number, table::CommuneTable};

/// Median income used when a commune has no income row or value (€/year).
pub const DEFAULT_MEDIAN_INCOME: f64 = 22_000.0;

/// Median standard of living relative to median income.
pub const LIVING_STANDARD_FACTOR: f64 = 1.3;

/// Median standard of living when the workbook carries no income column at all.
pub const DEFAULT_LIVING_STANDARD: f64 = 29_000.0;

/// Average household size used when population is not published.
pub const PERSONS_PER_HOUSEHOLD: f64 = 2.2;

/// Header fragments that identify the income column of the workbook.
const INCOME_HEADER_FRAGMENTS: [&str; 4] = ["REVENU", "NIVEAU", "MEDIAN", "VIE"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommuneProfile {
    pub code: String,
    pub name: String,
    pub population: u64,
    pub households: u64,
    pub dwellings: u64,
    pub houses: u64,
    pub pct_houses: f64,
    pub pct_primary_residences: f64,
    pub median_income: f64,
    pub median_living_standard: f64,
    /// True when `median_income` is [`DEFAULT_MEDIAN_INCOME`].
    pub income_imputed: bool,
}

/// Housing columns, resolved once per table.
struct HousingColumns {
    name: Option<usize>,
    population: Option<usize>,
    households: Option<usize>,
    dwellings: Option<usize>,
    houses: Option<usize>,
    primary_residences: Option<usize>,
}

impl HousingColumns {
    fn resolve(table: &CommuneTable) -> Self {
        let columns = Self {
            name: table.column_index("LIBGEO"),
            population: table.column_index("P21_POP"),
            households: table.column_index("P21_MEN"),
            dwellings: table.column_index("P21_LOG"),
            houses: table.column_index("P21_MAISON"),
            primary_residences: table.column_index("P21_RP"),
        };
        for (header, found) in [
            ("P21_MEN", columns.households.is_some()),
            ("P21_LOG", columns.dwellings.is_some()),
            ("P21_MAISON", columns.houses.is_some()),
            ("P21_RP", columns.primary_residences.is_some()),
        ] {
            if !found {
                warn!(column = header, "housing column absent, using defaults");
            }
        }
        if columns.population.is_none() {
            warn!("P21_POP absent, population estimated from households");
        }
        columns
    }
}

/// Income column of the workbook: first non-key header mentioning income.
fn income_column(income: &CommuneTable) -> Option<usize> {
    income
        .headers()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != income.key_column())
        .find(|(_, h)| {
            let upper = h.to_uppercase();
            INCOME_HEADER_FRAGMENTS.iter().any(|f| upper.contains(f))
        })
        .map(|(i, _)| i)
}

fn count(row: &[String], col: Option<usize>, default: u64) -> u64 {
    col.and_then(|c| row.get(c))
        .and_then(|v| parse_number(v))
        .map(|v| v.max(0.0) as u64)
        .unwrap_or(default)
}

fn percentage(part: u64, whole: u64) -> f64 {
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

/// Join housing with income on commune code, one profile per housing commune,
/// sorted by code.
pub fn build_profiles(
    housing: &CommuneTable,
    income: Option<&CommuneTable>,
) -> Result<Vec<CommuneProfile>> {
    ensure!(
        housing.kind() == DatasetKind::Housing,
        "profiles are built from the housing table, got {}",
        housing.kind()
    );
    if let Some(income) = income {
        ensure!(
            income.kind() == DatasetKind::Income,
            "income side must be the income table, got {}",
            income.kind()
        );
    }

    let columns = HousingColumns::resolve(housing);
    let income_col = income.and_then(|t| {
        let col = income_column(t);
        if col.is_none() {
            warn!("no income column in workbook, every commune gets the default");
        }
        col.map(|c| (t, c))
    });
    let flat_living_standard = income.is_some() && income_col.is_none();

    let entries: Vec<(&str, &[String])> = housing.entries().collect();
    let mut profiles: Vec<CommuneProfile> = entries
        .par_iter()
        .map(|&(code, row)| {
            let households = count(row, columns.households, 0);
            let population = match columns.population {
                Some(_) => count(row, columns.population, 0),
                None => (households as f64 * PERSONS_PER_HOUSEHOLD) as u64,
            };
            let dwellings = count(row, columns.dwellings, 1).max(1);
            let houses = count(row, columns.houses, 0);
            let primary = count(row, columns.primary_residences, 0);

            let measured_income = income_col.and_then(|(table, col)| {
                table
                    .row(code)
                    .and_then(|r| r.get(col))
                    .and_then(|v| parse_number(v))
            });

            let name = columns
                .name
                .and_then(|c| row.get(c))
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| code.to_string());

            let median_income = measured_income.unwrap_or(DEFAULT_MEDIAN_INCOME);
            let median_living_standard = if flat_living_standard {
                DEFAULT_LIVING_STANDARD
            } else {
                median_income * LIVING_STANDARD_FACTOR
            };
            CommuneProfile {
                code: code.to_string(),
                name,
                population,
                households,
                dwellings,
                houses,
                pct_houses: percentage(houses, dwellings),
                pct_primary_residences: percentage(primary, dwellings),
                median_income,
                median_living_standard,
                income_imputed: measured_income.is_none(),
            }
        })
        .collect();
    profiles.sort_by(|a, b| a.code.cmp(&b.code));

    let imputed = profiles.iter().filter(|p| p.income_imputed).count();
    info!(communes = profiles.len(), imputed, "built commune profiles");
    Ok(profiles)
}

/// Write profiles as CSV with a header row.
pub fn write_profiles<W: Write>(profiles: &[CommuneProfile], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for profile in profiles {
        wtr.serialize(profile).context("serializing commune profile")?;
    }
    wtr.flush().context("flushing profile CSV")?;
    Ok(())
}

pub fn export_profiles(profiles: &[CommuneProfile], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_profiles(profiles, file)?;
    info!(path = %path.display(), communes = profiles.len(), "exported profiles");
    Ok(())
}
