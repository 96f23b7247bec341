//! Monthly closure resolution
//!
//! A closure run looks for period-specific variants of every catalog entry.
//! The variant's object name is the entry's name with each placeholder token
//! swapped for `CIERRE_<year><MM>`; it is published into a `<MM> - <Mes>`
//! subfolder of the entry's destination.

use std::fmt;

use serde::Serialize;

use crate::catalog::{Catalog, CatalogEntry};
use crate::remote::{ProbeError, RemoteStore};
use crate::{Error, Result};

/// Tokens replaced by the closure tag.
pub const PLACEHOLDERS: [&str; 2] = ["MESACTUAL", "MESANTERIOR"];

const MIN_YEAR_EXCLUSIVE: i32 = 2020;
const MAX_YEAR_EXCLUSIVE: i32 = 2040;

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// A validated closure year and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClosurePeriod {
    year: i32,
    month: u32,
}

impl ClosurePeriod {
    /// Validate a closure period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when `year` is outside 2021..=2039 or
    /// `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if year <= MIN_YEAR_EXCLUSIVE || year >= MAX_YEAR_EXCLUSIVE {
            return Err(Error::invalid_input(format!(
                "year must be between {} and {}, got {year}",
                MIN_YEAR_EXCLUSIVE + 1,
                MAX_YEAR_EXCLUSIVE - 1
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_input(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse raw user input such as `"2024"` and `"3"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when either value is not a number or
    /// the period is out of range.
    pub fn parse(year: &str, month: &str) -> Result<Self> {
        let year = year
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("year must be a number, got '{year}'")))?;
        let month = month
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("month must be a number, got '{month}'")))?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `CIERRE_202403`
    pub fn tag(&self) -> String {
        format!("CIERRE_{}{:02}", self.year, self.month)
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// `03 - Marzo`
    pub fn month_folder(&self) -> String {
        format!("{:02} - {}", self.month, self.month_name())
    }
}

impl fmt::Display for ClosurePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

/// A closure variant found on the remote, ready to sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureTask {
    pub entry: CatalogEntry,
    pub period: ClosurePeriod,
}

/// A derived locator whose existence could not be determined.
#[derive(Debug)]
pub struct ResolutionFailure {
    pub entry: CatalogEntry,
    pub error: ProbeError,
}

/// Result of probing every catalog entry for its closure variant.
#[derive(Debug, Default)]
pub struct ClosureResolution {
    pub tasks: Vec<ClosureTask>,
    pub absent: Vec<CatalogEntry>,
    pub failures: Vec<ResolutionFailure>,
}

impl ClosureResolution {
    /// Nothing to do and nothing went wrong.
    pub fn none_found(&self) -> bool {
        self.tasks.is_empty() && self.failures.is_empty()
    }
}

/// Replace every placeholder token in `name` with the period tag.
pub fn closure_file_name(name: &str, period: &ClosurePeriod) -> String {
    let tag = period.tag();
    PLACEHOLDERS
        .iter()
        .fold(name.to_string(), |acc, token| acc.replace(token, &tag))
}

/// The closure variant of `entry`: same remote parent, substituted name,
/// month subfolder under the same destination.
pub fn derive_closure_entry(entry: &CatalogEntry, period: &ClosurePeriod) -> CatalogEntry {
    let locator = entry.remote_locator();
    let derived = locator.with_file_name(&closure_file_name(locator.file_name(), period));
    entry.derive(derived, entry.destination_dir().join(period.month_folder()))
}

/// Probe the closure variant of every entry, in catalog order.
pub async fn resolve_closure_entries(
    catalog: &Catalog,
    period: &ClosurePeriod,
    prober: &dyn RemoteStore,
) -> ClosureResolution {
    let mut resolution = ClosureResolution::default();

    for entry in catalog {
        let derived = derive_closure_entry(entry, period);
        match prober.probe(derived.remote_locator()).await {
            Ok(info) if info.exists => {
                tracing::info!(object = %derived.object_name(), period = %period, "Closure found");
                resolution.tasks.push(ClosureTask {
                    entry: derived,
                    period: *period,
                });
            }
            Ok(_) => {
                tracing::info!(object = %derived.object_name(), "Closure not available, skipping");
                resolution.absent.push(derived);
            }
            Err(e) => {
                tracing::error!(object = %derived.object_name(), error = %e, "Closure probe failed");
                resolution.failures.push(ResolutionFailure {
                    entry: derived,
                    error: e,
                });
            }
        }
    }

    resolution
}
