//! PL number to BSN resolution
//!
//! The table is built once from the PL export and checked for conflicting
//! keys at construction. Lookups afterwards are pure.

mod source;

pub use source::read_rows;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::api::{Bsn, PlNumber};
use crate::common::config::LookupConfig;
use crate::common::{Error, Result};

/// One row of the PL export, as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRow {
    pub pl_number: String,
    pub bsn: String,
}

impl LookupRow {
    pub fn new(pl_number: impl Into<String>, bsn: impl Into<String>) -> Self {
        Self {
            pl_number: pl_number.into(),
            bsn: bsn.into(),
        }
    }
}

/// Resolves PL numbers to BSNs
#[derive(Debug, Clone, Default)]
pub struct PlLookup {
    table: BTreeMap<PlNumber, Bsn>,
}

impl PlLookup {
    /// Build the table, rejecting a key that maps to two different BSNs
    ///
    /// Rows without a PL number are ignored. Rows without a BSN are skipped,
    /// so resolving that key later fails with `NotFound`.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = LookupRow>,
    {
        let mut table = BTreeMap::new();

        for row in rows {
            let key = row.pl_number.trim();
            if key.is_empty() {
                continue;
            }
            let bsn = match Bsn::new(row.bsn.trim()) {
                Ok(bsn) => bsn,
                Err(_) => {
                    debug!(pl = key, "skipping PL row without BSN");
                    continue;
                }
            };

            match table.entry(PlNumber::new(key)) {
                Entry::Vacant(slot) => {
                    slot.insert(bsn);
                }
                Entry::Occupied(existing) => {
                    if existing.get() != &bsn {
                        return Err(Error::AmbiguousKey {
                            key: key.to_string(),
                            first: existing.get().to_string(),
                            second: bsn.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { table })
    }

    /// Load and build the table from a PL export file
    pub fn from_path(path: &Path, options: &LookupConfig) -> Result<Self> {
        let rows = read_rows(path, options)?;
        let lookup = Self::from_rows(rows)?;
        debug!(path = %path.display(), entries = lookup.len(), "PL lookup loaded");
        Ok(lookup)
    }

    /// Resolve a single PL number
    pub fn resolve(&self, pl: &PlNumber) -> Result<Bsn> {
        self.table
            .get(pl)
            .cloned()
            .ok_or_else(|| Error::NotFound(pl.to_string()))
    }

    /// Resolve a list in order, failing on the first unknown PL number
    pub fn resolve_all<'a, I>(&self, pls: I) -> Result<Vec<Bsn>>
    where
        I: IntoIterator<Item = &'a PlNumber>,
    {
        pls.into_iter().map(|pl| self.resolve(pl)).collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
