//! Pattern table: the stored `(address, data)` sequence replayed during a run.
//!
//! Both engines look entries up by `counter & data_mask`. The mask and the
//! table depth are configured independently; keeping them consistent is the
//! caller's job. An index past the end wraps modulo the depth so a
//! misconfigured mask still has defined behavior.

use serde::{Deserialize, Serialize};

use crate::error::BistError;

/// A data word as carried by the transport. Only the low `data_width` bits
/// configured on the engine are meaningful.
pub type DataWord = u128;

/// One pattern entry: a base transport address and the data word for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Base transport address; the engine adds `counter & mem_mask` to it.
    pub address: u32,
    /// Pattern data before row inversion.
    pub data: DataWord,
}

impl PatternEntry {
    /// Creates a new pattern entry.
    pub fn new(address: u32, data: DataWord) -> Self {
        Self { address, data }
    }
}

/// Fixed-depth storage of pattern entries.
///
/// The depth is fixed when the table is built. Individual entries may be
/// rewritten between runs with [`set`](PatternTable::set).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Creates a table from the given entries. The table must not be empty.
    pub fn new(entries: Vec<PatternEntry>) -> Result<Self, BistError> {
        if entries.is_empty() {
            return Err(BistError::EmptyPattern);
        }
        Ok(Self { entries })
    }

    /// Creates a table of `depth` zeroed entries.
    pub fn zeroed(depth: usize) -> Result<Self, BistError> {
        Self::new(vec![PatternEntry::default(); depth])
    }

    /// A single zeroed entry, for engines that have not started a run yet.
    pub(crate) fn placeholder() -> Self {
        Self {
            entries: vec![PatternEntry::default()],
        }
    }

    /// Creates a table from `(address, data)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, BistError>
    where
        I: IntoIterator<Item = (u32, DataWord)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(address, data)| PatternEntry::new(address, data))
                .collect(),
        )
    }

    /// Returns the number of entries.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Returns all entries in index order.
    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Returns the entry at `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&PatternEntry> {
        self.entries.get(index)
    }

    /// Overwrites the entry at `index`.
    pub fn set(&mut self, index: usize, entry: PatternEntry) -> Result<(), BistError> {
        let depth = self.entries.len();
        let slot = self
            .entries
            .get_mut(index)
            .ok_or(BistError::PatternIndexOutOfRange { index, depth })?;
        *slot = entry;
        Ok(())
    }

    /// Returns the table index used for transfer number `counter`.
    pub fn index_for(counter: u32, data_mask: u32) -> u32 {
        counter & data_mask
    }

    /// Returns the entry used for transfer number `counter`.
    pub fn lookup(&self, counter: u32, data_mask: u32) -> PatternEntry {
        let index = Self::index_for(counter, data_mask) as usize % self.entries.len();
        self.entries[index]
    }
}
