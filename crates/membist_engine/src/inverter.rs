//! Row-based data inversion.
//!
//! The field `addr[row_shift .. row_shift + bits]` is fed to a
//! [`SelectorConfig`]; selected rows get the complement of the pattern data.
//! This lets a single pattern entry produce checkerboard-style row layouts.

use serde::{Deserialize, Serialize};

use crate::error::BistError;
use crate::pattern::DataWord;
use crate::selector::SelectorConfig;

/// Maximum supported data word width in bits.
pub const MAX_DATA_WIDTH: u32 = DataWord::BITS;

/// Returns a mask with the low `width` bits set.
///
/// Fails unless `width` is in `1..=128`.
pub fn word_mask(width: u32) -> Result<DataWord, BistError> {
    match width {
        0 => Err(BistError::InvalidDataWidth { width }),
        w if w == MAX_DATA_WIDTH => Ok(DataWord::MAX),
        w if w < MAX_DATA_WIDTH => Ok((1 << w) - 1),
        _ => Err(BistError::InvalidDataWidth { width }),
    }
}

/// Selector plus the position of its field within the address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Row predicate.
    pub selector: SelectorConfig,
    /// Position of the lowest row bit within the transport address.
    pub row_shift: u32,
}

impl InverterConfig {
    /// Extracts the selector field from `addr`.
    pub fn row_field(&self, addr: u32) -> u32 {
        addr.checked_shr(self.row_shift).unwrap_or(0) & self.selector.field_mask()
    }
}

/// Conditionally complements data words based on their address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowInverter {
    config: InverterConfig,
    word_mask: DataWord,
}

impl RowInverter {
    /// Creates an inverter for `data_width`-bit words.
    pub fn new(config: InverterConfig, data_width: u32) -> Result<Self, BistError> {
        Ok(Self {
            config,
            word_mask: word_mask(data_width)?,
        })
    }

    /// Returns the inverter configuration.
    pub fn config(&self) -> &InverterConfig {
        &self.config
    }

    /// Returns a mutable reference to the selector, for mask register writes.
    pub fn selector_mut(&mut self) -> &mut SelectorConfig {
        &mut self.config.selector
    }

    /// Returns the mask of meaningful data bits.
    pub fn word_mask(&self) -> DataWord {
        self.word_mask
    }

    /// Returns whether the row containing `addr` is inverted.
    pub fn inverts(&self, addr: u32) -> bool {
        self.config.selector.selects(self.config.row_field(addr))
    }

    /// Returns `data_in`, complemented if `addr` falls in a selected row.
    pub fn apply(&self, addr: u32, data_in: DataWord) -> DataWord {
        if self.inverts(addr) {
            !data_in & self.word_mask
        } else {
            data_in & self.word_mask
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverter(bits: u32, divisor: u32, selection: u64, row_shift: u32) -> RowInverter {
        let selector = SelectorConfig::new(bits, divisor, selection).unwrap();
        RowInverter::new(InverterConfig { selector, row_shift }, 32).unwrap()
    }

    #[test]
    fn decoded_config_keeps_selector_bound() {
        let wide = r#"{"selector":{"bits":7,"divisor_mask":0,"selection_mask":1},"row_shift":0}"#;
        assert!(serde_json::from_str::<InverterConfig>(wide).is_err());

        let ok = r#"{"selector":{"bits":3,"divisor_mask":7,"selection_mask":4},"row_shift":2}"#;
        let config: InverterConfig = serde_json::from_str(ok).unwrap();
        let inv = RowInverter::new(config, 32).unwrap();
        assert!(inv.inverts(2 << 2));
        assert!(!inv.inverts(3 << 2));
    }

    #[test]
    fn word_mask_bounds() {
        assert!(word_mask(0).is_err());
        assert!(word_mask(129).is_err());
        assert_eq!(word_mask(8).unwrap(), 0xff);
        assert_eq!(word_mask(128).unwrap(), DataWord::MAX);
    }

    #[test]
    fn unselected_passes_through() {
        let inv = inverter(2, 0b11, 0, 4);
        assert_eq!(inv.apply(0x30, 0xdead_beef), 0xdead_beef);
    }

    #[test]
    fn selected_row_complemented_within_width() {
        // Row field is addr[4..6]; row 3 is selected.
        let inv = inverter(2, 0b11, 0b1000, 4);
        assert_eq!(inv.apply(0x30, 0x0000_ffff), 0xffff_0000);
        assert_eq!(inv.apply(0x20, 0x0000_ffff), 0x0000_ffff);
        // Bits outside the row field do not matter.
        assert_eq!(inv.apply(0x1_0030, 0x0), 0xffff_ffff);
    }

    #[test]
    fn row_field_extraction() {
        let inv = inverter(3, 0b111, 0, 8);
        assert_eq!(inv.config().row_field(0x0000_0500), 5);
        assert_eq!(inv.config().row_field(0x0000_0f00), 7);
        assert_eq!(inv.config().row_field(0x0000_00ff), 0);
    }

    #[test]
    fn large_shift_reads_zero_field() {
        let inv = inverter(1, 1, 0b01, 40);
        assert!(inv.inverts(u32::MAX));
        assert_eq!(inv.config().row_field(u32::MAX), 0);
    }

    #[test]
    fn narrow_width_masks_input() {
        let selector = SelectorConfig::disabled(1).unwrap();
        let inv = RowInverter::new(
            InverterConfig {
                selector,
                row_shift: 0,
            },
            8,
        )
        .unwrap();
        assert_eq!(inv.apply(0, 0x1ff), 0xff);
    }

    #[test]
    fn selector_register_writes() {
        let mut inv = inverter(2, 0, 0, 0);
        assert!(!inv.inverts(1));
        inv.selector_mut().set_divisor_mask(0b11);
        inv.selector_mut().set_selection_mask(0b10);
        assert!(inv.inverts(1));
        assert!(!inv.inverts(2));
    }

    #[test]
    fn invalid_width_rejected() {
        let selector = SelectorConfig::disabled(0).unwrap();
        let cfg = InverterConfig {
            selector,
            row_shift: 0,
        };
        assert!(matches!(
            RowInverter::new(cfg, 200),
            Err(BistError::InvalidDataWidth { width: 200 })
        ));
    }
}
