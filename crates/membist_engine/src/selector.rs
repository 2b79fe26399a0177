//! Bitmap-driven address selection.
//!
//! An address field is reduced with `divisor_mask` to a row number in
//! `0..2^bits`, and `selection_mask` holds one bit per row. Zeroing bits of
//! `divisor_mask` folds many rows onto the same quotient, so bit 0 of the
//! selection mask can act as an "every Nth row" rule.

use serde::{Deserialize, Serialize};

use crate::error::BistError;

/// Widest supported selector field. The selection bitmap has `2^bits` bits,
/// so 6 bits gives a 64-bit bitmap.
pub const MAX_SELECTOR_BITS: u32 = 6;

/// Returns whether `address` is selected by the given masks.
///
/// `quotient = address & divisor_mask` names a row and the result is that
/// row's bit in `selection_mask`. Quotients of 64 or more select nothing.
pub fn is_selected(address: u32, divisor_mask: u32, selection_mask: u64) -> bool {
    let quotient = address & divisor_mask;
    selection_mask.checked_shr(quotient).unwrap_or(0) & 1 != 0
}

/// Selector parameters: field width plus the two mask registers.
///
/// Deserialization goes through [`SelectorConfig::new`], so the width bound
/// and the mask truncation hold for decoded values too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSelector")]
pub struct SelectorConfig {
    bits: u32,
    divisor_mask: u32,
    selection_mask: u64,
}

#[derive(Deserialize)]
struct RawSelector {
    bits: u32,
    divisor_mask: u32,
    selection_mask: u64,
}

impl TryFrom<RawSelector> for SelectorConfig {
    type Error = BistError;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        Self::new(raw.bits, raw.divisor_mask, raw.selection_mask)
    }
}

impl SelectorConfig {
    /// Creates a selector over a `bits`-wide field.
    ///
    /// The masks are truncated to their register widths (`bits` and `2^bits`).
    /// Fails if `bits` exceeds [`MAX_SELECTOR_BITS`].
    pub fn new(bits: u32, divisor_mask: u32, selection_mask: u64) -> Result<Self, BistError> {
        if bits > MAX_SELECTOR_BITS {
            return Err(BistError::RowBitsTooLarge {
                bits,
                max: MAX_SELECTOR_BITS,
            });
        }
        let mut config = Self {
            bits,
            divisor_mask: 0,
            selection_mask: 0,
        };
        config.set_divisor_mask(divisor_mask);
        config.set_selection_mask(selection_mask);
        Ok(config)
    }

    /// Creates a selector that selects nothing.
    pub fn disabled(bits: u32) -> Result<Self, BistError> {
        Self::new(bits, 0, 0)
    }

    /// Width of the address field in bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Current divisor mask.
    pub fn divisor_mask(&self) -> u32 {
        self.divisor_mask
    }

    /// Current selection bitmap.
    pub fn selection_mask(&self) -> u64 {
        self.selection_mask
    }

    /// Mask covering the `bits`-wide address field.
    pub fn field_mask(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Mask covering the `2^bits`-wide selection bitmap.
    pub fn bitmap_mask(&self) -> u64 {
        let rows = 1u32 << self.bits;
        if rows >= u64::BITS {
            u64::MAX
        } else {
            (1u64 << rows) - 1
        }
    }

    /// Writes the divisor mask register, truncated to `bits` bits.
    pub fn set_divisor_mask(&mut self, mask: u32) {
        self.divisor_mask = mask & self.field_mask();
    }

    /// Writes the selection mask register, truncated to `2^bits` bits.
    pub fn set_selection_mask(&mut self, mask: u64) {
        self.selection_mask = mask & self.bitmap_mask();
    }

    /// Returns whether the field value `address` is selected.
    pub fn selects(&self, address: u32) -> bool {
        is_selected(
            address & self.field_mask(),
            self.divisor_mask,
            self.selection_mask,
        )
    }
}
