//! Configuration types deserialized from `membist.toml`.

use std::fmt;

use membist_engine::DataWord;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// The top-level configuration parsed from `membist.toml`.
///
/// Every section has defaults except the pattern source, and `[region]`
/// which selects whole-region fills and checks.
#[derive(Debug, Default, Deserialize)]
pub struct MembistConfig {
    /// Engine geometry.
    #[serde(default)]
    pub engine: EngineSection,
    /// Simulated memory device.
    #[serde(default)]
    pub memory: MemorySection,
    /// Pattern source: explicit entries, data words, or a seeded random pattern.
    #[serde(default)]
    pub pattern: PatternSection,
    /// Region covered by data-word patterns.
    #[serde(default)]
    pub region: Option<RegionSection>,
    /// Run registers and limits.
    #[serde(default)]
    pub run: RunSection,
}

/// Construction-time engine geometry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Width of a data word in bits (1..=128).
    pub data_width: u32,
    /// Width of the row field used for inversion (0..=6).
    pub row_bits: u32,
    /// Position of the row field within the address.
    pub row_shift: u32,
    /// Pattern table depth.
    pub depth: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            data_width: 32,
            row_bits: 3,
            row_shift: 0,
            depth: 4,
        }
    }
}

/// Simulated memory device settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Maximum outstanding reads.
    pub fifo_depth: usize,
    /// Extra steps before a read response is available.
    pub latency: u32,
    /// Accept requests only every `throttle` steps.
    pub throttle: u32,
    /// Value of never-written words.
    pub fill: Word,
    /// Injected read faults.
    pub faults: Vec<FaultSpec>,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            fifo_depth: 4,
            latency: 2,
            throttle: 1,
            fill: Word(0),
            faults: Vec::new(),
        }
    }
}

/// A read fault at one address.
#[derive(Debug, Clone, Deserialize)]
pub struct FaultSpec {
    /// Faulty address.
    pub address: Word,
    /// How reads are corrupted.
    pub kind: FaultMode,
    /// XOR mask or stuck value.
    pub value: Word,
}

/// Fault behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    /// Flip the bits set in `value`.
    Xor,
    /// Always read `value`.
    Stuck,
}

/// Pattern source. Exactly one of the fields may be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternSection {
    /// Explicit `(address, data)` entries, run with the `[run]` registers.
    pub entries: Vec<EntrySpec>,
    /// Data words repeated over `[region]`.
    pub data: Vec<Word>,
    /// Seeded random data words repeated over `[region]`.
    pub random: Option<RandomPattern>,
}

/// One explicit pattern entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EntrySpec {
    /// Base address.
    pub address: Word,
    /// Data word.
    pub data: Word,
}

/// A reproducible random pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct RandomPattern {
    /// RNG seed.
    pub seed: u64,
    /// Number of data words (a power of two).
    pub length: usize,
}

/// A contiguous region of transport words.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionSection {
    /// First address.
    #[serde(default)]
    pub base: Word,
    /// Number of words (a power of two).
    pub words: Word,
}

/// Run registers and limits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Transfers per run; required with explicit entries.
    pub count: Option<Word>,
    /// Address offset mask.
    pub mem_mask: Word,
    /// Pattern index mask.
    pub data_mask: Word,
    /// Row inversion divisor mask.
    pub divisor_mask: Word,
    /// Row inversion selection bitmap.
    pub selection_mask: Word,
    /// Count mismatches without queueing them.
    pub skip_fifo: bool,
    /// Step limit per run.
    pub max_cycles: Option<u64>,
}

/// A numeric value written as an integer or as a decimal, hex (`0x`),
/// octal (`0o`), or binary (`0b`) string. Underscores are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Word(pub DataWord);

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct WordVisitor;

        impl<'de> Visitor<'de> for WordVisitor {
            type Value = Word;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a non-negative integer or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                DataWord::try_from(v)
                    .map(Word)
                    .map_err(|_| E::custom(format!("negative value {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Word(DataWord::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                parse_word(v).map(Word).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(WordVisitor)
    }
}

/// Parses a data word from decimal, `0x`, `0o`, or `0b` text.
pub fn parse_word(text: &str) -> Result<DataWord, String> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() || digits.starts_with('+') {
        return Err(format!("invalid number '{text}'"));
    }
    DataWord::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{text}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Holder {
        value: Word,
    }

    fn word(toml_value: &str) -> Result<Word, toml::de::Error> {
        toml::from_str::<Holder>(&format!("value = {toml_value}")).map(|h| h.value)
    }

    #[test]
    fn parse_word_radixes() {
        assert_eq!(parse_word("42"), Ok(42));
        assert_eq!(parse_word("0xFF"), Ok(0xff));
        assert_eq!(parse_word("0b1010"), Ok(10));
        assert_eq!(parse_word("0o17"), Ok(15));
        assert_eq!(parse_word("0x5555_5555"), Ok(0x5555_5555));
        assert_eq!(
            parse_word("0xffffffffffffffffffffffffffffffff"),
            Ok(u128::MAX)
        );
    }

    #[test]
    fn parse_word_rejects_garbage() {
        assert!(parse_word("").is_err());
        assert!(parse_word("0x").is_err());
        assert!(parse_word("0xg1").is_err());
        assert!(parse_word("-1").is_err());
        assert!(parse_word("0x+1").is_err());
    }

    #[test]
    fn word_from_integer_and_string() {
        assert_eq!(word("17").unwrap(), Word(17));
        assert_eq!(word("\"0x11\"").unwrap(), Word(17));
        assert_eq!(word("0x11").unwrap(), Word(17));
    }

    #[test]
    fn word_rejects_negative_and_bool() {
        assert!(word("-3").is_err());
        assert!(word("true").is_err());
    }

    #[test]
    fn section_defaults() {
        let config: MembistConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.data_width, 32);
        assert_eq!(config.engine.depth, 4);
        assert_eq!(config.memory.fifo_depth, 4);
        assert_eq!(config.memory.throttle, 1);
        assert!(config.region.is_none());
        assert!(config.run.count.is_none());
        assert!(!config.run.skip_fifo);
    }

    #[test]
    fn fault_modes() {
        let toml = r#"
[[memory.faults]]
address = "0x20"
kind = "stuck"
value = 0

[[memory.faults]]
address = 4
kind = "xor"
value = "0b11"
"#;
        let config: MembistConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.memory.faults.len(), 2);
        assert_eq!(config.memory.faults[0].kind, FaultMode::Stuck);
        assert_eq!(config.memory.faults[0].address, Word(0x20));
        assert_eq!(config.memory.faults[1].value, Word(3));
    }
}
