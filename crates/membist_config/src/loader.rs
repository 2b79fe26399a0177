//! Configuration file loading and validation.

use std::path::Path;

use membist_engine::inverter::MAX_DATA_WIDTH;
use membist_engine::selector::MAX_SELECTOR_BITS;

use crate::error::ConfigError;
use crate::types::MembistConfig;

/// File name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "membist.toml";

/// Loads and validates `membist.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<MembistConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<MembistConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<MembistConfig, ConfigError> {
    let config: MembistConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

/// Validates ranges and the consistency of the pattern source with the run mode.
fn validate_config(config: &MembistConfig) -> Result<(), ConfigError> {
    let engine = &config.engine;
    if engine.data_width == 0 || engine.data_width > MAX_DATA_WIDTH {
        return Err(invalid(format!(
            "engine.data_width must be between 1 and {MAX_DATA_WIDTH}, got {}",
            engine.data_width
        )));
    }
    if engine.row_bits > MAX_SELECTOR_BITS {
        return Err(invalid(format!(
            "engine.row_bits must be at most {MAX_SELECTOR_BITS}, got {}",
            engine.row_bits
        )));
    }
    if engine.depth == 0 {
        return Err(invalid("engine.depth must be at least 1".to_string()));
    }
    if config.memory.fifo_depth == 0 {
        return Err(invalid("memory.fifo_depth must be at least 1".to_string()));
    }
    if config.memory.throttle == 0 {
        return Err(invalid("memory.throttle must be at least 1".to_string()));
    }

    let pattern = &config.pattern;
    let sources = [
        !pattern.entries.is_empty(),
        !pattern.data.is_empty(),
        pattern.random.is_some(),
    ];
    match sources.iter().filter(|&&set| set).count() {
        0 => return Err(ConfigError::MissingField("pattern".to_string())),
        1 => {}
        _ => {
            return Err(invalid(
                "pattern: set only one of entries, data, random".to_string(),
            ))
        }
    }

    if !pattern.entries.is_empty() {
        if pattern.entries.len() > engine.depth {
            return Err(invalid(format!(
                "pattern.entries has {} entries but engine.depth is {}",
                pattern.entries.len(),
                engine.depth
            )));
        }
        if config.run.count.is_none() {
            return Err(ConfigError::MissingField("run.count".to_string()));
        }
        if config.region.is_some() {
            return Err(invalid(
                "[region] applies to pattern.data and pattern.random, not pattern.entries"
                    .to_string(),
            ));
        }
        return Ok(());
    }

    let length = match &pattern.random {
        Some(random) => random.length,
        None => pattern.data.len(),
    };
    if !length.is_power_of_two() {
        return Err(invalid(format!(
            "pattern length must be a power of two, got {length}"
        )));
    }
    if length > engine.depth {
        return Err(invalid(format!(
            "pattern length {length} exceeds engine.depth {}",
            engine.depth
        )));
    }
    let Some(region) = &config.region else {
        return Err(ConfigError::MissingField("region.words".to_string()));
    };
    if !region.words.0.is_power_of_two() {
        return Err(invalid(format!(
            "region.words must be a power of two, got {}",
            region.words.0
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Word;

    #[test]
    fn parse_region_config() {
        let toml = r#"
[engine]
data_width = 64

[pattern]
data = ["0x5555_5555_5555_5555", "0xaaaa_aaaa_aaaa_aaaa"]

[region]
base = "0x1000"
words = 1024

[run]
skip_fifo = true
max_cycles = 100000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.engine.data_width, 64);
        assert_eq!(config.pattern.data.len(), 2);
        let region = config.region.unwrap();
        assert_eq!(region.base, Word(0x1000));
        assert_eq!(region.words, Word(1024));
        assert!(config.run.skip_fifo);
        assert_eq!(config.run.max_cycles, Some(100_000));
    }

    #[test]
    fn parse_entries_config() {
        let toml = r#"
[engine]
depth = 2

[[pattern.entries]]
address = "0x10"
data = "0xaa"

[[pattern.entries]]
address = "0x20"
data = "0x55"

[run]
count = 4
data_mask = 1
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.pattern.entries.len(), 2);
        assert_eq!(config.run.count, Some(Word(4)));
    }

    #[test]
    fn missing_pattern_errors() {
        let err = load_config_from_str("[engine]\ndepth = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "pattern"));
    }

    #[test]
    fn two_pattern_sources_error() {
        let toml = r#"
[pattern]
data = [1]
random = { seed = 1, length = 1 }

[region]
words = 4
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn entries_require_count() {
        let toml = r#"
[[pattern.entries]]
address = 0
data = 1
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "run.count"));
    }

    #[test]
    fn data_requires_region() {
        let err = load_config_from_str("[pattern]\ndata = [1]\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "region.words"));
    }

    #[test]
    fn range_checks() {
        for toml in [
            "[engine]\ndata_width = 0\n[pattern]\ndata = [1]\n[region]\nwords = 4\n",
            "[engine]\ndata_width = 129\n[pattern]\ndata = [1]\n[region]\nwords = 4\n",
            "[engine]\nrow_bits = 7\n[pattern]\ndata = [1]\n[region]\nwords = 4\n",
            "[engine]\ndepth = 0\n[pattern]\ndata = [1]\n[region]\nwords = 4\n",
            "[memory]\nthrottle = 0\n[pattern]\ndata = [1]\n[region]\nwords = 4\n",
            "[pattern]\ndata = [1, 2, 3]\n[region]\nwords = 4\n",
            "[pattern]\ndata = [1]\n[region]\nwords = 6\n",
            "[engine]\ndepth = 1\n[pattern]\ndata = [1, 2]\n[region]\nwords = 4\n",
        ] {
            let err = load_config_from_str(toml).unwrap_err();
            assert!(
                matches!(err, ConfigError::ValidationError(_)),
                "expected validation error for {toml:?}, got {err}"
            );
        }
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn bad_number_is_parse_error() {
        let err = load_config_from_str("[pattern]\ndata = [\"0xzz\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(msg) if msg.contains("0xzz")));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[pattern]\nrandom = { seed = 7, length = 4 }\n[region]\nwords = 64\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.pattern.random.unwrap().length, 4);
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
