//! Utilities shared across commands.

use anyhow::{Context, Result, bail};
use std::path::Path;
use tarn_core::{EngineConfig, EngineProfile, FuncType, Value, ValueType};

/// Loads the engine configuration.
///
/// A TOML file overrides the preset; missing keys in the file take the
/// moderate defaults.
///
/// # Examples
///
/// ```
/// use tarn_cli::commands::common::load_config;
/// use tarn_core::EngineProfile;
///
/// let config = load_config(None, EngineProfile::Strict).unwrap();
/// assert_eq!(config.max_call_depth, 256);
/// ```
pub fn load_config(path: Option<&Path>, profile: EngineProfile) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::from_profile(profile));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: EngineConfig = toml::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    config.validate()?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Reads a module binary from disk.
pub fn read_module(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read module {}", path.display()))
}

/// Parses command-line arguments into values of the parameter kinds of `ty`.
///
/// Integers accept decimal or `0x` hex; i32 also accepts unsigned values
/// up to `u32::MAX`, which wrap. Reference parameters only accept `null`.
///
/// # Examples
///
/// ```
/// use tarn_cli::commands::common::parse_args;
/// use tarn_core::{FuncType, Value};
///
/// let ty = FuncType::from_tags("i", "iId").unwrap();
/// let args = parse_args(&ty, &["-1".into(), "0x10".into(), "2.5".into()]).unwrap();
/// assert_eq!(args, vec![Value::I32(-1), Value::I64(16), Value::F64(2.5)]);
/// ```
pub fn parse_args(ty: &FuncType, raw: &[String]) -> Result<Vec<Value>> {
    if raw.len() != ty.params().len() {
        bail!(
            "expected {} argument(s) for {ty}, got {}",
            ty.params().len(),
            raw.len()
        );
    }
    ty.params()
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(i, (kind, text))| {
            parse_value(*kind, text)
                .with_context(|| format!("argument {} ('{text}') is not a valid {kind}", i + 1))
        })
        .collect()
}

fn parse_int(text: &str) -> Result<i128> {
    let (negative, digits) = text
        .strip_prefix('-')
        .map_or((false, text), |rest| (true, rest));
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16)?,
        None => digits.parse::<i128>()?,
    };
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_value(kind: ValueType, text: &str) -> Result<Value> {
    let value = match kind {
        ValueType::I32 => {
            let n = parse_int(text)?;
            if !(i128::from(i32::MIN)..=i128::from(u32::MAX)).contains(&n) {
                bail!("out of range");
            }
            Value::I32(n as u32 as i32)
        }
        ValueType::I64 => {
            let n = parse_int(text)?;
            if !(i128::from(i64::MIN)..=i128::from(u64::MAX)).contains(&n) {
                bail!("out of range");
            }
            Value::I64(n as u64 as i64)
        }
        ValueType::F32 => Value::F32(text.parse()?),
        ValueType::F64 => Value::F64(text.parse()?),
        ValueType::FuncRef | ValueType::ExternRef => {
            if text != "null" {
                bail!("only null references can be passed");
            }
            kind.default_value()
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_arity() {
        let ty = FuncType::from_tags("i", "ii").unwrap();
        let err = parse_args(&ty, &["1".to_string()]).unwrap_err();
        assert!(err.to_string().contains("expected 2 argument(s)"));
    }

    #[test]
    fn test_parse_i32_wraps_unsigned() {
        assert_eq!(
            parse_value(ValueType::I32, "4294967295").unwrap(),
            Value::I32(-1)
        );
        assert_eq!(
            parse_value(ValueType::I32, "-2147483648").unwrap(),
            Value::I32(i32::MIN)
        );
        assert!(parse_value(ValueType::I32, "4294967296").is_err());
        assert!(parse_value(ValueType::I32, "abc").is_err());
    }

    #[test]
    fn test_parse_i64_hex() {
        assert_eq!(
            parse_value(ValueType::I64, "0xff").unwrap(),
            Value::I64(255)
        );
        assert_eq!(
            parse_value(ValueType::I64, "-0x10").unwrap(),
            Value::I64(-16)
        );
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(
            parse_value(ValueType::FuncRef, "null").unwrap(),
            Value::FuncRef(None)
        );
        assert!(parse_value(ValueType::ExternRef, "7").is_err());
    }

    #[test]
    fn test_parse_argument_error_names_position() {
        let ty = FuncType::from_tags("v", "if").unwrap();
        let err = parse_args(&ty, &["1".to_string(), "x".to_string()]).unwrap_err();
        assert!(format!("{err:#}").contains("argument 2 ('x') is not a valid f32"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tarn.toml");
        std::fs::write(&path, "max_call_depth = 77\nstep_budget = 1000\n").unwrap();
        let config = load_config(Some(&path), EngineProfile::Permissive).unwrap();
        assert_eq!(config.max_call_depth, 77);
        assert_eq!(config.step_budget, Some(1000));
    }

    #[test]
    fn test_load_config_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tarn.toml");
        std::fs::write(&path, "max_depth = 77\n").unwrap();
        assert!(load_config(Some(&path), EngineProfile::Moderate).is_err());
    }
}
