use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use chrono::{FixedOffset, Offset, Utc};
use partiql_error::{PartiqlError, Result};
use serde::Serialize;

/// What to do when a variable can't be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedVariableBehavior {
    /// Report an error and replace the reference with an error node.
    Error,
    /// Report a warning and defer the lookup to run time.
    Permissive,
}

/// How scans treat values of an unexpected type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingMode {
    /// Scanning a non-collection is a run time error.
    Strict,
    /// Scanning a non-collection wraps it in a single element bag, and
    /// operations on mistyped values produce MISSING.
    Permissive,
}

/// Configuration for a planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub undefined_variable_behavior: UndefinedVariableBehavior,
    /// Offset applied to TIME literals written without one.
    pub default_timezone: FixedOffset,
    pub typing_mode: TypingMode,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            undefined_variable_behavior: UndefinedVariableBehavior::Error,
            default_timezone: utc(),
            typing_mode: TypingMode::Permissive,
        }
    }
}

impl PlannerConfig {
    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| PartiqlError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| PartiqlError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();

        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| PartiqlError::new(format!("Missing setting for '{name}'")))?;

        let value = (func.get)(&def_conf);
        (func.set)(&value, self)
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    /// Names and descriptions of all settings, sorted by name.
    pub fn settings() -> Vec<(&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, funcs)| (*name, funcs.description))
            .collect();
        settings.sort_unstable();
        settings
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(value: &str, conf: &mut PlannerConfig) -> Result<()>,
    get: fn(conf: &PlannerConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: PlannerSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: PlannerSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<UndefinedVariable>(&mut map);
    insert_setting::<DefaultTimezone>(&mut map);
    insert_setting::<Typing>(&mut map);

    map
});

pub trait PlannerSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()>;
    fn get_as_string(conf: &PlannerConfig) -> String;
}

pub struct UndefinedVariable;

impl PlannerSetting for UndefinedVariable {
    const NAME: &'static str = "undefined_variable_behavior";
    const DESCRIPTION: &'static str =
        "How to handle unresolvable variables, either 'error' or 'permissive'";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.undefined_variable_behavior = match value.to_ascii_lowercase().as_str() {
            "error" => UndefinedVariableBehavior::Error,
            "permissive" => UndefinedVariableBehavior::Permissive,
            other => {
                return Err(PartiqlError::new(format!(
                    "Invalid value for {}: {other}",
                    Self::NAME
                )));
            }
        };
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        match conf.undefined_variable_behavior {
            UndefinedVariableBehavior::Error => "error".to_string(),
            UndefinedVariableBehavior::Permissive => "permissive".to_string(),
        }
    }
}

pub struct DefaultTimezone;

impl PlannerSetting for DefaultTimezone {
    const NAME: &'static str = "default_timezone";
    const DESCRIPTION: &'static str = "Offset for TIME literals without one, formatted as '+HH:MM'";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.default_timezone = parse_offset(value)?;
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        conf.default_timezone.to_string()
    }
}

pub struct Typing;

impl PlannerSetting for Typing {
    const NAME: &'static str = "typing_mode";
    const DESCRIPTION: &'static str = "Scan behavior for mistyped values, either 'strict' or 'permissive'";

    fn set_from_str(value: &str, conf: &mut PlannerConfig) -> Result<()> {
        conf.typing_mode = match value.to_ascii_lowercase().as_str() {
            "strict" => TypingMode::Strict,
            "permissive" => TypingMode::Permissive,
            other => {
                return Err(PartiqlError::new(format!(
                    "Invalid value for {}: {other}",
                    Self::NAME
                )));
            }
        };
        Ok(())
    }

    fn get_as_string(conf: &PlannerConfig) -> String {
        match conf.typing_mode {
            TypingMode::Strict => "strict".to_string(),
            TypingMode::Permissive => "permissive".to_string(),
        }
    }
}

impl fmt::Display for TypingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse an offset of the form `+HH:MM` or `-HH:MM`.
fn parse_offset(s: &str) -> Result<FixedOffset> {
    let invalid = || PartiqlError::new(format!("Invalid timezone offset: '{s}', expected '+HH:MM'"));

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
