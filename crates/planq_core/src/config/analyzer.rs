use std::collections::HashMap;
use std::sync::LazyLock;

use planq_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use crate::arrays::scalar::ScalarValue;

pub const DEFAULT_MAX_BATCH_ITERATIONS: usize = 8;

/// Configuration for plan analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Iteration cap for batches that run to a fixed point.
    pub max_batch_iterations: usize,
    pub enable_pushdown: bool,
    pub enable_indexed_joins: bool,
    pub apply_triggers: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            max_batch_iterations: DEFAULT_MAX_BATCH_ITERATIONS,
            enable_pushdown: true,
            enable_indexed_joins: true,
            apply_triggers: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn set_from_scalar(&mut self, name: &str, value: ScalarValue) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let value = def_conf.get_as_scalar(name)?;
        self.set_from_scalar(name, value)
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
    set: fn(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()>,
    get: fn(conf: &AnalyzerConfig) -> ScalarValue,
}

impl SettingFunctions {
    const fn new<S: AnalyzerSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
        }
    }
}

fn insert_setting<S: AnalyzerSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<MaxBatchIterations>(&mut map);
    insert_setting::<EnablePushdown>(&mut map);
    insert_setting::<EnableIndexedJoins>(&mut map);
    insert_setting::<ApplyTriggers>(&mut map);

    map
});

pub trait AnalyzerSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()>;
    fn get_as_scalar(conf: &AnalyzerConfig) -> ScalarValue;
}

pub struct MaxBatchIterations;

impl AnalyzerSetting for MaxBatchIterations {
    const NAME: &'static str = "max_batch_iterations";
    const DESCRIPTION: &'static str = "Iteration cap for fixed-point analyzer batches";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()> {
        let val = scalar.try_as_i64()?;
        if val < 1 {
            return Err(DbError::new("max_batch_iterations must be at least 1")
                .with_field("value", val));
        }
        conf.max_batch_iterations = val as usize;
        Ok(())
    }

    fn get_as_scalar(conf: &AnalyzerConfig) -> ScalarValue {
        ScalarValue::Int64(conf.max_batch_iterations as i64)
    }
}

pub struct EnablePushdown;

impl AnalyzerSetting for EnablePushdown {
    const NAME: &'static str = "enable_pushdown";
    const DESCRIPTION: &'static str = "Controls if projection, filter and index pushdown run";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()> {
        conf.enable_pushdown = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &AnalyzerConfig) -> ScalarValue {
        conf.enable_pushdown.into()
    }
}

pub struct EnableIndexedJoins;

impl AnalyzerSetting for EnableIndexedJoins {
    const NAME: &'static str = "enable_indexed_joins";
    const DESCRIPTION: &'static str = "Controls if joins are planned as indexed joins";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()> {
        conf.enable_indexed_joins = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &AnalyzerConfig) -> ScalarValue {
        conf.enable_indexed_joins.into()
    }
}

pub struct ApplyTriggers;

impl AnalyzerSetting for ApplyTriggers {
    const NAME: &'static str = "apply_triggers";
    const DESCRIPTION: &'static str = "Controls if stored triggers are applied to mutations";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut AnalyzerConfig) -> Result<()> {
        conf.apply_triggers = scalar.try_as_bool()?;
        Ok(())
    }

    fn get_as_scalar(conf: &AnalyzerConfig) -> ScalarValue {
        conf.apply_triggers.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_reset() {
        let mut conf = AnalyzerConfig::default();
        conf.set_from_scalar("enable_pushdown", false.into()).unwrap();
        assert_eq!(
            ScalarValue::Boolean(false),
            conf.get_as_scalar("enable_pushdown").unwrap()
        );

        conf.reset("enable_pushdown").unwrap();
        assert!(conf.enable_pushdown);
    }

    #[test]
    fn invalid_iterations() {
        let mut conf = AnalyzerConfig::default();
        conf.set_from_scalar("max_batch_iterations", ScalarValue::Int64(0))
            .unwrap_err();
        conf.set_from_scalar("max_batch_iterations", ScalarValue::Int64(3))
            .unwrap();
        assert_eq!(3, conf.max_batch_iterations);
    }

    #[test]
    fn unknown_setting() {
        let mut conf = AnalyzerConfig::default();
        conf.set_from_scalar("does_not_exist", true.into())
            .unwrap_err();
    }

    #[test]
    fn deserialize_partial() {
        let conf: AnalyzerConfig = serde_json::from_str(r#"{"apply_triggers": false}"#).unwrap();
        assert!(!conf.apply_triggers);
        assert_eq!(DEFAULT_MAX_BATCH_ITERATIONS, conf.max_batch_iterations);
    }

    #[test]
    fn settings_listed() {
        let names: Vec<_> = AnalyzerConfig::settings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            vec![
                "apply_triggers",
                "enable_indexed_joins",
                "enable_pushdown",
                "max_batch_iterations"
            ],
            names
        );
    }
}
