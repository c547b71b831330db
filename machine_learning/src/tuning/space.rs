use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The largest grid a stepped knob may span.
const MAX_GRID_LEN: u64 = 1 << 32;

/// How a float knob is spread over its range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    #[default]
    Linear,
    Log,
}

/// An integer knob: `min..=max` in steps of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: Option<i64>,
}

impl IntRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self {
            min,
            max,
            step: 1,
            default: None,
        }
    }

    pub const fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    pub const fn with_default(mut self, default: i64) -> Self {
        self.default = Some(default);
        self
    }

    /// The value used when the knob isn't sampled, `min` if there's no default.
    pub fn default_value(&self) -> i64 {
        self.default.unwrap_or(self.min)
    }

    /// The amount of values the knob can take.
    pub fn count(&self) -> u64 {
        (self.max.abs_diff(self.min) / self.step.max(1).unsigned_abs()).saturating_add(1)
    }

    pub fn contains(&self, value: i64) -> bool {
        self.step > 0
            && (self.min..=self.max).contains(&value)
            && value.abs_diff(self.min) % self.step.unsigned_abs() == 0
    }

    pub(super) fn validate(&self, name: &str) -> Result<()> {
        if self.step <= 0 {
            return Err(invalid(name, format!("step must be positive, got {}", self.step)));
        }

        if self.min > self.max {
            return Err(invalid(
                name,
                format!("min {} is greater than max {}", self.min, self.max),
            ));
        }

        if self.count() > MAX_GRID_LEN {
            return Err(invalid(name, format!("{self} has too many values")));
        }

        match self.default {
            Some(default) if !self.contains(default) => Err(invalid(
                name,
                format!("default {default} is not one of the values of {self}"),
            )),
            _ => Ok(()),
        }
    }
}

impl Display for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] step {}", self.min, self.max, self.step)
    }
}

/// A float knob over `[min, max]`, on a grid when `step` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f64,
    pub max: f64,
    pub step: Option<f64>,
    #[serde(default)]
    pub sampling: Sampling,
    pub default: Option<f64>,
}

impl FloatRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            step: None,
            sampling: Sampling::Linear,
            default: None,
        }
    }

    pub const fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub const fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub const fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn default_value(&self) -> f64 {
        self.default.unwrap_or(self.min)
    }

    /// The amount of grid points, if the knob is stepped.
    pub fn grid_len(&self) -> Option<u64> {
        // The tolerance keeps `0.5 / 0.1` from rounding down to 4
        self.step
            .map(|step| (((self.max - self.min) / step + 1e-9).floor() as u64).saturating_add(1))
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub(super) fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(invalid(
                name,
                format!("[{}, {}] is not a valid range", self.min, self.max),
            ));
        }

        match (self.step, self.sampling) {
            (Some(step), _) if step.is_nan() || step <= 0. => {
                return Err(invalid(name, format!("step must be positive, got {step}")));
            }
            (Some(step), _) if !((self.max - self.min) / step < MAX_GRID_LEN as f64) => {
                return Err(invalid(
                    name,
                    format!("step {step} makes too many points in [{}, {}]", self.min, self.max),
                ));
            }
            (Some(_), Sampling::Log) => {
                return Err(invalid(name, "log sampling can't be stepped".to_string()));
            }
            (None, Sampling::Log) if self.min <= 0. => {
                return Err(invalid(
                    name,
                    format!("log sampling needs a positive min, got {}", self.min),
                ));
            }
            _ => {}
        }

        match self.default {
            Some(default) if !self.contains(default) => Err(invalid(
                name,
                format!("default {default} is outside [{}, {}]", self.min, self.max),
            )),
            _ => Ok(()),
        }
    }
}

/// The kind and range of a knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Knob {
    Int(IntRange),
    Float(FloatRange),
    Choice(Vec<String>),
}

/// A named knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameter {
    pub name: String,
    pub knob: Knob,
}

/// Every knob a search asked about, in the order they were first asked about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpace {
    knobs: Vec<HyperParameter>,
}

impl HyperparameterSpace {
    pub fn get(&self, name: &str) -> Option<&Knob> {
        self.knobs
            .iter()
            .find_map(|hp| (hp.name == name).then_some(&hp.knob))
    }

    pub fn iter(&self) -> impl Iterator<Item = &HyperParameter> {
        self.knobs.iter()
    }

    pub fn len(&self) -> usize {
        self.knobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    /// Records a knob, keeping the first registration of every name.
    pub(super) fn register(&mut self, name: &str, knob: Knob) {
        if self.get(name).is_none() {
            self.knobs.push(HyperParameter {
                name: name.to_string(),
                knob,
            });
        }
    }
}

/// The value a knob took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Choice(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Choice(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Choice(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Choice(value)
    }
}

pub(super) fn invalid(name: &str, reason: String) -> MlErr {
    MlErr::InvalidHyperParameter {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_ranges_count_their_values() {
        assert_eq!(IntRange::new(32, 128).with_step(32).count(), 4);
        assert_eq!(IntRange::new(1, 4).count(), 4);
        assert_eq!(FloatRange::new(0., 0.5).with_step(0.1).grid_len(), Some(6));
    }

    #[test]
    fn inconsistent_ranges_are_rejected() {
        assert!(IntRange::new(4, 1).validate("n").is_err());
        assert!(IntRange::new(1, 4).with_step(0).validate("n").is_err());
        assert!(IntRange::new(32, 128).with_step(32).with_default(50).validate("n").is_err());
        assert!(
            FloatRange::new(0., 1e-2)
                .with_sampling(Sampling::Log)
                .validate("lr")
                .is_err()
        );
        assert!(FloatRange::new(0., 0.5).with_default(0.7).validate("p").is_err());
        assert!(FloatRange::new(0., 0.5).with_step(0.1).validate("p").is_ok());
    }

    #[test]
    fn oversized_grids_are_rejected() {
        assert!(IntRange::new(i64::MIN, i64::MAX).validate("n").is_err());
        assert_eq!(IntRange::new(i64::MIN, i64::MAX).count(), u64::MAX);
        assert!(IntRange::new(i64::MIN, i64::MAX).with_step(1 << 40).validate("n").is_ok());

        let tiny = FloatRange::new(0., 0.5).with_step(1e-320);
        assert!(tiny.validate("x").is_err());
        assert_eq!(tiny.grid_len(), Some(u64::MAX));
        assert!(FloatRange::new(0., f64::MAX).with_step(f64::MIN_POSITIVE).validate("x").is_err());
    }

    #[test]
    fn values_deserialize_by_shape() {
        let values: Vec<Value> = serde_json::from_str(r#"[3, 0.25, "max"]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Int(3), Value::Float(0.25), Value::Choice("max".to_string())]
        );
    }
}
