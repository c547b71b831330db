use std::collections::BTreeMap;

use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::space::{FloatRange, HyperparameterSpace, IntRange, Knob, Sampling, Value, invalid};
use crate::{MlErr, Result};

/// The interface a model builder draws its hyperparameters from.
///
/// Every knob is identified by its name, asking twice for the same name yields the same value.
pub trait Sampler {
    fn int(&mut self, name: &str, range: IntRange) -> Result<i64>;
    fn float(&mut self, name: &str, range: FloatRange) -> Result<f64>;
    fn choice(&mut self, name: &str, values: &[&str]) -> Result<String>;
}

/// A `Sampler` that records the space it's asked about and caches one value per knob.
///
/// Knobs that weren't fixed take their default value, or a random one if the sampler was
/// created with `random`.
#[derive(Debug, Clone, Default)]
pub struct HyperParameters {
    space: HyperparameterSpace,
    values: BTreeMap<String, Value>,
    fixed: BTreeMap<String, Value>,
    rng: Option<StdRng>,
}

impl HyperParameters {
    /// Creates a new `HyperParameters` that resolves every knob to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `HyperParameters` that samples every knob at random.
    pub fn random(seed: u64) -> Self {
        Self {
            rng: Some(StdRng::seed_from_u64(seed)),
            ..Self::default()
        }
    }

    /// Forces the value of a knob, it's checked against the knob's range when it's requested.
    pub fn fix(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.values.remove(&name);
        self.fixed.insert(name, value.into());
        self
    }

    pub fn space(&self) -> &HyperparameterSpace {
        &self.space
    }

    /// Returns every value resolved so far.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the fixed knobs nothing has asked about yet.
    pub fn unrequested(&self) -> Vec<&str> {
        self.fixed
            .keys()
            .filter(|name| self.space.get(name).is_none())
            .map(String::as_str)
            .collect()
    }

    fn store(&mut self, name: &str, value: Value) {
        debug!("hyperparameter {name} = {value}");
        self.values.insert(name.to_string(), value);
    }
}

impl Sampler for HyperParameters {
    fn int(&mut self, name: &str, range: IntRange) -> Result<i64> {
        range.validate(name)?;
        self.space.register(name, Knob::Int(range));

        let value = match (self.values.get(name), self.fixed.get(name)) {
            (Some(Value::Int(v)), _) => return Ok(*v),
            (Some(other), _) => return Err(wrong_kind(name, "an integer", other)),
            (None, Some(Value::Int(v))) if range.contains(*v) => *v,
            (None, Some(Value::Int(v))) => {
                return Err(invalid(name, format!("fixed value {v} is not in {range}")));
            }
            (None, Some(other)) => return Err(wrong_kind(name, "an integer", other)),
            (None, None) => match &mut self.rng {
                Some(rng) => {
                    let offset = rng.random_range(0..range.count()) * range.step.unsigned_abs();
                    range.min.wrapping_add_unsigned(offset)
                }
                None => range.default_value(),
            },
        };

        self.store(name, Value::Int(value));
        Ok(value)
    }

    fn float(&mut self, name: &str, range: FloatRange) -> Result<f64> {
        range.validate(name)?;
        self.space.register(name, Knob::Float(range));

        let fixed = match self.fixed.get(name) {
            Some(Value::Int(v)) => Some(*v as f64),
            Some(Value::Float(v)) => Some(*v),
            Some(other) => return Err(wrong_kind(name, "a float", other)),
            None => None,
        };

        let value = match (self.values.get(name), fixed) {
            (Some(Value::Float(v)), _) => return Ok(*v),
            (Some(other), _) => return Err(wrong_kind(name, "a float", other)),
            (None, Some(v)) if range.contains(v) => v,
            (None, Some(v)) => {
                return Err(invalid(
                    name,
                    format!("fixed value {v} is outside [{}, {}]", range.min, range.max),
                ));
            }
            (None, None) => match &mut self.rng {
                Some(rng) => sample_float(rng, &range),
                None => range.default_value(),
            },
        };

        self.store(name, Value::Float(value));
        Ok(value)
    }

    fn choice(&mut self, name: &str, values: &[&str]) -> Result<String> {
        if values.is_empty() {
            return Err(invalid(name, "there are no values to choose from".to_string()));
        }
        self.space.register(
            name,
            Knob::Choice(values.iter().map(|v| v.to_string()).collect()),
        );

        let value = match (self.values.get(name), self.fixed.get(name)) {
            (Some(Value::Choice(v)), _) => return Ok(v.clone()),
            (Some(other), _) => return Err(wrong_kind(name, "a choice", other)),
            (None, Some(Value::Choice(v))) if values.contains(&v.as_str()) => v.clone(),
            (None, Some(Value::Choice(v))) => {
                return Err(invalid(
                    name,
                    format!("fixed value '{v}' is not one of {values:?}"),
                ));
            }
            (None, Some(other)) => return Err(wrong_kind(name, "a choice", other)),
            (None, None) => {
                let i = match &mut self.rng {
                    Some(rng) => rng.random_range(0..values.len()),
                    None => 0,
                };
                values[i].to_string()
            }
        };

        self.store(name, Value::Choice(value.clone()));
        Ok(value)
    }
}

fn sample_float<R: Rng + ?Sized>(rng: &mut R, range: &FloatRange) -> f64 {
    if let Some(n) = range.grid_len() {
        let step = range.step.unwrap_or_default();
        let value = range.min + rng.random_range(0..n) as f64 * step;
        return value.min(range.max);
    }

    match range.sampling {
        Sampling::Linear => rng.random_range(range.min..=range.max),
        Sampling::Log => rng
            .random_range(range.min.ln()..=range.max.ln())
            .exp()
            .clamp(range.min, range.max),
    }
}

fn wrong_kind(name: &str, expected: &str, got: &Value) -> MlErr {
    invalid(name, format!("expected {expected}, got {got}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTERS: IntRange = IntRange::new(32, 128).with_step(32);
    const RATE: FloatRange = FloatRange::new(0., 0.5).with_step(0.1).with_default(0.3);
    const LR: FloatRange = FloatRange::new(1e-4, 1e-2)
        .with_sampling(Sampling::Log)
        .with_default(1e-3);

    #[test]
    fn defaults_resolve_to_the_declared_default_or_the_min() {
        let mut hp = HyperParameters::new();

        assert_eq!(hp.int("filters", FILTERS).unwrap(), 32);
        assert_eq!(hp.float("rate", RATE).unwrap(), 0.3);
        assert_eq!(hp.choice("pooling", &["avg", "max"]).unwrap(), "avg");
        assert_eq!(hp.space().len(), 3);
    }

    #[test]
    fn values_are_cached_per_name() {
        let mut hp = HyperParameters::random(11);

        let first = hp.float("rate", RATE).unwrap();
        for _ in 0..10 {
            assert_eq!(hp.float("rate", RATE).unwrap(), first);
        }
        assert_eq!(hp.values().len(), 1);
    }

    #[test]
    fn random_values_stay_on_the_grid() {
        for seed in 0..50 {
            let mut hp = HyperParameters::random(seed);

            let filters = hp.int("filters", FILTERS).unwrap();
            assert!(FILTERS.contains(filters));

            let rate = hp.float("rate", RATE).unwrap();
            let steps = rate / 0.1;
            assert!((0. ..=0.5).contains(&rate));
            assert!((steps - steps.round()).abs() < 1e-6);

            let lr = hp.float("lr", LR).unwrap();
            assert!((1e-4..=1e-2).contains(&lr));
        }
    }

    #[test]
    fn fixed_values_are_validated() {
        let mut hp = HyperParameters::random(0);
        hp.fix("filters", 64_i64)
            .fix("rate", 0_i64)
            .fix("pooling", "max");

        assert_eq!(hp.int("filters", FILTERS).unwrap(), 64);
        assert_eq!(hp.float("rate", RATE).unwrap(), 0.);
        assert_eq!(hp.choice("pooling", &["avg", "max"]).unwrap(), "max");

        hp.fix("filters", 50_i64)
            .fix("rate", 0.9)
            .fix("pooling", "min");
        assert!(hp.int("filters", FILTERS).is_err());
        assert!(hp.float("rate", RATE).is_err());
        assert!(hp.choice("pooling", &["avg", "max"]).is_err());

        hp.fix("filters", "many");
        assert!(hp.int("filters", FILTERS).is_err());
    }

    #[test]
    fn fixed_knobs_that_were_never_asked_about_are_reported() {
        let mut hp = HyperParameters::new();
        hp.fix("filters", 64_i64).fix("dropout_rate", 0.2);
        assert_eq!(hp.unrequested(), vec!["dropout_rate", "filters"]);

        hp.int("filters", FILTERS).unwrap();
        assert_eq!(hp.unrequested(), vec!["dropout_rate"]);
    }

    #[test]
    fn unindexable_grids_fail_instead_of_sampling() {
        let mut hp = HyperParameters::random(0);

        let tiny = FloatRange::new(0., 0.5).with_step(1e-320);
        assert!(matches!(
            hp.float("x", tiny),
            Err(MlErr::InvalidHyperParameter { .. })
        ));
        assert!(hp.int("n", IntRange::new(i64::MIN, i64::MAX)).is_err());
        assert!(hp.values().is_empty());

        let wide = IntRange::new(i64::MIN, i64::MAX).with_step(1 << 40);
        for seed in 0..20 {
            let mut hp = HyperParameters::random(seed);
            assert!(wide.contains(hp.int("wide", wide).unwrap()));
        }
    }

    #[test]
    fn same_seed_samples_the_same_values() {
        let sample = |seed| {
            let mut hp = HyperParameters::random(seed);
            (
                hp.int("filters", FILTERS).unwrap(),
                hp.float("lr", LR).unwrap(),
                hp.choice("pooling", &["avg", "max"]).unwrap(),
            )
        };

        assert_eq!(sample(5), sample(5));
    }
}
