use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::Value;

use crate::error::{LibError, Result};

/// Linear map of the numeric values into `[to_lower, to_upper]`, rounded to 3 decimals.
///
/// The source range is the observed min/max unless `from` is given. A constant column
/// maps to the midpoint of the target range. Non-numeric values become `null`.
pub fn rescale(values: &[Value], to: (f64, f64), from: Option<(f64, f64)>) -> Vec<Value> {
    let numbers = values.iter().map(Value::as_f64).collect::<Vec<_>>();
    let (lo, hi) = match from {
        Some(range) => range,
        None => {
            let present = numbers.iter().flatten().copied();
            let lo = present.clone().fold(f64::INFINITY, f64::min);
            let hi = present.fold(f64::NEG_INFINITY, f64::max);
            (lo, hi)
        }
    };

    numbers
        .into_iter()
        .map(|number| {
            let Some(x) = number else {
                return Value::Null;
            };
            let scaled = if (hi - lo).abs() < f64::EPSILON {
                (to.0 + to.1) / 2.0
            } else {
                to.0 + (x - lo) / (hi - lo) * (to.1 - to.0)
            };
            serde_json::Number::from_f64(round3(scaled)).map_or(Value::Null, Value::Number)
        })
        .collect()
}

/// Assigns a palette color to every value.
///
/// Numeric columns are cut into `palette.len()` equal-width bins over their range; any
/// other column is treated as categorical, giving each distinct value the next color in
/// first-appearance order and cycling when the palette runs out. `null` stays `null`.
pub fn colorize(values: &[Value], palette: &[String]) -> Result<Vec<Value>> {
    if palette.is_empty() {
        return Err(LibError::invalid(
            "A color palette needs at least one color",
            anyhow!("empty palette"),
        ));
    }

    let numeric = values.iter().all(|value| value.is_null() || value.is_number());
    if numeric {
        return Ok(colorize_numeric(values, palette));
    }

    let mut categories: HashMap<String, usize> = HashMap::new();
    Ok(values
        .iter()
        .map(|value| {
            if value.is_null() {
                return Value::Null;
            }
            let key = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let next = categories.len();
            let slot = *categories.entry(key).or_insert(next);
            Value::String(palette[slot % palette.len()].clone())
        })
        .collect())
}

fn colorize_numeric(values: &[Value], palette: &[String]) -> Vec<Value> {
    let numbers = values.iter().map(Value::as_f64).collect::<Vec<_>>();
    let lo = numbers.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let hi = numbers
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let bins = palette.len();

    numbers
        .into_iter()
        .map(|number| {
            let Some(x) = number else {
                return Value::Null;
            };
            let bin = if (hi - lo).abs() < f64::EPSILON {
                0
            } else {
                let position = (x - lo) / (hi - lo) * bins as f64;
                (position.floor() as usize).min(bins - 1)
            };
            Value::String(palette[bin].clone())
        })
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
