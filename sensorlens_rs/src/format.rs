//! Value formatting for labels.

use std::fmt;

use serde::Serialize;

use crate::measurement::{SensorField, Unit};
use crate::representation::ValueSelection;

/// A display-ready value and its unit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormattedValue {
    pub value: String,
    pub unit: Unit,
}

impl fmt::Display for FormattedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Unit::None => f.write_str(&self.value),
            unit => write!(f, "{} {}", self.value, unit),
        }
    }
}

/// Format one field value.
///
/// Energy fields are rounded to 3 decimals, everything else prints as is.
/// Zero (and anything that is not a finite number) prints as `"0"`.
pub fn format_value(value: f64, field: SensorField) -> FormattedValue {
    let value = if field.is_energy() {
        literal((value * 1000.0).round() / 1000.0)
    } else {
        literal(value)
    };
    FormattedValue {
        value,
        unit: field.unit(),
    }
}

/// Format the value of an arbitrary selection. Formula results carry no unit.
pub fn format_selection(value: f64, selection: ValueSelection) -> FormattedValue {
    match selection {
        ValueSelection::Field(field) => format_value(value, field),
        ValueSelection::CustomFormula => FormattedValue {
            value: literal(value),
            unit: Unit::None,
        },
    }
}

/// Percentage label with two decimals, e.g. `"12.5 %"`.
pub fn format_percentage(percentage: f64) -> String {
    let rounded = (percentage * 100.0).round() / 100.0;
    format!("{} %", literal(rounded))
}

fn literal(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}
