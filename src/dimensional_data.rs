use serde::{Deserialize, Serialize};

use crate::units::{Unit, UnitConvertible, UnitSystem};
use std::fmt::{self, Display};
use std::str::FromStr;

/// NDBC missing-data sentinels. These must surface as absent values,
/// never as zeros.
const MISSING_TOKENS: [&str; 5] = ["MM", "99.0", "99.00", "999.0", "999"];

pub fn is_missing_token(raw: &str) -> bool {
    MISSING_TOKENS.contains(&raw.trim())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DimensionalData<T> {
    pub value: Option<T>,
    pub variable_name: String,
    pub unit: Unit,
}

impl<T> DimensionalData<T>
where
    T: FromStr,
{
    pub fn from_raw_data(raw_data: &str, variable_name: &str, unit: Unit) -> DimensionalData<T> {
        let value = if is_missing_token(raw_data) {
            None
        } else {
            raw_data.trim().parse().ok()
        };

        DimensionalData {
            value,
            variable_name: variable_name.into(),
            unit,
        }
    }
}

impl<T> DimensionalData<T>
where
    T: Display,
{
    pub fn unit_label(&self) -> &'static str {
        self.unit.abbreviation()
    }

    pub fn try_string(&self) -> Option<String> {
        self.value.as_ref().map(|_| self.to_string())
    }
}

impl UnitConvertible for DimensionalData<f64> {
    fn to_units(&mut self, new_units: &UnitSystem) -> &mut Self {
        let new_unit = self.unit.convert_system(new_units);
        self.value = self.value.map(|value| self.unit.convert(value, &new_unit));
        self.unit = new_unit;
        self
    }
}

impl<T> fmt::Display for DimensionalData<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut label = self.unit.abbreviation().to_string();
        if label == "°" {
            label = "".into();
        } else {
            label = format!(" {label}");
        }

        match self.value {
            Some(ref val) => write!(f, "{:.1}{}", val, label),
            None => write!(f, "N/A"),
        }
    }
}
