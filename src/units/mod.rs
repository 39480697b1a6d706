pub mod direction;

pub use direction::{CardinalDirection, Direction, DirectionConvention};
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display};

pub const METERS_TO_FEET: f64 = 3.28084;
pub const METERS_PER_SECOND_TO_KNOTS: f64 = 1.94384;
pub const NAUTICAL_MILES_TO_METERS: f64 = 1852.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Unit {
    Meters,
    Feet,
    MetersPerSecond,
    Knots,
    NauticalMiles,
    HectaPascal,
    Celsius,
    MetersSquaredPerHertz,
    Degrees,
    Seconds,
    Unknown,
}

impl Unit {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Unit::Meters => "m",
            Unit::Feet => "ft",
            Unit::MetersPerSecond => "m/s",
            Unit::Knots => "kt",
            Unit::NauticalMiles => "nmi",
            Unit::HectaPascal => "hpa",
            Unit::Celsius => "°C",
            Unit::MetersSquaredPerHertz => "m²/Hz",
            Unit::Degrees => "°",
            Unit::Seconds => "s",
            Unit::Unknown => "",
        }
    }
}

impl From<&str> for Unit {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "m" | "meters" | "meter" => Unit::Meters,
            "ft" | "feet" | "foot" => Unit::Feet,
            "m/s" | "mps" | "ms-1" | "meterspersecond" => Unit::MetersPerSecond,
            "kt" | "kts" | "knots" | "knot" => Unit::Knots,
            "nmi" | "nauticalmiles" | "nauticalmile" => Unit::NauticalMiles,
            "hpa" | "mb" | "millibars" | "hectapascal" => Unit::HectaPascal,
            "°c" | "degc" | "degreescelsius" => Unit::Celsius,
            "m^2/hz" | "m2hz-1" | "meterssquaredperhertz" => Unit::MetersSquaredPerHertz,
            "°" | "deg" | "degs" | "degrees" | "degree" | "degrees_true" => Unit::Degrees,
            "s" | "sec" | "second" | "seconds" => Unit::Seconds,
            _ => Unit::Unknown,
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl Unit {
    pub fn convert(&self, value: f64, target: &Unit) -> f64 {
        match self {
            Unit::Meters => match target {
                Unit::Feet => value * METERS_TO_FEET,
                Unit::NauticalMiles => value / NAUTICAL_MILES_TO_METERS,
                _ => value,
            },
            Unit::Feet => match target {
                Unit::Meters => value / METERS_TO_FEET,
                _ => value,
            },
            Unit::MetersPerSecond => match target {
                Unit::Knots => value * METERS_PER_SECOND_TO_KNOTS,
                _ => value,
            },
            Unit::Knots => match target {
                Unit::MetersPerSecond => value / METERS_PER_SECOND_TO_KNOTS,
                _ => value,
            },
            Unit::NauticalMiles => match target {
                Unit::Meters => value * NAUTICAL_MILES_TO_METERS,
                _ => value,
            },
            _ => value,
        }
    }

    pub fn convert_system(&self, target_system: &UnitSystem) -> Unit {
        match self {
            Unit::Meters => match target_system {
                UnitSystem::English => Unit::Feet,
                _ => self.clone(),
            },
            Unit::Feet => match target_system {
                UnitSystem::Metric => Unit::Meters,
                _ => self.clone(),
            },
            Unit::MetersPerSecond => match target_system {
                UnitSystem::English => Unit::Knots,
                _ => self.clone(),
            },
            Unit::Knots => match target_system {
                UnitSystem::Metric => Unit::MetersPerSecond,
                _ => self.clone(),
            },
            _ => self.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitSystem {
    Metric,
    English,
}

impl UnitSystem {
    pub fn earths_radius(&self) -> f64 {
        match self {
            UnitSystem::Metric => 6371.0,
            UnitSystem::English => 3440.1,
        }
    }
}

impl Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let as_str = match self {
            UnitSystem::Metric => "metric",
            UnitSystem::English => "english",
        };

        write!(f, "{as_str}")
    }
}

pub enum DataParseError {
    InvalidString,
}

pub trait UnitConvertible {
    fn to_units(&mut self, new_units: &UnitSystem) -> &mut Self;
}
