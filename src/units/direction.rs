use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::DataParseError;
use super::Unit;

/// Normalizes an arbitrary angle in degrees into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees % 360.0;
    if normalized < 0.0 {
        normalized + 360.0
    } else {
        normalized
    }
}

/// Smallest angular difference between two bearings, in [0, 180].
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (normalize_degrees(a) - normalize_degrees(b)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionConvention {
    From,
    Towards,
    Met,
}

impl DirectionConvention {
    /// Normalizes direction to From convention in degrees
    pub fn normalize(&self, dir: f64) -> f64 {
        match self {
            DirectionConvention::From => normalize_degrees(dir),
            DirectionConvention::Towards => normalize_degrees(dir + 180.0),
            DirectionConvention::Met => normalize_degrees(270.0 - dir),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CardinalDirection {
    North,
    NorthNorthEast,
    NorthEast,
    EastNorthEast,
    East,
    EastSouthEast,
    SouthEast,
    SouthSouthEast,
    South,
    SouthSouthWest,
    SouthWest,
    WestSouthWest,
    West,
    WestNorthWest,
    NorthWest,
    NorthNorthWest,
    Invalid,
}

impl CardinalDirection {
    pub fn from_degrees(degrees: f64) -> CardinalDirection {
        let degrees = normalize_degrees(degrees);
        // 16 sectors of 22.5°, centered on each compass point
        let sector = ((degrees + 11.25) / 22.5).floor() as usize % 16;
        match sector {
            0 => CardinalDirection::North,
            1 => CardinalDirection::NorthNorthEast,
            2 => CardinalDirection::NorthEast,
            3 => CardinalDirection::EastNorthEast,
            4 => CardinalDirection::East,
            5 => CardinalDirection::EastSouthEast,
            6 => CardinalDirection::SouthEast,
            7 => CardinalDirection::SouthSouthEast,
            8 => CardinalDirection::South,
            9 => CardinalDirection::SouthSouthWest,
            10 => CardinalDirection::SouthWest,
            11 => CardinalDirection::WestSouthWest,
            12 => CardinalDirection::West,
            13 => CardinalDirection::WestNorthWest,
            14 => CardinalDirection::NorthWest,
            _ => CardinalDirection::NorthNorthWest,
        }
    }

    pub fn to_degrees(&self) -> f64 {
        match self {
            CardinalDirection::North => 0.0,
            CardinalDirection::NorthNorthEast => 22.5,
            CardinalDirection::NorthEast => 45.0,
            CardinalDirection::EastNorthEast => 67.5,
            CardinalDirection::East => 90.0,
            CardinalDirection::EastSouthEast => 112.5,
            CardinalDirection::SouthEast => 135.0,
            CardinalDirection::SouthSouthEast => 157.5,
            CardinalDirection::South => 180.0,
            CardinalDirection::SouthSouthWest => 202.5,
            CardinalDirection::SouthWest => 225.0,
            CardinalDirection::WestSouthWest => 247.5,
            CardinalDirection::West => 270.0,
            CardinalDirection::WestNorthWest => 292.5,
            CardinalDirection::NorthWest => 315.0,
            CardinalDirection::NorthNorthWest => 337.5,
            CardinalDirection::Invalid => 0.0,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CardinalDirection::North => "N",
            CardinalDirection::NorthNorthEast => "NNE",
            CardinalDirection::NorthEast => "NE",
            CardinalDirection::EastNorthEast => "ENE",
            CardinalDirection::East => "E",
            CardinalDirection::EastSouthEast => "ESE",
            CardinalDirection::SouthEast => "SE",
            CardinalDirection::SouthSouthEast => "SSE",
            CardinalDirection::South => "S",
            CardinalDirection::SouthSouthWest => "SSW",
            CardinalDirection::SouthWest => "SW",
            CardinalDirection::WestSouthWest => "WSW",
            CardinalDirection::West => "W",
            CardinalDirection::WestNorthWest => "WNW",
            CardinalDirection::NorthWest => "NW",
            CardinalDirection::NorthNorthWest => "NNW",
            CardinalDirection::Invalid => "",
        }
    }

    pub fn all() -> [CardinalDirection; 16] {
        [
            CardinalDirection::North,
            CardinalDirection::NorthNorthEast,
            CardinalDirection::NorthEast,
            CardinalDirection::EastNorthEast,
            CardinalDirection::East,
            CardinalDirection::EastSouthEast,
            CardinalDirection::SouthEast,
            CardinalDirection::SouthSouthEast,
            CardinalDirection::South,
            CardinalDirection::SouthSouthWest,
            CardinalDirection::SouthWest,
            CardinalDirection::WestSouthWest,
            CardinalDirection::West,
            CardinalDirection::WestNorthWest,
            CardinalDirection::NorthWest,
            CardinalDirection::NorthNorthWest,
        ]
    }
}

impl fmt::Display for CardinalDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for CardinalDirection {
    type Err = DataParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(CardinalDirection::North),
            "NNE" => Ok(CardinalDirection::NorthNorthEast),
            "NE" => Ok(CardinalDirection::NorthEast),
            "ENE" => Ok(CardinalDirection::EastNorthEast),
            "E" => Ok(CardinalDirection::East),
            "ESE" => Ok(CardinalDirection::EastSouthEast),
            "SE" => Ok(CardinalDirection::SouthEast),
            "SSE" => Ok(CardinalDirection::SouthSouthEast),
            "S" => Ok(CardinalDirection::South),
            "SSW" => Ok(CardinalDirection::SouthSouthWest),
            "SW" => Ok(CardinalDirection::SouthWest),
            "WSW" => Ok(CardinalDirection::WestSouthWest),
            "W" => Ok(CardinalDirection::West),
            "WNW" => Ok(CardinalDirection::WestNorthWest),
            "NW" => Ok(CardinalDirection::NorthWest),
            "NNW" => Ok(CardinalDirection::NorthNorthWest),
            _ => Err(DataParseError::InvalidString),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Direction {
    pub degrees: f64,
    direction: CardinalDirection,
}

impl Direction {
    pub fn from_cardinal_direction(direction: CardinalDirection) -> Direction {
        Direction {
            degrees: direction.to_degrees(),
            direction,
        }
    }

    pub fn from_degrees(degrees: f64) -> Direction {
        let degrees = normalize_degrees(degrees);
        Direction {
            direction: CardinalDirection::from_degrees(degrees),
            degrees,
        }
    }

    pub fn cardinal_direction(&self) -> &CardinalDirection {
        &self.direction
    }

    pub fn radians(&self) -> f64 {
        self.degrees.to_radians()
    }

    pub fn invert(&self) -> Direction {
        Direction::from_degrees(self.degrees + 180.0)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{} {}",
            self.degrees,
            Unit::Degrees.abbreviation(),
            self.direction
        )
    }
}

impl FromStr for Direction {
    type Err = DataParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(dir) = s.parse::<CardinalDirection>() {
            return Ok(Direction::from_cardinal_direction(dir));
        }
        match s.trim().parse::<f64>() {
            Ok(degrees) => Ok(Direction::from_degrees(degrees)),
            Err(_) => Err(DataParseError::InvalidString),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_degrees() {
        assert!((normalize_degrees(-45.0) - 315.0).abs() < 1e-9);
        assert!((normalize_degrees(360.0) - 0.0).abs() < 1e-9);
        assert!((normalize_degrees(725.0) - 5.0).abs() < 1e-9);
        for d in [-1000.0, -360.0, -0.5, 0.0, 359.9, 4321.0] {
            let n = normalize_degrees(d);
            assert!((0.0..360.0).contains(&n), "{d} normalized to {n}");
        }
    }

    #[test]
    fn test_angular_difference_wraps() {
        assert!((angular_difference(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angular_difference(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angular_difference(90.0, 270.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_compass_round_trip() {
        for dir in CardinalDirection::all() {
            let degrees = dir.to_degrees();
            assert_eq!(CardinalDirection::from_degrees(degrees), dir);

            let parsed: CardinalDirection = dir.abbreviation().parse().ok().unwrap();
            assert_eq!(parsed, dir);
        }
    }

    #[test]
    fn test_met_convention() {
        let convention = DirectionConvention::Met;
        assert!((convention.normalize(270.0) - 0.0).abs() < 1e-9);
    }
}
