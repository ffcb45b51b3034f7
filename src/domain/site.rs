//! Site records and geographic queries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude, -85.05..=85.05 for the geo index to accept it
    pub lat: f64,
    /// Longitude, -180..=180
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate from latitude and longitude.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A solar installation.
///
/// Sites are persisted as flat hash records (see [`crate::domain::schema`])
/// and, when they carry a coordinate, registered in the geo index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: u64,
    /// Installed capacity in kW
    pub capacity: f64,
    pub panels: u32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub coordinate: Option<Coordinate>,
}

impl Site {
    /// Create a site with the given id and empty descriptive fields.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            capacity: 0.0,
            panels: 0,
            address: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            coordinate: None,
        }
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_panels(mut self, panels: u32) -> Self {
        self.panels = panels;
        self
    }

    /// Set street address, city, state and postal code at once.
    pub fn with_address(
        mut self,
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        self.address = address.into();
        self.city = city.into();
        self.state = state.into();
        self.postal_code = postal_code.into();
        self
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }
}

/// Unit of a geo radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeoUnit {
    #[serde(rename = "m")]
    Meters,
    #[default]
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "mi")]
    Miles,
    #[serde(rename = "ft")]
    Feet,
}

impl GeoUnit {
    /// Unit token understood by the store's geo commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoUnit::Meters => "m",
            GeoUnit::Kilometers => "km",
            GeoUnit::Miles => "mi",
            GeoUnit::Feet => "ft",
        }
    }

    /// Length of one unit in meters, using the same factors as Redis.
    pub fn meters(&self) -> f64 {
        match self {
            GeoUnit::Meters => 1.0,
            GeoUnit::Kilometers => 1000.0,
            GeoUnit::Miles => 1609.34,
            GeoUnit::Feet => 0.3048,
        }
    }
}

impl fmt::Display for GeoUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A radius search around a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoQuery {
    pub coordinate: Coordinate,
    pub radius: f64,
    pub radius_unit: GeoUnit,
    /// Restrict results to sites whose capacity score exceeds the threshold
    pub only_excess_capacity: bool,
}

impl GeoQuery {
    /// Create a query for every site within `radius` of `coordinate`.
    pub fn new(coordinate: Coordinate, radius: f64, radius_unit: GeoUnit) -> Self {
        Self {
            coordinate,
            radius,
            radius_unit,
            only_excess_capacity: false,
        }
    }

    /// Only return sites with excess capacity.
    pub fn with_excess_capacity(mut self) -> Self {
        self.only_excess_capacity = true;
        self
    }
}

/// Unit of a site meter metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricUnit {
    #[serde(rename = "whG")]
    WattHoursGenerated,
    #[serde(rename = "whU")]
    WattHoursUsed,
    #[serde(rename = "tempC")]
    TemperatureCelsius,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::WattHoursGenerated => "whG",
            MetricUnit::WattHoursUsed => "whU",
            MetricUnit::TemperatureCelsius => "tempC",
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
