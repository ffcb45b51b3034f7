//! Flat hash encoding of site records.
//!
//! Every field becomes one hash field with a string value. The coordinate is
//! flattened into `lat` and `lng`, which are either both present or both
//! absent.

use crate::domain::site::{Coordinate, Site};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Hash field-mapping as stored under one key.
pub type Fields = BTreeMap<String, String>;

pub const FIELD_ID: &str = "id";
pub const FIELD_CAPACITY: &str = "capacity";
pub const FIELD_PANELS: &str = "panels";
pub const FIELD_ADDRESS: &str = "address";
pub const FIELD_CITY: &str = "city";
pub const FIELD_STATE: &str = "state";
pub const FIELD_POSTAL_CODE: &str = "postal_code";
pub const FIELD_LAT: &str = "lat";
pub const FIELD_LNG: &str = "lng";

/// Error returned when a stored record cannot be decoded into a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A required field is absent
    MissingField(&'static str),
    /// A field is present but does not parse
    InvalidField {
        field: &'static str,
        value: String,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingField(field) => {
                write!(f, "missing field `{}` in site record", field)
            }
            DecodeError::InvalidField { field, value } => {
                write!(f, "invalid value {:?} for field `{}`", value, field)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode a site as a flat field mapping.
pub fn encode(site: &Site) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_ID.to_string(), site.id.to_string());
    fields.insert(FIELD_CAPACITY.to_string(), site.capacity.to_string());
    fields.insert(FIELD_PANELS.to_string(), site.panels.to_string());
    fields.insert(FIELD_ADDRESS.to_string(), site.address.clone());
    fields.insert(FIELD_CITY.to_string(), site.city.clone());
    fields.insert(FIELD_STATE.to_string(), site.state.clone());
    fields.insert(FIELD_POSTAL_CODE.to_string(), site.postal_code.clone());

    if let Some(coordinate) = site.coordinate {
        fields.insert(FIELD_LAT.to_string(), coordinate.lat.to_string());
        fields.insert(FIELD_LNG.to_string(), coordinate.lng.to_string());
    }

    fields
}

/// Decode a flat field mapping into a site.
///
/// # Errors
/// Fails if a required field is missing or any numeric field is unparsable.
pub fn decode(fields: &Fields) -> Result<Site, DecodeError> {
    let coordinate = match (fields.get(FIELD_LAT), fields.get(FIELD_LNG)) {
        (None, None) => None,
        (Some(_), None) => return Err(DecodeError::MissingField(FIELD_LNG)),
        (None, Some(_)) => return Err(DecodeError::MissingField(FIELD_LAT)),
        (Some(lat), Some(lng)) => Some(Coordinate::new(
            parse(FIELD_LAT, lat)?,
            parse(FIELD_LNG, lng)?,
        )),
    };

    Ok(Site {
        id: parse(FIELD_ID, required(fields, FIELD_ID)?)?,
        capacity: parse(FIELD_CAPACITY, required(fields, FIELD_CAPACITY)?)?,
        panels: parse(FIELD_PANELS, required(fields, FIELD_PANELS)?)?,
        address: required(fields, FIELD_ADDRESS)?.clone(),
        city: required(fields, FIELD_CITY)?.clone(),
        state: required(fields, FIELD_STATE)?.clone(),
        postal_code: required(fields, FIELD_POSTAL_CODE)?.clone(),
        coordinate,
    })
}

fn required<'a>(fields: &'a Fields, field: &'static str) -> Result<&'a String, DecodeError> {
    fields.get(field).ok_or(DecodeError::MissingField(field))
}

fn parse<T: FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}
