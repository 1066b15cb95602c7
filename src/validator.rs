//! Request validation.
//!
//! Decides the [`Status`] of an incoming [`Request`] before any value is
//! generated.

use crate::protocol::{Request, Status};

/// Cities the server has data for.
pub const SUPPORTED_CITIES: [&str; 10] = [
    "Bari", "Roma", "Milano", "Napoli", "Torino", "Palermo", "Genova", "Bologna", "Firenze",
    "Venezia",
];

/// Whether `name` is one of [`SUPPORTED_CITIES`], ignoring ASCII case.
///
/// Surrounding whitespace is significant: `" Roma"` is not supported.
pub fn is_supported_city(name: &[u8]) -> bool {
    SUPPORTED_CITIES
        .iter()
        .any(|city| city.as_bytes().eq_ignore_ascii_case(name))
}

/// Check the type code, then the city field's shape, then the allow-list.
pub fn validate(request: &Request) -> Status {
    if request.weather_type().is_none() {
        return Status::InvalidRequest;
    }
    let city = match request.city_bytes() {
        Some(city) if !city.is_empty() => city,
        _ => return Status::InvalidRequest,
    };
    if city.iter().any(|b| b.is_ascii_control()) {
        return Status::InvalidRequest;
    }
    if is_supported_city(city) {
        Status::Success
    } else {
        Status::CityUnavailable
    }
}
