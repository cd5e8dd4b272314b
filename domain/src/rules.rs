//! Pure input checks shared by the ride and driver use cases.

use crate::error::{Error, ValidationErrorKind};
use entity::Id;

/// Longest cancellation reason accepted, in characters.
pub const MAX_CANCELLATION_REASON_LEN: usize = 500;

/// Ride types offered when nothing else is configured.
pub const DEFAULT_RIDE_TYPES: [&str; 3] = ["ECONOMY", "PREMIUM", "XL"];

/// The set of ride types passengers may request.
#[derive(Debug, Clone, PartialEq)]
pub struct RideCatalog {
    ride_types: Vec<String>,
}

impl RideCatalog {
    pub fn new<I, S>(ride_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ride_type in ride_types {
            let ride_type = ride_type.as_ref().trim().to_uppercase();
            if !ride_type.is_empty() && !normalized.contains(&ride_type) {
                normalized.push(ride_type);
            }
        }
        Self {
            ride_types: normalized,
        }
    }

    pub fn ride_types(&self) -> &[String] {
        &self.ride_types
    }

    /// Upper-cases `raw` and checks it against the catalog.
    pub fn normalize(&self, raw: &str) -> Result<String, Error> {
        let ride_type = raw.trim().to_uppercase();
        if self.ride_types.contains(&ride_type) {
            Ok(ride_type)
        } else {
            Err(Error::validation(ValidationErrorKind::UnsupportedRideType(
                raw.to_string(),
            )))
        }
    }
}

impl Default for RideCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_RIDE_TYPES)
    }
}

pub fn require_id(id: Id, field: &'static str) -> Result<(), Error> {
    if id.is_nil() {
        return Err(Error::validation(ValidationErrorKind::MissingId(field)));
    }
    Ok(())
}

pub fn require_address(address: &str, field: &'static str) -> Result<(), Error> {
    if address.trim().is_empty() {
        return Err(Error::validation(ValidationErrorKind::MissingAddress(field)));
    }
    Ok(())
}

/// Latitude within [-90, 90], longitude within [-180, 180], both finite.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), Error> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(invalid_coordinates("coordinates must be finite numbers"));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid_coordinates("latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid_coordinates("longitude must be between -180 and 180"));
    }
    Ok(())
}

/// Like `validate_coordinates`, but also rejects a zero component, which
/// device GPS stacks report when they have no fix.
pub fn validate_driver_position(latitude: f64, longitude: f64) -> Result<(), Error> {
    validate_coordinates(latitude, longitude)?;
    if latitude == 0.0 || longitude == 0.0 {
        return Err(invalid_coordinates("coordinates cannot be zero"));
    }
    Ok(())
}

pub fn validate_reason(reason: Option<&str>) -> Result<(), Error> {
    match reason {
        Some(reason) if reason.chars().count() > MAX_CANCELLATION_REASON_LEN => {
            Err(Error::validation(ValidationErrorKind::ReasonTooLong))
        }
        _ => Ok(()),
    }
}

/// Optional speed must be non-negative and heading within [0, 360).
pub fn validate_motion(speed_kmh: Option<f64>, heading_degrees: Option<f64>) -> Result<(), Error> {
    if let Some(speed) = speed_kmh {
        if !speed.is_finite() || speed < 0.0 {
            return Err(Error::validation(ValidationErrorKind::InvalidMotion(
                "speed must be a non-negative number".to_string(),
            )));
        }
    }
    if let Some(heading) = heading_degrees {
        if !heading.is_finite() || !(0.0..360.0).contains(&heading) {
            return Err(Error::validation(ValidationErrorKind::InvalidMotion(
                "heading must be between 0 and 360 degrees".to_string(),
            )));
        }
    }
    Ok(())
}

fn invalid_coordinates(detail: &str) -> Error {
    Error::validation(ValidationErrorKind::InvalidCoordinates(detail.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, InternalErrorKind};

    fn validation_kind(err: Error) -> ValidationErrorKind {
        match err.error_kind {
            DomainErrorKind::Internal(InternalErrorKind::Validation(kind)) => kind,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn catalog_normalizes_case_and_rejects_unknown_types() {
        let catalog = RideCatalog::default();
        assert_eq!(catalog.normalize("economy").unwrap(), "ECONOMY");
        assert_eq!(catalog.normalize(" Xl ").unwrap(), "XL");

        let kind = validation_kind(catalog.normalize("LIMO").unwrap_err());
        assert_eq!(kind, ValidationErrorKind::UnsupportedRideType("LIMO".to_string()));
    }

    #[test]
    fn configured_catalog_drops_blanks_and_duplicates() {
        let catalog = RideCatalog::new(["economy", "", "ECONOMY", "bike"]);
        assert_eq!(catalog.ride_types(), ["ECONOMY", "BIKE"]);
    }

    #[test]
    fn coordinates_outside_the_globe_are_rejected() {
        assert!(validate_coordinates(43.238949, 76.889709).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn driver_position_cannot_be_zero() {
        assert!(validate_coordinates(0.0, 76.9).is_ok());
        assert!(validate_driver_position(0.0, 76.9).is_err());
        assert!(validate_driver_position(43.2, 0.0).is_err());
        assert!(validate_driver_position(43.2, 76.9).is_ok());
    }

    #[test]
    fn nil_ids_and_blank_addresses_are_rejected() {
        assert_eq!(
            validation_kind(require_id(Id::nil(), "passenger_id").unwrap_err()),
            ValidationErrorKind::MissingId("passenger_id")
        );
        assert!(require_id(Id::new_v4(), "passenger_id").is_ok());
        assert!(require_address("   ", "pickup_address").is_err());
        assert!(require_address("Abay Ave 10", "pickup_address").is_ok());
    }

    #[test]
    fn reason_length_is_counted_in_characters() {
        let at_limit = "é".repeat(MAX_CANCELLATION_REASON_LEN);
        assert!(validate_reason(Some(&at_limit)).is_ok());
        let over = "a".repeat(MAX_CANCELLATION_REASON_LEN + 1);
        assert_eq!(
            validation_kind(validate_reason(Some(&over)).unwrap_err()),
            ValidationErrorKind::ReasonTooLong
        );
        assert!(validate_reason(None).is_ok());
    }

    #[test]
    fn motion_bounds() {
        assert!(validate_motion(Some(45.0), Some(359.9)).is_ok());
        assert!(validate_motion(None, None).is_ok());
        assert!(validate_motion(Some(-1.0), None).is_err());
        assert!(validate_motion(None, Some(360.0)).is_err());
    }
}
