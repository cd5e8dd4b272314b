//! Up-front fare estimation from straight-line distance.

use crate::error::Error;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;
/// Straight-line distance understates road distance in a city grid.
const ROAD_FACTOR: f64 = 1.43;
const AVERAGE_CITY_SPEED_KMH: f64 = 25.0;

/// Prices in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    pub base: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minimum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FareQuote {
    pub fare: f64,
    pub distance_km: f64,
    pub duration_minutes: u32,
}

pub trait FareEstimator: Send + Sync {
    fn estimate(
        &self,
        ride_type: &str,
        pickup: (f64, f64),
        destination: (f64, f64),
    ) -> Result<FareQuote, Error>;
}

/// Per-ride-type tariff table.
#[derive(Debug, Clone)]
pub struct TariffFareEstimator {
    tariffs: HashMap<String, Tariff>,
}

impl TariffFareEstimator {
    pub fn new(tariffs: HashMap<String, Tariff>) -> Self {
        Self { tariffs }
    }

    pub fn standard() -> Self {
        let tariffs = [
            (
                "ECONOMY",
                Tariff {
                    base: 500.0,
                    per_km: 100.0,
                    per_minute: 50.0,
                    minimum: 600.0,
                },
            ),
            (
                "PREMIUM",
                Tariff {
                    base: 800.0,
                    per_km: 120.0,
                    per_minute: 60.0,
                    minimum: 900.0,
                },
            ),
            (
                "XL",
                Tariff {
                    base: 1000.0,
                    per_km: 150.0,
                    per_minute: 75.0,
                    minimum: 1100.0,
                },
            ),
        ]
        .into_iter()
        .map(|(name, tariff)| (name.to_string(), tariff))
        .collect();
        Self::new(tariffs)
    }

    pub fn has_tariff(&self, ride_type: &str) -> bool {
        self.tariffs.contains_key(ride_type)
    }
}

impl Default for TariffFareEstimator {
    fn default() -> Self {
        Self::standard()
    }
}

impl FareEstimator for TariffFareEstimator {
    fn estimate(
        &self,
        ride_type: &str,
        pickup: (f64, f64),
        destination: (f64, f64),
    ) -> Result<FareQuote, Error> {
        let tariff = self
            .tariffs
            .get(ride_type)
            .ok_or_else(|| Error::config("no tariff configured for ride type"))?;

        let distance_km = road_distance_km(pickup, destination);
        let duration_minutes = travel_minutes(distance_km);
        let raw = tariff.base
            + distance_km * tariff.per_km
            + f64::from(duration_minutes) * tariff.per_minute;
        let fare = ((raw / 10.0).round() * 10.0).max(tariff.minimum);

        Ok(FareQuote {
            fare,
            distance_km,
            duration_minutes,
        })
    }
}

/// Haversine distance scaled to an approximate road distance, to 0.1 km.
pub fn road_distance_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let km = EARTH_RADIUS_KM * c * ROAD_FACTOR;

    (km * 10.0).round() / 10.0
}

/// Whole minutes at average city speed, never less than one.
pub fn travel_minutes(distance_km: f64) -> u32 {
    let minutes = (distance_km / AVERAGE_CITY_SPEED_KMH * 60.0).ceil();
    (minutes as u32).max(1)
}
