use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::attendance::Coordinates;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("position unavailable")]
    Unavailable,

    #[error("position out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

/// Source of the device's current position.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, GeoError>;
}

/// Position the client read from its own geolocation API and sent along.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct ReportedPosition {
    #[schema(example = 40.4168)]
    pub latitude: Option<f64>,
    #[schema(example = -3.7038)]
    pub longitude: Option<f64>,
}

#[async_trait]
impl Geolocator for ReportedPosition {
    async fn current_position(&self) -> Result<Coordinates, GeoError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(GeoError::Unavailable);
        };
        Coordinates::new(latitude, longitude).ok_or(GeoError::OutOfRange { latitude, longitude })
    }
}
