//! Geolocation collaborator and the read policy every visit transition uses.
//!
//! A transition never writes coordinates unless [`LocationPolicy::read`]
//! returned a complete, in-range fix captured no earlier than the policy
//! allows. Timeouts, provider errors and stale fixes all fail closed.

use std::time::Duration;

use async_trait::async_trait;
use fieldkit_storage::Coords;
use time::OffsetDateTime;

/// Errors reported by a geolocation read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("no position within {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("location permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Unavailable(String),

    /// The provider returned a cached fix older than the policy accepts.
    #[error("position fix is {age_ms}ms old")]
    Stale { age_ms: i128 },

    /// The provider returned coordinates outside the valid range.
    #[error("invalid position: {latitude}, {longitude}")]
    Invalid { latitude: f64, longitude: f64 },
}

/// Options passed through to the provider for a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

/// A position fix and the time it was acquired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coords: Coords,
    pub captured_at: OffsetDateTime,
}

impl Position {
    /// A fix captured now.
    pub fn now(coords: Coords) -> Self {
        Self {
            coords,
            captured_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Single-shot "get current position" provider.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self, request: &PositionRequest) -> Result<Position, LocationError>;
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for std::sync::Arc<T> {
    async fn current_position(&self, request: &PositionRequest) -> Result<Position, LocationError> {
        (**self).current_position(request).await
    }
}

/// Bounded-wait, no-stale-fix policy shared by check-in, observation and
/// check-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationPolicy {
    pub timeout: Duration,
    /// How old a cached fix may be, measured back from the moment the read
    /// was issued. Zero demands a fix acquired during the read.
    pub maximum_age: Duration,
    pub high_accuracy: bool,
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
            high_accuracy: true,
        }
    }
}

impl LocationPolicy {
    pub fn request(&self) -> PositionRequest {
        PositionRequest {
            high_accuracy: self.high_accuracy,
            timeout: self.timeout,
            maximum_age: self.maximum_age,
        }
    }

    /// Read the current position under this policy.
    pub async fn read<L>(&self, provider: &L) -> Result<Position, LocationError>
    where
        L: LocationProvider + ?Sized,
    {
        let request = self.request();
        let issued_at = OffsetDateTime::now_utc();
        let position = tokio::time::timeout(self.timeout, provider.current_position(&request))
            .await
            .map_err(|_| LocationError::Timeout {
                after: self.timeout,
            })??;

        // No lower bound when the window reaches past the representable range.
        let oldest_accepted = time::Duration::try_from(self.maximum_age)
            .ok()
            .and_then(|window| issued_at.checked_sub(window));
        if let Some(oldest) = oldest_accepted {
            if position.captured_at < oldest {
                let age = OffsetDateTime::now_utc() - position.captured_at;
                return Err(LocationError::Stale {
                    age_ms: age.whole_milliseconds(),
                });
            }
        }
        validate_coords(position.coords)?;
        Ok(position)
    }
}

/// Reject non-finite or out-of-range coordinates.
pub fn validate_coords(coords: Coords) -> Result<Coords, LocationError> {
    let Coords {
        latitude,
        longitude,
    } = coords;
    let in_range = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);
    if in_range {
        Ok(coords)
    } else {
        Err(LocationError::Invalid {
            latitude,
            longitude,
        })
    }
}

/// Provider that reports a fixed position, fresh on every read.
///
/// Used where no positioning hardware is available (command line, tests).
/// Lookup order for [`from_env`](FixedLocation::from_env):
/// `FIELDKIT_LAT` / `FIELDKIT_LON`.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    coords: Option<Coords>,
}

impl FixedLocation {
    pub fn new(coords: Coords) -> Self {
        Self {
            coords: Some(coords),
        }
    }

    /// A provider with no position; every read fails.
    pub fn unavailable() -> Self {
        Self { coords: None }
    }

    /// Read the position from `FIELDKIT_LAT` and `FIELDKIT_LON`.
    /// Missing or unparsable variables yield an unavailable provider.
    pub fn from_env() -> Self {
        let parse = |key: &str| std::env::var(key).ok()?.trim().parse::<f64>().ok();
        match (parse("FIELDKIT_LAT"), parse("FIELDKIT_LON")) {
            (Some(latitude), Some(longitude)) => Self::new(Coords::new(latitude, longitude)),
            _ => Self::unavailable(),
        }
    }

    pub fn coords(&self) -> Option<Coords> {
        self.coords
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self, _request: &PositionRequest) -> Result<Position, LocationError> {
        self.coords.map(Position::now).ok_or_else(|| {
            LocationError::Unavailable(
                "no position configured (set FIELDKIT_LAT and FIELDKIT_LON)".to_string(),
            )
        })
    }
}
