use async_trait::async_trait;
use std::fmt::Debug;

use crate::{error::LocationError, model::Coordinates};

/// Supplies the device's current position.
#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn current_coordinates(&self) -> Result<Coordinates, LocationError>;
}

/// Always reports the same, preconfigured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current_coordinates(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}
