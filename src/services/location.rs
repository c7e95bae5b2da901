use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use super::LocationStore;

/// Location report uploaded by a recording device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub address: Option<String>,
    pub capture_id: Option<String>,
}

/// Process-local location storage. Relational persistence is an external
/// concern; this keeps the endpoint functional without one.
#[derive(Default)]
pub struct InMemoryLocationStore {
    locations: Mutex<Vec<Location>>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn create_location(&self, location: Location) -> anyhow::Result<i64> {
        let mut locations = self.locations.lock().await;
        locations.push(location);
        let id = locations.len() as i64;
        info!("Stored location {}", id);
        Ok(id)
    }
}
