//! ==============================================================================
//! sensor.rs - simulated sensor node
//! ==============================================================================
//!
//! purpose:
//!     stands in for the field hardware. every interval it draws four random
//!     readings and POSTs them to the reading store, the same json a real
//!     node sends:
//!
//!         { "SoilTemp": 42, "AirTemp": 7, "Humidity": 91, "SoilMoisture": 13 }
//!
//!     a failed push is logged and the next interval tries again.
//!
//! relationships:
//!     - pushes to: server.rs (/api/nodeMCU-data)
//!     - uses: poller.rs (TaskHandle for cancellation)
//!
//! ==============================================================================

use crate::domain::SensorUpdate;
use crate::poller::TaskHandle;

use rand::Rng;
use std::time::Duration;

/// four readings drawn uniformly from 0..100
pub fn simulated_reading<R: Rng>(rng: &mut R) -> SensorUpdate {
    let mut draw = || Some(f64::from(rng.gen_range(0u8..100)));
    SensorUpdate {
        soil_temp: draw(),
        air_temp: draw(),
        humidity: draw(),
        soil_moisture: draw(),
    }
}

pub struct SimulatedSensor {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl SimulatedSensor {
    pub fn new(url: impl Into<String>, interval: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(interval.max(Duration::from_secs(1)))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    /// push one reading, returning the status code and response body
    pub async fn push(&self, reading: &SensorUpdate) -> Result<(u16, String), reqwest::Error> {
        let resp = self.client.post(&self.url).json(reading).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok((status, body))
    }

    pub fn start(self) -> TaskHandle {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                let reading = simulated_reading(&mut rand::thread_rng());
                match self.push(&reading).await {
                    Ok((status, body)) => {
                        tracing::info!(status, body = %body, "pushed simulated reading");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, url = %self.url, "error sending reading");
                    }
                }
            }
        });
        TaskHandle::new(vec![task])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{cors_layer, serve, store_router, StoreState};
    use crate::store::ReadingStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_simulated_reading_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let r = simulated_reading(&mut rng);
            for v in [r.soil_temp, r.air_temp, r.humidity, r.soil_moisture] {
                let v = v.unwrap();
                assert!((0.0..100.0).contains(&v));
                assert_eq!(v.fract(), 0.0);
            }
        }
    }

    #[tokio::test]
    async fn test_push_reaches_store() {
        let store = ReadingStore::default();
        let state = StoreState {
            store: store.clone(),
            response_delay: Duration::ZERO,
            show_sensor_data: false,
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = store_router(state, cors_layer("*").unwrap());
        tokio::spawn(serve(listener, app, std::future::pending()));

        let sensor = SimulatedSensor::new(
            format!("http://{}/api/nodeMCU-data", addr),
            Duration::from_secs(2),
        )
        .unwrap();
        let reading = SensorUpdate {
            soil_temp: Some(11.0),
            air_temp: Some(12.0),
            humidity: Some(13.0),
            soil_moisture: Some(14.0),
        };
        let (status, body) = sensor.push(&reading).await.unwrap();

        assert_eq!(status, 200);
        assert!(body.contains("Data received successfully"));
        let current = store.get_current().await;
        assert_eq!(current.air_temp, 12.0);
        assert_eq!(current.ideal_air_temp, 21.0);
    }
}
