//! Health aggregation
//!
//! Pure read-side rollup of registry snapshots into status buckets. No
//! side effects; the HTTP layer serves the result as-is.

use std::time::Instant;

use mr_core::api::HubStatus;
use mr_core::types::InstanceStatus;

use crate::registry::SessionRegistry;

/// Aggregate registry state into the liveness payload.
pub fn aggregate_status(registry: &SessionRegistry, started_at: Instant) -> HubStatus {
    let mut connected = 0;
    let mut pending = 0;
    let mut down = 0;

    for record in registry.list_snapshots() {
        match record.status {
            InstanceStatus::Connected => connected += 1,
            InstanceStatus::Connecting
            | InstanceStatus::AwaitingPairing
            | InstanceStatus::Reconnecting => pending += 1,
            InstanceStatus::Uninitialized
            | InstanceStatus::Disconnecting
            | InstanceStatus::Disconnected
            | InstanceStatus::AuthFailed => down += 1,
        }
    }

    HubStatus {
        running: true,
        instance_count: connected + pending + down,
        connected,
        pending,
        down,
        uptime_secs: started_at.elapsed().as_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimTransportFactory;
    use mr_core::traits::TransportFactory;
    use mr_core::types::InstanceId;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_registry_counts() {
        let factory = Arc::new(SimTransportFactory::manual());
        let registry = SessionRegistry::new(factory as Arc<dyn TransportFactory>);
        let status = aggregate_status(&registry, Instant::now());

        assert!(status.running);
        assert_eq!(status.instance_count, 0);
        assert_eq!(status.connected, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.down, 0);
    }

    #[tokio::test]
    async fn test_buckets_follow_status() {
        let factory = Arc::new(SimTransportFactory::manual());
        let registry = SessionRegistry::new(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        let connecting = InstanceId::new("h-connecting");
        registry
            .create_and_start(connecting.clone(), None)
            .await
            .unwrap();

        let live = InstanceId::new("h-live");
        registry.create_and_start(live.clone(), None).await.unwrap();
        factory.controller(&live).unwrap().emit_ready("+1").await;

        let down = InstanceId::new("h-down");
        registry.create_and_start(down.clone(), None).await.unwrap();
        factory
            .controller(&down)
            .unwrap()
            .emit_disconnected("drop")
            .await;

        for _ in 0..100 {
            let status = aggregate_status(&registry, Instant::now());
            if status.connected == 1 && status.pending == 1 && status.down == 1 {
                assert_eq!(status.instance_count, 3);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("buckets never settled");
    }
}
