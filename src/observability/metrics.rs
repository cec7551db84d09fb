use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub connections_active: IntGauge,
    pub rooms_active: IntGauge,
    pub packages_created_total: IntCounter,
    pub events_broadcast_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections_active =
            IntGauge::new("connections_active", "Currently connected websocket clients")
                .expect("valid connections_active metric");

        let rooms_active = IntGauge::new("rooms_active", "Rooms with at least one subscriber")
            .expect("valid rooms_active metric");

        let packages_created_total =
            IntCounter::new("packages_created_total", "Total packages registered")
                .expect("valid packages_created_total metric");

        let events_broadcast_total = IntCounterVec::new(
            Opts::new("events_broadcast_total", "Room broadcasts by event kind"),
            &["kind"],
        )
        .expect("valid events_broadcast_total metric");

        registry
            .register(Box::new(connections_active.clone()))
            .expect("register connections_active");
        registry
            .register(Box::new(rooms_active.clone()))
            .expect("register rooms_active");
        registry
            .register(Box::new(packages_created_total.clone()))
            .expect("register packages_created_total");
        registry
            .register(Box::new(events_broadcast_total.clone()))
            .expect("register events_broadcast_total");

        Self {
            registry,
            connections_active,
            rooms_active,
            packages_created_total,
            events_broadcast_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
