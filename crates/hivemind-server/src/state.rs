use hivemind_metrics::{ObservabilityService, ObserveConfig, ObserveResult};

pub struct AppState {
    pub service: ObservabilityService,
}

impl AppState {
    pub async fn new(config: ObserveConfig) -> ObserveResult<Self> {
        let service = ObservabilityService::new(config).await?;
        Ok(Self { service })
    }

    pub fn from_service(service: ObservabilityService) -> Self {
        Self { service }
    }
}
