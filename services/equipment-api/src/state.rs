use std::sync::Arc;

use equipment_core::{DatasetStore, EquipmentService, RetentionPolicy};

use crate::config::AppConfig;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
pub struct AppState {
    pub service: EquipmentService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn DatasetStore>, config: AppConfig) -> Self {
        let service = EquipmentService::new(store)
            .with_retention(RetentionPolicy::new(config.retention_keep))
            .with_fetch_policy(config.fetch_policy);
        Self { service, config }
    }
}
