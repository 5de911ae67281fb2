use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::repositories::AcademicStore;
use crate::services::reports::ReportEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn AcademicStore>,
    redis: RedisHandle,
    engine: ReportEngine,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn AcademicStore>,
        redis: RedisHandle,
    ) -> Self {
        let engine = ReportEngine::new(store.clone(), settings.reports().clone());
        Self { inner: Arc::new(InnerState { settings, store, redis, engine }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &Arc<dyn AcademicStore> {
        &self.inner.store
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn engine(&self) -> &ReportEngine {
        &self.inner.engine
    }
}
