use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::services::geocoding::GeocodeError;
use crate::services::{
    ActionLog, CaseService, HttpGeocoder, OrganizationService, RatingService, ReverseGeocoder, StatsService,
    UserService,
};

/// Shared handler state: the pool, configuration and outbound collaborators
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub config: Arc<AppConfig>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
    pub action_log: ActionLog,
}

impl AppState {
    pub fn new(db: DatabaseManager, config: AppConfig) -> Result<Self, GeocodeError> {
        let geocoder = Arc::new(HttpGeocoder::new(config.geocoding.clone())?);
        Ok(Self::with_geocoder(db, config, geocoder))
    }

    pub fn with_geocoder(db: DatabaseManager, config: AppConfig, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        let action_log = ActionLog::new(db.pool().clone());
        Self {
            db,
            config: Arc::new(config),
            geocoder,
            action_log,
        }
    }

    pub fn pool(&self) -> PgPool {
        self.db.pool().clone()
    }

    pub fn cases(&self) -> CaseService {
        CaseService::new(self.pool(), self.config.cases.code_max_attempts)
    }

    pub fn organizations(&self) -> OrganizationService {
        OrganizationService::new(self.pool())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.pool())
    }

    pub fn ratings(&self) -> RatingService {
        RatingService::new(self.pool())
    }

    pub fn stats(&self) -> StatsService {
        StatsService::new(self.pool())
    }
}
