//! Saved health report storage.

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{HealthReport, SavedHealthReport};
use crate::services::store_error::StoreError;

#[async_trait::async_trait]
pub trait HealthReportStore: Send + Sync {
    /// Persist a generated report on behalf of `owner_id`.
    async fn save(
        &self,
        owner_id: Uuid,
        report: &HealthReport,
    ) -> Result<SavedHealthReport, StoreError>;

    /// Reports saved by `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<SavedHealthReport>, StoreError>;

    /// Delete a report. Returns `false` when it is missing or owned by someone else.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError>;
}

/// In-memory report store for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryHealthReportStore {
    reports: RwLock<Vec<SavedHealthReport>>,
}

impl InMemoryHealthReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl HealthReportStore for InMemoryHealthReportStore {
    async fn save(
        &self,
        owner_id: Uuid,
        report: &HealthReport,
    ) -> Result<SavedHealthReport, StoreError> {
        let saved = SavedHealthReport {
            id: Uuid::new_v4(),
            owner_id,
            report: report.clone(),
            created_at: Utc::now(),
        };
        self.reports.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<SavedHealthReport>, StoreError> {
        let reports = self.reports.read().await;
        // insertion order is creation order
        Ok(reports
            .iter()
            .rev()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut reports = self.reports.write().await;
        let before = reports.len();
        reports.retain(|r| !(r.id == id && r.owner_id == owner_id));
        Ok(reports.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::health_report::generate_report;
    use crate::models::sensor::{AirQuality, Environmental, Motion};
    use crate::models::SensorReading;

    fn sample_report(device_id: &str) -> HealthReport {
        let reading = SensorReading {
            device_id: device_id.to_string(),
            environmental: Some(Environmental {
                air_quality: Some(AirQuality::default()),
                ..Default::default()
            }),
            motion: Some(Motion::default()),
            ..Default::default()
        };
        generate_report(device_id, 7, &[reading], None, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_list_newest_first_per_owner() {
        let store = InMemoryHealthReportStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = store.save(owner, &sample_report("dev-1")).await.unwrap();
        let second = store.save(owner, &sample_report("dev-2")).await.unwrap();
        store.save(other, &sample_report("dev-3")).await.unwrap();

        let listed = store.list_for_owner(owner).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let store = InMemoryHealthReportStore::new();
        let owner = Uuid::new_v4();
        let saved = store.save(owner, &sample_report("dev-1")).await.unwrap();

        assert!(!store.delete(Uuid::new_v4(), saved.id).await.unwrap());
        assert!(store.delete(owner, saved.id).await.unwrap());
        assert!(!store.delete(owner, saved.id).await.unwrap());
        assert!(store.list_for_owner(owner).await.unwrap().is_empty());
    }
}
