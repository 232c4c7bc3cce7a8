//! Repository Implementation

use crate::StorageError;
use feature_engine::{ExtendedFields, RawReading};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Raw device sample as received
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorRecord {
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub reading: RawReading,
    #[serde(flatten)]
    pub extended: ExtendedFields,
}

/// Scored reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub id: i64,
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub reading: RawReading,
    pub score: f64,
    pub stress_level: u8,
}

/// Bounded in-memory history; oldest entries are evicted first
pub struct Repository {
    sensor_log: Mutex<VecDeque<SensorRecord>>,
    classifications: Mutex<VecDeque<ClassificationRecord>>,
    max_records: usize,
    next_classification_id: Mutex<i64>,
}

impl Repository {
    /// Create a repository keeping at most `max_records` of each kind
    pub fn new(max_records: usize) -> Self {
        info!("Creating in-memory repository (retention {} records)", max_records);
        let max_records = max_records.max(1);
        Self {
            sensor_log: Mutex::new(VecDeque::with_capacity(max_records.min(10_000))),
            classifications: Mutex::new(VecDeque::with_capacity(max_records.min(10_000))),
            max_records,
            next_classification_id: Mutex::new(1),
        }
    }

    /// Insert a sensor record
    pub fn insert_sensor(&self, record: SensorRecord) -> Result<(), StorageError> {
        let mut log = self
            .sensor_log
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        while log.len() >= self.max_records {
            log.pop_front();
        }
        log.push_back(record);
        Ok(())
    }

    /// Insert a classification, assigning its id
    pub fn insert_classification(
        &self,
        mut record: ClassificationRecord,
    ) -> Result<i64, StorageError> {
        let mut records = self
            .classifications
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        let mut id = self
            .next_classification_id
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        record.id = *id;
        *id += 1;

        while records.len() >= self.max_records {
            records.pop_front();
        }

        let returned_id = record.id;
        records.push_back(record);
        debug!("Inserted classification with ID {}", returned_id);

        Ok(returned_id)
    }

    /// Most recent sensor records, newest first
    pub fn get_sensors(&self, limit: usize) -> Result<Vec<SensorRecord>, StorageError> {
        let log = self
            .sensor_log
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        Ok(log.iter().rev().take(limit).cloned().collect())
    }

    /// Most recent classifications, newest first, optionally for one level
    pub fn get_classifications(
        &self,
        stress_level: Option<u8>,
        limit: usize,
    ) -> Result<Vec<ClassificationRecord>, StorageError> {
        let records = self
            .classifications
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        Ok(records
            .iter()
            .rev()
            .filter(|r| stress_level.map_or(true, |level| r.stress_level == level))
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_log.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn classification_count(&self) -> usize {
        self.classifications.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(level: u8) -> ClassificationRecord {
        ClassificationRecord {
            id: 0,
            timestamp_ms: 1_700_000_000_000,
            reading: RawReading::new(2230.0, 1312.0, 88.0, 1453.0),
            score: 12.0,
            stress_level: level,
        }
    }

    #[test]
    fn test_sensor_insert_and_retrieve() {
        let repo = Repository::default();
        repo.insert_sensor(SensorRecord {
            timestamp_ms: 1,
            reading: RawReading::new(1.0, 2.0, 70.0, 3.0),
            extended: ExtendedFields {
                spo2: Some(98.0),
                ..Default::default()
            },
        })
        .unwrap();

        let sensors = repo.get_sensors(10).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].extended.spo2, Some(98.0));
    }

    #[test]
    fn test_classification_ids_and_filter() {
        let repo = Repository::default();
        assert_eq!(repo.insert_classification(classification(0)).unwrap(), 1);
        assert_eq!(repo.insert_classification(classification(2)).unwrap(), 2);
        assert_eq!(repo.insert_classification(classification(2)).unwrap(), 3);

        let high = repo.get_classifications(Some(2), 10).unwrap();
        assert_eq!(high.len(), 2);
        assert_eq!(high[0].id, 3);
        assert_eq!(repo.get_classifications(None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_retention_limit() {
        let repo = Repository::new(5);
        for _ in 0..10 {
            repo.insert_classification(classification(1)).unwrap();
        }
        assert_eq!(repo.classification_count(), 5);
        assert_eq!(repo.get_classifications(None, 10).unwrap()[4].id, 6);
    }
}
