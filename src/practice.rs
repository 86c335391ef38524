use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;

/// Manages per-practice engines. Each practice gets its own Engine + WAL +
/// compactor, so bookings in one clinic never contend with another.
/// Practice = database name from the pgwire connection.
pub struct PracticeManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl PracticeManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create an engine for the given practice.
    pub fn get_or_create(&self, practice: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(practice) {
            return Ok(engine.value().clone());
        }
        if practice.len() > MAX_PRACTICE_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "practice name too long",
            ));
        }
        if self.engines.len() >= MAX_PRACTICES {
            return Err(std::io::Error::other("too many practices"));
        }

        // Sanitize practice name to prevent path traversal
        let safe_name: String = practice
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty practice name",
            ));
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(wal_path, notify)?);

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        self.engines.insert(practice.to_string(), engine.clone());
        metrics::gauge!(crate::observability::PRACTICES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Actor;
    use crate::model::{HourFormat, When};
    use chrono::{NaiveDate, NaiveTime, Weekday};
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("turno_test_practice").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn practice_isolation() {
        let dir = test_data_dir("isolation");
        let pm = PracticeManager::new(dir, 1000);

        let eng_a = pm.get_or_create("clinic_a").unwrap();
        let eng_b = pm.get_or_create("clinic_b").unwrap();

        let pid = Ulid::new();
        let svc = Ulid::new();

        // Same professional id in both practices — fully independent.
        for eng in [&eng_a, &eng_b] {
            eng.register_professional(pid, None, chrono_tz::America::Toronto, HourFormat::H24)
                .await
                .unwrap();
        }
        eng_a
            .add_service(svc, pid, None, 30, None)
            .await
            .unwrap();
        eng_a
            .add_schedule(
                Actor::Backend,
                Ulid::new(),
                pid,
                Weekday::Mon,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                None,
            )
            .await
            .unwrap();

        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let slots_a = eng_a.availability(pid, monday, svc, None).await.unwrap();
        assert_eq!(slots_a.len(), 6);

        // clinic_b has no such service at all.
        assert!(eng_b.availability(pid, monday, svc, None).await.is_err());
    }

    #[tokio::test]
    async fn practice_lazy_creation() {
        let dir = test_data_dir("lazy");
        let pm = PracticeManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = pm.get_or_create("my_clinic").unwrap();
        assert!(dir.join("my_clinic.wal").exists());
    }

    #[tokio::test]
    async fn practice_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let pm = PracticeManager::new(dir, 1000);

        let eng1 = pm.get_or_create("foo").unwrap();
        let eng2 = pm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn practice_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let pm = PracticeManager::new(dir.clone(), 1000);

        // Path traversal attempt
        let _eng = pm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        // Empty after sanitization
        assert!(pm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn practice_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let pm = PracticeManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_PRACTICE_NAME_LEN + 1);
        let err = pm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("practice name too long"));
    }

    #[tokio::test]
    async fn practice_state_survives_reopen() {
        let dir = test_data_dir("reopen");
        let pid = Ulid::new();
        let svc = Ulid::new();
        let appt = Ulid::new();

        {
            let pm = PracticeManager::new(dir.clone(), 1000);
            let eng = pm.get_or_create("persist").unwrap();
            eng.register_professional(pid, None, chrono_tz::America::Toronto, HourFormat::H24)
                .await
                .unwrap();
            eng.add_service(svc, pid, None, 30, None).await.unwrap();
            eng.add_schedule(
                Actor::Backend,
                Ulid::new(),
                pid,
                Weekday::Mon,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                None,
            )
            .await
            .unwrap();
            let start = NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            eng.book_appointment(Actor::Backend, appt, pid, svc, Ulid::new(), When::Wall(start))
                .await
                .unwrap();
        }

        // Fresh manager over the same data dir replays the WAL.
        let pm = PracticeManager::new(dir, 1000);
        let eng = pm.get_or_create("persist").unwrap();
        let appointments = eng.get_appointments(pid).await.unwrap();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].id, appt);
    }
}
