use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{subject_name, SUBJECTS};
use crate::models::{ClassRoster, ScoreRecord, SpecialStatus, Student};
use crate::repository::{RepositoryError, RosterRepository};

const FIRST_NAMES: [&str; 10] = [
    "สมชาย", "วิชัย", "สุดา", "มานี", "ปิติ", "ชูใจ", "วีระ", "สมศรี", "กานดา", "อาทิตย์",
];
const LAST_NAMES: [&str; 8] = [
    "ใจดี", "รักเรียน", "ขยันยิ่ง", "มั่งมี", "ศรีสุข", "เจริญผล", "มั่นคง", "ยอดเยี่ยม",
];

pub struct LocalRosterRepository {
    path: PathBuf,
    latency: Duration,
}

impl LocalRosterRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call, to exercise loading states against a slow store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn read_or_seed(&self) -> Result<Vec<ClassRoster>, RepositoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let classes: Vec<ClassRoster> = serde_json::from_str(&raw)?;
                Ok(classes.into_iter().map(ClassRoster::sanitized).collect())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let classes = mock_classes();
                self.write(&classes).await?;
                log::info!("[STORE] seeded mock rosters at {}", self.path.display());
                Ok(classes)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, classes: &[ClassRoster]) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string_pretty(classes)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, raw).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn try_save_roster(
        &self,
        class_id: &str,
        students: &[Student],
    ) -> Result<(), RepositoryError> {
        let mut classes = self.read_or_seed().await?;
        match classes.iter_mut().find(|class| class.id == class_id) {
            Some(class) => class.students = students.to_vec(),
            None => classes.push(ClassRoster {
                id: class_id.to_string(),
                name: subject_name(class_id).unwrap_or(class_id).to_string(),
                students: students.to_vec(),
            }),
        }
        self.write(&classes).await
    }
}

#[async_trait]
impl RosterRepository for LocalRosterRepository {
    async fn load_all(&self) -> Vec<ClassRoster> {
        self.simulate_latency().await;
        match self.read_or_seed().await {
            Ok(classes) => classes,
            Err(err) => {
                log::error!(
                    "[STORE] failed to read local rosters {}: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    async fn save_roster(&self, class_id: &str, students: &[Student]) -> bool {
        self.simulate_latency().await;
        match self.try_save_roster(class_id, students).await {
            Ok(()) => true,
            Err(err) => {
                log::error!("[STORE] failed to save local class:{class_id}: {err}");
                false
            }
        }
    }
}

pub fn mock_classes() -> Vec<ClassRoster> {
    let layout: [(usize, &str); 5] = [(20, "661"), (20, "661"), (15, "665"), (15, "665"), (25, "666")];

    SUBJECTS
        .iter()
        .zip(layout)
        .map(|(subject, (count, prefix))| ClassRoster {
            id: subject.id.to_string(),
            name: subject.name.to_string(),
            students: mock_students(count, prefix),
        })
        .collect()
}

fn mock_students(count: usize, prefix: &str) -> Vec<Student> {
    (0..count)
        .map(|i| {
            let mut collected = [0.0; 6];
            for (j, slot) in collected.iter_mut().enumerate() {
                *slot = (2 + (i * 3 + j * 5) % 9) as f64;
            }
            let status = if i % 10 == 9 {
                SpecialStatus::AbsentExcused
            } else if i % 17 == 16 {
                SpecialStatus::Incomplete
            } else {
                SpecialStatus::Normal
            };

            Student {
                id: format!("{prefix}{:03}", i + 1),
                name: format!(
                    "{} {}",
                    FIRST_NAMES[(i * 7) % FIRST_NAMES.len()],
                    LAST_NAMES[(i * 3) % LAST_NAMES.len()]
                ),
                scores: ScoreRecord {
                    collected,
                    midterm: (10 + (i * 7) % 11) as f64,
                    final_exam: (10 + (i * 5) % 11) as f64,
                },
                status,
                redeemed_draws: (i % 3) as u32,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_COLLECTED, MAX_FINAL, MAX_MIDTERM};

    fn temp_store() -> LocalRosterRepository {
        let path = std::env::temp_dir().join(format!("gradebook-{}.json", uuid::Uuid::new_v4()));
        LocalRosterRepository::new(path)
    }

    #[test]
    fn mock_data_covers_every_subject_within_limits() {
        let classes = mock_classes();
        assert_eq!(classes.len(), SUBJECTS.len());
        assert_eq!(classes[4].students.len(), 25);
        assert_eq!(classes[2].students[0].id, "665001");

        for student in classes.iter().flat_map(|c| c.students.iter()) {
            assert!(student.scores.collected.iter().all(|s| (0.0..=MAX_COLLECTED).contains(s)));
            assert!(student.scores.midterm <= MAX_MIDTERM);
            assert!(student.scores.final_exam <= MAX_FINAL);
        }
        assert_eq!(mock_classes(), classes);
    }

    #[tokio::test]
    async fn first_load_seeds_file() {
        let store = temp_store();
        let classes = store.load_all().await;
        assert_eq!(classes, mock_classes());
        assert!(store.path().exists());
        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test]
    async fn save_replaces_only_target_class() {
        let store = temp_store();
        let replacement = vec![Student::new("661999", "ชูใจ ศรีสุข")];

        assert!(store.save_roster("M1_Social", &replacement).await);
        let classes = store.load_all().await;

        let social = classes.iter().find(|c| c.id == "M1_Social").unwrap();
        assert_eq!(social.students, replacement);
        let history = classes.iter().find(|c| c.id == "M1_History").unwrap();
        assert_eq!(history.students.len(), 20);
        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test]
    async fn unknown_class_is_added_on_save() {
        let store = temp_store();
        assert!(store.save_roster("M2_Art", &[Student::new("1", "A")]).await);
        let classes = store.load_all().await;
        assert_eq!(classes.len(), SUBJECTS.len() + 1);
        let _ = std::fs::remove_file(store.path());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_and_refuses_saves() {
        let store = temp_store();
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load_all().await.is_empty());
        assert!(!store.save_roster("M1_History", &[]).await);
        let _ = std::fs::remove_file(store.path());
    }
}
