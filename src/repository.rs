use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ClassRoster, Enrollment, Student};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected payload: {0}")]
    Payload(String),
    #[error("save rejected by store: {0}")]
    Rejected(String),
    #[error("local store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait RosterRepository: Send + Sync {
    async fn load_all(&self) -> Vec<ClassRoster>;

    async fn save_roster(&self, class_id: &str, students: &[Student]) -> bool;
}

/// Every class the student appears in. Empty means "not found", which also
/// covers a store that could not be reached.
pub async fn find_enrollments(repo: &dyn RosterRepository, student_id: &str) -> Vec<Enrollment> {
    let student_id = student_id.trim();
    if student_id.is_empty() {
        return Vec::new();
    }

    repo.load_all()
        .await
        .into_iter()
        .filter_map(|class| {
            let student = class.find(student_id)?.clone();
            Some(Enrollment { student, class })
        })
        .collect()
}

pub async fn load_class(repo: &dyn RosterRepository, class_id: &str) -> Option<ClassRoster> {
    repo.load_all()
        .await
        .into_iter()
        .find(|class| class.id == class_id)
}
