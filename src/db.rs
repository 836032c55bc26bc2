use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::config::{subject_name, COLLECTED_SLOTS};
use crate::local_store::mock_classes;
use crate::models::{ClassRoster, ScoreRecord, SpecialStatus, Student};
use crate::repository::{RepositoryError, RosterRepository};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let repo = PgRosterRepository::new(pool.clone());
    let mut seeded = 0usize;
    for class in mock_classes() {
        repo.try_save_roster(&class.id, Some(&class.name), &class.students)
            .await?;
        seeded += class.students.len();
    }
    Ok(seeded)
}

pub struct PgRosterRepository {
    pool: PgPool,
}

#[derive(Debug, Clone)]
struct EnrollmentRow {
    class_id: String,
    student_id: String,
    full_name: String,
    collected: Vec<f64>,
    midterm: f64,
    final_exam: f64,
    status: String,
    redeemed_draws: i32,
}

impl EnrollmentRow {
    fn into_student(self) -> Student {
        let mut collected = [0.0; COLLECTED_SLOTS];
        for (slot, value) in collected.iter_mut().zip(self.collected) {
            *slot = value;
        }
        Student {
            id: self.student_id,
            name: self.full_name,
            scores: ScoreRecord {
                collected,
                midterm: self.midterm,
                final_exam: self.final_exam,
            }
            .clamped(),
            status: SpecialStatus::from_label(&self.status),
            redeemed_draws: self.redeemed_draws.max(0) as u32,
        }
    }
}

impl PgRosterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_load_all(&self) -> Result<Vec<ClassRoster>, RepositoryError> {
        let mut classes: Vec<(String, String)> = Vec::new();
        for row in sqlx::query("SELECT id, name FROM gradebook.classes ORDER BY id")
            .fetch_all(&self.pool)
            .await?
        {
            classes.push((row.try_get("id")?, row.try_get("name")?));
        }

        let records = sqlx::query(
            r#"
            SELECT class_id, student_id, full_name, collected, midterm, final_exam,
                   status, redeemed_draws
            FROM gradebook.enrollments
            ORDER BY class_id, position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rows = Vec::with_capacity(records.len());
        for row in records {
            rows.push(EnrollmentRow {
                class_id: row.try_get("class_id")?,
                student_id: row.try_get("student_id")?,
                full_name: row.try_get("full_name")?,
                collected: row.try_get("collected")?,
                midterm: row.try_get("midterm")?,
                final_exam: row.try_get("final_exam")?,
                status: row.try_get("status")?,
                redeemed_draws: row.try_get("redeemed_draws")?,
            });
        }

        Ok(assemble_rosters(classes, rows))
    }

    async fn try_save_roster(
        &self,
        class_id: &str,
        class_name: Option<&str>,
        students: &[Student],
    ) -> Result<(), RepositoryError> {
        let name = class_name
            .or_else(|| subject_name(class_id))
            .unwrap_or(class_id);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO gradebook.classes (id, name, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(class_id)
        .bind(name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM gradebook.enrollments WHERE class_id = $1")
            .bind(class_id)
            .execute(&mut *tx)
            .await?;

        for (position, student) in students.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO gradebook.enrollments
                (class_id, position, student_id, full_name, collected, midterm, final_exam,
                 status, redeemed_draws)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(class_id)
            .bind(position as i32)
            .bind(&student.id)
            .bind(&student.name)
            .bind(student.scores.collected.to_vec())
            .bind(student.scores.midterm)
            .bind(student.scores.final_exam)
            .bind(student.status.label())
            .bind(i32::try_from(student.redeemed_draws).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RosterRepository for PgRosterRepository {
    async fn load_all(&self) -> Vec<ClassRoster> {
        match self.try_load_all().await {
            Ok(classes) => classes,
            Err(err) => {
                log::error!("[STORE] failed to load rosters from postgres: {err}");
                Vec::new()
            }
        }
    }

    async fn save_roster(&self, class_id: &str, students: &[Student]) -> bool {
        match self.try_save_roster(class_id, None, students).await {
            Ok(()) => true,
            Err(err) => {
                log::error!("[STORE] failed to save class:{class_id} to postgres: {err}");
                false
            }
        }
    }
}

fn assemble_rosters(classes: Vec<(String, String)>, rows: Vec<EnrollmentRow>) -> Vec<ClassRoster> {
    let mut rosters: Vec<ClassRoster> = classes
        .into_iter()
        .map(|(id, name)| ClassRoster {
            id,
            name,
            students: Vec::new(),
        })
        .collect();

    for row in rows {
        if let Some(roster) = rosters.iter_mut().find(|r| r.id == row.class_id) {
            roster.students.push(row.into_student());
        }
    }

    rosters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(class_id: &str, student_id: &str, collected: Vec<f64>) -> EnrollmentRow {
        EnrollmentRow {
            class_id: class_id.to_string(),
            student_id: student_id.to_string(),
            full_name: "สุดา มั่งมี".to_string(),
            collected,
            midterm: 18.0,
            final_exam: 22.0,
            status: "Normal".to_string(),
            redeemed_draws: -1,
        }
    }

    #[test]
    fn rows_group_under_their_class_in_order() {
        let classes = vec![
            ("M1_History".to_string(), "ม.1 ประวัติศาสตร์".to_string()),
            ("M5_Social".to_string(), "ม.5 สังคมศึกษา".to_string()),
        ];
        let rows = vec![
            row("M1_History", "661002", vec![1.0; 6]),
            row("M1_History", "661001", vec![2.0; 6]),
            row("M9_Orphan", "1", vec![]),
        ];

        let rosters = assemble_rosters(classes, rows);
        assert_eq!(rosters.len(), 2);
        let ids: Vec<&str> = rosters[0].students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["661002", "661001"]);
        assert!(rosters[1].students.is_empty());
    }

    #[test]
    fn row_conversion_pads_clamps_and_floors() {
        let student = row("M1_History", "661001", vec![3.0, 12.0]).into_student();
        assert_eq!(student.scores.collected, [3.0, 10.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(student.scores.final_exam, 20.0);
        assert_eq!(student.redeemed_draws, 0);
        assert_eq!(student.status, SpecialStatus::Normal);
    }
}
