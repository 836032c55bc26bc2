use std::fmt;

use crate::config::{COLLECTED_SLOTS, MAX_COLLECTED, MAX_FINAL, MAX_MIDTERM};
use crate::models::{ScoreRecord, SpecialStatus, Student};

/// Descending (minimum total, grade points) pairs; anything below the last is 0.
pub const GRADE_THRESHOLDS: [(f64, f64); 7] = [
    (80.0, 4.0),
    (75.0, 3.5),
    (70.0, 3.0),
    (65.0, 2.5),
    (60.0, 2.0),
    (55.0, 1.5),
    (50.0, 1.0),
];

pub const GRADE_POINTS: [f64; 8] = [4.0, 3.5, 3.0, 2.5, 2.0, 1.5, 1.0, 0.0];

pub const PASSING_POINTS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grade {
    Points(f64),
    Status(SpecialStatus),
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Points(points) => write!(f, "{points}"),
            Grade::Status(status) => f.write_str(status.label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeResult {
    pub total_score: f64,
    pub grade: Grade,
    pub is_pass: bool,
}

pub fn calculate_grade(record: &ScoreRecord, status: SpecialStatus) -> GradeResult {
    if !status.is_normal() {
        return GradeResult {
            total_score: 0.0,
            grade: Grade::Status(status),
            is_pass: false,
        };
    }

    let total = record.collected_sum() + record.midterm + record.final_exam;
    let points = grade_points(total);

    GradeResult {
        total_score: total,
        grade: Grade::Points(points),
        is_pass: points >= PASSING_POINTS,
    }
}

pub fn grade_student(student: &Student) -> GradeResult {
    calculate_grade(&student.scores, student.status)
}

pub fn grade_points(total: f64) -> f64 {
    GRADE_THRESHOLDS
        .iter()
        .find(|(min_total, _)| total >= *min_total)
        .map(|(_, points)| *points)
        .unwrap_or(0.0)
}

pub fn clamp_score(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}

pub fn parse_score_input(raw: &str, max: f64) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    clamp_score(trimmed.parse::<f64>().unwrap_or(0.0), max)
}

pub fn parse_count_input(raw: &str) -> u32 {
    let parsed = raw.trim().parse::<f64>().unwrap_or(0.0);
    if !parsed.is_finite() {
        return 0;
    }
    parsed.trunc().clamp(0.0, u32::MAX as f64) as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestLog {
    pub collected: f64,
    pub collected_max: f64,
    pub midterm: f64,
    pub final_exam: f64,
}

impl QuestLog {
    pub fn from_scores(scores: &ScoreRecord) -> Self {
        Self {
            collected: scores.collected_sum(),
            collected_max: MAX_COLLECTED * COLLECTED_SLOTS as f64,
            midterm: scores.midterm,
            final_exam: scores.final_exam,
        }
    }

    pub fn collected_percent(&self) -> f64 {
        self.collected / self.collected_max * 100.0
    }

    pub fn midterm_percent(&self) -> f64 {
        self.midterm / MAX_MIDTERM * 100.0
    }

    pub fn final_percent(&self) -> f64 {
        self.final_exam / MAX_FINAL * 100.0
    }
}
