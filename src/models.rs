use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{COLLECTED_SLOTS, MAX_COLLECTED, MAX_FINAL, MAX_MIDTERM};
use crate::grading::clamp_score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "String")]
pub enum SpecialStatus {
    #[default]
    Normal,
    AbsentExcused,
    Incomplete,
}

impl SpecialStatus {
    pub fn label(self) -> &'static str {
        match self {
            SpecialStatus::Normal => "Normal",
            SpecialStatus::AbsentExcused => "ร",
            SpecialStatus::Incomplete => "มส.",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "ร" | "r" | "R" | "absent" => SpecialStatus::AbsentExcused,
            "มส." | "มส" | "incomplete" => SpecialStatus::Incomplete,
            _ => SpecialStatus::Normal,
        }
    }

    pub fn is_normal(self) -> bool {
        self == SpecialStatus::Normal
    }
}

impl fmt::Display for SpecialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status '{0}' (expected Normal, ร or มส.)")]
pub struct UnknownStatus(pub String);

// Typed input is exact; stored cells go through `from_label` instead.
impl FromStr for SpecialStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed {
            "ร" => return Ok(SpecialStatus::AbsentExcused),
            "มส." => return Ok(SpecialStatus::Incomplete),
            _ => {}
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "normal" => Ok(SpecialStatus::Normal),
            "absent" => Ok(SpecialStatus::AbsentExcused),
            "incomplete" => Ok(SpecialStatus::Incomplete),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for SpecialStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(label) => SpecialStatus::from_label(&label),
            _ => SpecialStatus::Normal,
        })
    }
}

impl From<SpecialStatus> for String {
    fn from(value: SpecialStatus) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(default, deserialize_with = "lenient_slots")]
    pub collected: [f64; COLLECTED_SLOTS],
    #[serde(default, deserialize_with = "lenient_number")]
    pub midterm: f64,
    #[serde(rename = "final", default, deserialize_with = "lenient_number")]
    pub final_exam: f64,
}

impl ScoreRecord {
    pub fn collected_sum(&self) -> f64 {
        self.collected.iter().sum()
    }

    pub fn clamped(&self) -> Self {
        let mut collected = self.collected;
        for slot in collected.iter_mut() {
            *slot = clamp_score(*slot, MAX_COLLECTED);
        }
        Self {
            collected,
            midterm: clamp_score(self.midterm, MAX_MIDTERM),
            final_exam: clamp_score(self.final_exam, MAX_FINAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default)]
    pub scores: ScoreRecord,
    #[serde(default)]
    pub status: SpecialStatus,
    #[serde(rename = "redeemedDraws", default, deserialize_with = "lenient_count")]
    pub redeemed_draws: u32,
}

impl Student {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scores: ScoreRecord::default(),
            status: SpecialStatus::Normal,
            redeemed_draws: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRoster {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default)]
    pub students: Vec<Student>,
}

impl ClassRoster {
    pub fn find(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn with_student(&self, updated: &Student) -> Vec<Student> {
        self.students
            .iter()
            .map(|s| {
                if s.id == updated.id {
                    updated.clone()
                } else {
                    s.clone()
                }
            })
            .collect()
    }

    pub fn sanitized(mut self) -> Self {
        for student in self.students.iter_mut() {
            student.scores = student.scores.clamped();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub student: Student,
    pub class: ClassRoster,
}

fn number_from_value(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

fn lenient_slots<'de, D>(deserializer: D) -> Result<[f64; COLLECTED_SLOTS], D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let mut slots = [0.0; COLLECTED_SLOTS];
    if let Value::Array(items) = value {
        for (slot, item) in slots.iter_mut().zip(items.iter()) {
            *slot = number_from_value(item);
        }
    }
    Ok(slots)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let count = number_from_value(&value).trunc();
    Ok(count.clamp(0.0, u32::MAX as f64) as u32)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sheet_student_with_loose_types() {
        let raw = r#"{
            "id": 661001,
            "name": "สมชาย ใจดี",
            "scores": { "collected": ["8", 9, null, ""], "midterm": "15", "final": 12.5 },
            "status": "มส."
        }"#;
        let student: Student = serde_json::from_str(raw).unwrap();
        assert_eq!(student.id, "661001");
        assert_eq!(student.scores.collected, [8.0, 9.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(student.scores.midterm, 15.0);
        assert_eq!(student.scores.final_exam, 12.5);
        assert_eq!(student.status, SpecialStatus::Incomplete);
        assert_eq!(student.redeemed_draws, 0);
    }

    #[test]
    fn redeemed_draws_accepts_strings_and_rejects_negatives() {
        let student: Student =
            serde_json::from_str(r#"{"id":"a","redeemedDraws":"3"}"#).unwrap();
        assert_eq!(student.redeemed_draws, 3);

        let student: Student =
            serde_json::from_str(r#"{"id":"a","redeemedDraws":-2}"#).unwrap();
        assert_eq!(student.redeemed_draws, 0);
    }

    #[test]
    fn status_serializes_as_label() {
        let mut student = Student::new("661002", "มานี มีนา");
        student.status = SpecialStatus::AbsentExcused;
        let json = serde_json::to_value(&student).unwrap();
        assert_eq!(json["status"], "ร");
        assert_eq!(json["redeemedDraws"], 0);
        assert!(json["scores"]["final"].is_number());
    }

    #[test]
    fn unknown_status_falls_back_to_normal() {
        assert_eq!(SpecialStatus::from_label("??"), SpecialStatus::Normal);
    }

    #[test]
    fn non_string_status_cells_decode_as_normal() {
        for raw in [
            r#"{"id":"1","status":0}"#,
            r#"{"id":"1","status":true}"#,
            r#"{"id":"1","status":null}"#,
            r#"{"id":"1","status":["ร"]}"#,
        ] {
            let student: Student = serde_json::from_str(raw).unwrap();
            assert_eq!(student.status, SpecialStatus::Normal, "{raw}");
        }
    }

    #[test]
    fn typed_status_must_match_a_label() {
        assert_eq!("มส.".parse::<SpecialStatus>(), Ok(SpecialStatus::Incomplete));
        assert_eq!(" ร ".parse::<SpecialStatus>(), Ok(SpecialStatus::AbsentExcused));
        assert_eq!("Normal".parse::<SpecialStatus>(), Ok(SpecialStatus::Normal));
        assert_eq!("ABSENT".parse::<SpecialStatus>(), Ok(SpecialStatus::AbsentExcused));
        assert_eq!(
            "มส .".parse::<SpecialStatus>(),
            Err(UnknownStatus("มส .".to_string()))
        );
        assert!("".parse::<SpecialStatus>().is_err());
        assert!("r".parse::<SpecialStatus>().is_err());
    }

    #[test]
    fn with_student_replaces_only_matching_record() {
        let roster = ClassRoster {
            id: "M1_History".to_string(),
            name: "ม.1 ประวัติศาสตร์".to_string(),
            students: vec![Student::new("1", "A"), Student::new("2", "B")],
        };
        let mut updated = roster.students[1].clone();
        updated.redeemed_draws = 4;

        let students = roster.with_student(&updated);
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].redeemed_draws, 0);
        assert_eq!(students[1].redeemed_draws, 4);
    }

    #[test]
    fn sanitized_clamps_out_of_range_scores() {
        let mut student = Student::new("1", "A");
        student.scores.collected[0] = 14.0;
        student.scores.midterm = -3.0;
        student.scores.final_exam = 25.0;
        let roster = ClassRoster {
            id: "c".to_string(),
            name: String::new(),
            students: vec![student],
        }
        .sanitized();

        let scores = &roster.students[0].scores;
        assert_eq!(scores.collected[0], 10.0);
        assert_eq!(scores.midterm, 0.0);
        assert_eq!(scores.final_exam, 20.0);
    }
}
