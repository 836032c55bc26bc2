use std::io::{Read, Write};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::config::{COLLECTED_SLOTS, MAX_COLLECTED, MAX_FINAL, MAX_MIDTERM};
use crate::grading::{grade_student, parse_count_input, parse_score_input};
use crate::models::{SpecialStatus, Student, UnknownStatus};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("student {0} is not on this roster")]
    StudentNotFound(String),
    #[error("unknown score field '{0}' (expected c1-c6, midterm or final)")]
    UnknownField(String),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv row {row}: missing student id")]
    MissingId { row: usize },
    #[error("csv row {row}: {source}")]
    Status { row: usize, source: UnknownStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreField {
    Collected(usize),
    Midterm,
    Final,
}

impl ScoreField {
    pub fn max(self) -> f64 {
        match self {
            ScoreField::Collected(_) => MAX_COLLECTED,
            ScoreField::Midterm => MAX_MIDTERM,
            ScoreField::Final => MAX_FINAL,
        }
    }
}

impl FromStr for ScoreField {
    type Err = EditError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "midterm" | "mid" => Ok(ScoreField::Midterm),
            "final" => Ok(ScoreField::Final),
            other => other
                .strip_prefix('c')
                .and_then(|slot| slot.parse::<usize>().ok())
                .filter(|slot| (1..=COLLECTED_SLOTS).contains(slot))
                .map(|slot| ScoreField::Collected(slot - 1))
                .ok_or_else(|| EditError::UnknownField(value.to_string())),
        }
    }
}

fn student_mut<'a>(students: &'a mut [Student], student_id: &str) -> Result<&'a mut Student, EditError> {
    students
        .iter_mut()
        .find(|s| s.id == student_id)
        .ok_or_else(|| EditError::StudentNotFound(student_id.to_string()))
}

pub fn set_score(
    students: &mut [Student],
    student_id: &str,
    field: ScoreField,
    raw: &str,
) -> Result<f64, EditError> {
    let student = student_mut(students, student_id)?;
    let value = parse_score_input(raw, field.max());
    match field {
        ScoreField::Collected(slot) => student.scores.collected[slot] = value,
        ScoreField::Midterm => student.scores.midterm = value,
        ScoreField::Final => student.scores.final_exam = value,
    }
    Ok(value)
}

pub fn set_status(
    students: &mut [Student],
    student_id: &str,
    status: SpecialStatus,
) -> Result<(), EditError> {
    student_mut(students, student_id)?.status = status;
    Ok(())
}

pub fn set_redeemed(students: &mut [Student], student_id: &str, raw: &str) -> Result<u32, EditError> {
    let count = parse_count_input(raw);
    student_mut(students, student_id)?.redeemed_draws = count;
    Ok(count)
}

pub fn export_csv<W: Write>(students: &[Student], writer: W) -> Result<(), EditError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "ID", "Name", "C1", "C2", "C3", "C4", "C5", "C6", "Midterm", "Final", "Total", "Grade",
        "Status", "RedeemedDraws",
    ])?;

    for student in students {
        let result = grade_student(student);
        let mut record = Vec::with_capacity(14);
        record.push(student.id.clone());
        record.push(student.name.clone());
        record.extend(student.scores.collected.iter().map(|s| s.to_string()));
        record.push(student.scores.midterm.to_string());
        record.push(student.scores.final_exam.to_string());
        record.push(result.total_score.to_string());
        record.push(result.grade.to_string());
        record.push(student.status.label().to_string());
        record.push(student.redeemed_draws.to_string());
        csv.write_record(&record)?;
    }

    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub updated: usize,
    pub added: usize,
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(alias = "ID")]
    id: String,
    #[serde(alias = "Name", default)]
    name: Option<String>,
    #[serde(alias = "C1", default)]
    c1: Option<String>,
    #[serde(alias = "C2", default)]
    c2: Option<String>,
    #[serde(alias = "C3", default)]
    c3: Option<String>,
    #[serde(alias = "C4", default)]
    c4: Option<String>,
    #[serde(alias = "C5", default)]
    c5: Option<String>,
    #[serde(alias = "C6", default)]
    c6: Option<String>,
    #[serde(alias = "Midterm", default)]
    midterm: Option<String>,
    #[serde(rename = "final", alias = "Final", default)]
    final_exam: Option<String>,
    #[serde(alias = "Status", default)]
    status: Option<String>,
    #[serde(alias = "RedeemedDraws", default)]
    redeemed_draws: Option<String>,
}

pub fn import_csv<R: Read>(students: &mut Vec<Student>, reader: R) -> Result<ImportSummary, EditError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut summary = ImportSummary::default();

    for (index, result) in csv.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        if row.id.trim().is_empty() {
            return Err(EditError::MissingId { row: index + 1 });
        }
        let status = match row.status.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(label) => label
                .parse::<SpecialStatus>()
                .map_err(|source| EditError::Status { row: index + 1, source })?,
            None => SpecialStatus::Normal,
        };

        let position = match students.iter().position(|s| s.id == row.id) {
            Some(position) => {
                summary.updated += 1;
                position
            }
            None => {
                students.push(Student::new(row.id.clone(), String::new()));
                summary.added += 1;
                students.len() - 1
            }
        };
        let student = &mut students[position];

        if let Some(name) = row.name.filter(|n| !n.trim().is_empty()) {
            student.name = name;
        }
        let collected = [&row.c1, &row.c2, &row.c3, &row.c4, &row.c5, &row.c6];
        for (slot, raw) in student.scores.collected.iter_mut().zip(collected) {
            *slot = parse_score_input(raw.as_deref().unwrap_or(""), MAX_COLLECTED);
        }
        student.scores.midterm = parse_score_input(row.midterm.as_deref().unwrap_or(""), MAX_MIDTERM);
        student.scores.final_exam = parse_score_input(row.final_exam.as_deref().unwrap_or(""), MAX_FINAL);
        student.status = status;
        if let Some(raw) = row.redeemed_draws.filter(|r| !r.trim().is_empty()) {
            student.redeemed_draws = parse_count_input(&raw);
        }
    }

    log::info!(
        "[ROSTER] csv import updated:{} added:{}",
        summary.updated,
        summary.added
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Student> {
        let mut first = Student::new("661001", "สมชาย ใจดี");
        first.redeemed_draws = 2;
        vec![first, Student::new("661002", "สุดา ศรีสุข")]
    }

    #[test]
    fn score_fields_parse() {
        assert_eq!("c1".parse::<ScoreField>().unwrap(), ScoreField::Collected(0));
        assert_eq!("C6".parse::<ScoreField>().unwrap(), ScoreField::Collected(5));
        assert_eq!("Midterm".parse::<ScoreField>().unwrap(), ScoreField::Midterm);
        assert_eq!("final".parse::<ScoreField>().unwrap(), ScoreField::Final);
        assert!("c7".parse::<ScoreField>().is_err());
        assert!("c0".parse::<ScoreField>().is_err());
        assert!("quiz".parse::<ScoreField>().is_err());
    }

    #[test]
    fn set_score_clamps_per_field() {
        let mut students = roster();
        assert_eq!(set_score(&mut students, "661001", ScoreField::Midterm, "27").unwrap(), 20.0);
        assert_eq!(set_score(&mut students, "661001", ScoreField::Collected(2), "-3").unwrap(), 0.0);
        assert_eq!(set_score(&mut students, "661001", ScoreField::Final, "").unwrap(), 0.0);
        assert_eq!(set_score(&mut students, "661001", ScoreField::Collected(0), "8.5").unwrap(), 8.5);
        assert_eq!(students[0].scores.midterm, 20.0);
        assert_eq!(students[0].scores.collected[0], 8.5);
        assert_eq!(students[1].scores.midterm, 0.0);
    }

    #[test]
    fn edits_on_missing_student_fail() {
        let mut students = roster();
        assert!(matches!(
            set_status(&mut students, "999", SpecialStatus::Incomplete),
            Err(EditError::StudentNotFound(id)) if id == "999"
        ));
    }

    #[test]
    fn redeemed_edit_floors_at_zero() {
        let mut students = roster();
        assert_eq!(set_redeemed(&mut students, "661001", "-4").unwrap(), 0);
        assert_eq!(set_redeemed(&mut students, "661002", "3").unwrap(), 3);
        assert_eq!(students[1].redeemed_draws, 3);
    }

    #[test]
    fn export_writes_header_and_derived_columns() {
        let mut students = roster();
        students[0].scores.collected = [10.0; 6];
        students[0].scores.midterm = 15.0;
        students[0].scores.final_exam = 10.0;
        students[1].status = SpecialStatus::AbsentExcused;

        let mut out = Vec::new();
        export_csv(&students, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "ID,Name,C1,C2,C3,C4,C5,C6,Midterm,Final,Total,Grade,Status,RedeemedDraws"
        );
        assert_eq!(lines[1], "661001,สมชาย ใจดี,10,10,10,10,10,10,15,10,85,4,Normal,2");
        assert_eq!(lines[2], "661002,สุดา ศรีสุข,0,0,0,0,0,0,0,0,0,ร,ร,0");
    }

    #[test]
    fn import_merges_by_id_and_clamps() {
        let mut students = roster();
        let csv = "\
id,name,c1,c2,c3,c4,c5,c6,midterm,final,status,redeemed_draws
661001,,9,9,9,9,9,12,18,25,Normal,
661003,ปิติ มั่นคง,5,5,5,5,5,5,10,10,มส.,1
";
        let summary = import_csv(&mut students, csv.as_bytes()).unwrap();

        assert_eq!(summary, ImportSummary { updated: 1, added: 1 });
        assert_eq!(students.len(), 3);
        assert_eq!(students[0].name, "สมชาย ใจดี");
        assert_eq!(students[0].scores.collected[5], 10.0);
        assert_eq!(students[0].scores.final_exam, 20.0);
        assert_eq!(students[0].redeemed_draws, 2);
        assert_eq!(students[2].status, SpecialStatus::Incomplete);
        assert_eq!(students[2].redeemed_draws, 1);
    }

    #[test]
    fn import_rejects_mistyped_status() {
        let mut students = roster();
        students[1].status = SpecialStatus::AbsentExcused;
        let csv = "\
id,name,c1,c2,c3,c4,c5,c6,midterm,final,status,redeemed_draws
661001,,9,9,9,9,9,9,18,18,,
661002,,1,1,1,1,1,1,1,1,มส .,
";
        let err = import_csv(&mut students, csv.as_bytes()).unwrap_err();

        assert!(matches!(err, EditError::Status { row: 2, .. }));
        assert_eq!(students[0].status, SpecialStatus::Normal);
        assert_eq!(students[1].status, SpecialStatus::AbsentExcused);
        assert_eq!(students[1].scores.midterm, 0.0);
    }

    #[test]
    fn exported_file_imports_back() {
        let mut students = roster();
        students[1].scores.midterm = 12.0;
        let mut out = Vec::new();
        export_csv(&students, &mut out).unwrap();

        let mut copy = roster();
        let summary = import_csv(&mut copy, out.as_slice()).unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(copy, students);
    }
}
