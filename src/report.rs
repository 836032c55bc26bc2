use std::fmt::Write;

use crate::grading::{grade_student, Grade, GRADE_POINTS};
use crate::models::{ClassRoster, SpecialStatus};
use crate::rank::resolve_rank;
use crate::tickets::ticket_info;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    pub student_count: usize,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub distribution: Vec<(f64, usize)>,
    pub absent_excused: usize,
    pub incomplete: usize,
}

pub fn class_stats(class: &ClassRoster) -> ClassStats {
    let results: Vec<_> = class.students.iter().map(grade_student).collect();
    let scored: Vec<f64> = results
        .iter()
        .map(|r| r.total_score)
        .filter(|total| *total > 0.0)
        .collect();

    let distribution = GRADE_POINTS
        .iter()
        .map(|points| {
            let count = results
                .iter()
                .filter(|r| r.grade == Grade::Points(*points))
                .count();
            (*points, count)
        })
        .collect();

    let count_status = |status: SpecialStatus| {
        results
            .iter()
            .filter(|r| r.grade == Grade::Status(status))
            .count()
    };

    let (average, max, min) = if scored.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            scored.iter().sum::<f64>() / scored.len() as f64,
            scored.iter().cloned().fold(f64::MIN, f64::max),
            scored.iter().cloned().fold(f64::MAX, f64::min),
        )
    };

    ClassStats {
        student_count: class.students.len(),
        average,
        max,
        min,
        distribution,
        absent_excused: count_status(SpecialStatus::AbsentExcused),
        incomplete: count_status(SpecialStatus::Incomplete),
    }
}

pub fn build_report(class: &ClassRoster) -> String {
    let stats = class_stats(class);
    let mut output = String::new();

    let _ = writeln!(output, "# Class Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}), {} students",
        class.name, class.id, stats.student_count
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Summary");

    if stats.student_count == 0 {
        let _ = writeln!(output, "No students on this roster.");
    } else {
        let _ = writeln!(
            output,
            "- average {:.1}, highest {}, lowest {}",
            stats.average, stats.max, stats.min
        );
        let _ = writeln!(
            output,
            "- special status: {} ร, {} มส.",
            stats.absent_excused, stats.incomplete
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    for (points, count) in stats.distribution.iter() {
        let _ = writeln!(output, "- {}: {}", points, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");

    if class.students.is_empty() {
        let _ = writeln!(output, "No students on this roster.");
    } else {
        let _ = writeln!(output, "| ID | Name | Total | Grade | Rank | Tickets |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for student in class.students.iter() {
            let result = grade_student(student);
            let rank = resolve_rank(result.total_score, &student.id);
            let tickets = ticket_info(rank.rank_index, student.redeemed_draws);
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {}/{} |",
                student.id,
                student.name,
                result.total_score,
                result.grade,
                rank.current.tier,
                tickets.available,
                tickets.earned
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreRecord, Student};

    fn student(id: &str, total_final: f64, status: SpecialStatus) -> Student {
        let mut student = Student::new(id, format!("นักเรียน {id}"));
        student.scores = ScoreRecord {
            collected: [10.0; 6],
            midterm: 0.0,
            final_exam: total_final,
        };
        student.status = status;
        student
    }

    fn class() -> ClassRoster {
        ClassRoster {
            id: "M5_Social".to_string(),
            name: "ม.5 สังคมศึกษา".to_string(),
            students: vec![
                student("665001", 20.0, SpecialStatus::Normal),
                student("665002", 0.0, SpecialStatus::Normal),
                student("665003", 10.0, SpecialStatus::AbsentExcused),
                student("665004", 5.0, SpecialStatus::Incomplete),
            ],
        }
    }

    #[test]
    fn stats_skip_zero_totals_and_count_statuses() {
        let stats = class_stats(&class());
        assert_eq!(stats.student_count, 4);
        assert_eq!(stats.average, 70.0);
        assert_eq!(stats.max, 80.0);
        assert_eq!(stats.min, 60.0);
        assert_eq!(stats.absent_excused, 1);
        assert_eq!(stats.incomplete, 1);

        let counts: Vec<usize> = stats.distribution.iter().map(|(_, c)| *c).collect();
        assert_eq!(counts, vec![1, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn empty_class_has_zeroed_stats() {
        let stats = class_stats(&ClassRoster {
            id: "M1_Social".to_string(),
            name: String::new(),
            students: Vec::new(),
        });
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.max, 0.0);
        assert!(stats.distribution.iter().all(|(_, c)| *c == 0));
    }

    #[test]
    fn report_lists_students_with_rank_and_tickets() {
        let report = build_report(&class());
        assert!(report.contains("# Class Report"));
        assert!(report.contains("ม.5 สังคมศึกษา (M5_Social), 4 students"));
        assert!(report.contains("- average 70.0, highest 80, lowest 60"));
        assert!(report.contains("| 665001 | นักเรียน 665001 | 80 | 4 | Chieftain | 5/5 |"));
        assert!(report.contains("| 665003 | นักเรียน 665003 | 0 | ร | Novice Scout | 0/0 |"));
    }
}
