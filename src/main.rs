use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod config;
mod db;
mod grading;
mod http_store;
mod local_store;
mod models;
mod rank;
mod redemption;
mod report;
mod repository;
mod roster;
mod tickets;

use config::{Backend, Settings, SUBJECTS};
use grading::{grade_student, QuestLog};
use models::{ClassRoster, Enrollment, SpecialStatus};
use rank::{resolve_rank, Gender};
use redemption::{
    RedemptionCoordinator, RedemptionError, RedemptionOutcome, RedemptionPhase, RedemptionPrompt,
};
use repository::{find_enrollments, load_class, RosterRepository};
use roster::ScoreField;
use tickets::TicketInfo;

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Classroom gradebook with rank progression and lucky-draw tickets", long_about = None)]
struct Cli {
    /// Roster store: http, postgres or local (defaults from GRADEBOOK_BACKEND)
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Teacher password, required by teacher commands
    #[arg(long, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// Load demo rosters into the selected store
    Seed,
    /// List configured classes and whether the store has data for them
    Classes,
    /// Show every student of a class with grade and tickets
    Roster {
        #[arg(long)]
        class: String,
    },
    /// Look up a student id and show their results in every class
    Student {
        #[arg(long)]
        id: String,
    },
    /// Redeem one lucky-draw ticket
    Redeem {
        #[arg(long)]
        id: String,
        #[arg(long)]
        class: String,
        /// Skip the confirmation question
        #[arg(long)]
        yes: bool,
    },
    /// Set one score (c1-c6, midterm or final); blank or invalid counts as 0
    SetScore {
        #[arg(long)]
        class: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        field: String,
        #[arg(long, default_value = "")]
        value: String,
    },
    /// Set a special status: Normal, ร or มส.
    SetStatus {
        #[arg(long)]
        class: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        status: String,
    },
    /// Overwrite the redeemed-draw count for a student
    SetRedeemed {
        #[arg(long)]
        class: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        value: String,
    },
    /// Print class statistics
    Stats {
        #[arg(long)]
        class: String,
    },
    /// Generate a markdown class report
    Report {
        #[arg(long)]
        class: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a class roster to CSV
    Export {
        #[arg(long)]
        class: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Merge a CSV file into a class roster and save it
    Import {
        #[arg(long)]
        class: String,
        #[arg(long)]
        csv: PathBuf,
    },
}

struct TerminalPrompt {
    assume_yes: bool,
}

impl RedemptionPrompt for TerminalPrompt {
    fn confirm(&self, enrollment: &Enrollment, tickets: TicketInfo) -> bool {
        if self.assume_yes {
            return true;
        }
        println!(
            "ยืนยันการใช้สิทธิ์จับรางวัล? ({} - {}, เหลือ {} ใบ)",
            enrollment.class.name, enrollment.student.name, tickets.available
        );
        println!("เมื่อกดแล้วตั๋วจะถูกใช้ไปและคุณจะได้สิทธิ์ในการจับรางวัลกับอาจารย์");
        print!("Redeem one ticket? [y/N] ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "ใช่")
    }

    fn notify(&self, outcome: &RedemptionOutcome) {
        match outcome {
            RedemptionOutcome::Confirmed(receipt) => {
                println!("✅ บันทึกการใช้สิทธิ์สำเร็จ! แคปหน้าจอนี้เพื่อยืนยันสิทธิ์จับรางวัลกับอาจารย์");
                println!(
                    "Receipt {} | {} ({}) | {} | redeemed {} | remaining {} | {}",
                    receipt.id,
                    receipt.student_name,
                    receipt.student_id,
                    receipt.class_name,
                    receipt.redeemed,
                    receipt.remaining,
                    receipt.redeemed_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            RedemptionOutcome::RolledBack { restored, .. } => {
                println!("❌ ไม่สามารถบันทึกข้อมูลได้ กรุณาแจ้งอาจารย์ให้ตรวจสอบคอลัมน์ Redeemed ใน Google Sheets");
                println!("Ticket count restored to {restored} redeemed.");
            }
        }
    }
}

async fn connect_pg(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn open_repository(settings: &Settings) -> anyhow::Result<Box<dyn RosterRepository>> {
    let repo: Box<dyn RosterRepository> = match settings.backend {
        Backend::Http => Box::new(
            http_store::HttpRosterRepository::new(settings.endpoint()?)
                .context("failed to build HTTP client")?,
        ),
        Backend::Postgres => Box::new(db::PgRosterRepository::new(connect_pg(settings).await?)),
        Backend::Local => Box::new(
            local_store::LocalRosterRepository::new(&settings.mock_path)
                .with_latency(settings.mock_latency),
        ),
    };
    Ok(repo)
}

fn require_teacher(settings: &Settings, password: Option<&str>) -> anyhow::Result<()> {
    match password {
        Some(given) if given == settings.teacher_password => Ok(()),
        Some(_) => bail!("invalid teacher password"),
        None => bail!("teacher commands need --password"),
    }
}

async fn require_class(repo: &dyn RosterRepository, class_id: &str) -> anyhow::Result<ClassRoster> {
    match load_class(repo, class_id).await {
        Some(class) => Ok(class),
        None => bail!(
            "ไม่พบข้อมูลรายวิชา {class_id}: the store returned no roster for this class (check the sheet tab name or connectivity)"
        ),
    }
}

async fn save_class(repo: &dyn RosterRepository, class: &ClassRoster) -> anyhow::Result<()> {
    if repo.save_roster(&class.id, &class.students).await {
        println!("บันทึกข้อมูลเรียบร้อยแล้ว ({} students in {}).", class.students.len(), class.id);
        Ok(())
    } else {
        bail!("เกิดข้อผิดพลาดในการบันทึก: the store did not confirm the save for {}", class.id)
    }
}

fn print_enrollment(enrollment: &Enrollment, coordinator: &RedemptionCoordinator) {
    let student = &enrollment.student;
    let result = grade_student(student);
    let rank = resolve_rank(result.total_score, &student.id);
    let tickets = coordinator.tickets(enrollment);
    let quests = QuestLog::from_scores(&student.scores);
    let gender = match Gender::from_name(&student.name) {
        Gender::Male => "male",
        Gender::Female => "female",
    };

    println!("== {} ({})", enrollment.class.name, enrollment.class.id);
    println!(
        "{} [{}] {} / {} - {}",
        student.name,
        student.id,
        rank.current.tier,
        rank.current.thai_name,
        rank.current.description
    );
    println!("{} {} ({})", rank.skin_name(), rank.hero_class, gender);
    match rank.next {
        Some(next) => println!(
            "Level progress {:.0}% toward {}",
            rank.display_progress(),
            next.tier
        ),
        None => println!("Level progress 100% (top tier)"),
    }
    let status = if student.status.is_normal() {
        "Online".to_string()
    } else {
        student.status.to_string()
    };
    println!(
        "Score {} | Grade {} | Status {}",
        result.total_score, result.grade, status
    );
    println!(
        "Tickets available {} (earned {}, redeemed {})",
        tickets.available, tickets.earned, tickets.redeemed
    );
    println!(
        "Collected {}/{} ({:.0}%) | Midterm {}/20 ({:.0}%) | Final {}/20 ({:.0}%)",
        quests.collected,
        quests.collected_max,
        quests.collected_percent(),
        quests.midterm,
        quests.midterm_percent(),
        quests.final_exam,
        quests.final_percent()
    );
    println!("Avatar {}", rank.avatar_url());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let backend = cli
        .backend
        .as_deref()
        .map(str::parse::<Backend>)
        .transpose()
        .context("invalid --backend")?;
    let settings = Settings::from_env(backend)?;
    let password = cli.password.as_deref();

    match cli.command {
        Commands::InitDb => {
            let pool = connect_pg(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => match settings.backend {
            Backend::Postgres => {
                let pool = connect_pg(&settings).await?;
                let seeded = db::seed(&pool).await?;
                println!("Seeded {seeded} enrollments.");
            }
            Backend::Local => {
                let repo = local_store::LocalRosterRepository::new(&settings.mock_path);
                let classes = repo.load_all().await;
                println!(
                    "Local store {} holds {} classes.",
                    repo.path().display(),
                    classes.len()
                );
            }
            Backend::Http => bail!("the spreadsheet endpoint is seeded from the sheet itself"),
        },
        Commands::Classes => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let classes = repo.load_all().await;
            if classes.is_empty() {
                println!("No roster data available (store empty or unreachable).");
            }
            for subject in SUBJECTS.iter() {
                match classes.iter().find(|c| c.id == subject.id) {
                    Some(class) => println!(
                        "- {} {} ({} students)",
                        subject.id,
                        subject.name,
                        class.students.len()
                    ),
                    None => println!("- {} {} (no data)", subject.id, subject.name),
                }
            }
            for class in classes
                .iter()
                .filter(|c| SUBJECTS.iter().all(|s| s.id != c.id))
            {
                println!("- {} {} ({} students, unlisted)", class.id, class.name, class.students.len());
            }
        }
        Commands::Roster { class } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let class = require_class(repo.as_ref(), &class).await?;
            println!("{} ({})", class.name, class.id);
            for student in class.students.iter() {
                let result = grade_student(student);
                let rank = resolve_rank(result.total_score, &student.id);
                let tickets = tickets::ticket_info(rank.rank_index, student.redeemed_draws);
                println!(
                    "- {} {} total {} grade {} {} | {} | tickets {}/{}",
                    student.id,
                    student.name,
                    result.total_score,
                    result.grade,
                    if result.is_pass { "pass" } else { "fail" },
                    rank.current.tier,
                    tickets.available,
                    tickets.earned
                );
            }
        }
        Commands::Student { id } => {
            let repo = open_repository(&settings).await?;
            let enrollments = find_enrollments(repo.as_ref(), &id).await;
            if enrollments.is_empty() {
                println!("ไม่พบรหัสนักเรียน {id} หรือ ระบบขัดข้อง (student not found).");
                return Ok(());
            }
            let coordinator = RedemptionCoordinator::new();
            for enrollment in enrollments.iter() {
                print_enrollment(enrollment, &coordinator);
                println!();
            }
        }
        Commands::Redeem { id, class, yes } => {
            let repo = open_repository(&settings).await?;
            let enrollments = find_enrollments(repo.as_ref(), &id).await;
            let Some(enrollment) = enrollments.into_iter().find(|e| e.class.id == class) else {
                println!("ไม่พบรหัสนักเรียน {id} ในรายวิชา {class} (student not found).");
                return Ok(());
            };

            let mut coordinator = RedemptionCoordinator::new();
            let prompt = TerminalPrompt { assume_yes: yes };
            match coordinator.redeem(repo.as_ref(), &enrollment, &prompt).await {
                Ok(outcome) => {
                    if outcome.phase() == RedemptionPhase::RolledBack {
                        bail!("redemption was not saved; nothing was consumed")
                    }
                }
                Err(RedemptionError::NoTicketsAvailable) => {
                    println!("Rank up to earn more tickets: none available right now.");
                }
                Err(RedemptionError::Declined) => println!("Redemption cancelled."),
                Err(err) => return Err(err.into()),
            }
        }
        Commands::SetScore {
            class,
            student,
            field,
            value,
        } => {
            require_teacher(&settings, password)?;
            let field: ScoreField = field.parse()?;
            let repo = open_repository(&settings).await?;
            let mut class = require_class(repo.as_ref(), &class).await?;
            let stored = roster::set_score(&mut class.students, &student, field, &value)?;
            log::info!("[ROSTER] {} {:?} -> {}", student, field, stored);
            save_class(repo.as_ref(), &class).await?;
        }
        Commands::SetStatus {
            class,
            student,
            status,
        } => {
            require_teacher(&settings, password)?;
            let status: SpecialStatus = status.parse()?;
            let repo = open_repository(&settings).await?;
            let mut class = require_class(repo.as_ref(), &class).await?;
            roster::set_status(&mut class.students, &student, status)?;
            save_class(repo.as_ref(), &class).await?;
        }
        Commands::SetRedeemed {
            class,
            student,
            value,
        } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let mut class = require_class(repo.as_ref(), &class).await?;
            let count = roster::set_redeemed(&mut class.students, &student, &value)?;
            log::info!("[ROSTER] {} redeemed -> {}", student, count);
            save_class(repo.as_ref(), &class).await?;
        }
        Commands::Stats { class } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let class = require_class(repo.as_ref(), &class).await?;
            let stats = report::class_stats(&class);
            println!("{} ({}): {} students", class.name, class.id, stats.student_count);
            println!(
                "Average {:.1} | Max {} | Min {}",
                stats.average, stats.max, stats.min
            );
            for (points, count) in stats.distribution.iter() {
                println!("- grade {points}: {count}");
            }
            println!("- ร: {} | มส.: {}", stats.absent_excused, stats.incomplete);
        }
        Commands::Report { class, out } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let class = require_class(repo.as_ref(), &class).await?;
            std::fs::write(&out, report::build_report(&class))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { class, out } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let class = require_class(repo.as_ref(), &class).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{}_grades.csv", class.id)));
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            roster::export_csv(&class.students, file)?;
            println!("Exported {} students to {}.", class.students.len(), out.display());
        }
        Commands::Import { class, csv } => {
            require_teacher(&settings, password)?;
            let repo = open_repository(&settings).await?;
            let mut class = require_class(repo.as_ref(), &class).await?;
            let file = std::fs::File::open(&csv)
                .with_context(|| format!("failed to open {}", csv.display()))?;
            let summary = roster::import_csv(&mut class.students, file)?;
            println!(
                "Imported {} updated and {} new students from {}.",
                summary.updated,
                summary.added,
                csv.display()
            );
            save_class(repo.as_ref(), &class).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::from_env(Some(Backend::Local)).unwrap();
        settings.teacher_password = "admin".to_string();
        settings
    }

    #[test]
    fn teacher_gate_checks_password() {
        let settings = settings();
        assert!(require_teacher(&settings, Some("admin")).is_ok());
        assert!(require_teacher(&settings, Some("guess")).is_err());
        assert!(require_teacher(&settings, None).is_err());
    }

    #[test]
    fn cli_parses_redeem() {
        let cli = Cli::parse_from([
            "gradebook", "--backend", "local", "redeem", "--id", "661001", "--class", "M1_History",
            "--yes",
        ]);
        assert_eq!(cli.backend.as_deref(), Some("local"));
        match cli.command {
            Commands::Redeem { id, class, yes } => {
                assert_eq!(id, "661001");
                assert_eq!(class, "M1_History");
                assert!(yes);
            }
            _ => panic!("expected redeem"),
        }
    }

    #[tokio::test]
    async fn missing_class_is_reported_not_panicked() {
        let repo = repository::testing::InMemoryRosterRepository::new(Vec::new());
        assert!(require_class(&repo, "M1_History").await.is_err());
    }
}
