use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::grading::grade_student;
use crate::models::{Enrollment, Student};
use crate::rank::resolve_rank;
use crate::repository::RosterRepository;
use crate::tickets::{ticket_info, TicketInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionPhase {
    Idle,
    Redeeming,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedemptionError {
    #[error("no tickets available to redeem")]
    NoTicketsAvailable,
    #[error("a redemption for this class is already in progress")]
    InFlight,
    #[error("redemption cancelled")]
    Declined,
    #[error("redemption attempt {0} is not pending")]
    StaleAttempt(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EnrollmentKey {
    class_id: String,
    student_id: String,
}

impl EnrollmentKey {
    fn of(enrollment: &Enrollment) -> Self {
        Self {
            class_id: enrollment.class.id.clone(),
            student_id: enrollment.student.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    attempt: Uuid,
    prior_overlay: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct StagedRedemption {
    attempt: Uuid,
    key: EnrollmentKey,
    class_name: String,
    student_name: String,
    rank_index: usize,
    pub previous_redeemed: u32,
    pub new_redeemed: u32,
    pub students: Vec<Student>,
}

impl StagedRedemption {
    #[cfg(test)]
    pub fn attempt(&self) -> Uuid {
        self.attempt
    }

    pub fn class_id(&self) -> &str {
        &self.key.class_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionReceipt {
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub class_name: String,
    pub redeemed: u32,
    pub remaining: u32,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    Confirmed(RedemptionReceipt),
    RolledBack {
        class_id: String,
        student_id: String,
        restored: u32,
    },
}

impl RedemptionOutcome {
    pub fn phase(&self) -> RedemptionPhase {
        match self {
            RedemptionOutcome::Confirmed(_) => RedemptionPhase::Confirmed,
            RedemptionOutcome::RolledBack { .. } => RedemptionPhase::RolledBack,
        }
    }
}

pub trait RedemptionPrompt {
    fn confirm(&self, enrollment: &Enrollment, tickets: TicketInfo) -> bool;

    fn notify(&self, outcome: &RedemptionOutcome);
}

#[derive(Debug, Default)]
pub struct RedemptionCoordinator {
    overlay: HashMap<EnrollmentKey, u32>,
    pending: HashMap<EnrollmentKey, Pending>,
}

impl RedemptionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redeemed_count(&self, enrollment: &Enrollment) -> u32 {
        self.overlay
            .get(&EnrollmentKey::of(enrollment))
            .copied()
            .unwrap_or(enrollment.student.redeemed_draws)
    }

    pub fn tickets(&self, enrollment: &Enrollment) -> TicketInfo {
        ticket_info(rank_index(enrollment), self.redeemed_count(enrollment))
    }

    pub fn phase(&self, enrollment: &Enrollment) -> RedemptionPhase {
        if self.pending.contains_key(&EnrollmentKey::of(enrollment)) {
            RedemptionPhase::Redeeming
        } else {
            RedemptionPhase::Idle
        }
    }

    pub fn begin(&mut self, enrollment: &Enrollment) -> Result<StagedRedemption, RedemptionError> {
        let key = EnrollmentKey::of(enrollment);
        if self.pending.contains_key(&key) {
            return Err(RedemptionError::InFlight);
        }

        let tickets = self.tickets(enrollment);
        if tickets.available == 0 {
            return Err(RedemptionError::NoTicketsAvailable);
        }

        let previous_redeemed = self.redeemed_count(enrollment);
        let new_redeemed = previous_redeemed + 1;
        let attempt = Uuid::new_v4();

        let prior_overlay = self.overlay.insert(key.clone(), new_redeemed);
        self.pending.insert(
            key.clone(),
            Pending {
                attempt,
                prior_overlay,
            },
        );

        let updated = Student {
            redeemed_draws: new_redeemed,
            ..enrollment.student.clone()
        };
        let students = enrollment.class.with_student(&updated);

        log::info!(
            "[REDEEM] staged attempt:{} class:{} student:{} redeemed:{}->{}",
            attempt,
            key.class_id,
            key.student_id,
            previous_redeemed,
            new_redeemed
        );

        Ok(StagedRedemption {
            attempt,
            key,
            class_name: enrollment.class.name.clone(),
            student_name: enrollment.student.name.clone(),
            rank_index: rank_index(enrollment),
            previous_redeemed,
            new_redeemed,
            students,
        })
    }

    pub fn settle(
        &mut self,
        staged: StagedRedemption,
        saved: bool,
    ) -> Result<RedemptionOutcome, RedemptionError> {
        let pending = match self.pending.get(&staged.key) {
            Some(pending) if pending.attempt == staged.attempt => *pending,
            _ => return Err(RedemptionError::StaleAttempt(staged.attempt)),
        };
        self.pending.remove(&staged.key);

        if saved {
            log::info!(
                "[REDEEM] confirmed attempt:{} class:{} student:{}",
                staged.attempt,
                staged.key.class_id,
                staged.key.student_id
            );
            let remaining = ticket_info(staged.rank_index, staged.new_redeemed).available;
            return Ok(RedemptionOutcome::Confirmed(RedemptionReceipt {
                id: staged.attempt,
                student_id: staged.key.student_id,
                student_name: staged.student_name,
                class_id: staged.key.class_id,
                class_name: staged.class_name,
                redeemed: staged.new_redeemed,
                remaining,
                redeemed_at: Utc::now(),
            }));
        }

        match pending.prior_overlay {
            Some(prior) => {
                self.overlay.insert(staged.key.clone(), prior);
            }
            None => {
                self.overlay.remove(&staged.key);
            }
        }
        log::warn!(
            "[REDEEM] rolled back attempt:{} class:{} student:{} restored:{}",
            staged.attempt,
            staged.key.class_id,
            staged.key.student_id,
            staged.previous_redeemed
        );

        Ok(RedemptionOutcome::RolledBack {
            class_id: staged.key.class_id,
            student_id: staged.key.student_id,
            restored: staged.previous_redeemed,
        })
    }

    pub async fn redeem(
        &mut self,
        repo: &dyn RosterRepository,
        enrollment: &Enrollment,
        prompt: &dyn RedemptionPrompt,
    ) -> Result<RedemptionOutcome, RedemptionError> {
        if self.phase(enrollment) == RedemptionPhase::Redeeming {
            return Err(RedemptionError::InFlight);
        }
        let tickets = self.tickets(enrollment);
        if tickets.available == 0 {
            return Err(RedemptionError::NoTicketsAvailable);
        }
        if !prompt.confirm(enrollment, tickets) {
            return Err(RedemptionError::Declined);
        }

        let staged = self.begin(enrollment)?;
        let saved = repo.save_roster(staged.class_id(), &staged.students).await;
        let outcome = self.settle(staged, saved)?;
        prompt.notify(&outcome);
        Ok(outcome)
    }
}

fn rank_index(enrollment: &Enrollment) -> usize {
    let result = grade_student(&enrollment.student);
    resolve_rank(result.total_score, &enrollment.student.id).rank_index
}
