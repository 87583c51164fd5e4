//! crates/reading_groups_core/src/lifecycle.rs
//!
//! The reading-part lifecycle of a group:
//! `Unclaimed -> InProgress(t) -> {Completed, Unclaimed}`.
//!
//! Everything here is a pure in-memory transformation of a [`Group`]; loading
//! and saving is done by the reading service.

use crate::domain::{Group, PartNumber};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// A claim older than this is considered abandoned.
pub const CLAIM_TTL_MS: i64 = 2 * 60 * 60 * 1000;

pub fn claim_ttl() -> Duration {
    Duration::milliseconds(CLAIM_TTL_MS)
}

/// Picks a part in `[1, max]` that is not excluded, uniformly among the
/// eligible parts. Returns `None` when every part is excluded.
pub fn select_part<R: Rng + ?Sized>(
    max: PartNumber,
    excluded: &BTreeSet<PartNumber>,
    rng: &mut R,
) -> Option<PartNumber> {
    let available: Vec<PartNumber> = (1..=max).filter(|p| !excluded.contains(p)).collect();
    available.choose(rng).copied()
}

/// Removes every claim whose age is strictly greater than the TTL.
/// Returns how many claims were removed.
pub fn sweep_stale_claims(
    claims: &mut BTreeMap<PartNumber, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> usize {
    let before = claims.len();
    let ttl = claim_ttl();
    claims.retain(|_, claimed_at| now - *claimed_at <= ttl);
    before - claims.len()
}

/// Result of finishing a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishOutcome {
    /// Nothing was recorded: the part had no live claim, typically because it
    /// was finished already.
    pub already_completed: bool,
    /// This finish filled the book; the counter was bumped and the set reset.
    pub cycle_completed: bool,
}

impl Group {
    /// Parts that may not be handed out: completed plus claimed.
    pub fn excluded_parts(&self) -> BTreeSet<PartNumber> {
        self.completed
            .iter()
            .chain(self.claims.keys())
            .copied()
            .collect()
    }

    pub fn contains_part(&self, part: PartNumber) -> bool {
        (1..=self.max).contains(&part)
    }

    /// Gives legacy in-progress entries a fresh timestamp when the group has
    /// no timestamped claims yet. Returns whether anything changed.
    pub fn migrate_legacy_claims(&mut self, now: DateTime<Utc>) -> bool {
        if !self.claims.is_empty() || self.legacy_in_progress.is_empty() {
            return false;
        }
        for part in self.legacy_in_progress.drain(..) {
            if !self.completed.contains(&part) {
                self.claims.insert(part, now);
            }
        }
        true
    }

    /// Migrates legacy claims if needed, otherwise drops stale claims.
    /// Returns whether the group must be saved.
    pub fn refresh_claims(&mut self, now: DateTime<Utc>) -> bool {
        if self.migrate_legacy_claims(now) {
            return true;
        }
        // Once timestamped claims exist the legacy list is only a stale mirror.
        let had_legacy = !self.legacy_in_progress.is_empty();
        self.legacy_in_progress.clear();
        let removed = sweep_stale_claims(&mut self.claims, now);
        removed > 0 || had_legacy
    }

    /// Chooses a random free part and records a claim on it.
    pub fn claim_random_part<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<PartNumber> {
        let part = select_part(self.max, &self.excluded_parts(), rng)?;
        self.claims.insert(part, now);
        Some(part)
    }

    /// Moves a claimed part into the completed set. Filling the book bumps
    /// `books_read` and resets the set.
    ///
    /// Only a live claim (timestamped or legacy) can be completed. Finishing a
    /// part that is not claimed records nothing, so a repeated finish neither
    /// adds the part twice nor carries it into the next cycle.
    pub fn finish_part(&mut self, part: PartNumber) -> FinishOutcome {
        let legacy_before = self.legacy_in_progress.len();
        self.legacy_in_progress.retain(|p| *p != part);
        let claimed =
            self.claims.remove(&part).is_some() || legacy_before != self.legacy_in_progress.len();
        if !claimed || !self.completed.insert(part) {
            return FinishOutcome {
                already_completed: true,
                cycle_completed: false,
            };
        }

        let cycle_completed = self.completed.len() >= self.max as usize;
        if cycle_completed {
            self.complete_cycle();
        }

        FinishOutcome {
            already_completed: false,
            cycle_completed,
        }
    }

    /// Counts a finished book and starts the next cycle.
    pub fn complete_cycle(&mut self) {
        self.books_read += 1;
        self.completed.clear();
    }

    /// Releases a claim without completing it. Returns whether a claim existed.
    pub fn abandon_part(&mut self, part: PartNumber) -> bool {
        let legacy_before = self.legacy_in_progress.len();
        self.legacy_in_progress.retain(|p| *p != part);
        self.claims.remove(&part).is_some() || legacy_before != self.legacy_in_progress.len()
    }

    /// Share of the current cycle already completed, in percent.
    pub fn progress_percent(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        self.completed.len() as f64 * 100.0 / self.max as f64
    }
}
