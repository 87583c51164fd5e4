//! crates/reading_groups_core/src/service.rs
//!
//! Applies lifecycle and membership changes to stored groups.
//!
//! Every change is a read-modify-write of the whole group. The store rejects a
//! save whose version is stale, in which case the group is re-read and the
//! change re-applied to the fresh copy.

use crate::domain::{Group, GroupDetailsUpdate, GroupFilter, Member, NewGroup, PartNumber};
use crate::lifecycle::FinishOutcome;
use crate::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// How many times a conflicting save is retried before giving up.
pub const MAX_SAVE_ATTEMPTS: usize = 5;

/// Outcome of asking for a part to read.
#[derive(Debug, Clone)]
pub struct PartAssignment {
    pub group: Group,
    /// `None` when every part is completed or being read.
    pub part: Option<PartNumber>,
}

#[derive(Debug, Clone)]
pub struct FinishedPart {
    pub group: Group,
    pub outcome: FinishOutcome,
}

#[derive(Clone)]
pub struct ReadingService {
    db: Arc<dyn DatabaseService>,
}

impl ReadingService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Loads the group, lets `apply` change it and saves it when `apply`
    /// reports a change. Conflicting saves are retried on a fresh copy.
    async fn mutate<T, F>(&self, group_id: Uuid, mut apply: F) -> PortResult<(Group, T)>
    where
        F: FnMut(&mut Group) -> PortResult<(bool, T)> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut group = self.db.get_group(group_id).await?;
            let (changed, value) = apply(&mut group)?;
            if !changed {
                return Ok((group, value));
            }
            match self.db.save_group(&group).await {
                Ok(saved) => return Ok((saved, value)),
                Err(PortError::Conflict(_)) if attempt < MAX_SAVE_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Drops stale claims, then claims a random free part.
    pub async fn request_part(&self, group_id: Uuid, now: DateTime<Utc>) -> PortResult<PartAssignment> {
        let (group, part) = self
            .mutate(group_id, |group| {
                let refreshed = group.refresh_claims(now);
                let part = group.claim_random_part(&mut rand::thread_rng(), now);
                Ok((refreshed || part.is_some(), part))
            })
            .await?;
        Ok(PartAssignment { group, part })
    }

    /// Completes a claimed part. A finish without a live claim is not saved.
    pub async fn finish_part(&self, group_id: Uuid, part: PartNumber) -> PortResult<FinishedPart> {
        let (group, outcome) = self
            .mutate(group_id, |group| {
                ensure_part_in_range(group, part)?;
                let outcome = group.finish_part(part);
                Ok((!outcome.already_completed, outcome))
            })
            .await?;
        Ok(FinishedPart { group, outcome })
    }

    /// Releases a claim. Returns whether a claim was released.
    pub async fn abandon_part(&self, group_id: Uuid, part: PartNumber) -> PortResult<(Group, bool)> {
        self.mutate(group_id, |group| {
            ensure_part_in_range(group, part)?;
            let released = group.abandon_part(part);
            Ok((released, released))
        })
        .await
    }

    /// Sweeps one group. Returns whether it was changed.
    pub async fn sweep_group(&self, group_id: Uuid, now: DateTime<Utc>) -> PortResult<bool> {
        let (_, changed) = self
            .mutate(group_id, |group| {
                let changed = group.refresh_claims(now);
                Ok((changed, changed))
            })
            .await?;
        Ok(changed)
    }

    /// Sweeps every group. Returns how many groups were changed.
    ///
    /// Groups are swept one by one; a group that fails to save is skipped and
    /// the error returned after the remaining groups have been processed.
    pub async fn sweep_all(&self, now: DateTime<Utc>) -> PortResult<usize> {
        let groups = self.db.list_groups(&GroupFilter::All).await?;
        let mut cleaned = 0;
        let mut first_error = None;
        for group in groups {
            let mut probe = group.clone();
            if !probe.refresh_claims(now) {
                continue;
            }
            match self.sweep_group(group.id, now).await {
                Ok(true) => cleaned += 1,
                Ok(false) | Err(PortError::NotFound(_)) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if cleaned == 0 => Err(e),
            _ => Ok(cleaned),
        }
    }

    pub async fn create_group(&self, new_group: NewGroup) -> PortResult<Group> {
        new_group.validate()?;
        self.db.create_group(new_group).await
    }

    /// Adds the member to the group. Returns whether they were new.
    pub async fn join_group(&self, group_id: Uuid, member: Member) -> PortResult<(Group, bool)> {
        self.mutate(group_id, |group| {
            let added = group.add_member(member.clone());
            Ok((added, added))
        })
        .await
    }

    /// Flips a member's admin flag. Returns the new flag.
    pub async fn toggle_admin(
        &self,
        group_id: Uuid,
        actor_email: &str,
        target_email: &str,
    ) -> PortResult<(Group, bool)> {
        self.mutate(group_id, |group| {
            let admin = group.toggle_admin(actor_email, target_email)?;
            Ok((true, admin))
        })
        .await
    }

    pub async fn update_details(
        &self,
        group_id: Uuid,
        actor_email: &str,
        update: GroupDetailsUpdate,
    ) -> PortResult<Group> {
        let (group, ()) = self
            .mutate(group_id, |group| {
                group.update_details(actor_email, update.clone())?;
                Ok((true, ()))
            })
            .await?;
        Ok(group)
    }
}

fn ensure_part_in_range(group: &Group, part: PartNumber) -> PortResult<()> {
    if group.contains_part(part) {
        Ok(())
    } else {
        Err(PortError::Invalid(format!(
            "part {} is outside 1..={}",
            part, group.max
        )))
    }
}
