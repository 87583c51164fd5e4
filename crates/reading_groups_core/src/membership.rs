//! crates/reading_groups_core/src/membership.rs
//!
//! Membership and ownership rules for groups.

use crate::domain::{Group, GroupDetailsUpdate, Member, NewGroup};
use crate::ports::{PortError, PortResult};

fn require_text(field: &str, value: &str) -> PortResult<()> {
    if value.trim().is_empty() {
        return Err(PortError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Blank image links are stored as "no image".
pub fn normalize_image(image: Option<String>) -> Option<String> {
    image
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl NewGroup {
    pub fn validate(&self) -> PortResult<()> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        require_text("dedicated_to", &self.dedicated_to)?;
        require_text("owner email", &self.owner.email)
    }
}

impl GroupDetailsUpdate {
    pub fn validate(&self) -> PortResult<()> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        require_text("dedicated_to", &self.dedicated_to)
    }
}

impl Group {
    pub fn is_owner(&self, email: &str) -> bool {
        self.owner_email.eq_ignore_ascii_case(email)
    }

    pub fn member(&self, email: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
    }

    fn require_owner(&self, actor_email: &str) -> PortResult<()> {
        if self.is_owner(actor_email) {
            Ok(())
        } else {
            Err(PortError::Forbidden(format!(
                "only the owner of group {} may do this",
                self.id
            )))
        }
    }

    /// Adds a member unless one with the same email already exists.
    /// Returns whether the member was added.
    pub fn add_member(&mut self, member: Member) -> bool {
        if self.member(&member.email).is_some() {
            return false;
        }
        self.members.push(member);
        true
    }

    /// Flips the admin flag of `target_email`. Only the owner may do this and
    /// the owner's own entry cannot be changed. Returns the new flag.
    pub fn toggle_admin(&mut self, actor_email: &str, target_email: &str) -> PortResult<bool> {
        self.require_owner(actor_email)?;
        if self.is_owner(target_email) {
            return Err(PortError::Invalid(
                "the owner's admin rights cannot be changed".to_string(),
            ));
        }
        let member = self
            .members
            .iter_mut()
            .find(|m| m.email.eq_ignore_ascii_case(target_email))
            .ok_or_else(|| PortError::NotFound(format!("Member {} not found", target_email)))?;
        member.admin = !member.admin;
        Ok(member.admin)
    }

    /// Replaces the descriptive fields. Owner only.
    pub fn update_details(&mut self, actor_email: &str, update: GroupDetailsUpdate) -> PortResult<()> {
        self.require_owner(actor_email)?;
        update.validate()?;
        self.name = update.name;
        self.description = update.description;
        self.dedicated_to = update.dedicated_to;
        self.intention = update.intention;
        self.global = update.global;
        self.book_image = normalize_image(update.book_image);
        Ok(())
    }
}
