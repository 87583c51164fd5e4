//! crates/reading_groups_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// One numbered unit of a text, counted from 1.
pub type PartNumber = u32;

/// The text a group is reading. The number of parts is fixed per book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookType {
    Tanya,
    Psalms,
    Mishnah,
}

impl BookType {
    pub const ALL: [BookType; 3] = [BookType::Tanya, BookType::Psalms, BookType::Mishnah];

    /// The stable wire code ("1", "2", "3").
    pub fn code(self) -> &'static str {
        match self {
            BookType::Tanya => "1",
            BookType::Psalms => "2",
            BookType::Mishnah => "3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code.trim())
    }

    /// Total number of parts in one full cycle of this book.
    pub fn max_parts(self) -> PartNumber {
        match self {
            BookType::Tanya => 385,
            BookType::Psalms => 150,
            BookType::Mishnah => 525,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BookType::Tanya => "תניא",
            BookType::Psalms => "תהילים",
            BookType::Mishnah => "משנה",
        }
    }
}

/// What the group's reading is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intention {
    Merit,
    InMemoryOf,
    Success,
    Children,
    Healing,
    Other,
}

impl Intention {
    pub const ALL: [Intention; 6] = [
        Intention::Merit,
        Intention::InMemoryOf,
        Intention::Success,
        Intention::Children,
        Intention::Healing,
        Intention::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Intention::Merit => "1",
            Intention::InMemoryOf => "2",
            Intention::Success => "3",
            Intention::Children => "4",
            Intention::Healing => "5",
            Intention::Other => "7",
        }
    }

    /// Unknown codes are treated as `Other`.
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|i| i.code() == code.trim())
            .unwrap_or(Intention::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            Intention::Merit => "זכות",
            Intention::InMemoryOf => "ע״נ",
            Intention::Success => "הצלחה",
            Intention::Children => "זחו״ק",
            Intention::Healing => "רפואה",
            Intention::Other => "אחר",
        }
    }
}

/// A member of a reading group. Identified by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub email: String,
    pub name: String,
    pub picture_url: String,
    pub admin: bool,
}

/// A shared reading collection with its membership and progress state.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: Uuid,
    /// Bumped by the store on every successful save.
    pub version: i64,
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    pub intention: Intention,
    pub book_type: BookType,
    pub book_image: Option<String>,
    pub owner_email: String,
    pub owner_name: String,
    pub global: bool,
    pub members: Vec<Member>,
    pub max: PartNumber,
    /// Parts completed in the current cycle.
    pub completed: BTreeSet<PartNumber>,
    /// Parts currently being read, with the time they were claimed.
    pub claims: BTreeMap<PartNumber, DateTime<Utc>>,
    /// Claims carried over from records that predate claim timestamps.
    pub legacy_in_progress: Vec<PartNumber>,
    pub books_read: u32,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to create a new group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    pub intention: Intention,
    pub book_type: BookType,
    pub book_image: Option<String>,
    pub global: bool,
    pub owner: Member,
}

impl NewGroup {
    /// Builds the initial group record: the owner is the only (admin) member
    /// and no part has been read yet.
    pub fn into_group(self, id: Uuid, now: DateTime<Utc>) -> Group {
        let owner = Member {
            admin: true,
            ..self.owner
        };
        Group {
            id,
            version: 0,
            name: self.name,
            description: self.description,
            dedicated_to: self.dedicated_to,
            intention: self.intention,
            book_type: self.book_type,
            book_image: self.book_image,
            owner_email: owner.email.clone(),
            owner_name: owner.name.clone(),
            global: self.global,
            members: vec![owner],
            max: self.book_type.max_parts(),
            completed: BTreeSet::new(),
            claims: BTreeMap::new(),
            legacy_in_progress: Vec::new(),
            books_read: 0,
            created_at: now,
        }
    }
}

/// Editable descriptive fields of a group.
#[derive(Debug, Clone)]
pub struct GroupDetailsUpdate {
    pub name: String,
    pub description: String,
    pub dedicated_to: String,
    pub intention: Intention,
    pub global: bool,
    pub book_image: Option<String>,
}

/// Which groups a listing should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupFilter {
    /// Every group, regardless of visibility.
    All,
    /// Groups marked as global.
    Global,
    /// Groups the email is a member of but does not own.
    SharedWith(String),
    /// Groups owned by the email.
    OwnedBy(String),
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl User {
    /// The member entry this user gets when joining or creating a group.
    pub fn as_member(&self, admin: bool) -> Member {
        let name = if self.display_name.trim().is_empty() {
            self.email.clone()
        } else {
            self.display_name.clone()
        };
        Member {
            email: self.email.clone(),
            name,
            picture_url: self.photo_url.clone().unwrap_or_default(),
            admin,
        }
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
