pub mod content;
pub mod domain;
pub mod lifecycle;
pub mod membership;
pub mod ports;
pub mod service;

pub use content::{hebrew_numeral, ContentLocator};
pub use domain::{
    AuthSession, BookType, Group, GroupDetailsUpdate, GroupFilter, Intention, Member, NewGroup,
    PartNumber, User, UserCredentials,
};
pub use lifecycle::{claim_ttl, select_part, sweep_stale_claims, FinishOutcome, CLAIM_TTL_MS};
pub use ports::{DatabaseService, PortError, PortResult};
pub use service::{FinishedPart, PartAssignment, ReadingService, MAX_SAVE_ATTEMPTS};
