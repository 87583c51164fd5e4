//! services/api/src/import.rs
//!
//! Converts exported `NewGroup` documents from the old document store into
//! typed groups. The old records are loosely typed: part numbers are decimal
//! strings, most fields may be missing, and older records only carry the
//! `inProgress` list without claim timestamps.

use chrono::{DateTime, Utc};
use reading_groups_core::domain::{BookType, Group, Intention, Member, PartNumber};
use reading_groups_core::membership::normalize_image;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Document {id}: invalid JSON: {source}")]
    Json {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Document {id}: unknown book type '{book_type}'")]
    BookType { id: String, book_type: String },
    #[error("Document {id}: part '{part}' is not a number in 1..={max}")]
    Part { id: String, part: String, max: PartNumber },
    #[error("Document {id}: claim timestamp {millis} is out of range")]
    Timestamp { id: String, millis: i64 },
    #[error("Document {id}: owner email is missing")]
    Owner { id: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMember {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pic: String,
    #[serde(default)]
    pub admin: bool,
}

/// Numbers were stored either as JSON numbers or as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn as_text(&self) -> String {
        match self {
            LooseNumber::Int(n) => n.to_string(),
            LooseNumber::Float(f) => f.to_string(),
            LooseNumber::Text(s) => s.clone(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            LooseNumber::Int(n) => Some(*n),
            LooseNumber::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            LooseNumber::Float(_) => None,
            LooseNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// One exported `NewGroup` document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGroupDocument {
    pub object_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dedicated_to: String,
    #[serde(default)]
    pub intention: Option<String>,
    #[serde(default)]
    pub book_type: Option<String>,
    #[serde(default)]
    pub book_image: Option<String>,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub members: Vec<LegacyMember>,
    #[serde(default)]
    pub max: Option<LooseNumber>,
    #[serde(default)]
    pub book: Vec<LooseNumber>,
    #[serde(default)]
    pub in_progress: Vec<LooseNumber>,
    #[serde(default)]
    pub in_progress_data: HashMap<String, LooseNumber>,
    #[serde(default)]
    pub books_readed: Option<LooseNumber>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LegacyGroupDocument {
    fn part(&self, raw: &LooseNumber, max: PartNumber) -> Result<PartNumber, ImportError> {
        raw.as_i64()
            .and_then(|n| PartNumber::try_from(n).ok())
            .filter(|p| (1..=max).contains(p))
            .ok_or_else(|| ImportError::Part {
                id: self.object_id.clone(),
                part: raw.as_text(),
                max,
            })
    }

    /// Validates the document and converts it into a group with a fresh id.
    pub fn into_group(self, now: DateTime<Utc>) -> Result<Group, ImportError> {
        let code = self.book_type.clone().unwrap_or_else(|| "1".to_string());
        let book_type = BookType::from_code(&code).ok_or_else(|| ImportError::BookType {
            id: self.object_id.clone(),
            book_type: code.clone(),
        })?;
        if self.owner_email.trim().is_empty() {
            return Err(ImportError::Owner {
                id: self.object_id.clone(),
            });
        }

        let max = self
            .max
            .as_ref()
            .and_then(LooseNumber::as_i64)
            .and_then(|n| PartNumber::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or_else(|| book_type.max_parts());

        let completed: BTreeSet<PartNumber> = self
            .book
            .iter()
            .map(|raw| self.part(raw, max))
            .collect::<Result<_, _>>()?;

        let mut claims = BTreeMap::new();
        for (raw_part, raw_at) in &self.in_progress_data {
            let part = self.part(&LooseNumber::Text(raw_part.clone()), max)?;
            let millis = raw_at.as_i64().unwrap_or(i64::MIN);
            let at = DateTime::from_timestamp_millis(millis).ok_or_else(|| ImportError::Timestamp {
                id: self.object_id.clone(),
                millis,
            })?;
            if !completed.contains(&part) {
                claims.insert(part, at);
            }
        }

        let legacy_in_progress: Vec<PartNumber> = if claims.is_empty() {
            self.in_progress
                .iter()
                .map(|raw| self.part(raw, max))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|p| !completed.contains(p))
                .collect()
        } else {
            Vec::new()
        };

        let mut members: Vec<Member> = Vec::new();
        for m in self.members {
            let email = m.email.trim().to_string();
            if email.is_empty() || members.iter().any(|x| x.email.eq_ignore_ascii_case(&email)) {
                continue;
            }
            members.push(Member {
                name: if m.name.trim().is_empty() { email.clone() } else { m.name },
                email,
                picture_url: m.pic,
                admin: m.admin,
            });
        }

        let books_read = self
            .books_readed
            .as_ref()
            .and_then(LooseNumber::as_i64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);

        let mut group = Group {
            id: Uuid::new_v4(),
            version: 0,
            name: self.name,
            description: self.description,
            dedicated_to: self.dedicated_to,
            intention: Intention::from_code(self.intention.as_deref().unwrap_or("7")),
            book_type,
            book_image: normalize_image(self.book_image),
            owner_email: self.owner_email.trim().to_string(),
            owner_name: self.owner_name,
            global: self.global,
            members,
            max,
            completed,
            claims,
            legacy_in_progress,
            books_read,
            created_at: self.created_at.unwrap_or(now),
        };
        // The old reader never reset a finished book; count it here.
        if group.completed.len() >= group.max as usize {
            group.complete_cycle();
        }
        Ok(group)
    }
}

/// Parses a JSON array of exported documents. Each document is decoded on its
/// own so one malformed record does not hide the others.
pub fn parse_export(json: &str) -> Result<Vec<Result<LegacyGroupDocument, ImportError>>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let id = value
                .get("objectId")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", i));
            serde_json::from_value(value).map_err(|source| ImportError::Json { id, source })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> LegacyGroupDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_string_parts_and_claim_times() {
        let now = Utc::now();
        let group = doc(json!({
            "objectId": "abc123",
            "name": "Tanya for R. Levi",
            "ownerEmail": "owner@example.com",
            "bookType": "1",
            "max": 385,
            "book": ["1", "2", 3],
            "inProgress": ["4"],
            "inProgressData": {"4": 1700000000000i64},
            "booksReaded": 2,
            "members": [
                {"email": "owner@example.com", "name": "Owner", "pic": "", "admin": true},
                {"email": "OWNER@example.com", "name": "Dup"}
            ]
        }))
        .into_group(now)
        .unwrap();

        assert_eq!(group.completed.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(
            group.claims.get(&4).map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(group.legacy_in_progress.is_empty());
        assert_eq!(group.books_read, 2);
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.max, 385);
    }

    #[test]
    fn keeps_legacy_list_when_no_timestamps() {
        let group = doc(json!({
            "objectId": "old",
            "ownerEmail": "o@example.com",
            "bookType": "2",
            "book": ["5"],
            "inProgress": ["5", "6"]
        }))
        .into_group(Utc::now())
        .unwrap();

        assert_eq!(group.max, 150);
        assert_eq!(group.legacy_in_progress, vec![6]);
        assert!(group.claims.is_empty());
    }

    #[test]
    fn finished_book_starts_a_new_cycle() {
        let group = doc(json!({
            "objectId": "done",
            "ownerEmail": "o@example.com",
            "bookType": "2",
            "max": 2,
            "book": ["1", "2"],
            "booksReaded": 0
        }))
        .into_group(Utc::now())
        .unwrap();

        assert!(group.completed.is_empty());
        assert_eq!(group.books_read, 1);
        assert!(group.excluded_parts().len() < group.max as usize);
    }

    #[test]
    fn rejects_parts_outside_the_book() {
        let result = doc(json!({
            "objectId": "bad",
            "ownerEmail": "o@example.com",
            "bookType": "2",
            "book": ["151"]
        }))
        .into_group(Utc::now());

        assert!(matches!(result, Err(ImportError::Part { part, max: 150, .. }) if part == "151"));
    }

    #[test]
    fn rejects_unknown_book_type_and_missing_owner() {
        let result = doc(json!({"objectId": "x", "ownerEmail": "o@e.com", "bookType": "9"}))
            .into_group(Utc::now());
        assert!(matches!(result, Err(ImportError::BookType { .. })));

        let result = doc(json!({"objectId": "y"})).into_group(Utc::now());
        assert!(matches!(result, Err(ImportError::Owner { .. })));
    }

    #[test]
    fn malformed_document_does_not_hide_others() {
        let parsed = parse_export(
            r#"[{"objectId": "a", "ownerEmail": "o@e.com"}, {"objectId": "b", "members": 5}]"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].is_ok());
        assert!(matches!(&parsed[1], Err(ImportError::Json { id, .. }) if id == "b"));
    }
}
