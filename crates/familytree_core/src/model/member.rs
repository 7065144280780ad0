//! Member domain model.
//!
//! # Responsibility
//! - Define the node record for one person in one family tree.
//! - Provide lifecycle helpers for placeholder synthesis and resolution.
//!
//! # Invariants
//! - `id` is stable; placeholder resolution keeps the same `id`.
//! - An `Undefined` member carries only gender and a generated name.
//! - `death_date` is never earlier than `birth_date` when both are set.

use crate::model::family_tree::FamilyTreeId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier for a member node.
pub type MemberId = Uuid;

/// Recorded gender of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Default gender for a synthesized co-parent.
    ///
    /// `Unknown` has no opposite and maps to itself.
    pub fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// Whether a member is a real person or a synthesized placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Real person data.
    Normal,
    /// Placeholder standing in for an unknown co-parent or partner.
    Undefined,
}

/// Membership role inside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    TreeAdmin,
}

/// Validation failures for member attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    /// `full_name` is blank after trim.
    BlankFullName,
    /// `death_date` is earlier than `birth_date`.
    DeathBeforeBirth { birth_date: i64, death_date: i64 },
    /// `death_date` is set while `is_dead` is false.
    DeathDateWithoutDeathFlag,
    /// Placeholder carries life data it cannot know.
    PlaceholderWithLifeData(MemberId),
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankFullName => write!(f, "full name must not be blank"),
            Self::DeathBeforeBirth {
                birth_date,
                death_date,
            } => write!(
                f,
                "death date {death_date} must not be earlier than birth date {birth_date}"
            ),
            Self::DeathDateWithoutDeathFlag => {
                write!(f, "death date requires the member to be marked dead")
            }
            Self::PlaceholderWithLifeData(id) => {
                write!(f, "placeholder member {id} must not carry life data")
            }
        }
    }
}

impl Error for MemberValidationError {}

/// Caller-supplied person data for a new or resolved member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAttributes {
    pub full_name: String,
    pub gender: Gender,
    /// Unix epoch milliseconds; negative before 1970.
    pub birth_date: Option<i64>,
    /// Unix epoch milliseconds. Requires `is_dead`.
    pub death_date: Option<i64>,
    pub is_dead: bool,
    pub role: MemberRole,
}

impl MemberAttributes {
    /// Creates attributes for a living ordinary member with unknown dates.
    pub fn new(full_name: impl Into<String>, gender: Gender) -> Self {
        Self {
            full_name: full_name.into(),
            gender,
            birth_date: None,
            death_date: None,
            is_dead: false,
            role: MemberRole::Member,
        }
    }

    /// Returns a copy with `full_name` trimmed and inner whitespace collapsed,
    /// then validated.
    pub fn normalized(&self) -> Result<Self, MemberValidationError> {
        let mut normalized = self.clone();
        normalized.full_name = normalize_full_name(&self.full_name);
        normalized.validate()?;
        Ok(normalized)
    }

    /// Validates attribute consistency.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(MemberValidationError::BlankFullName);
        }
        if self.death_date.is_some() && !self.is_dead {
            return Err(MemberValidationError::DeathDateWithoutDeathFlag);
        }
        if let (Some(birth_date), Some(death_date)) = (self.birth_date, self.death_date) {
            if death_date < birth_date {
                return Err(MemberValidationError::DeathBeforeBirth {
                    birth_date,
                    death_date,
                });
            }
        }
        Ok(())
    }
}

/// Node record for one person in one family tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub tree_id: FamilyTreeId,
    pub full_name: String,
    pub gender: Gender,
    pub birth_date: Option<i64>,
    pub death_date: Option<i64>,
    pub is_dead: bool,
    /// Exactly one member per non-empty tree has this set.
    pub is_root: bool,
    pub status: MemberStatus,
    pub role: MemberRole,
}

impl Member {
    /// Creates a non-root member from caller attributes with a generated ID.
    pub fn new(tree_id: FamilyTreeId, attributes: MemberAttributes) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree_id,
            full_name: attributes.full_name,
            gender: attributes.gender,
            birth_date: attributes.birth_date,
            death_date: attributes.death_date,
            is_dead: attributes.is_dead,
            is_root: false,
            status: MemberStatus::Normal,
            role: attributes.role,
        }
    }

    /// Synthesizes an `Undefined` co-parent for `counterpart`.
    ///
    /// The placeholder takes the opposite gender and a display name derived
    /// from the counterpart's name. It is never root.
    pub fn placeholder_for(counterpart: &Member) -> Self {
        Self {
            id: Uuid::new_v4(),
            tree_id: counterpart.tree_id,
            full_name: placeholder_display_name(&counterpart.full_name),
            gender: counterpart.gender.opposite(),
            birth_date: None,
            death_date: None,
            is_dead: false,
            is_root: false,
            status: MemberStatus::Undefined,
            role: MemberRole::Member,
        }
    }

    /// Returns whether this member is an unresolved placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.status == MemberStatus::Undefined
    }

    /// Overwrites placeholder data with real person data.
    ///
    /// # Invariants
    /// - `id`, `tree_id` and `is_root` are preserved.
    /// - `status` becomes `Normal`.
    pub fn resolve_with(&mut self, attributes: MemberAttributes) {
        self.full_name = attributes.full_name;
        self.gender = attributes.gender;
        self.birth_date = attributes.birth_date;
        self.death_date = attributes.death_date;
        self.is_dead = attributes.is_dead;
        self.role = attributes.role;
        self.status = MemberStatus::Normal;
    }

    /// Returns the caller-facing attribute view of this member.
    pub fn attributes(&self) -> MemberAttributes {
        MemberAttributes {
            full_name: self.full_name.clone(),
            gender: self.gender,
            birth_date: self.birth_date,
            death_date: self.death_date,
            is_dead: self.is_dead,
            role: self.role,
        }
    }

    /// Validates the record before persistence.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.is_placeholder()
            && (self.birth_date.is_some() || self.death_date.is_some() || self.is_dead)
        {
            return Err(MemberValidationError::PlaceholderWithLifeData(self.id));
        }
        self.attributes().validate()
    }
}

/// Collapses whitespace runs and trims a person's name.
pub fn normalize_full_name(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

fn placeholder_display_name(counterpart_name: &str) -> String {
    format!("Partner of {counterpart_name}")
}
