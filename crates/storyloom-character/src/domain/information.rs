//! Classified information owned by a character.
//!
//! Every entry lives in exactly one of three tiers: `public` (visible to
//! everybody), `private` (the owning player and the GM), and `gm` (the GM
//! only).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::ids::InformationId;

/// Clearance tier of an information entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Visible to everybody in the session.
    Public,
    /// Visible to the owning player and the GM.
    Private,
    /// Visible to the GM only.
    Gm,
}

impl Classification {
    /// All tiers, from least to most restricted.
    pub const ALL: [Self; 3] = [Self::Public, Self::Private, Self::Gm];
}

impl FromStr for Classification {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "gm" => Ok(Self::Gm),
            other => Err(DomainError::Validation(format!(
                "invalid classification {other:?}; expected public, private or gm"
            ))),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Gm => "gm",
        })
    }
}

/// The `type` tag of an information entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InformationKind {
    /// A numeric attribute such as strength.
    Attribute,
    /// A numeric skill rating.
    Skill,
    /// Free-form text.
    Generic,
    /// Any other tag; values are kept as text.
    Other(String),
}

impl InformationKind {
    /// Whether values of this kind must be numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Attribute | Self::Skill)
    }

    /// Returns the tag as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Attribute => "attribute",
            Self::Skill => "skill",
            Self::Generic => "generic",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for InformationKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "attribute" => Self::Attribute,
            "skill" => Self::Skill,
            "generic" => Self::Generic,
            _ => Self::Other(tag),
        }
    }
}

impl From<InformationKind> for String {
    fn from(kind: InformationKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Value of an information entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InformationValue {
    /// Value of an attribute or skill.
    Numeric(i64),
    /// Free text.
    Text(String),
}

impl fmt::Display for InformationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// One named fact about a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Information {
    /// Identifier.
    pub id: InformationId,
    /// Display name, e.g. "Strength".
    pub name: String,
    /// The `type` tag.
    pub kind: InformationKind,
    /// The value.
    pub value: InformationValue,
}

impl Information {
    /// Builds an entry from its raw stored parts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank or a numeric
    /// kind carries a non-integer value.
    pub fn from_parts(
        id: InformationId,
        name: impl Into<String>,
        kind: InformationKind,
        raw_value: &str,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::Validation(
                "information name must not be empty".to_owned(),
            ));
        }
        let value = if kind.is_numeric() {
            let n = raw_value.trim().parse::<i64>().map_err(|_| {
                DomainError::Validation(format!(
                    "{} {name:?} needs a whole number, got {raw_value:?}",
                    kind.as_str()
                ))
            })?;
            InformationValue::Numeric(n)
        } else {
            InformationValue::Text(raw_value.to_owned())
        };
        Ok(Self {
            id,
            name,
            kind,
            value,
        })
    }
}

/// Who is looking at a character's information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Any session participant.
    Anyone,
    /// The player who owns the character.
    Owner,
    /// The game master.
    Gm,
}

/// Three disjoint tiers of information keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InformationStore {
    public: BTreeMap<InformationId, Information>,
    private: BTreeMap<InformationId, Information>,
    gm: BTreeMap<InformationId, Information>,
}

impl InformationStore {
    fn tier_mut(&mut self, classification: Classification) -> &mut BTreeMap<InformationId, Information> {
        match classification {
            Classification::Public => &mut self.public,
            Classification::Private => &mut self.private,
            Classification::Gm => &mut self.gm,
        }
    }

    /// Returns the entries of one tier.
    #[must_use]
    pub fn tier(&self, classification: Classification) -> &BTreeMap<InformationId, Information> {
        match classification {
            Classification::Public => &self.public,
            Classification::Private => &self.private,
            Classification::Gm => &self.gm,
        }
    }

    /// Inserts `information` into the given tier, evicting the same id from
    /// any other tier.
    pub fn add(&mut self, classification: Classification, information: Information) {
        self.remove(information.id);
        self.tier_mut(classification)
            .insert(information.id, information);
    }

    /// Removes an entry from whichever tier holds it.
    pub fn remove(&mut self, id: InformationId) -> Option<Information> {
        Classification::ALL
            .into_iter()
            .find_map(|classification| self.tier_mut(classification).remove(&id))
    }

    /// Moves an existing entry to another tier. Returns `false` when the id is
    /// unknown.
    pub fn set_classification(&mut self, id: InformationId, classification: Classification) -> bool {
        match self.remove(id) {
            Some(information) => {
                self.tier_mut(classification).insert(id, information);
                true
            }
            None => false,
        }
    }

    /// Returns the tier holding `id`.
    #[must_use]
    pub fn classification_of(&self, id: InformationId) -> Option<Classification> {
        Classification::ALL
            .into_iter()
            .find(|classification| self.tier(*classification).contains_key(&id))
    }

    /// Looks up an entry in any tier.
    #[must_use]
    pub fn get(&self, id: InformationId) -> Option<&Information> {
        Classification::ALL
            .into_iter()
            .find_map(|classification| self.tier(classification).get(&id))
    }

    /// Entries `viewer` is cleared to see, paired with their tier.
    #[must_use]
    pub fn visible_to(&self, viewer: Viewer) -> Vec<(Classification, &Information)> {
        let tiers: &[Classification] = match viewer {
            Viewer::Anyone => &[Classification::Public],
            Viewer::Owner => &[Classification::Public, Classification::Private],
            Viewer::Gm => &Classification::ALL,
        };
        tiers
            .iter()
            .flat_map(|classification| {
                self.tier(*classification)
                    .values()
                    .map(move |information| (*classification, information))
            })
            .collect()
    }

    /// Total number of entries across all tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.public.len() + self.private.len() + self.gm.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
