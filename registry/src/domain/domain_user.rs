//! Per-domain user records.
//!
//! A record carries a small set of well-known fields plus an open attribute
//! map. Records are created implicitly by the first upserting write for a
//! `(domain_id, uid)` pair.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AttributeKey, DomainId, Projection, RoleName, Uid};

/// One principal's record inside one domain.
///
/// ## Invariants
/// - At most one record exists per `(domain_id, uid)`.
/// - `role`, when present, should name a role of the owning domain. Role
///   deletion clears it; nothing else enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainUser {
    pub domain_id: DomainId,
    pub uid: Uid,
    pub role: Option<RoleName>,
    pub num_submit: Option<i64>,
    pub num_accept: Option<i64>,
    pub score: Option<i64>,
    /// Extension fields keyed by validated attribute names.
    pub attributes: BTreeMap<AttributeKey, Value>,
}

impl DomainUser {
    /// A freshly materialised record with no optional fields.
    pub fn empty(domain_id: DomainId, uid: Uid) -> Self {
        Self {
            domain_id,
            uid,
            role: None,
            num_submit: None,
            num_accept: None,
            score: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Trim the record down to the fields selected by `projection`.
    pub fn project(mut self, projection: &Projection<UserField>) -> Self {
        if !projection.includes(&UserField::Role) {
            self.role = None;
        }
        if !projection.includes(&UserField::NumSubmit) {
            self.num_submit = None;
        }
        if !projection.includes(&UserField::NumAccept) {
            self.num_accept = None;
        }
        if !projection.includes(&UserField::Score) {
            self.score = None;
        }
        self.attributes
            .retain(|key, _| projection.includes(&UserField::Attribute(key.clone())));
        self
    }

    /// Apply `patch`, overwriting the fields it sets.
    pub fn apply(&mut self, patch: &DomainUserPatch) {
        if let Some(role) = &patch.role {
            self.role = Some(role.clone());
        }
        if let Some(value) = patch.num_submit {
            self.num_submit = Some(value);
        }
        if let Some(value) = patch.num_accept {
            self.num_accept = Some(value);
        }
        if let Some(value) = patch.score {
            self.score = Some(value);
        }
        for (key, value) in &patch.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
    }

    /// Remove each field in `fields`.
    pub fn clear(&mut self, fields: &BTreeSet<UserField>) {
        for field in fields {
            match field {
                UserField::Role => self.role = None,
                UserField::NumSubmit => self.num_submit = None,
                UserField::NumAccept => self.num_accept = None,
                UserField::Score => self.score = None,
                UserField::Attribute(key) => {
                    self.attributes.remove(key);
                }
            }
        }
    }

    /// Add each delta to its counter, treating an absent counter as zero.
    ///
    /// Either every delta is applied or none is.
    pub fn increment(&mut self, deltas: &BTreeMap<Counter, i64>) -> Result<(), IncrementError> {
        let mut next = self.clone();
        for (counter, delta) in deltas {
            match counter {
                Counter::NumSubmit => next.num_submit = Some(add(next.num_submit, *delta, counter)?),
                Counter::NumAccept => next.num_accept = Some(add(next.num_accept, *delta, counter)?),
                Counter::Score => next.score = Some(add(next.score, *delta, counter)?),
                Counter::Attribute(key) => {
                    let current = match next.attributes.get(key) {
                        None | Some(Value::Null) => None,
                        Some(value) => Some(value.as_i64().ok_or_else(|| {
                            IncrementError::NotInteger {
                                field: key.to_string(),
                            }
                        })?),
                    };
                    let total = add(current, *delta, counter)?;
                    next.attributes.insert(key.clone(), Value::from(total));
                }
            }
        }
        *self = next;
        Ok(())
    }
}

fn add(current: Option<i64>, delta: i64, counter: &Counter) -> Result<i64, IncrementError> {
    current
        .unwrap_or(0)
        .checked_add(delta)
        .ok_or_else(|| IncrementError::Overflow {
            field: counter.name().to_owned(),
        })
}

/// Failures applying an increment to an in-memory record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncrementError {
    /// The target attribute holds a non-integer value.
    #[error("attribute {field} does not hold an integer")]
    NotInteger { field: String },
    /// The sum does not fit in a 64-bit integer.
    #[error("incrementing {field} overflows a 64-bit integer")]
    Overflow { field: String },
}

/// Names a removable or projectable field of a [`DomainUser`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserField {
    Role,
    NumSubmit,
    NumAccept,
    Score,
    Attribute(AttributeKey),
}

impl UserField {
    /// Stored name of the field.
    pub fn name(&self) -> &str {
        match self {
            Self::Role => "role",
            Self::NumSubmit => "num_submit",
            Self::NumAccept => "num_accept",
            Self::Score => "score",
            Self::Attribute(key) => key.as_str(),
        }
    }
}

impl From<Counter> for UserField {
    fn from(counter: Counter) -> Self {
        match counter {
            Counter::NumSubmit => Self::NumSubmit,
            Counter::NumAccept => Self::NumAccept,
            Counter::Score => Self::Score,
            Counter::Attribute(key) => Self::Attribute(key),
        }
    }
}

/// Names an incrementable field of a [`DomainUser`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    NumSubmit,
    NumAccept,
    Score,
    /// An extension attribute holding an integer.
    Attribute(AttributeKey),
}

impl Counter {
    /// Stored name of the counter.
    pub fn name(&self) -> &str {
        match self {
            Self::NumSubmit => "num_submit",
            Self::NumAccept => "num_accept",
            Self::Score => "score",
            Self::Attribute(key) => key.as_str(),
        }
    }
}

/// Field values written by `set_user`. Unset members are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DomainUserPatch {
    pub role: Option<RoleName>,
    pub num_submit: Option<i64>,
    pub num_accept: Option<i64>,
    pub score: Option<i64>,
    pub attributes: BTreeMap<AttributeKey, Value>,
}

impl DomainUserPatch {
    /// Set the role.
    pub fn role(mut self, role: RoleName) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the submission counter.
    pub fn num_submit(mut self, value: i64) -> Self {
        self.num_submit = Some(value);
        self
    }

    /// Set the acceptance counter.
    pub fn num_accept(mut self, value: i64) -> Self {
        self.num_accept = Some(value);
        self
    }

    /// Set the score.
    pub fn score(mut self, value: i64) -> Self {
        self.score = Some(value);
        self
    }

    /// Set an extension attribute.
    pub fn attribute(mut self, key: AttributeKey, value: impl Into<Value>) -> Self {
        self.attributes.insert(key, value.into());
        self
    }

    /// Whether the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.num_submit.is_none()
            && self.num_accept.is_none()
            && self.score.is_none()
            && self.attributes.is_empty()
    }
}

/// Filter for streaming domain-user records. Empty matches every record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainUserFilter {
    pub domain_id: Option<DomainId>,
    pub uid: Option<Uid>,
    pub uids: Option<Vec<Uid>>,
    pub role: Option<RoleName>,
}

impl DomainUserFilter {
    /// Records inside `domain_id`.
    pub fn in_domain(domain_id: DomainId) -> Self {
        Self {
            domain_id: Some(domain_id),
            ..Self::default()
        }
    }

    /// Records of principal `uid` across every domain.
    pub fn for_uid(uid: Uid) -> Self {
        Self {
            uid: Some(uid),
            ..Self::default()
        }
    }

    /// Whether `user` satisfies the filter.
    pub fn matches(&self, user: &DomainUser) -> bool {
        self.domain_id
            .as_ref()
            .is_none_or(|domain_id| &user.domain_id == domain_id)
            && self.uid.is_none_or(|uid| user.uid == uid)
            && self.uids.as_ref().is_none_or(|uids| uids.contains(&user.uid))
            && self
                .role
                .as_ref()
                .is_none_or(|role| user.role.as_ref() == Some(role))
    }
}
