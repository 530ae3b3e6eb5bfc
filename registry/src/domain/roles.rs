//! Role maps: per-domain mapping from role name to permission bitmask.
//!
//! The registry stores and returns masks verbatim. Interpreting individual
//! bits is left to the authorization layer.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use super::RoleName;

/// Integer permission bitmask attached to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PermissionMask(i64);

impl PermissionMask {
    /// No permission bits set.
    pub const NONE: Self = Self(0);
    /// Every permission bit set.
    pub const ALL: Self = Self(-1);

    /// Wrap a raw bitmask.
    pub const fn new(bits: i64) -> Self {
        Self(bits)
    }

    /// The raw bitmask.
    pub const fn bits(self) -> i64 {
        self.0
    }
}

impl From<i64> for PermissionMask {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Ordered mapping of role names to permission masks.
///
/// # Examples
/// ```
/// use domain_registry::domain::{PermissionMask, RoleMap, RoleName};
///
/// let admin = RoleName::new("admin").expect("valid role");
/// let mut roles = RoleMap::new();
/// roles.insert(admin.clone(), PermissionMask::new(7));
/// assert_eq!(roles.get(&admin), Some(PermissionMask::new(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RoleMap(BTreeMap<RoleName, PermissionMask>);

impl RoleMap {
    /// Create an empty role map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the mask for `role`.
    pub fn get(&self, role: &RoleName) -> Option<PermissionMask> {
        self.0.get(role).copied()
    }

    /// Whether `role` is defined.
    pub fn contains(&self, role: &RoleName) -> bool {
        self.0.contains_key(role)
    }

    /// Set `role` to `mask`, returning the previous mask.
    pub fn insert(&mut self, role: RoleName, mask: PermissionMask) -> Option<PermissionMask> {
        self.0.insert(role, mask)
    }

    /// Remove `role`, returning its mask if it was present.
    pub fn remove(&mut self, role: &RoleName) -> Option<PermissionMask> {
        self.0.remove(role)
    }

    /// Number of roles defined.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no roles are defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate roles in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, RoleName, PermissionMask> {
        self.0.iter()
    }

    /// Decode a role map from its stored JSON object form.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode the role map as a JSON object `{role: mask}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(role, mask)| (role.to_string(), serde_json::Value::from(mask.bits())))
                .collect(),
        )
    }
}

impl FromIterator<(RoleName, PermissionMask)> for RoleMap {
    fn from_iter<I: IntoIterator<Item = (RoleName, PermissionMask)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleMap {
    type Item = (&'a RoleName, &'a PermissionMask);
    type IntoIter = btree_map::Iter<'a, RoleName, PermissionMask>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
