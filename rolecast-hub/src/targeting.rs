use std::collections::BTreeSet;

use rolecast_core::models::{ModuleId, RoleSet};

/// Broadcast targeting: required roles and required modules
///
/// A connection matches when its role set shares at least one label with
/// `roles` AND its module is one of `modules`. An empty list on either side
/// matches no connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targeting {
    roles: RoleSet,
    modules: BTreeSet<ModuleId>,
}

impl Targeting {
    pub fn new<R, M>(roles: R, modules: M) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<ModuleId>,
    {
        Self {
            roles: roles.into_iter().collect(),
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, roles: &RoleSet, module: &ModuleId) -> bool {
        self.modules.contains(module) && self.roles.intersects(roles)
    }

    /// True when nothing can match
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() || self.modules.is_empty()
    }

    #[must_use]
    pub const fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.iter()
    }
}
