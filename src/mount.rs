//! Mount declarations
//!
//! A [`MountSpec`] is the parsed form of one `webdav` directive: the URL
//! prefix it serves, the default user, and any named users.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::user::UserSpec;

/// One declared mount point
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MountSpec {
    /// Normalized URL prefix, empty for the root
    pub base_prefix: String,

    /// Settings for principals without their own block
    pub default_user: UserSpec,

    /// Per-principal settings
    pub named_users: BTreeMap<String, UserSpec>,
}

impl MountSpec {
    /// Create a mount for `prefix` with default settings
    pub fn new(prefix: &str) -> Self {
        Self {
            base_prefix: normalize_prefix(prefix),
            default_user: UserSpec::default(),
            named_users: BTreeMap::new(),
        }
    }

    /// Open a named user as a copy of the current default user.
    ///
    /// Later changes to the default user do not reach the copy. Returns
    /// `None` if the name is already declared.
    pub fn declare_user(&mut self, name: &str) -> Option<&mut UserSpec> {
        match self.named_users.entry(name.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => Some(slot.insert(self.default_user.clone())),
        }
    }

    /// The default user (`None`) or a named user
    pub fn user_mut(&mut self, name: Option<&str>) -> Option<&mut UserSpec> {
        match name {
            None => Some(&mut self.default_user),
            Some(name) => self.named_users.get_mut(name),
        }
    }
}

/// Normalize a mount prefix to `""` or `/segment...` without a trailing slash
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    let trimmed = trimmed.trim_start_matches('/');

    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleSpec;

    #[test]
    fn test_normalize_prefix() {
        for input in ["foo/", "/foo", "/foo/", "foo", "//foo"] {
            assert_eq!(normalize_prefix(input), "/foo", "input {:?}", input);
        }
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/a/b/"), "/a/b");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in ["foo/", "/", "", "/a/b/", "x"] {
            let once = normalize_prefix(input);
            assert_eq!(normalize_prefix(&once), once);
        }
    }

    #[test]
    fn test_declared_user_is_a_snapshot() {
        let mut mount = MountSpec::new("/dav");
        mount.default_user.allow_modify = false;
        mount.default_user.rules.push(RuleSpec::literal(false, "/private"));

        mount.declare_user("alice").unwrap();

        mount.default_user.allow_modify = true;
        mount.default_user.rules.push(RuleSpec::literal(true, "/late"));

        let alice = &mount.named_users["alice"];
        assert!(!alice.allow_modify);
        assert_eq!(alice.rules, vec![RuleSpec::literal(false, "/private")]);
    }

    #[test]
    fn test_named_user_changes_do_not_leak() {
        let mut mount = MountSpec::new("");
        mount
            .declare_user("bob")
            .unwrap()
            .rules
            .push(RuleSpec::literal(true, "/bob"));

        assert!(mount.default_user.rules.is_empty());
    }

    #[test]
    fn test_duplicate_user() {
        let mut mount = MountSpec::new("");
        assert!(mount.declare_user("alice").is_some());
        assert!(mount.declare_user("alice").is_none());
        assert!(mount.user_mut(Some("carol")).is_none());
        assert!(mount.user_mut(None).is_some());
    }
}
