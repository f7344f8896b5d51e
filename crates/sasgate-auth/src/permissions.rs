//! Scoped permissions carried in the `sp` query parameter.
//!
//! A permission is a path of the form `/scope/segments/action`. The last
//! segment is the action; everything before it is the scope prefix that a
//! requested scope must start with. A set of permissions serializes to a single
//! comma-separated string in which a literal comma is written as `,,`.

use std::fmt;
use std::str::FromStr;

/// Action that grants every operation on a scope.
pub const WILDCARD_ACTION: &str = "*";
/// Read action.
pub const READ_ACTION: &str = "read";
/// Write action.
pub const WRITE_ACTION: &str = "write";
/// Delete action.
pub const DELETE_ACTION: &str = "delete";
/// Run action.
pub const RUN_ACTION: &str = "run";

/// The action part of a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionAction {
    /// `*`: any action is permitted.
    Wildcard,
    /// A specific action such as `read`, compared case-insensitively.
    Named(String),
}

impl PermissionAction {
    /// Whether this action permits the requested one.
    #[must_use]
    pub fn permits(&self, action: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Named(name) => name.eq_ignore_ascii_case(action),
        }
    }
}

impl From<&str> for PermissionAction {
    fn from(value: &str) -> Self {
        if value == WILDCARD_ACTION {
            Self::Wildcard
        } else {
            Self::Named(value.to_owned())
        }
    }
}

/// A single parsed permission entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    /// Scope prefix, always starting with `/`. Ends with `/` unless it is the root.
    pub scope: String,
    /// The granted action.
    pub action: PermissionAction,
}

impl Permission {
    /// Parse a raw `/scope/action` entry.
    ///
    /// Returns `None` when the entry has no non-empty segment.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let (action, scope_segments) = segments.split_last()?;

        let scope = if scope_segments.is_empty() {
            "/".to_owned()
        } else {
            format!("/{}/", scope_segments.join("/"))
        };

        Some(Self {
            scope,
            action: PermissionAction::from(*action),
        })
    }

    /// Whether this permission covers `scope` and `action`.
    #[must_use]
    pub fn permits(&self, scope: &str, action: &str) -> bool {
        scope.to_lowercase().starts_with(&self.scope.to_lowercase()) && self.action.permits(action)
    }
}

/// An immutable, order-preserving set of permission strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedAccessPermissions {
    permissions: Vec<String>,
}

impl SharedAccessPermissions {
    /// Build one `/scope/action` entry per action.
    ///
    /// Leading and trailing slashes are trimmed from both parts before joining,
    /// so the root scope `/` with `*` yields `//*`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sasgate_auth::permissions::SharedAccessPermissions;
    ///
    /// let perms = SharedAccessPermissions::from_scope_and_actions("/tickets/", &["read", "write"]);
    /// assert_eq!(perms.to_string(), "/tickets/read,/tickets/write");
    /// ```
    #[must_use]
    pub fn from_scope_and_actions(scope: &str, actions: &[&str]) -> Self {
        let scope = scope.trim_matches('/');
        Self {
            permissions: actions
                .iter()
                .map(|action| format!("/{scope}/{}", action.trim_matches('/')))
                .collect(),
        }
    }

    /// Build a single `/scope/action` entry.
    #[must_use]
    pub fn from_scope_and_action(scope: &str, action: &str) -> Self {
        Self::from_scope_and_actions(scope, &[action])
    }

    /// Parse the serialized `sp` form, dropping empty entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use sasgate_auth::permissions::SharedAccessPermissions;
    ///
    /// let perms = SharedAccessPermissions::from_serialized("/a/read,/b,,c/write");
    /// assert_eq!(perms.entries(), ["/a/read", "/b,c/write"]);
    /// ```
    #[must_use]
    pub fn from_serialized(input: &str) -> Self {
        Self {
            permissions: split_escaped(input)
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// The raw permission entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.permissions
    }

    /// Whether no permission is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Whether any stored permission covers `scope` and `action`.
    ///
    /// A permission covers a request when its scope is a case-insensitive prefix
    /// of `scope` and its action is `*` or equals `action` ignoring case.
    #[must_use]
    pub fn is_scope_permitted(&self, scope: &str, action: &str) -> bool {
        self.permissions
            .iter()
            .filter_map(|raw| Permission::parse(raw))
            .any(|permission| permission.permits(scope, action))
    }
}

impl fmt::Display for SharedAccessPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, permission) in self.permissions.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&permission.replace(',', ",,"))?;
        }
        Ok(())
    }
}

impl FromStr for SharedAccessPermissions {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_serialized(s))
    }
}

/// Split on single commas, keeping `,,` pairs inside the current entry.
fn split_escaped(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let mut entries = Vec::new();
    let mut start = 0;
    let mut cursor = 0;

    while cursor < bytes.len() {
        if bytes[cursor] == b',' {
            cursor += 1;
            if cursor < bytes.len() && bytes[cursor] != b',' {
                entries.push(unescape(&value[start..cursor - 1]));
                start = cursor;
            }
        }
        cursor += 1;
    }

    entries.push(unescape(&value[start..]));
    entries
}

fn unescape(value: &str) -> String {
    value.replace(",,", ",")
}
