//! A policy paired with its signature.

use crate::policy::SharedAccessPolicy;

/// Query parameter carrying the start time.
pub const START_TIME_PARAM: &str = "st";
/// Query parameter carrying the expire time.
pub const EXPIRE_TIME_PARAM: &str = "se";
/// Query parameter carrying the serialized permissions.
pub const PERMISSIONS_PARAM: &str = "sp";
/// Query parameter carrying the signing version.
pub const VERSION_PARAM: &str = "sv";
/// Query parameter carrying the signature.
pub const SIGNATURE_PARAM: &str = "sig";

/// A [`SharedAccessPolicy`] and the signature computed for it or received with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedAccessCredentials {
    policy: SharedAccessPolicy,
    signature: String,
}

impl SharedAccessCredentials {
    /// Pair a policy with a signature.
    #[must_use]
    pub fn new(policy: SharedAccessPolicy, signature: impl Into<String>) -> Self {
        Self {
            policy,
            signature: signature.into(),
        }
    }

    /// Sign `policy` for `channel_id` with `access_key`.
    #[must_use]
    pub fn sign(policy: SharedAccessPolicy, channel_id: &str, access_key: &str) -> Self {
        let signature = policy.signature(channel_id, access_key);
        Self { policy, signature }
    }

    /// The signed policy.
    #[must_use]
    pub fn policy(&self) -> &SharedAccessPolicy {
        &self.policy
    }

    /// The signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Whether permissions, version and signature are all present.
    #[must_use]
    pub fn contains_sas_credentials(&self) -> bool {
        !self.policy.permissions.is_empty()
            && !self.policy.version.is_empty()
            && !self.signature.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::SharedAccessPermissions;

    #[test]
    fn test_should_sign_policy() {
        let credentials =
            SharedAccessCredentials::sign(SharedAccessPolicy::default(), "http://test.com", "12345");
        assert_eq!(
            credentials.signature(),
            "IF6iSQodR6i2Tt6BBKfOKND9fFciPiD-nTP8xE77Xo4"
        );
        assert_eq!(credentials.policy(), &SharedAccessPolicy::default());
        assert!(credentials.contains_sas_credentials());
    }

    #[test]
    fn test_should_report_missing_parts() {
        let no_signature = SharedAccessCredentials::new(SharedAccessPolicy::default(), "");
        assert!(!no_signature.contains_sas_credentials());

        let no_permissions = SharedAccessCredentials::new(
            SharedAccessPolicy {
                permissions: SharedAccessPermissions::default(),
                ..SharedAccessPolicy::default()
            },
            "sig",
        );
        assert!(!no_permissions.contains_sas_credentials());

        let no_version = SharedAccessCredentials::new(
            SharedAccessPolicy {
                version: String::new(),
                ..SharedAccessPolicy::default()
            },
            "sig",
        );
        assert!(!no_version.contains_sas_credentials());
    }
}
