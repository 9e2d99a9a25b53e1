//! Broker configuration.

use mentorbot_protocol::Identity;
use serde::{Deserialize, Serialize};

/// Display name for a mentor who has none of their own.
pub const DEFAULT_MENTOR_NAME: &str = "Mentor";

/// Display name for participants who sign in anonymously.
pub const DEFAULT_ANONYMOUS_LABEL: &str = "Anonymous";

/// Placeholder used in notices when an identity has no registered name.
pub const DEFAULT_UNKNOWN_NAME: &str = "Unknown";

/// Startup configuration for a [`Broker`](crate::Broker).
///
/// The mentor identity and the access secret have no sensible defaults,
/// so there is no `Default` impl; build one with [`BrokerConfig::new`]
/// and override the label literals if needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// The single privileged identity.
    pub mentor: Identity,

    /// The shared password every identity must submit to register.
    pub access_secret: String,

    /// Name used for the mentor when the transport supplies none.
    pub mentor_fallback_name: String,

    /// Name given to participants who pick "sign in anonymously".
    pub anonymous_label: String,

    /// Placeholder for unregistered identities in notices.
    pub unknown_name: String,
}

impl BrokerConfig {
    /// Creates a config with the default label literals.
    pub fn new(mentor: Identity, access_secret: impl Into<String>) -> Self {
        Self {
            mentor,
            access_secret: access_secret.into(),
            mentor_fallback_name: DEFAULT_MENTOR_NAME.to_string(),
            anonymous_label: DEFAULT_ANONYMOUS_LABEL.to_string(),
            unknown_name: DEFAULT_UNKNOWN_NAME.to_string(),
        }
    }

    /// Checks the config is usable.
    ///
    /// A broker with an empty secret would let anyone in, and identity 0
    /// is what an unset numeric environment variable usually turns into,
    /// so both are refused at startup rather than discovered later.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mentor.0 == 0 {
            return Err(ConfigError::MissingMentor);
        }
        if self.access_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        for (field, value) in [
            ("mentor_fallback_name", &self.mentor_fallback_name),
            ("anonymous_label", &self.anonymous_label),
            ("unknown_name", &self.unknown_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyLabel(field));
            }
        }
        Ok(())
    }
}

/// Fatal configuration problems, reported before the broker starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No mentor identity was configured.
    #[error("mentor identity is not configured")]
    MissingMentor,

    /// No access secret was configured.
    #[error("access secret is not configured")]
    MissingSecret,

    /// A display-name literal is blank.
    #[error("{0} must not be blank")]
    EmptyLabel(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_labels() {
        let config = BrokerConfig::new(Identity(1), "abc123");
        assert_eq!(config.mentor_fallback_name, "Mentor");
        assert_eq!(config.anonymous_label, "Anonymous");
        assert_eq!(config.unknown_name, "Unknown");
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = BrokerConfig::new(Identity(1), "abc123");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_zero_mentor() {
        let config = BrokerConfig::new(Identity(0), "abc123");
        assert_eq!(config.validate(), Err(ConfigError::MissingMentor));
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = BrokerConfig::new(Identity(1), "");
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));
    }

    #[test]
    fn test_validate_rejects_blank_anonymous_label() {
        let mut config = BrokerConfig::new(Identity(1), "abc123");
        config.anonymous_label = "  ".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyLabel("anonymous_label"))
        );
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let json = r#"{
            "mentor": 7,
            "access_secret": "s3cret",
            "mentor_fallback_name": "Coach",
            "anonymous_label": "Guest",
            "unknown_name": "?"
        }"#;
        let config: BrokerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mentor, Identity(7));
        assert_eq!(config.anonymous_label, "Guest");
    }
}
