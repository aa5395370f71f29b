//! Anonymization configuration

use crate::domain::ids::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Kind of synthetic value produced for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Username,
    SafeEmail,
    Name,
    FirstName,
    LastName,
    Sentence,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Username => "username",
            GeneratorKind::SafeEmail => "safe_email",
            GeneratorKind::Name => "name",
            GeneratorKind::FirstName => "first_name",
            GeneratorKind::LastName => "last_name",
            GeneratorKind::Sentence => "sentence",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one logical field to a generator
///
/// For identity tables the field is a column name; for attribute tables it
/// is the attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymizationRule {
    #[serde(alias = "column", alias = "key")]
    pub field: String,

    pub generator: GeneratorKind,

    /// Never hand out the same value twice within a run
    #[serde(default)]
    pub unique: bool,

    /// Uniqueness pool shared by rules with the same class; defaults to the
    /// generator name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_class: Option<String>,
}

impl AnonymizationRule {
    pub fn new(field: &str, generator: GeneratorKind) -> Self {
        Self {
            field: field.to_string(),
            generator,
            unique: false,
            unique_class: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Name of the uniqueness pool this rule draws from
    pub fn class(&self) -> &str {
        self.unique_class
            .as_deref()
            .unwrap_or_else(|| self.generator.as_str())
    }
}

/// Anonymization rules and protections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Identity keys that are never anonymized
    #[serde(default = "default_protected_ids")]
    pub protected_ids: Vec<i64>,

    /// Generation attempts before a unique field gives up
    #[serde(default = "default_max_unique_attempts")]
    pub max_unique_attempts: usize,

    /// Columns of the identity table and their generators
    #[serde(default = "default_identity_fields")]
    pub identity_fields: Vec<AnonymizationRule>,

    /// Attribute keys and their generators
    #[serde(default = "default_attribute_keys")]
    pub attribute_keys: Vec<AnonymizationRule>,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for AnonymizationConfig {
    fn default() -> Self {
        Self {
            protected_ids: default_protected_ids(),
            max_unique_attempts: default_max_unique_attempts(),
            identity_fields: default_identity_fields(),
            attribute_keys: default_attribute_keys(),
            audit: AuditConfig::default(),
        }
    }
}

impl AnonymizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_unique_attempts == 0 {
            return Err("anonymization.max_unique_attempts must be > 0".to_string());
        }
        if self.identity_fields.is_empty() && self.attribute_keys.is_empty() {
            return Err(
                "anonymization needs at least one identity_fields or attribute_keys rule"
                    .to_string(),
            );
        }

        let mut seen = HashSet::new();
        for rule in &self.identity_fields {
            if !is_valid_identifier(&rule.field) {
                return Err(format!(
                    "anonymization.identity_fields: '{}' is not a valid column name",
                    rule.field
                ));
            }
            if !seen.insert(rule.field.as_str()) {
                return Err(format!(
                    "anonymization.identity_fields: duplicate column '{}'",
                    rule.field
                ));
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.attribute_keys {
            if rule.field.trim().is_empty() {
                return Err("anonymization.attribute_keys: key cannot be empty".to_string());
            }
            if !seen.insert(rule.field.as_str()) {
                return Err(format!(
                    "anonymization.attribute_keys: duplicate key '{}'",
                    rule.field
                ));
            }
        }

        self.audit.validate()
    }

    pub fn is_protected(&self, id: i64) -> bool {
        self.protected_ids.contains(&id)
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default)]
    pub enabled: bool,

    /// Audit log file path
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Use JSON format for audit logs
    #[serde(default = "default_audit_json_format")]
    pub json_format: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
            json_format: default_audit_json_format(),
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.log_path.as_os_str().is_empty() {
            return Err("anonymization.audit.log_path cannot be empty".to_string());
        }
        Ok(())
    }
}

fn default_protected_ids() -> Vec<i64> {
    vec![1]
}

fn default_max_unique_attempts() -> usize {
    100
}

fn default_identity_fields() -> Vec<AnonymizationRule> {
    vec![
        AnonymizationRule::new("user_login", GeneratorKind::Username).unique(),
        AnonymizationRule::new("user_nicename", GeneratorKind::Username).unique(),
        AnonymizationRule::new("user_email", GeneratorKind::SafeEmail).unique(),
        AnonymizationRule::new("display_name", GeneratorKind::Name),
    ]
}

fn default_attribute_keys() -> Vec<AnonymizationRule> {
    vec![
        AnonymizationRule::new("first_name", GeneratorKind::FirstName),
        AnonymizationRule::new("last_name", GeneratorKind::LastName),
        AnonymizationRule::new("nickname", GeneratorKind::Username),
        AnonymizationRule::new("description", GeneratorKind::Sentence),
    ]
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("./audit/anonymization.log")
}

fn default_audit_json_format() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnonymizationConfig::default();
        assert_eq!(config.protected_ids, vec![1]);
        assert!(config.is_protected(1));
        assert!(!config.is_protected(2));
        assert_eq!(config.identity_fields.len(), 4);
        assert_eq!(config.attribute_keys.len(), 4);
        assert!(!config.audit.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unique_class_defaults_to_generator() {
        let rule = AnonymizationRule::new("user_login", GeneratorKind::Username).unique();
        assert_eq!(rule.class(), "username");

        let mut custom = rule.clone();
        custom.unique_class = Some("login".to_string());
        assert_eq!(custom.class(), "login");
    }

    #[test]
    fn test_rules_from_toml() {
        let config: AnonymizationConfig = toml::from_str(
            r#"
protected_ids = [1, 42]

[[identity_fields]]
column = "email"
generator = "safe_email"
unique = true

[[attribute_keys]]
key = "phone"
generator = "name"
"#,
        )
        .unwrap();

        assert_eq!(config.protected_ids, vec![1, 42]);
        assert_eq!(config.identity_fields[0].field, "email");
        assert_eq!(config.identity_fields[0].generator, GeneratorKind::SafeEmail);
        assert!(config.identity_fields[0].unique);
        assert_eq!(config.attribute_keys[0].field, "phone");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_column() {
        let mut config = AnonymizationConfig::default();
        config.identity_fields[0].field = "user_login; --".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_key() {
        let mut config = AnonymizationConfig::default();
        config
            .attribute_keys
            .push(AnonymizationRule::new("nickname", GeneratorKind::Name));
        let err = config.validate().unwrap_err();
        assert!(err.contains("duplicate key 'nickname'"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = AnonymizationConfig {
            max_unique_attempts: 0,
            ..AnonymizationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
