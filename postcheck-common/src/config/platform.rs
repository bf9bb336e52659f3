//! Identity of the platform under test.
//!
//! Scenarios never look this up from ambient state; the values are loaded
//! once and handed to each scenario.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    address::{AddressFormatter, EmailMessageField},
    error::ConfigError,
};

/// Where the mail service under test is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Hosted production platform.
    Appspot,
    /// Self-hosted compatible platform.
    Capedwarf,
    /// Local development server. Mail is logged rather than delivered.
    Sdk,
    /// In-process loopback service.
    #[default]
    Loopback,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Appspot => "appspot",
            Self::Capedwarf => "capedwarf",
            Self::Sdk => "sdk",
            Self::Loopback => "loopback",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    /// Application id, used as the first label of the mail domain.
    #[serde(default = "defaults::app_id")]
    pub app_id: String,

    /// Mail gateway suffix.
    ///
    /// Default: `appspotmail.com`
    #[serde(default = "defaults::mail_gateway")]
    pub mail_gateway: String,

    /// Registered administrator, if the platform has one for testing.
    #[serde(default)]
    pub admin_email: Option<String>,

    #[serde(default)]
    pub environment: Environment,
}

impl Platform {
    /// `<app_id>.<mail_gateway>`
    pub fn mail_domain(&self) -> String {
        format!("{}.{}", self.app_id, self.mail_gateway)
    }

    pub fn address(
        &self,
        formatter: &dyn AddressFormatter,
        user: &str,
        field: EmailMessageField,
    ) -> String {
        formatter.format(user, &self.app_id, &self.mail_gateway, field)
    }

    /// The configured administrator address.
    ///
    /// # Errors
    ///
    /// If no administrator is configured.
    pub fn admin_email(&self) -> Result<&str, ConfigError> {
        self.admin_email
            .as_deref()
            .ok_or(ConfigError::MissingField("admin_email"))
    }

    /// # Errors
    ///
    /// If the application id or gateway is empty or contains `@`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("app_id", &self.app_id), ("mail_gateway", &self.mail_gateway)] {
            if value.is_empty() || value.contains('@') {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: format!("'{value}' is not a valid domain label"),
                });
            }
        }
        Ok(())
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            app_id: defaults::app_id(),
            mail_gateway: defaults::mail_gateway(),
            admin_email: None,
            environment: Environment::default(),
        }
    }
}

mod defaults {
    pub fn app_id() -> String {
        "postcheck".to_string()
    }
    pub fn mail_gateway() -> String {
        "appspotmail.com".to_string()
    }
}
