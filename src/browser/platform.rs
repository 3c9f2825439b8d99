use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Error, types::PushSubscription};

/// `Notification.permission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Permission::Default => write!(f, "default"),
            Permission::Granted => write!(f, "granted"),
            Permission::Denied => write!(f, "denied"),
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "default" => Ok(Permission::Default),
            "granted" => Ok(Permission::Granted),
            "denied" => Ok(Permission::Denied),
            _ => Err(Error::InvalidOption {
                option: value.to_string(),
            }),
        }
    }
}

/// The browser's permission API and push manager as seen from a page.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// False when the environment has no notification or push support.
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Shows the permission prompt. A dismissed prompt reports
    /// [`Permission::Default`].
    async fn request_permission(&self) -> Result<Permission, Error>;

    async fn get_subscription(&self) -> Result<Option<PushSubscription>, Error>;

    /// Creates a subscription bound to the application server key.
    async fn subscribe(
        &self,
        application_server_key: &str,
    ) -> Result<PushSubscription, Error>;

    async fn unsubscribe(
        &self,
        subscription: &PushSubscription,
    ) -> Result<bool, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names() {
        for permission in
            [Permission::Default, Permission::Granted, Permission::Denied]
        {
            let parsed: Permission = permission.to_string().parse().unwrap();
            assert_eq!(parsed, permission);
        }
        assert!("prompt".parse::<Permission>().is_err());
    }
}
