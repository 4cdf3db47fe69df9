//! User profile returned for the `profile` scope.

use serde::{Deserialize, Serialize};

/// Profile information about the `me` user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Only released when the `email` scope was also granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
