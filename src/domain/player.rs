use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Root of every profile page on the tracker site.
pub const PROFILE_BASE_URL: &str = "https://r6.tracker.network/r6siege/profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Psn,
    Xbox,
    Ubisoft,
}

impl Platform {
    pub fn url_code(self) -> &'static str {
        match self {
            Platform::Psn => "psn",
            Platform::Xbox => "xbl",
            Platform::Ubisoft => "ubi",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Psn => "psn",
            Platform::Xbox => "xbox",
            Platform::Ubisoft => "ubisoft",
        }
    }
}

impl FromStr for Platform {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "psn" => Ok(Platform::Psn),
            "xbox" | "xbl" => Ok(Platform::Xbox),
            "ubisoft" | "ubi" => Ok(Platform::Ubisoft),
            other => Err(TrackerError::MalformedInput(format!(
                "platform '{other}' not valid, use psn, xbox or ubisoft"
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated (username, platform) pair. Fields are private so the only way
/// in is through [`PlayerIdentity::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerIdentity {
    username: String,
    platform: Platform,
}

impl PlayerIdentity {
    pub fn new(username: impl AsRef<str>, platform: Platform) -> Result<Self> {
        let username = username.as_ref().trim();
        if username.is_empty() {
            return Err(TrackerError::MalformedInput(
                "username must not be empty".to_string(),
            ));
        }

        Ok(Self {
            username: username.to_string(),
            platform,
        })
    }

    pub fn parse(username: &str, platform: &str) -> Result<Self> {
        Self::new(username, platform.parse()?)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn profile_url(&self, kind: PageKind) -> ProfileUrl {
        ProfileUrl::new(self, kind)
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.platform.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Overview,
    Operators,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Overview => "overview",
            PageKind::Operators => "operators",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Main,
    Ally,
    Enemy,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Main => "main",
            Role::Ally => "ally",
            Role::Enemy => "enemy",
        }
    }
}

impl FromStr for Role {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "main" => Ok(Role::Main),
            "ally" | "allies" => Ok(Role::Ally),
            "enemy" | "enemies" => Ok(Role::Enemy),
            other => Err(TrackerError::MalformedInput(format!(
                "role '{other}' not valid, use main, ally or enemy"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reassembly key for a player within a batch. The main player sits in slot
/// 0, allies and enemies are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotKey {
    pub role: Role,
    pub slot: usize,
}

impl SlotKey {
    pub fn new(role: Role, slot: usize) -> Self {
        Self { role, slot }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProfileUrl(String);

impl ProfileUrl {
    pub fn new(identity: &PlayerIdentity, kind: PageKind) -> Self {
        let url = match Url::parse(PROFILE_BASE_URL) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments
                        .pop_if_empty()
                        .push(identity.platform.url_code())
                        .push(&identity.username)
                        .push(kind.as_str());
                }
                url.set_query(Some("lang=en"));
                url.to_string()
            }
            // Unreachable with a constant base.
            Err(_) => format!(
                "{}/{}/{}/{}?lang=en",
                PROFILE_BASE_URL,
                identity.platform.url_code(),
                identity.username,
                kind.as_str()
            ),
        };
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
