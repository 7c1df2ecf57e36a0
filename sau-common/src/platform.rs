//! Supported short-video platforms
//!
//! Numeric codes are the ones stored in the `type` column of the account
//! table and sent by the front end as `?type=`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Creator platform an account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    Xiaohongshu,
    Channels,
    Douyin,
    Kuaishou,
}

impl PlatformType {
    pub const ALL: [PlatformType; 4] = [
        PlatformType::Xiaohongshu,
        PlatformType::Channels,
        PlatformType::Douyin,
        PlatformType::Kuaishou,
    ];

    /// Numeric code stored in the database
    pub fn code(self) -> i64 {
        match self {
            PlatformType::Xiaohongshu => 1,
            PlatformType::Channels => 2,
            PlatformType::Douyin => 3,
            PlatformType::Kuaishou => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PlatformType::Xiaohongshu => "Xiaohongshu",
            PlatformType::Channels => "WeChat Channels",
            PlatformType::Douyin => "Douyin",
            PlatformType::Kuaishou => "Kuaishou",
        }
    }

    /// Directory under `cookies/` holding this platform's credential files
    pub fn cookie_dir(self) -> &'static str {
        match self {
            PlatformType::Xiaohongshu => "xiaohongshu_uploader",
            PlatformType::Channels => "tencent_uploader",
            PlatformType::Douyin => "douyin_uploader",
            PlatformType::Kuaishou => "ks_uploader",
        }
    }

    /// Relative credential file path for an account on this platform
    pub fn credential_file_path(self, account_name: &str) -> String {
        format!("cookies/{}/cookie_{}.json", self.cookie_dir(), account_name)
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Unknown platform code or name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported platform type: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for PlatformType {
    type Err = UnknownPlatform;

    /// Accepts the numeric code (`"3"`) or the snake_case name (`"douyin"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| UnknownPlatform(s.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "xiaohongshu" | "xhs" => Ok(PlatformType::Xiaohongshu),
            "channels" | "tencent" => Ok(PlatformType::Channels),
            "douyin" => Ok(PlatformType::Douyin),
            "kuaishou" | "ks" => Ok(PlatformType::Kuaishou),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}
