//! Per-platform login knowledge
//!
//! The login state machine is generic; everything that differs between
//! creator platforms (URLs, locator lists, post-login signals) lives in a
//! [`PlatformProfile`]. Built-in profiles cover every [`PlatformType`] and
//! can be replaced from the `[[platform]]` tables of the config file.

use crate::browser::Locator;
use sau_common::PlatformType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub platform: PlatformType,
    /// Page showing the QR code
    pub login_url: String,
    /// Page only reachable when logged in
    pub verify_url: String,
    /// URL substrings that mean "logged in"
    pub logged_in_url_patterns: Vec<String>,
    /// Page title substrings that mean "logged in"
    #[serde(default)]
    pub logged_in_titles: Vec<String>,
    /// QR code candidates, most specific first
    pub qr_locators: Vec<Locator>,
    /// Elements only present once logged in
    #[serde(default)]
    pub logged_in_locators: Vec<Locator>,
    /// Elements only present on the login page
    #[serde(default)]
    pub login_prompt_locators: Vec<Locator>,
}

fn locators(raw: &[&str]) -> Vec<Locator> {
    raw.iter().copied().map(Locator::parse).collect()
}

fn strings(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

impl PlatformProfile {
    pub fn builtin(platform: PlatformType) -> Self {
        match platform {
            PlatformType::Douyin => Self {
                platform,
                login_url: "https://creator.douyin.com/".into(),
                verify_url: "https://creator.douyin.com/creator-micro/content/upload".into(),
                logged_in_url_patterns: strings(&[
                    "creator.douyin.com/creator-micro",
                    "creator.douyin.com/manage",
                ]),
                // The login page itself is titled "抖音创作者中心"
                logged_in_titles: Vec::new(),
                qr_locators: locators(&[
                    r#"img[src*="qrcode"]"#,
                    ".qr-code img",
                    r#"[class*="qrcode"] img"#,
                    ".login-qr-code img",
                    ".qrcode-img",
                    r#"img[alt*="二维码"]"#,
                    ".semi-qrcode img",
                    ".login-container img",
                ]),
                logged_in_locators: locators(&[
                    ".user-avatar",
                    ".user-info",
                    ".nickname",
                    ".semi-avatar",
                    ".creator-nav",
                    ".workspace-nav",
                    r#"[data-semi-prop*="workspace"]"#,
                ]),
                login_prompt_locators: locators(&[
                    r#"text="手机号登录""#,
                    r#"text="扫码登录""#,
                    r#"text="立即登录""#,
                ]),
            },
            PlatformType::Kuaishou => Self {
                platform,
                login_url: "https://cp.kuaishou.com".into(),
                verify_url: "https://cp.kuaishou.com/article/publish/video".into(),
                logged_in_url_patterns: strings(&[
                    "cp.kuaishou.com/article",
                    "cp.kuaishou.com/profile",
                ]),
                logged_in_titles: Vec::new(),
                qr_locators: locators(&[
                    r#"img[src*="qrcode"]"#,
                    ".qrcode img",
                    r#"[class*="qrcode"] img"#,
                    ".qr-code img",
                ]),
                logged_in_locators: locators(&[".user-info", ".header-user", ".user-avatar"]),
                login_prompt_locators: locators(&[r#"text="扫码登录""#, r#"text="立即登录""#]),
            },
            PlatformType::Channels => Self {
                platform,
                login_url: "https://channels.weixin.qq.com/login.html".into(),
                verify_url: "https://channels.weixin.qq.com/platform/post/create".into(),
                logged_in_url_patterns: strings(&["channels.weixin.qq.com/platform"]),
                logged_in_titles: Vec::new(),
                qr_locators: locators(&[
                    ".qrcode",
                    r#"img[class*="qrcode"]"#,
                    r#"img[src*="qrcode"]"#,
                ]),
                logged_in_locators: locators(&[".finder-nickname", ".account-info"]),
                login_prompt_locators: locators(&[r#"text="微信扫码登录""#]),
            },
            PlatformType::Xiaohongshu => Self {
                platform,
                login_url: "https://creator.xiaohongshu.com/login".into(),
                verify_url: "https://creator.xiaohongshu.com/publish/publish".into(),
                logged_in_url_patterns: strings(&[
                    "creator.xiaohongshu.com/publish",
                    "creator.xiaohongshu.com/new/home",
                    "creator.xiaohongshu.com/creator",
                ]),
                logged_in_titles: Vec::new(),
                qr_locators: locators(&[
                    r#"img[src*="qrcode"]"#,
                    ".qrcode-img",
                    r#"[class*="qrcode"] img"#,
                    ".login-box-container img",
                ]),
                logged_in_locators: locators(&[".user-avatar", ".name-box"]),
                login_prompt_locators: locators(&[r#"text="短信登录""#, r#"text="扫码登录""#]),
            },
        }
    }

    pub fn is_logged_in_url(&self, url: &str) -> bool {
        self.logged_in_url_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
    }

    pub fn logged_in_title<'a>(&'a self, title: &str) -> Option<&'a str> {
        self.logged_in_titles
            .iter()
            .map(String::as_str)
            .find(|needle| title.contains(needle))
    }
}

/// Built-in profiles plus config overrides
#[derive(Debug, Clone, Default)]
pub struct PlatformProfiles {
    overrides: HashMap<PlatformType, PlatformProfile>,
}

impl PlatformProfiles {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Later entries for the same platform win
    pub fn with_overrides(overrides: impl IntoIterator<Item = PlatformProfile>) -> Self {
        Self {
            overrides: overrides.into_iter().map(|p| (p.platform, p)).collect(),
        }
    }

    pub fn get(&self, platform: PlatformType) -> PlatformProfile {
        self.overrides
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| PlatformProfile::builtin(platform))
    }

    pub fn is_overridden(&self, platform: PlatformType) -> bool {
        self.overrides.contains_key(&platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_platform_has_a_usable_profile() {
        for platform in PlatformType::ALL {
            let profile = PlatformProfile::builtin(platform);
            assert_eq!(profile.platform, platform);
            assert!(!profile.qr_locators.is_empty());
            assert!(!profile.logged_in_url_patterns.is_empty());
            assert!(
                profile.is_logged_in_url(&profile.verify_url),
                "{} verify URL must satisfy its own logged-in pattern",
                platform
            );
            assert!(!profile.is_logged_in_url(&profile.login_url));
        }
    }

    #[test]
    fn test_douyin_login_prompts_are_text_locators() {
        let profile = PlatformProfile::builtin(PlatformType::Douyin);
        assert!(profile
            .login_prompt_locators
            .contains(&Locator::Text("扫码登录".into())));
    }

    #[test]
    fn test_override_replaces_builtin() {
        let mut custom = PlatformProfile::builtin(PlatformType::Douyin);
        custom.login_url = "https://example.test/login".into();
        custom.logged_in_titles = vec!["Dashboard".into()];

        let profiles = PlatformProfiles::with_overrides(vec![custom]);
        let douyin = profiles.get(PlatformType::Douyin);
        assert_eq!(douyin.login_url, "https://example.test/login");
        assert_eq!(douyin.logged_in_title("My Dashboard"), Some("Dashboard"));
        assert!(profiles.is_overridden(PlatformType::Douyin));
        assert!(!profiles.is_overridden(PlatformType::Kuaishou));
        assert_eq!(
            profiles.get(PlatformType::Kuaishou),
            PlatformProfile::builtin(PlatformType::Kuaishou)
        );
    }

    #[test]
    fn test_profile_from_toml() {
        let toml_str = r#"
            platform = "douyin"
            login_url = "https://creator.douyin.com/"
            verify_url = "https://creator.douyin.com/creator-micro/content/upload"
            logged_in_url_patterns = ["creator.douyin.com/creator-micro"]
            qr_locators = ['img[src*="qrcode"]', 'text="扫码登录"']
        "#;
        let profile: PlatformProfile = toml::from_str(toml_str).unwrap();
        assert_eq!(profile.platform, PlatformType::Douyin);
        assert_eq!(profile.qr_locators[1], Locator::Text("扫码登录".into()));
        assert!(profile.login_prompt_locators.is_empty());
    }
}
