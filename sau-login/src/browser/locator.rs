//! Element locators
//!
//! Plain strings are CSS selectors. `text=<literal>` (optionally quoted)
//! matches elements whose own text is exactly the literal, which is how the
//! creator login pages label their "scan to log in" / "phone login" tabs.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    Css(String),
    Text(String),
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.strip_prefix("text=") {
            Some(text) => Locator::Text(unquote(text.trim()).to_string()),
            None => Locator::Css(trimmed.to_string()),
        }
    }

    /// WebDriver `(using, value)` pair
    pub fn webdriver_strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Css(css) => ("css selector", css.clone()),
            Locator::Text(text) => (
                "xpath",
                format!("//*[normalize-space(text())={}]", xpath_literal(text)),
            ),
        }
    }
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Quote a string for use inside an XPath expression
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

impl From<String> for Locator {
    fn from(raw: String) -> Self {
        Locator::parse(&raw)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Locator::parse(raw)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => f.write_str(css),
            Locator::Text(text) => write!(f, "text=\"{}\"", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_css_and_text_forms() {
        assert_eq!(
            Locator::parse(r#"img[src*="qrcode"]"#),
            Locator::Css(r#"img[src*="qrcode"]"#.to_string())
        );
        assert_eq!(
            Locator::parse(r#"text="扫码登录""#),
            Locator::Text("扫码登录".to_string())
        );
        assert_eq!(Locator::parse("text=立即登录"), Locator::Text("立即登录".to_string()));
    }

    #[test]
    fn test_text_locator_maps_to_xpath() {
        let (using, value) = Locator::Text("扫码登录".into()).webdriver_strategy();
        assert_eq!(using, "xpath");
        assert_eq!(value, "//*[normalize-space(text())='扫码登录']");
    }

    #[test]
    fn test_xpath_literal_with_both_quotes() {
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for raw in [".qr-code img", r#"text="手机号登录""#] {
            let locator = Locator::parse(raw);
            assert_eq!(Locator::parse(&locator.to_string()), locator);
        }
    }
}
