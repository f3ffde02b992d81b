//! Where the engine's configuration comes from.

use std::path::PathBuf;
use tunnel_config_and_utils::{CoreResult, TunnelSettings};

/// Configuration handed to [`EngineAdapter::invoke`](crate::EngineAdapter::invoke).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A config file that already exists and is readable by the engine.
    ExistingPath(PathBuf),
    /// Config text that must be written to a scratch file first.
    InlineText(String),
}

impl ConfigSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::ExistingPath(path.into())
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self::InlineText(text.into())
    }

    /// Render typed settings into an inline source.
    pub fn from_settings(settings: &TunnelSettings) -> CoreResult<Self> {
        Ok(Self::InlineText(settings.to_yaml()?))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::InlineText(_))
    }

    /// Short description for logs. Inline text is never logged in full.
    pub fn describe(&self) -> String {
        match self {
            Self::ExistingPath(path) => format!("path {}", path.display()),
            Self::InlineText(text) => format!("inline ({} bytes)", text.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(
            ConfigSource::path("/etc/tunnel.yml"),
            ConfigSource::ExistingPath(PathBuf::from("/etc/tunnel.yml"))
        );
        assert!(ConfigSource::inline("a: 1").is_inline());
        assert!(!ConfigSource::path("/x").is_inline());
    }

    #[test]
    fn from_settings_renders_yaml() {
        let source = ConfigSource::from_settings(&TunnelSettings::default()).unwrap();
        match source {
            ConfigSource::InlineText(text) => {
                assert!(text.contains("tunnel:"));
                assert!(text.contains("socks5:"));
            }
            other => panic!("expected inline source, got {:?}", other),
        }
    }

    #[test]
    fn describe_hides_inline_content() {
        let source = ConfigSource::inline("password: hunter2");
        let description = source.describe();
        assert_eq!(description, "inline (17 bytes)");
        assert!(!description.contains("hunter2"));
    }
}
