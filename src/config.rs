use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::notify::{ParseMode, TELEGRAM_API};
use crate::registry::IdentifierRegistry;

pub const DEFAULT_CONFIG_FILE: &str = "pickup_watch.toml";
const ENV_PREFIX: &str = "PICKUP_WATCH";

const PAGE_URL: &str = "https://belgrad.diplo.de/rs-de/service/05-visaeinreise/2631174-2631174";
const LINK_SELECTOR: &str = r#"[title="Abholliste/Lista za preuzimanje - Kneza Milosa 75"]"#;
const MARKER_SELECTOR: &str = ".link-list__sub-content";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_page_url")]
    pub page_url: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_marker_selector")]
    pub marker_selector: String,
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default = "default_registry")]
    pub registry: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub parse_mode: ParseMode,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            api_base: default_api_base(),
            timeout_secs: default_delivery_timeout(),
            parse_mode: ParseMode::default(),
        }
    }
}

fn default_page_url() -> String {
    PAGE_URL.into()
}
fn default_link_selector() -> String {
    LINK_SELECTOR.into()
}
fn default_marker_selector() -> String {
    MARKER_SELECTOR.into()
}
fn default_poll_secs() -> u64 {
    5
}
fn default_page_timeout() -> u64 {
    20
}
fn default_document_timeout() -> u64 {
    30
}
fn default_delivery_timeout() -> u64 {
    10
}
fn default_state_path() -> PathBuf {
    PathBuf::from("last_date.txt")
}
fn default_user_agent() -> String {
    BROWSER_UA.into()
}
fn default_api_base() -> String {
    TELEGRAM_API.into()
}
fn default_registry() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("587006".to_string(), "Adel".to_string()),
        ("587884".to_string(), "Amir".to_string()),
    ])
}

impl Settings {
    /// Defaults, then the TOML file (required only when given explicitly),
    /// then `PICKUP_WATCH__*` variables, then `TG_TOKEN` / `TG_CHAT_ID`.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("telegram.token", std::env::var("TG_TOKEN").ok())?
            .set_override_option("telegram.chat_id", std::env::var("TG_CHAT_ID").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.registry().map(|_| ())
    }

    pub fn registry(&self) -> Result<IdentifierRegistry, ConfigError> {
        IdentifierRegistry::new(self.registry.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(src: &str) -> Settings {
        config::Config::builder()
            .add_source(config::File::from_str(src, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_match_monitored_page() {
        let s = from_toml("");
        assert_eq!(s.page_url, PAGE_URL);
        assert_eq!(s.marker_selector, ".link-list__sub-content");
        assert_eq!(s.poll_interval(), Duration::from_secs(5));
        assert_eq!(s.state_path, PathBuf::from("last_date.txt"));
        assert_eq!(s.telegram.api_base, TELEGRAM_API);
        assert_eq!(s.telegram.parse_mode, ParseMode::Plain);
        let reg = s.registry().unwrap();
        assert_eq!(reg.label("587006"), Some("Adel"));
        assert_eq!(reg.label("587884"), Some("Amir"));
    }

    #[test]
    fn file_overrides_registry_and_interval() {
        let s = from_toml(
            r#"
            poll_interval_secs = 60
            state_path = "state/marker.txt"

            [telegram]
            parse_mode = "rich_text"

            [registry]
            "123456" = "Someone"
            "#,
        );
        assert_eq!(s.poll_interval(), Duration::from_secs(60));
        assert_eq!(s.telegram.parse_mode, ParseMode::RichText);
        let reg = s.registry().unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.label("123456"), Some("Someone"));
    }

    #[test]
    fn validation_catches_bad_values() {
        let s = from_toml("poll_interval_secs = 0");
        assert!(matches!(s.validate(), Err(ConfigError::ZeroInterval)));

        let s = from_toml("[registry]\nabc = \"x\"");
        assert!(matches!(s.validate(), Err(ConfigError::BadIdentifier(_))));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Settings::load(Some(&missing)),
            Err(ConfigError::Load(_))
        ));
    }
}
