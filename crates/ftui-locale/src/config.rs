#![forbid(unsafe_code)]

//! Environment configuration for the process-wide registry.
//!
//! | Variable             | Meaning                                  |
//! |----------------------|------------------------------------------|
//! | `FTUI_LOCALE`        | initial pair (`fr_FR`, `fr-FR`, `fr`)    |
//! | `FTUI_LOCALE_ASSETS` | directory holding `<pair>.<ext>` tables  |
//! | `FTUI_LOCALE_EXT`    | table file extension, default `bin`      |
//!
//! Without `FTUI_LOCALE` the pair comes from `LC_ALL`, `LC_MESSAGES`, then
//! `LANG`. Without `FTUI_LOCALE_ASSETS` no tables are loaded and every
//! lookup resolves through hooks or returns its input.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::assets::{AssetProvider, DirAssets, NoAssets};
use crate::code::{LocalePair, detect_system_pair_with};
use crate::registry::LocaleRegistry;

pub const ENV_LOCALE: &str = "FTUI_LOCALE";
pub const ENV_LOCALE_ASSETS: &str = "FTUI_LOCALE_ASSETS";
pub const ENV_LOCALE_EXT: &str = "FTUI_LOCALE_EXT";

/// Settings used to build a [`LocaleRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    pub pair: LocalePair,
    pub assets_dir: Option<PathBuf>,
    pub extension: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            pair: LocalePair::fallback(),
            assets_dir: None,
            extension: DirAssets::DEFAULT_EXTENSION.to_string(),
        }
    }
}

/// Configuration parse diagnostics.
#[derive(Debug, Clone)]
pub struct LocaleConfigParse {
    pub config: LocaleConfig,
    pub errors: Vec<LocaleConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl LocaleConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LocaleConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for LocaleConfigError {}

impl LocaleConfig {
    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> LocaleConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> LocaleConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Asset provider described by this config.
    #[must_use]
    pub fn asset_provider(&self) -> Arc<dyn AssetProvider> {
        match &self.assets_dir {
            Some(dir) => Arc::new(DirAssets::new(dir).with_extension(&self.extension)),
            None => Arc::new(NoAssets),
        }
    }

    /// Registry whose contexts share this config's provider.
    #[must_use]
    pub fn build_registry(&self) -> LocaleRegistry {
        debug!(
            pair = %self.pair,
            assets = ?self.assets_dir,
            extension = %self.extension,
            "building locale registry"
        );
        LocaleRegistry::new(self.pair, self.asset_provider())
    }
}

/// Parse config through a custom environment lookup.
pub fn from_env_with<F>(get: F) -> LocaleConfigParse
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = LocaleConfig::default();
    let mut errors = Vec::new();

    let explicit = match get(ENV_LOCALE) {
        Some(value) => match LocalePair::parse(&value) {
            Some(pair) => Some(pair),
            None => {
                errors.push(LocaleConfigError::new(
                    "locale",
                    value,
                    "expected ll, ll_CC or ll-CC with two-character codes",
                ));
                None
            }
        },
        None => None,
    };
    config.pair = explicit.unwrap_or_else(|| detect_system_pair_with(&get));

    if let Some(value) = get(ENV_LOCALE_ASSETS) {
        if value.trim().is_empty() {
            errors.push(LocaleConfigError::new(
                "assets_dir",
                value,
                "expected a directory path",
            ));
        } else {
            config.assets_dir = Some(PathBuf::from(value));
        }
    }

    if let Some(value) = get(ENV_LOCALE_EXT) {
        let ext = value.trim().trim_start_matches('.');
        if ext.is_empty() || ext.contains(['/', '\\', '.']) {
            errors.push(LocaleConfigError::new(
                "extension",
                value,
                "expected a bare file extension such as bin",
            ));
        } else {
            config.extension = ext.to_string();
        }
    }

    LocaleConfigParse { config, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::StringTableBuilder;
    use std::collections::HashMap;

    fn parse(vars: &[(&'static str, &'static str)]) -> LocaleConfigParse {
        let env: HashMap<&str, &str> = vars.iter().copied().collect();
        from_env_with(|key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn locale_config_env_parsing() {
        let parsed = parse(&[
            (ENV_LOCALE, "fr_FR.UTF-8"),
            (ENV_LOCALE_ASSETS, "/usr/share/app/strings"),
            (ENV_LOCALE_EXT, ".tbl"),
        ]);
        assert!(parsed.errors.is_empty());
        let config = parsed.config;
        assert_eq!(config.pair, LocalePair::new("fr", "FR").unwrap());
        assert_eq!(
            config.assets_dir,
            Some(PathBuf::from("/usr/share/app/strings"))
        );
        assert_eq!(config.extension, "tbl");
    }

    #[test]
    fn explicit_locale_beats_platform() {
        let parsed = parse(&[(ENV_LOCALE, "de"), ("LANG", "ja_JP.UTF-8")]);
        assert_eq!(parsed.config.pair, LocalePair::new("de", "").unwrap());
    }

    #[test]
    fn platform_locale_when_unset() {
        let parsed = parse(&[("LANG", "pt_BR.UTF-8")]);
        assert_eq!(parsed.config.pair, LocalePair::new("pt", "BR").unwrap());
        let parsed = parse(&[("LANG", "C")]);
        assert_eq!(parsed.config.pair, LocalePair::fallback());
    }

    #[test]
    fn defaults_without_environment() {
        let parsed = parse(&[]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config, LocaleConfig::default());
    }

    #[test]
    fn locale_config_invalid_values_reported() {
        let parsed = parse(&[
            (ENV_LOCALE, "english"),
            (ENV_LOCALE_ASSETS, "  "),
            (ENV_LOCALE_EXT, "a/b"),
            ("LANG", "ko_KR"),
        ]);
        assert!(parsed.errors.iter().any(|err| err.field == "locale"));
        assert!(parsed.errors.iter().any(|err| err.field == "assets_dir"));
        assert!(parsed.errors.iter().any(|err| err.field == "extension"));
        // Bad explicit value falls through to detection.
        assert_eq!(parsed.config.pair, LocalePair::new("ko", "KR").unwrap());
        assert_eq!(parsed.config.assets_dir, None);
        assert_eq!(parsed.config.extension, "bin");
    }

    #[test]
    fn error_display() {
        let err = LocaleConfigError::new("locale", "xx_YYY", "bad code");
        assert_eq!(err.to_string(), "locale=xx_YYY (bad code)");
    }

    #[test]
    fn build_registry_reads_directory() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = [("ok", "Valider")]
            .into_iter()
            .collect::<StringTableBuilder>()
            .build()
            .unwrap();
        std::fs::write(dir.path().join("fr_FR.tbl"), bytes).unwrap();

        let config = LocaleConfig {
            pair: LocalePair::new("fr", "FR").unwrap(),
            assets_dir: Some(dir.path().to_path_buf()),
            extension: "tbl".to_string(),
        };
        let registry = config.build_registry();
        let ctx = registry.acquire("");
        assert_eq!(ctx.translate("ok"), "Valider");
        assert_eq!(registry.pair(), config.pair);
    }

    #[test]
    fn build_registry_without_assets() {
        let registry = LocaleConfig::default().build_registry();
        let ctx = registry.acquire("app");
        assert!(!ctx.has_table());
        assert_eq!(ctx.translate("ok"), "ok");
    }
}
