use anyhow::{Context, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

use crate::config::DEFAULT_LANGUAGE;

/// Languages shipped with the bot
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ru"];

/// Localization manager for the navigation bot
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
    default_language: String,
}

impl LocalizationManager {
    /// Create a manager from `./locales`
    pub fn new() -> Result<Self> {
        Self::from_dir(Path::new("./locales"), DEFAULT_LANGUAGE)
    }

    /// Create a manager reading `<dir>/<lang>/main.ftl` for every supported language
    pub fn from_dir(dir: &Path, default_language: &str) -> Result<Self> {
        let mut bundles = HashMap::new();

        for lang in SUPPORTED_LANGUAGES {
            let locale: LanguageIdentifier = lang.parse()?;
            let bundle = Self::create_bundle(dir, &locale)?;
            bundles.insert(lang.to_string(), Arc::new(bundle));
        }

        let default_language = supported_language(Some(default_language)).unwrap_or_else(|| {
            warn!(language = default_language, "No bundle for default language, using English");
            DEFAULT_LANGUAGE
        });

        Ok(Self {
            bundles,
            default_language: default_language.to_string(),
        })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        dir: &Path,
        locale: &LanguageIdentifier,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Names are interpolated into HTML; bidi isolation marks would show up verbatim
        bundle.set_use_isolating(false);

        let resource_path = dir.join(locale.to_string()).join("main.ftl");
        let content = fs::read_to_string(&resource_path)
            .with_context(|| format!("Failed to read {}", resource_path.display()))?;
        let resource = FluentResource::try_new(content).map_err(|(_, errors)| {
            anyhow::anyhow!("Failed to parse {}: {:?}", resource_path.display(), errors)
        })?;
        bundle.add_resource(resource).map_err(|errors| {
            anyhow::anyhow!("Duplicate messages in {}: {:?}", resource_path.display(), errors)
        })?;

        debug!(locale = %locale, "Loaded localization bundle");
        Ok(bundle)
    }

    /// Whether `key` exists in the given language
    pub fn has_message(&self, key: &str, language: &str) -> bool {
        self.bundles
            .get(language)
            .is_some_and(|bundle| bundle.has_message(key))
    }

    /// Get a localized message, falling back to the default language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .filter(|bundle| bundle.has_message(key))
            .or_else(|| self.bundles.get(&self.default_language))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let fluent_args = args.map(|args| {
            FluentArgs::from_iter(args.iter().map(|(k, v)| (*k, FluentValue::from(*v))))
        });

        let mut value = String::new();
        let mut errors = vec![];
        if bundle
            .write_pattern(&mut value, pattern, fluent_args.as_ref(), &mut errors)
            .is_err()
            || !errors.is_empty()
        {
            warn!(key, language, ?errors, "Failed to format message");
        }

        value
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(
        &self,
        key: &str,
        language: &str,
        args: &[(&str, &str)],
    ) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language, Some(&args_map))
    }
}

/// Supported language matching a Telegram language code, if any
pub fn supported_language(language_code: Option<&str>) -> Option<&'static str> {
    language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(|code| code.to_ascii_lowercase())
        .and_then(|code| SUPPORTED_LANGUAGES.iter().find(|lang| **lang == code).copied())
}

/// Map a Telegram language code onto a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    supported_language(language_code).unwrap_or(DEFAULT_LANGUAGE)
}

/// Global localization instance
static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager from `./locales`
pub fn init_localization() -> Result<()> {
    init_localization_from(Path::new("./locales"), DEFAULT_LANGUAGE)
}

/// Initialize the global localization manager; later calls are no-ops
pub fn init_localization_from(dir: &Path, default_language: &str) -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_some() {
        return Ok(());
    }
    let manager = LocalizationManager::from_dir(dir, default_language)?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager, loading `./locales` on first use
pub fn get_localization_manager() -> Option<&'static LocalizationManager> {
    if LOCALIZATION_MANAGER.get().is_none() {
        if let Err(e) = init_localization() {
            warn!(error = %e, "Localization unavailable");
        }
    }
    LOCALIZATION_MANAGER.get()
}

/// Localized message in the visitor's language
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    t_args_lang(key, &[], language)
}

/// Localized message with arguments in the visitor's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    match get_localization_manager() {
        Some(manager) => {
            let language =
                supported_language(language).unwrap_or(manager.default_language.as_str());
            manager.get_message_with_args(key, language, args)
        }
        None => format!("Missing translation: {}", key),
    }
}
