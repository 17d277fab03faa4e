use std::collections::HashMap;
use std::sync::LazyLock;

use fluent_templates::{
    fluent_bundle::{FluentArgs, FluentValue},
    static_loader, Loader,
};
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
        // Telegram renders the bidi isolation marks as garbage
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Default language identifier used as a fallback.
static DEFAULT_LANG: LazyLock<LanguageIdentifier> = LazyLock::new(|| "ru".parse().unwrap_or_default());

/// Normalizes a language code into a LanguageIdentifier (falls back to default).
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    let code_normalized = code.to_lowercase();
    let normalized = match code_normalized.as_str() {
        "en" | "en-us" => "en-US",
        "ru" | "ru-ru" => "ru",
        other => other,
    };

    normalized.parse().unwrap_or_else(|_| DEFAULT_LANG.clone())
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .lookup(lang, key)
        .unwrap_or_else(|| LOCALES.lookup(&DEFAULT_LANG, key).unwrap_or_else(|| key.to_string()));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &FluentArgs) -> String {
    let args_map: HashMap<String, FluentValue> = args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    lookup_with_map(lang, key, &args_map)
}

/// Shorthand for [`t_args`] with plain string arguments.
///
/// Numbers are formatted by the caller so Fluent does not apply its own
/// grouping to mileage and ids.
pub fn t_with(lang: &LanguageIdentifier, key: &str, args: &[(&str, String)]) -> String {
    let args_map: HashMap<String, FluentValue> = args
        .iter()
        .map(|(k, v)| (k.to_string(), FluentValue::from(v.clone())))
        .collect();
    lookup_with_map(lang, key, &args_map)
}

fn lookup_with_map(lang: &LanguageIdentifier, key: &str, args_map: &HashMap<String, FluentValue>) -> String {
    let text = LOCALES.lookup_with_args(lang, key, args_map).unwrap_or_else(|| {
        LOCALES
            .lookup_with_args(&DEFAULT_LANG, key, args_map)
            .unwrap_or_else(|| key.to_string())
    });
    text.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_from_code() {
        assert_eq!(lang_from_code("en").to_string(), "en-US");
        assert_eq!(lang_from_code("RU").to_string(), "ru");
        assert_eq!(lang_from_code("!!").to_string(), "ru");
    }

    #[test]
    fn test_lookup_in_both_languages() {
        let ru = lang_from_code("ru");
        let en = lang_from_code("en");
        assert_eq!(t(&en, "common.cancel"), "❌ Cancel");
        assert_eq!(t(&ru, "common.cancel"), "❌ Отмена");
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let en = lang_from_code("en");
        assert_eq!(t(&en, "no.such.key"), "no.such.key");
    }

    #[test]
    fn test_args_are_interpolated_without_isolation_marks() {
        let en = lang_from_code("en");
        let text = t_with(&en, "mileage.confirm_button", &[("mileage", "46000".to_string())]);
        assert_eq!(text, "✅ Confirm: 46000 km");
    }

    #[test]
    fn test_fluent_args_variant() {
        let en = lang_from_code("en");
        let mut args = FluentArgs::new();
        args.set("mileage", "46000");
        assert_eq!(t_args(&en, "mileage.confirm_button", &args), "✅ Confirm: 46000 km");
    }

    fn keys(source: &str) -> Vec<String> {
        let mut group = "";
        let mut keys = Vec::new();
        for line in source.lines() {
            if let Some(name) = line.strip_suffix(" =") {
                group = name;
            } else if let Some(attr) = line.trim_start().strip_prefix('.') {
                if let Some((name, _)) = attr.split_once(" =") {
                    keys.push(format!("{}.{}", group, name));
                }
            }
        }
        keys.sort();
        keys
    }

    #[test]
    fn test_translations_have_the_same_keys() {
        let ru = keys(include_str!("../locales/ru/main.ftl"));
        let en = keys(include_str!("../locales/en-US/main.ftl"));
        assert!(!ru.is_empty());
        assert_eq!(ru, en);
    }
}
