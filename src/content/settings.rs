//! Site-wide settings (`configuracoes`).
//!
//! Settings are key/value rows (`chave`, `valor`) overlaid on built-in
//! defaults, so a fresh backend still renders a complete site. Unknown keys
//! are kept and shown; nothing is ever deleted.
//!
//! | Key | Default |
//! |---|---|
//! | `whatsapp` | `5527999999999` |
//! | `email` | `contato@trilhosetrilhas.com.br` |
//! | `instagram` | `https://instagram.com/trilhosetrilhases` |
//! | `sobre_texto` | short "about us" paragraph |
//! | `num_aventureiros` / `num_trilhas` / `num_estados` | `500` / `50` / `4` |
//! | `footer_imagem` | empty |

use crate::cache::SettingsCache;
use crate::error::{ContentError, ContentResult};
use crate::store::{ContentStore, Query};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TABLE: &str = "configuracoes";

pub const WHATSAPP: &str = "whatsapp";
pub const EMAIL: &str = "email";
pub const INSTAGRAM: &str = "instagram";
pub const ABOUT: &str = "sobre_texto";
pub const ADVENTURERS: &str = "num_aventureiros";
pub const TRAILS: &str = "num_trilhas";
pub const STATES: &str = "num_estados";
pub const FOOTER_IMAGE: &str = "footer_imagem";

/// Folder inside the gallery bucket for the footer image.
pub const FOOTER_FOLDER: &str = "config";

const DEFAULTS: [(&str, &str); 8] = [
    (WHATSAPP, "5527999999999"),
    (EMAIL, "contato@trilhosetrilhas.com.br"),
    (INSTAGRAM, "https://instagram.com/trilhosetrilhases"),
    (
        ABOUT,
        "Somos uma empresa de turismo de aventura do Espírito Santo, especializada em \
         trilhas, viagens a praias, campings e expedições noturnas.",
    ),
    (ADVENTURERS, "500"),
    (TRAILS, "50"),
    (STATES, "4"),
    (FOOTER_IMAGE, ""),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SiteSettings {
    values: BTreeMap<String, String>,
    /// Number used for links when the stored one has no digits.
    fallback_whatsapp: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback_whatsapp: DEFAULTS[0].1.to_string(),
        }
    }
}

impl SiteSettings {
    pub fn known_keys() -> impl Iterator<Item = &'static str> {
        DEFAULTS.iter().map(|(k, _)| *k)
    }

    /// Overlay `values` on top of these settings.
    pub fn overlay<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in values {
            self.values.insert(k.into(), v.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn whatsapp(&self) -> &str {
        self.get(WHATSAPP)
    }

    pub fn email(&self) -> &str {
        self.get(EMAIL)
    }

    pub fn instagram(&self) -> &str {
        self.get(INSTAGRAM)
    }

    pub fn about(&self) -> &str {
        self.get(ABOUT)
    }

    pub fn footer_image(&self) -> Option<&str> {
        Some(self.get(FOOTER_IMAGE)).filter(|s| !s.is_empty())
    }

    /// Homepage counters: adventurers, trails, states.
    pub fn stats(&self) -> [(&'static str, &str); 3] {
        [
            ("adventurers", self.get(ADVENTURERS)),
            ("trails", self.get(TRAILS)),
            ("states", self.get(STATES)),
        ]
    }

    /// Click-to-chat link for the stored number, or the configured one when
    /// the stored number is blank.
    pub fn whatsapp_link(&self, message: &str) -> String {
        whatsapp_link(Some(self.whatsapp()), message, &self.fallback_whatsapp)
    }

    /// Make the current WhatsApp number the link fallback.
    fn pin_whatsapp_fallback(mut self) -> Self {
        if !digits(self.whatsapp()).is_empty() {
            self.fallback_whatsapp = self.whatsapp().to_string();
        }
        self
    }
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

/// `https://wa.me/{digits}[?text=...]`.
///
/// Non-digits are stripped from `number`; if nothing is left, `fallback` is
/// used instead. The message is percent-encoded with spaces as `%20`, the
/// way browsers encode a URI component.
pub fn whatsapp_link(number: Option<&str>, message: &str, fallback: &str) -> String {
    let mut clean = number.map(digits).unwrap_or_default();
    if clean.is_empty() {
        clean = digits(fallback);
    }
    let base = format!("https://wa.me/{clean}");
    if message.is_empty() {
        return base;
    }
    // Form encoding writes spaces as '+' and a literal '+' as %2B.
    let text: String = url::form_urlencoded::byte_serialize(message.as_bytes()).collect();
    format!("{base}?text={}", text.replace('+', "%20"))
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Check a value before it is written. Empty values are always allowed.
///
/// WhatsApp numbers take 10 or 11 local digits (DDD + number), optionally
/// prefixed by the `55` country code, so 10 to 13 digits in total.
pub fn validate_setting(key: &str, value: &str) -> ContentResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    match key {
        EMAIL if !looks_like_email(value) => Err(ContentError::validation(format!(
            "'{value}' is not a valid e-mail address"
        ))),
        WHATSAPP if !(10..=13).contains(&digits(value).len()) => Err(ContentError::validation(
            format!("WhatsApp number must have 10 to 13 digits, got '{value}'"),
        )),
        ADVENTURERS | TRAILS | STATES if value.parse::<u32>().is_err() => Err(
            ContentError::validation(format!("{key} must be a whole number, got '{value}'")),
        ),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct SettingRow {
    chave: String,
    #[serde(default)]
    valor: Option<String>,
}

pub struct SettingsRepository<S: ContentStore + ?Sized> {
    store: Arc<S>,
    cache: Option<SettingsCache>,
    defaults: SiteSettings,
    current: SiteSettings,
}

impl<S: ContentStore + ?Sized> SettingsRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cache: None,
            defaults: SiteSettings::default(),
            current: SiteSettings::default(),
        }
    }

    pub fn with_cache(mut self, cache: SettingsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the built-in defaults (e.g. with contact details from config).
    ///
    /// The WhatsApp number in `defaults` also becomes the link fallback for
    /// a blank stored number.
    pub fn with_defaults(mut self, defaults: SiteSettings) -> Self {
        let defaults = defaults.pin_whatsapp_fallback();
        self.current = defaults.clone();
        self.defaults = defaults;
        self
    }

    /// Settings as of the last load or write.
    pub fn current(&self) -> &SiteSettings {
        &self.current
    }

    /// Fetch every row and overlay it on the defaults.
    pub async fn load(&mut self) -> ContentResult<SiteSettings> {
        let rows = self
            .store
            .select(TABLE, &Query::new())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "settings fetch failed");
                ContentError::fetch(TABLE, e)
            })?;
        let rows = rows
            .into_iter()
            .map(serde_json::from_value::<SettingRow>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContentError::fetch(TABLE, e))?;

        let fetched: BTreeMap<String, String> = rows
            .into_iter()
            .map(|r| (r.chave, r.valor.unwrap_or_default()))
            .collect();

        if let Some(cache) = &self.cache
            && let Err(e) = cache.store(&fetched)
        {
            tracing::warn!(path = %cache.path().display(), error = %e, "could not write settings cache");
        }

        self.current = self.defaults.clone().overlay(fetched);
        Ok(self.current.clone())
    }

    /// Use the cache when it is fresh, otherwise [`load`](Self::load).
    pub async fn load_cached(&mut self) -> ContentResult<SiteSettings> {
        if let Some(values) = self.cache.as_ref().and_then(SettingsCache::load) {
            tracing::debug!("settings served from cache");
            self.current = self.defaults.clone().overlay(values);
            return Ok(self.current.clone());
        }
        self.load().await
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.invalidate()
        {
            tracing::warn!(path = %cache.path().display(), error = %e, "could not invalidate settings cache");
        }
    }

    async fn write(&mut self, key: &str, value: &str) -> ContentResult<()> {
        let row = json!({ "chave": key, "valor": value });
        self.store
            .upsert(TABLE, vec![row], "chave")
            .await
            .map_err(|e| {
                tracing::error!(key, error = %e, "saving setting failed");
                ContentError::persistence(TABLE, e)
            })?;
        self.current.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Write one setting.
    pub async fn set(&mut self, key: &str, value: &str) -> ContentResult<()> {
        let value = value.trim();
        validate_setting(key, value)?;
        let result = self.write(key, value).await;
        self.invalidate_cache();
        result
    }

    /// Write several settings, one request each, in the given order.
    ///
    /// All values are validated first. The first failed write stops the
    /// rest; writes before it stay applied.
    pub async fn set_many(&mut self, entries: &[(String, String)]) -> ContentResult<()> {
        for (key, value) in entries {
            validate_setting(key, value)?;
        }
        let mut result = Ok(());
        for (key, value) in entries {
            result = self.write(key, value.trim()).await;
            if result.is_err() {
                break;
            }
        }
        self.invalidate_cache();
        result
    }
}
