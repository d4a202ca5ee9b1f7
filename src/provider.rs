//! Provider session: the persisted login and the link helpers views use.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DashboardError;
use crate::records::attachment_url_of;
use crate::types::Provider;

pub const DEFAULT_FORM_LINK: &str = "https://app.ponce.ai/face/default-clinic";
pub const DEFAULT_TELEHEALTH_LINK: &str = "https://your-telehealth-link.com";
pub const DEFAULT_SCAN_LINK: &str = "https://app.ponce.ai/face/default-email";

const FORM_LINK_KEYS: &[&str] = &["Form Link", "FormLink", "Form link", "form link", "formLink"];
const WEB_LINK_KEYS: &[&str] = &["Web Link", "WebLink", "web link", "webLink"];

impl Provider {
    /// First non-empty string among the passthrough fields `keys`.
    fn extra_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.extra.get(*k))
            .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Logo URL from `logo`/`Logo`: a bare string, an attachment list, or a
    /// single `{url}` object.
    pub fn logo_url(&self) -> Option<String> {
        let logo = self.extra.get("logo").or_else(|| self.extra.get("Logo"))?;
        match logo {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => items.first().and_then(attachment_url_of),
            obj @ Value::Object(_) => attachment_url_of(obj),
            _ => None,
        }
    }
}

/// Where patients fill in the scan form.
pub fn form_link(provider: Option<&Provider>) -> String {
    let Some(provider) = provider else {
        return DEFAULT_FORM_LINK.to_string();
    };
    provider
        .extra_str(FORM_LINK_KEYS)
        .or_else(|| provider.extra_str(&["JotformURL", "SCAN_FORM_URL"]))
        .unwrap_or(DEFAULT_FORM_LINK)
        .to_string()
}

pub fn telehealth_link(provider: Option<&Provider>) -> String {
    provider
        .and_then(|p| p.extra_str(&WEB_LINK_KEYS[..2]))
        .unwrap_or(DEFAULT_TELEHEALTH_LINK)
        .to_string()
}

/// Link sent to clients for a telehealth scan: the web link, then the form
/// link, then a default.
pub fn telehealth_scan_link(provider: Option<&Provider>) -> String {
    let Some(provider) = provider else {
        log::warn!("Provider not loaded yet, using default scan link");
        return DEFAULT_SCAN_LINK.to_string();
    };
    match provider
        .extra_str(WEB_LINK_KEYS)
        .or_else(|| provider.extra_str(FORM_LINK_KEYS))
    {
        Some(link) => link.to_string(),
        None => {
            log::warn!(
                "No web link or form link for provider {}, using default scan link",
                provider.id
            );
            DEFAULT_SCAN_LINK.to_string()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavedProvider {
    info: Provider,
    saved_at: DateTime<Utc>,
}

/// The logged-in provider, persisted between runs.
pub struct ProviderStore {
    path: PathBuf,
}

impl ProviderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// ~/.provider-dashboard/provider.json
    pub fn default_location() -> Result<Self, DashboardError> {
        Ok(Self::new(crate::state::app_dir()?.join("provider.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved provider, if any. An unreadable file is treated as logged
    /// out.
    pub fn load(&self) -> Option<Provider> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SavedProvider>(&content) {
            Ok(saved) => {
                log::debug!(
                    "Restored provider {} saved at {}",
                    saved.info.id,
                    saved.saved_at
                );
                Some(saved.info)
            }
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, provider: &Provider) -> Result<(), DashboardError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let saved = SavedProvider {
            info: provider.clone(),
            saved_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&saved)
            .map_err(|e| DashboardError::serialization("saved provider", e))?;
        fs::write(&self.path, content)?;
        log::info!("Saved provider {} to {}", provider.id, self.path.display());
        Ok(())
    }

    /// Forget the saved provider. Clearing twice is fine.
    pub fn clear(&self) -> Result<(), DashboardError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(extra: Value) -> Provider {
        Provider {
            id: "recProv".into(),
            name: "Glow Clinic".into(),
            code: "glow".into(),
            extra: extra.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_logo_url_shapes() {
        assert_eq!(
            provider(json!({"logo": "https://logo.png"})).logo_url().as_deref(),
            Some("https://logo.png")
        );
        assert_eq!(
            provider(json!({"Logo": [{"thumbnails": {"full": {"url": "https://full.png"}}}]}))
                .logo_url()
                .as_deref(),
            Some("https://full.png")
        );
        assert_eq!(
            provider(json!({"logo": {"url": "https://obj.png"}})).logo_url().as_deref(),
            Some("https://obj.png")
        );
        assert_eq!(provider(json!({})).logo_url(), None);
    }

    #[test]
    fn test_form_link_fallbacks() {
        assert_eq!(form_link(None), DEFAULT_FORM_LINK);
        assert_eq!(form_link(Some(&provider(json!({})))), DEFAULT_FORM_LINK);
        assert_eq!(
            form_link(Some(&provider(json!({"SCAN_FORM_URL": "https://scan"})))),
            "https://scan"
        );
        assert_eq!(
            form_link(Some(&provider(
                json!({"form link": "https://form", "JotformURL": "https://jot"})
            ))),
            "https://form"
        );
    }

    #[test]
    fn test_scan_link_prefers_web_then_form() {
        let both = provider(json!({"Form Link": "https://form", "webLink": "https://web"}));
        assert_eq!(telehealth_scan_link(Some(&both)), "https://web");
        let form_only = provider(json!({"FormLink": "https://form"}));
        assert_eq!(telehealth_scan_link(Some(&form_only)), "https://form");
        assert_eq!(telehealth_scan_link(Some(&provider(json!({})))), DEFAULT_SCAN_LINK);
        assert_eq!(telehealth_scan_link(None), DEFAULT_SCAN_LINK);
    }

    #[test]
    fn test_telehealth_link() {
        assert_eq!(
            telehealth_link(Some(&provider(json!({"Web Link": "https://tele"})))),
            "https://tele"
        );
        // Only the two canonical spellings count here.
        assert_eq!(
            telehealth_link(Some(&provider(json!({"webLink": "https://tele"})))),
            DEFAULT_TELEHEALTH_LINK
        );
    }

    #[test]
    fn test_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProviderStore::new(dir.path().join("nested").join("provider.json"));
        assert!(store.load().is_none());

        let saved = provider(json!({"Web Link": "https://tele"}));
        store.save(&saved).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["info"]["id"], "recProv");
        assert!(raw["savedAt"].is_string());
        assert_eq!(store.load(), Some(saved));

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.json");
        fs::write(&path, "{\"info\": 42}").unwrap();
        assert!(ProviderStore::new(path).load().is_none());
    }
}
