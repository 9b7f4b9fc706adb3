//! Message templates for notices and command replies.
//!
//! Templates may reference `{prefix-<name>}` entries from the same catalog
//! and `{<placeholder>}` values supplied by the caller.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::notice::Notice;

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("prefix-info", "[ItemSweep] "),
    ("prefix-warn", "[ItemSweep] (!) "),
    ("prefix-error", "[ItemSweep] (x) "),
    ("clear-countdown", "{prefix-warn}Dropped items will be cleared in {seconds}s."),
    ("clear-success", "{prefix-info}Cleared {count} dropped items."),
    ("clear-now", "{prefix-warn}Clearing dropped items now."),
    ("status-enabled", "{prefix-info}Auto-clear is on. Next clear in {time}."),
    ("status-disabled", "{prefix-info}Auto-clear is off."),
    ("enabled", "{prefix-info}Auto-clear enabled."),
    ("disabled", "{prefix-info}Auto-clear disabled."),
    ("already-enabled", "{prefix-error}Auto-clear is already enabled."),
    ("already-disabled", "{prefix-error}Auto-clear is already disabled."),
    ("set-success", "{prefix-info}Interval set to {interval}."),
    ("set-usage", "{prefix-error}Usage: set <interval>, e.g. set 30m or set 1d2h."),
    ("set-invalid-format", "{prefix-error}Invalid interval format. Use [Nd][Nh][Nm], e.g. 1h30m."),
    ("set-invalid-value", "{prefix-error}Interval must be at least 1m."),
    ("countdown-success", "{prefix-info}Countdown set to {seconds}s."),
    ("countdown-invalid", "{prefix-error}Countdown must be a whole number of seconds, 0 or more."),
    ("schedule-failed", "{prefix-error}Auto-clear could not be started: {reason}"),
    ("clear-failed", "{prefix-error}Clear failed: {reason}"),
    ("reload-success", "{prefix-info}Configuration reloaded."),
    ("reload-failed", "{prefix-error}Reload failed: {reason}"),
    ("unknown-command", "{prefix-error}Unknown command."),
    (
        "usage",
        "{prefix-info}Commands: clear, clear now, on, off, set <interval>, countdown <seconds>, reload, info, help",
    ),
];

/// Key/template map with prefix and placeholder expansion.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::english()
    }
}

impl MessageCatalog {
    /// Built-in English messages.
    pub fn english() -> Self {
        let templates = DEFAULT_MESSAGES.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Self { templates }
    }

    /// English defaults overlaid with `dir/messages_<language>.toml` when it exists.
    pub fn load(dir: &Path, language: &str) -> Result<Self> {
        let mut catalog = Self::english();
        let path = dir.join(format!("messages_{language}.toml"));
        if !path.exists() {
            if language != "en" {
                warn!("language file {} not found, falling back to English", path.display());
            }
            return Ok(catalog);
        }

        let txt = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let overrides: HashMap<String, String> =
            toml::from_str(&txt).with_context(|| format!("parse {}", path.display()))?;
        info!("loaded {} messages from {}", overrides.len(), path.display());
        catalog.templates.extend(overrides);
        Ok(catalog)
    }

    /// Template for `key` with prefixes expanded.
    pub fn get(&self, key: &str) -> String {
        match self.templates.get(key) {
            Some(template) => self.apply_prefixes(template),
            None => format!("Missing message: {key}"),
        }
    }

    /// Template for `key` with prefixes and placeholders expanded.
    pub fn render(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        let mut out = self.get(key);
        for (name, value) in placeholders {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }

    /// Render a notice.
    pub fn render_notice(&self, notice: &Notice) -> String {
        self.render(notice.message_key(), &notice.placeholders())
    }

    fn apply_prefixes(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{prefix-") {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 1..];
            match tail.find('}') {
                Some(end) => {
                    let key = &tail[..end];
                    out.push_str(self.templates.get(key).map(String::as_str).unwrap_or(""));
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}
