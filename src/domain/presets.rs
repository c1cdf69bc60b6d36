//! Named parameter presets and URL-matched site presets.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::params::RenderParams;

/// Read-only lookup over the loaded presets.
pub trait PresetStore: Send + Sync {
    /// Exact name lookup. Absence is reported to the caller, who decides whether it matters.
    fn by_name(&self, name: &str) -> Option<&RenderParams>;

    /// Parameters of the first preset whose URL rule matches `url`.
    fn for_site(&self, url: &str) -> Option<&RenderParams>;
}

/// Store used when no preset definitions are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresets;

impl PresetStore for NoPresets {
    fn by_name(&self, _name: &str) -> Option<&RenderParams> {
        None
    }

    fn for_site(&self, _url: &str) -> Option<&RenderParams> {
        None
    }
}

/// URL rule compiled on first use and cached for the life of the store.
#[derive(Debug)]
pub struct UrlRule {
    pattern: String,
    compiled: OnceCell<Option<Regex>>,
}

impl UrlRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn is_match(&self, url: &str) -> bool {
        let compiled = self.compiled.get_or_init(|| match Regex::new(&self.pattern) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(
                    target = "webclip::domain::presets",
                    pattern = %self.pattern,
                    error = %err,
                    "Preset url_regexp does not compile; rule will never match"
                );
                None
            }
        });
        compiled.as_ref().is_some_and(|regex| regex.is_match(url))
    }
}

#[derive(Debug)]
pub struct Preset {
    pub name: String,
    pub rule: Option<UrlRule>,
    pub params: RenderParams,
}

#[derive(Debug, Deserialize)]
struct PresetDefinition {
    #[serde(default)]
    url_regexp: Option<String>,
    #[serde(flatten)]
    params: RenderParams,
}

/// Presets kept in the order they were declared. Site matching walks that order, so
/// when several rules match a URL the earliest declaration wins.
#[derive(Debug, Default)]
pub struct DeclaredPresets {
    presets: Vec<Preset>,
}

impl DeclaredPresets {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self { presets }
    }

    /// Parse a JSON object keyed by preset name.
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        let entries: Map<String, Value> = serde_json::from_str(source)?;
        let mut presets = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let definition: PresetDefinition = serde_json::from_value(value)?;
            let rule = definition
                .url_regexp
                .filter(|pattern| !pattern.is_empty())
                .map(UrlRule::new);
            presets.push(Preset {
                name,
                rule,
                params: definition.params,
            });
        }
        Ok(Self { presets })
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|preset| preset.name.as_str())
    }
}

impl PresetStore for DeclaredPresets {
    fn by_name(&self, name: &str) -> Option<&RenderParams> {
        self.presets
            .iter()
            .find(|preset| preset.name == name)
            .map(|preset| &preset.params)
    }

    fn for_site(&self, url: &str) -> Option<&RenderParams> {
        self.presets
            .iter()
            .find(|preset| preset.rule.as_ref().is_some_and(|rule| rule.is_match(url)))
            .map(|preset| &preset.params)
    }
}
