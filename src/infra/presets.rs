//! Loads the declared preset catalogue from a JSON file.

use std::{fs, io::ErrorKind, path::Path, sync::Arc};

use tracing::{info, warn};

use crate::domain::presets::{DeclaredPresets, NoPresets, PresetStore};

use super::error::InfraError;

/// Read the preset file, if any. A configured file that does not exist leaves the
/// service running without presets.
pub fn load_presets(path: Option<&Path>) -> Result<Arc<dyn PresetStore>, InfraError> {
    let Some(path) = path else {
        return Ok(Arc::new(NoPresets));
    };

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(
                target = "webclip::infra::presets",
                path = %path.display(),
                "Preset file not found; continuing without presets"
            );
            return Ok(Arc::new(NoPresets));
        }
        Err(err) => return Err(InfraError::presets(path.display().to_string(), err.to_string())),
    };

    let presets = DeclaredPresets::from_json_str(&source)
        .map_err(|err| InfraError::presets(path.display().to_string(), err.to_string()))?;

    info!(
        target = "webclip::infra::presets",
        path = %path.display(),
        count = presets.len(),
        names = ?presets.names().collect::<Vec<_>>(),
        "Presets loaded"
    );
    Ok(Arc::new(presets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_configuration_means_no_presets() {
        let store = load_presets(None).expect("no presets");
        assert!(store.by_name("anything").is_none());
    }

    #[test]
    fn missing_file_is_tolerated() {
        let dir = TempDir::new().expect("temp dir");
        let store = load_presets(Some(&dir.path().join("presets.json"))).expect("tolerated");
        assert!(store.for_site("https://example.com/").is_none());
    }

    #[test]
    fn declared_presets_are_served() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("presets.json");
        fs::write(
            &path,
            r#"{"blog": {"url_regexp": "^https://blog\\.", "query": "main", "zoom": 1.2}}"#,
        )
        .expect("write presets");

        let store = load_presets(Some(&path)).expect("loaded");
        let preset = store.by_name("blog").expect("declared");
        assert_eq!(preset.query.as_deref(), Some("main"));
        assert_eq!(preset.zoom, Some(1.2));
        assert!(store.for_site("https://blog.example.com/post").is_some());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("presets.json");
        fs::write(&path, r#"{"blog": {"zoom": "big"}}"#).expect("write presets");

        let err = load_presets(Some(&path)).err().expect("invalid zoom");
        assert!(matches!(err, InfraError::Presets { .. }));
    }
}
