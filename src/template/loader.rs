//! Template loading
//!
//! `TemplateLoader` is the contract the supervisor consumes; the JSON file
//! implementation content-hashes the raw file and goes through the
//! process-wide cache so identical templates are parsed once.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::cache::TemplateCache;
use super::hash::content_hash;
use super::types::StationTemplate;
use crate::shared::SimulatorError;

/// A loaded template plus the content hash identifying it.
#[derive(Clone)]
pub struct LoadedTemplate {
    pub template: Arc<StationTemplate>,
    pub content_hash: String,
}

pub trait TemplateLoader: Send + Sync {
    fn load_template(&self, path: &Path) -> Result<LoadedTemplate, SimulatorError>;
}

pub struct JsonTemplateLoader;

impl TemplateLoader for JsonTemplateLoader {
    fn load_template(&self, path: &Path) -> Result<LoadedTemplate, SimulatorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SimulatorError::Template(format!("cannot read {}: {e}", path.display()))
        })?;
        let hash = content_hash(&content);

        if let Some(template) = TemplateCache::global().get_template(&hash) {
            debug!(path = %path.display(), hash = hash.as_str(), "Template cache hit");
            return Ok(LoadedTemplate {
                template,
                content_hash: hash,
            });
        }

        let template: StationTemplate = serde_json::from_str(&content).map_err(|e| {
            SimulatorError::Template(format!("invalid template {}: {e}", path.display()))
        })?;

        if template.supervision_urls.is_empty() {
            return Err(SimulatorError::Template(format!(
                "template {} has no supervision URL",
                path.display()
            )));
        }
        if template.connector_count() == 0 {
            return Err(SimulatorError::Template(format!(
                "template {} has no connectors",
                path.display()
            )));
        }

        let template = Arc::new(template);
        TemplateCache::global().put_template(hash.clone(), template.clone());
        debug!(path = %path.display(), hash = hash.as_str(), "Template loaded");

        Ok(LoadedTemplate {
            template,
            content_hash: hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_template(dir: &tempfile::TempDir, name: &str, json: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_caches_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "baseName": "CS-LOAD",
            "supervisionUrls": ["ws://localhost:8180/ocpp"],
            "chargePointModel": "M",
            "chargePointVendor": "V"
        }"#;
        let path = write_template(&dir, "a.json", json);
        let copy = write_template(&dir, "b.json", json);

        let loader = JsonTemplateLoader;
        let first = loader.load_template(&path).unwrap();
        let second = loader.load_template(&copy).unwrap();

        assert_eq!(first.content_hash, second.content_hash);
        assert!(Arc::ptr_eq(&first.template, &second.template));
    }

    #[test]
    fn rejects_template_without_supervision_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(
            &dir,
            "bad.json",
            r#"{
                "baseName": "CS-BAD",
                "supervisionUrls": [],
                "chargePointModel": "M",
                "chargePointVendor": "V"
            }"#,
        );
        assert!(JsonTemplateLoader.load_template(&path).is_err());
    }

    #[test]
    fn rejects_unreadable_path() {
        let missing = std::path::Path::new("/definitely/not/here.json");
        assert!(JsonTemplateLoader.load_template(missing).is_err());
    }
}
