//! Module contract validation
//!
//! Checks an imported module file against the module contract: a `run`
//! entry point the catalog knows, a unique non-empty `name`, and, when
//! present, `dependencies` as an array of strings and `priority` as an
//! integer.

use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::module::loader::catalog::{ModuleCatalog, ModuleFactory};
use crate::module::registry::dependencies::DependencyNode;
use crate::module::registry::manifest::{
    ModuleManifest, EXPORT_DEPENDENCIES, EXPORT_DESCRIPTION, EXPORT_PRIORITY,
    EXPORT_RUN,
};
use crate::module::traits::ModuleError;

/// A module file that passed the contract
#[derive(Clone)]
pub struct ValidatedModule {
    pub name: String,
    pub dependencies: Vec<String>,
    pub priority: i64,
    pub entry: String,
    pub factory: ModuleFactory,
    pub file_path: PathBuf,
    pub description: Option<String>,
}

impl std::fmt::Debug for ValidatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedModule")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .field("entry", &self.entry)
            .field("file_path", &self.file_path)
            .finish()
    }
}

impl DependencyNode for ValidatedModule {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn node_priority(&self) -> i64 {
        self.priority
    }
}

/// Contract validator
pub struct ContractValidator<'a> {
    catalog: &'a ModuleCatalog,
}

impl<'a> ContractValidator<'a> {
    pub fn new(catalog: &'a ModuleCatalog) -> Self {
        Self { catalog }
    }

    /// Validate a manifest against the contract
    ///
    /// `taken` holds the names already accepted in this pass.
    pub fn validate(
        &self,
        manifest: &ModuleManifest,
        taken: &HashSet<String>,
    ) -> Result<ValidatedModule, ModuleError> {
        let path = manifest.path.clone();

        let entry = manifest
            .export(EXPORT_RUN)
            .and_then(toml::Value::as_str)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ModuleError::MissingEntryPoint { path: path.clone() })?;
        let factory = self.catalog.factory(entry).ok_or_else(|| {
            warn!("{:?}: entry point '{}' is not in the catalog", path, entry);
            ModuleError::MissingEntryPoint { path: path.clone() }
        })?;

        let name = manifest
            .declared_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ModuleError::MissingName { path: path.clone() })?;
        if taken.contains(name) {
            return Err(ModuleError::DuplicateName {
                name: name.to_string(),
                path,
            });
        }
        if !is_valid_name(name) {
            warn!(
                "Module name '{}' in {:?} should be alphanumeric with dashes/underscores",
                name, path
            );
        }

        let dependencies = self.dependencies(manifest, name)?;

        let priority = match manifest.export(EXPORT_PRIORITY) {
            None => 0,
            Some(value) => value
                .as_integer()
                .ok_or_else(|| ModuleError::MalformedPriority { path: path.clone() })?,
        };

        let description = manifest
            .export(EXPORT_DESCRIPTION)
            .and_then(toml::Value::as_str)
            .map(str::to_string);

        debug!("Contract satisfied by module {} ({:?})", name, path);
        Ok(ValidatedModule {
            name: name.to_string(),
            dependencies,
            priority,
            entry: entry.to_string(),
            factory,
            file_path: path,
            description,
        })
    }

    fn dependencies(&self, manifest: &ModuleManifest, name: &str) -> Result<Vec<String>, ModuleError> {
        let Some(value) = manifest.export(EXPORT_DEPENDENCIES) else {
            return Ok(Vec::new());
        };
        let malformed = |reason: String| ModuleError::MalformedDependencies {
            path: manifest.path.clone(),
            reason,
        };

        let items = value
            .as_array()
            .ok_or_else(|| malformed(format!("found {}", value.type_str())))?;

        let mut dependencies: Vec<String> = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let dep = item
                .as_str()
                .ok_or_else(|| malformed(format!("element {} is {}", i, item.type_str())))?
                .trim();
            if dep.is_empty() {
                return Err(malformed(format!("element {} is empty", i)));
            }
            if dependencies.iter().any(|existing| existing == dep) {
                warn!("Module {} lists dependency {} more than once", name, dep);
                continue;
            }
            dependencies.push(dep.to_string());
        }
        Ok(dependencies)
    }
}

/// Module name format: alphanumeric start, then alphanumerics, `-` or `_`
#[inline]
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    if !name.chars().next().map_or(false, |c| c.is_alphanumeric()) {
        return false;
    }
    name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        catalog.register_fn("noop", |_ctx| async { Ok(()) });
        catalog
    }

    fn manifest(source: &str) -> ModuleManifest {
        ModuleManifest::from_exports("/modules/test.toml", source.parse().unwrap())
    }

    fn validate(source: &str) -> Result<ValidatedModule, ModuleError> {
        let catalog = catalog();
        ContractValidator::new(&catalog).validate(&manifest(source), &HashSet::new())
    }

    #[test]
    fn test_accepts_full_contract() {
        let module = validate(
            "run = \"noop\"\nname = \"chat\"\ndependencies = [\"logger\", \"logger\"]\npriority = -2\ndescription = \"chat rooms\"",
        )
        .unwrap();
        assert_eq!(module.name, "chat");
        assert_eq!(module.dependencies, vec!["logger"]);
        assert_eq!(module.priority, -2);
        assert_eq!(module.description.as_deref(), Some("chat rooms"));
    }

    #[test]
    fn test_defaults() {
        let module = validate("run = \"noop\"\nname = \"plain\"").unwrap();
        assert!(module.dependencies.is_empty());
        assert_eq!(module.priority, 0);
    }

    #[test]
    fn test_missing_or_unknown_entry_point() {
        assert!(matches!(
            validate("name = \"x\""),
            Err(ModuleError::MissingEntryPoint { .. })
        ));
        assert!(matches!(
            validate("run = 3\nname = \"x\""),
            Err(ModuleError::MissingEntryPoint { .. })
        ));
        assert!(matches!(
            validate("run = \"ghost\"\nname = \"x\""),
            Err(ModuleError::MissingEntryPoint { .. })
        ));
    }

    #[test]
    fn test_missing_name() {
        assert!(matches!(validate("run = \"noop\""), Err(ModuleError::MissingName { .. })));
        assert!(matches!(
            validate("run = \"noop\"\nname = \"  \""),
            Err(ModuleError::MissingName { .. })
        ));
        assert!(matches!(
            validate("run = \"noop\"\nname = 7"),
            Err(ModuleError::MissingName { .. })
        ));
    }

    #[test]
    fn test_duplicate_name() {
        let catalog = catalog();
        let taken: HashSet<String> = ["chat".to_string()].into_iter().collect();
        let result = ContractValidator::new(&catalog)
            .validate(&manifest("run = \"noop\"\nname = \"chat\""), &taken);
        match result {
            Err(ModuleError::DuplicateName { name, .. }) => assert_eq!(name, "chat"),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_dependencies() {
        for source in [
            "run = \"noop\"\nname = \"x\"\ndependencies = \"logger\"",
            "run = \"noop\"\nname = \"x\"\ndependencies = [\"logger\", 4]",
            "run = \"noop\"\nname = \"x\"\ndependencies = [\"\"]",
        ] {
            assert!(
                matches!(validate(source), Err(ModuleError::MalformedDependencies { .. })),
                "accepted {}",
                source
            );
        }
    }

    #[test]
    fn test_malformed_priority() {
        assert!(matches!(
            validate("run = \"noop\"\nname = \"x\"\npriority = \"high\""),
            Err(ModuleError::MalformedPriority { .. })
        ));
    }

    #[test]
    fn test_name_format() {
        assert!(is_valid_name("ws-reply"));
        assert!(is_valid_name("rate_limiter2"));
        assert!(!is_valid_name("-leading"));
        assert!(!is_valid_name("has space"));
    }
}
