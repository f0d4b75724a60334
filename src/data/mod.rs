mod formula;
mod loader;

use serde::{Deserialize, Serialize};

use crate::core::{EconomySettings, Registry, ResourceDef};

pub use formula::{Formula, FormulaCompiler, FormulaValue};
pub(crate) use formula::compile_or_fail;
pub use loader::{definitions_path, load_definitions, load_definitions_from_path};

/// An economy described as data: global settings plus resource definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionsFile {
    pub settings: EconomySettings,
    pub resources: Vec<ResourceDef>,
}

impl DefinitionsFile {
    /// Replaces the registry's settings and upserts every definition.
    pub fn install(self, registry: &mut Registry) {
        registry.settings = self.settings;
        registry.load_all(self.resources);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal_macros::dec;

    use super::{load_definitions, load_definitions_from_path};
    use crate::core::Registry;

    #[test]
    fn bundled_definitions_have_entries() {
        let definitions = load_definitions().expect("bundled definitions should load");

        assert!(
            !definitions.resources.is_empty(),
            "economy.json should include at least one resource"
        );
        assert_eq!(definitions.settings.sell_ratio, dec!(0.5));
    }

    #[test]
    fn installed_definitions_populate_the_registry() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"resources": [{{"name": "gold", "count": 5}}, {{"name": "mine", "max_count": "3", "locked": true}}]}}"#
        )
        .expect("write definitions");

        let definitions = load_definitions_from_path(file.path()).expect("definitions should load");
        let mut registry = Registry::default();
        definitions.install(&mut registry);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.by_name("gold").map(|gold| gold.count()), Some(dec!(5)));
        let mine = registry.by_name("mine").expect("mine registered");
        assert!(mine.locked);
        assert_eq!(mine.max_count, Some(dec!(3)));
        assert_eq!(registry.settings.sell_ratio, dec!(1));
    }

    #[test]
    fn malformed_files_report_their_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{ not json").expect("write definitions");

        let error = load_definitions_from_path(file.path()).expect_err("parse should fail");
        assert!(error.to_string().contains("resource definitions"));
    }

    #[test]
    fn repeated_names_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"resources": [{{"name": "gold"}}, {{"name": "gold"}}]}}"#)
            .expect("write definitions");

        let error = load_definitions_from_path(file.path()).expect_err("duplicate should fail");
        assert!(error.to_string().contains("`gold` more than once"));
    }
}
