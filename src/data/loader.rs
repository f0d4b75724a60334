use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;

use super::DefinitionsFile;

const DEFINITIONS_RELATIVE_PATH: &str = "assets/economy.json";

/// Location of the economy bundled with the crate.
pub fn definitions_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFINITIONS_RELATIVE_PATH)
}

pub fn load_definitions() -> Result<DefinitionsFile> {
    load_definitions_from_path(definitions_path())
}

/// Reads a definitions file, rejecting blank or repeated resource names.
pub fn load_definitions_from_path(path: impl AsRef<Path>) -> Result<DefinitionsFile> {
    let path = path.as_ref();
    let definitions: DefinitionsFile = read_json(path, "resource definitions")?;

    let mut seen = BTreeSet::new();
    for resource in &definitions.resources {
        if resource.name.trim().is_empty() {
            bail!("{} defines a resource without a name", path.display());
        }
        if !seen.insert(resource.name.as_str()) {
            bail!("{} defines `{}` more than once", path.display(), resource.name);
        }
    }
    Ok(definitions)
}

fn read_json<T>(path: &Path, label: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {label} from {}", path.display()))?;

    serde_json::from_str(&raw)
        .with_context(|| format!("{label} in {} are not valid JSON", path.display()))
}
