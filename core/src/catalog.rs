//! Ability catalog: the valid-id set for wire validation.
//!
//! Entries come from two places:
//! - **Builtin**: the static interrupt table shipped in `kickwatch-types`
//! - **Custom**: user TOML override files (editable, optional)
//!
//! Custom entries with the same spell id replace builtins, so a game patch
//! that changes a cooldown can be absorbed without shipping a new build.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use kickwatch_types::abilities::INTERRUPT_ABILITIES;

/// One catalog entry, builtin or user-supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityEntry {
    pub name: String,
    pub class: String,
    pub base_cooldown_secs: f32,
}

/// The set of ability ids this build will accept on the wire.
#[derive(Debug, Clone, Default)]
pub struct AbilityCatalog {
    entries: HashMap<u32, AbilityEntry>,
}

impl AbilityCatalog {
    /// Catalog holding only the builtin interrupt table.
    pub fn builtin() -> Self {
        let entries = INTERRUPT_ABILITIES
            .entries()
            .map(|(id, info)| {
                (
                    *id,
                    AbilityEntry {
                        name: info.name.to_string(),
                        class: info.class.to_string(),
                        base_cooldown_secs: info.base_cooldown_secs,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Builtin table plus any override files in the default custom directory.
    pub fn load() -> Self {
        let mut catalog = Self::builtin();
        if let Some(dir) = default_custom_dir()
            && dir.exists()
        {
            catalog.merge_overrides_dir(&dir);
        }
        catalog
    }

    /// Whether `id` may appear in ability-used and capability messages.
    pub fn is_valid(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entry lookup for display and cooldown data.
    pub fn get(&self, id: u32) -> Option<&AbilityEntry> {
        self.entries.get(&id)
    }

    /// Base cooldown for an ability, if known.
    pub fn base_cooldown_secs(&self, id: u32) -> Option<f32> {
        self.entries.get(&id).map(|e| e.base_cooldown_secs)
    }

    /// Number of entries (builtin + overrides).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every `*.toml` override file found in `dir`.
    ///
    /// A file that fails to load is logged and skipped; the rest still apply.
    pub fn merge_overrides_dir(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot read ability override dir");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                match load_override_file(&path) {
                    Ok(config) => {
                        let replaced = self.merge(config);
                        if replaced > 0 {
                            tracing::debug!(
                                file = %path.display(),
                                replaced,
                                "ability overrides replaced builtin entries"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "skipping ability override file");
                    }
                }
            }
        }
    }

    /// Apply one parsed override config. Returns how many existing entries
    /// were replaced (as opposed to added).
    pub fn merge(&mut self, config: CatalogConfig) -> usize {
        let mut replaced = 0;
        for ability in config.ability {
            let entry = AbilityEntry {
                name: ability.name,
                class: ability.class,
                base_cooldown_secs: ability.base_cooldown_secs,
            };
            if self.entries.insert(ability.id, entry).is_some() {
                replaced += 1;
            }
        }
        replaced
    }
}

/// Schema of a user override file: a list of `[[ability]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub ability: Vec<AbilityOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbilityOverride {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub class: String,
    pub base_cooldown_secs: f32,
}

/// Load a single TOML override file.
pub fn load_override_file(path: &Path) -> Result<CatalogConfig, CatalogError> {
    let contents = fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&contents).map_err(|e| CatalogError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default directory for user ability override files.
pub fn default_custom_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("kickwatch").join("abilities"))
}

/// Errors from loading override files.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_validates_known_ids() {
        let catalog = AbilityCatalog::builtin();
        assert!(catalog.is_valid(2139));
        assert!(catalog.is_valid(147362));
        assert!(!catalog.is_valid(555));
        assert_eq!(catalog.get(2139).unwrap().name, "Counterspell");
    }

    #[test]
    fn test_override_replaces_builtin() {
        let toml = r#"
[[ability]]
id = 2139
name = "Counterspell"
class = "Mage"
base_cooldown_secs = 25.0
"#;
        let config: CatalogConfig = toml::from_str(toml).unwrap();
        let mut catalog = AbilityCatalog::builtin();
        let before = catalog.len();
        let replaced = catalog.merge(config);
        assert_eq!(replaced, 1);
        assert_eq!(catalog.len(), before);
        assert_eq!(catalog.base_cooldown_secs(2139), Some(25.0));
    }

    #[test]
    fn test_override_adds_new_entry() {
        let toml = r#"
[[ability]]
id = 351339
name = "Quell (empowered)"
base_cooldown_secs = 20.0
"#;
        let config: CatalogConfig = toml::from_str(toml).unwrap();
        let mut catalog = AbilityCatalog::builtin();
        assert_eq!(catalog.merge(config), 0);
        assert!(catalog.is_valid(351339));
        assert_eq!(catalog.get(351339).unwrap().class, "");
    }

    #[test]
    fn test_merge_overrides_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("good.toml"),
            "[[ability]]\nid = 42\nname = \"Test Kick\"\nbase_cooldown_secs = 10.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("bad.toml"), "not [ valid toml").unwrap();
        fs::write(dir.path().join("ignored.txt"), "nope").unwrap();

        let mut catalog = AbilityCatalog::builtin();
        catalog.merge_overrides_dir(dir.path());
        assert!(catalog.is_valid(42));
    }
}
