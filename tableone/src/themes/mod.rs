//! Theme Registry - Store and reuse table themes
//!
//! Saves named [`Theme`]s to disk as JSON so the same document-wide defaults
//! can be applied across requests. A theme is always passed explicitly to
//! the pipeline; the registry only persists them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Theme;
use crate::error::{ThemeError, ThemeResult};
use crate::validation::validate_theme;

/// Directory where themes are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".tableone/themes";

/// Environment variable overriding the registry directory
pub const THEME_DIR_ENV: &str = "TABLEONE_THEME_DIR";

/// A stored theme with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTheme {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub theme: Theme,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this theme was applied
    pub last_used: Option<String>,
    /// Number of times applied
    pub use_count: u32,
}

/// Registry for managing themes
pub struct ThemeRegistry {
    /// Directory where themes are stored
    registry_dir: PathBuf,
    /// Loaded themes (id -> theme)
    themes: HashMap<String, StoredTheme>,
}

impl ThemeRegistry {
    /// Open the registry at `$TABLEONE_THEME_DIR`, or `.tableone/themes`
    pub fn new() -> Self {
        match std::env::var(THEME_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::with_dir(dir),
            _ => Self::with_dir(DEFAULT_REGISTRY_DIR),
        }
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: PathBuf::from(dir.as_ref()),
            themes: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all themes from the registry directory, skipping unreadable files
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(theme) = serde_json::from_str::<StoredTheme>(&content) {
                        self.themes.insert(theme.id.clone(), theme);
                    }
                }
            }
        }
    }

    /// All stored themes, by name
    pub fn list(&self) -> Vec<&StoredTheme> {
        let mut themes: Vec<&StoredTheme> = self.themes.values().collect();
        themes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        themes
    }

    pub fn get(&self, id: &str) -> Option<&StoredTheme> {
        self.themes.get(id)
    }

    /// Theme by ID, as an error when absent
    pub fn require(&self, id: &str) -> ThemeResult<&StoredTheme> {
        self.get(id).ok_or_else(|| ThemeError::NotFound(id.to_string()))
    }

    /// Save a new theme to the registry
    pub fn save(&mut self, theme: Theme, name: &str) -> ThemeResult<String> {
        theme
            .check()
            .map_err(|e| ThemeError::InvalidTheme(e.to_string()))?;
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(name);
        let stored = StoredTheme {
            id: id.clone(),
            name: name.to_string(),
            theme,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.themes.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a theme from a JSON file
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> ThemeResult<String> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        validate_theme(&value).map_err(|errors| ThemeError::InvalidTheme(errors.join("; ")))?;
        let theme: Theme = serde_json::from_value(value)?;

        let theme_name = name.unwrap_or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
        });
        self.save(theme, theme_name)
    }

    /// Record one use of a theme and return it
    pub fn touch(&mut self, id: &str) -> ThemeResult<Theme> {
        let stored = self
            .themes
            .get_mut(id)
            .ok_or_else(|| ThemeError::NotFound(id.to_string()))?;
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let stored = stored.clone();
        self.write(&stored)?;
        Ok(stored.theme)
    }

    /// Delete a theme from the registry
    pub fn delete(&mut self, id: &str) -> ThemeResult<()> {
        if self.themes.remove(id).is_none() {
            return Err(ThemeError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredTheme) -> ThemeResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }

    /// Generate a unique ID from a name
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut id = format!("{}-{}", slug, timestamp);
        let mut n = 1;
        while self.themes.contains_key(&id) {
            n += 1;
            id = format!("{}-{}-{}", slug, timestamp, n);
        }
        id
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PercentMode;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let theme = Theme {
            digits: 2,
            percent: PercentMode::Row,
            ..Theme::default()
        };

        let id = {
            let mut registry = ThemeRegistry::with_dir(dir.path());
            registry.save(theme.clone(), "Journal Style!").unwrap()
        };
        assert!(id.starts_with("journal-style-"));

        let registry = ThemeRegistry::with_dir(dir.path());
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get(&id).unwrap().theme, theme);
    }

    #[test]
    fn test_ids_unique() {
        let dir = tempdir().unwrap();
        let mut registry = ThemeRegistry::with_dir(dir.path());
        let a = registry.save(Theme::default(), "house").unwrap();
        let b = registry.save(Theme::default(), "house").unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_import_validates() {
        let dir = tempdir().unwrap();
        let mut registry = ThemeRegistry::with_dir(dir.path().join("themes"));

        let good = dir.path().join("compact.json");
        fs::write(&good, r#"{ "digits": 0, "header_n": false }"#).unwrap();
        let id = registry.import(&good, None).unwrap();
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.name, "compact");
        assert_eq!(stored.theme.digits, 0);
        assert!(!stored.theme.header_n);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{ "digits": "many" }"#).unwrap();
        assert!(matches!(
            registry.import(&bad, Some("bad")),
            Err(ThemeError::InvalidTheme(_))
        ));
    }

    #[test]
    fn test_touch_and_delete() {
        let dir = tempdir().unwrap();
        let mut registry = ThemeRegistry::with_dir(dir.path());
        let id = registry.save(Theme::default(), "plain").unwrap();

        registry.touch(&id).unwrap();
        registry.touch(&id).unwrap();
        let reloaded = ThemeRegistry::with_dir(dir.path());
        let stored = reloaded.get(&id).unwrap();
        assert_eq!(stored.use_count, 2);
        assert!(stored.last_used.is_some());

        registry.delete(&id).unwrap();
        assert!(registry.get(&id).is_none());
        assert!(matches!(registry.delete(&id), Err(ThemeError::NotFound(_))));
        assert!(matches!(registry.touch("nope"), Err(ThemeError::NotFound(_))));
    }
}
