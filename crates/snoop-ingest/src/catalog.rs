//! Reference data for module classification
//!
//! Both values are loaded once per run and handed to the extractor by value; nothing here is
//! process-wide state.

use serde_json::Value;
use snoop_common::{Result, SnoopError};
use std::collections::HashSet;
use std::path::Path;

/// Category assigned to modules that appear in no category list.
pub const NO_CATEGORY: &str = "none";

/// Module names that are always marked Ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    modules: HashSet<String>,
}

impl IgnoreSet {
    /// Load from a JSON array of module names.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SnoopError::file_read(path, e))?;
        Self::from_json_str(&raw).map_err(|e| SnoopError::parse(path, e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let modules: Vec<String> = serde_json::from_str(raw)?;
        Ok(modules.into_iter().collect())
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Category name to module names, searched in the order the categories were defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    categories: Vec<(String, HashSet<String>)>,
}

impl CategoryMap {
    /// Load from a JSON object of category name to array of module names.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SnoopError::file_read(path, e))?;
        Self::from_json_str(&raw).map_err(|e| SnoopError::parse(path, e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let object: serde_json::Map<String, Value> = serde_json::from_str(raw)?;

        let mut categories = Vec::with_capacity(object.len());
        for (name, modules) in object {
            let modules: Vec<String> = serde_json::from_value(modules).map_err(|e| {
                SnoopError::config(format!("category '{name}' must be a list of module names: {e}"))
            })?;
            categories.push((name, modules.into_iter().collect()));
        }

        Ok(Self { categories })
    }

    /// First category whose module list names `module`, or [`NO_CATEGORY`].
    pub fn category_of(&self, module: &str) -> &str {
        self.categories
            .iter()
            .find(|(_, modules)| modules.contains(module))
            .map(|(name, _)| name.as_str())
            .unwrap_or(NO_CATEGORY)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<N, M, S> FromIterator<(N, M)> for CategoryMap
where
    N: Into<String>,
    M: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, M)>>(iter: I) -> Self {
        Self {
            categories: iter
                .into_iter()
                .map(|(name, modules)| (name.into(), modules.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ignore_set_from_json() {
        let ignore = IgnoreSet::from_json_str(r#"["os", "sys", "re"]"#).unwrap();
        assert_eq!(ignore.len(), 3);
        assert!(ignore.contains("os"));
        assert!(!ignore.contains("numpy"));
    }

    #[test]
    fn test_category_lookup_follows_file_order() {
        // "h5py" is listed under both; the first category in the file wins
        let map = CategoryMap::from_json_str(
            r#"{"IO": ["h5py", "pandas"], "AI": ["tensorflow", "h5py"], "Sci": ["numpy"]}"#,
        )
        .unwrap();

        assert_eq!(map.names().collect::<Vec<_>>(), vec!["IO", "AI", "Sci"]);
        assert_eq!(map.category_of("h5py"), "IO");
        assert_eq!(map.category_of("tensorflow"), "AI");
        assert_eq!(map.category_of("requests"), NO_CATEGORY);
    }

    #[test]
    fn test_category_map_rejects_non_list_values() {
        let err = CategoryMap::from_json_str(r#"{"AI": "tensorflow"}"#).unwrap_err();
        assert!(err.to_string().contains("category 'AI'"));
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = IgnoreSet::from_file(file.path()).unwrap_err();
        assert_eq!(err.unit().unwrap(), file.path().display().to_string());

        let missing = CategoryMap::from_file("/nonexistent/categories.json").unwrap_err();
        assert!(matches!(missing, SnoopError::FileRead { .. }));
    }
}
