//! Module inventory: enabled plugins and the active template, keyed as
//! `plugin.<name>` / `template.<name>`, valued by the `date` from their info file.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Read the `date` key from a whitespace-separated `key value` info file.
pub fn read_info_date(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    content.lines().find_map(|line| {
        let line = line.trim();
        if line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once(char::is_whitespace)?;
        (key == "date").then(|| value.trim().to_string())
    })
}

#[derive(Debug, Clone, Default)]
pub struct ModuleInventory {
    modules: BTreeMap<String, String>,
}

impl ModuleInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record each named plugin under `plugin_dir/<name>/plugin.info.txt`.
    pub fn with_plugins<'a>(
        mut self,
        plugin_dir: &Path,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        for name in names {
            let info = plugin_dir.join(name).join("plugin.info.txt");
            self.record(format!("plugin.{name}"), &info, "plugin.info.txt unreadable");
        }
        self
    }

    /// Record the active template from `template_dir/template.info.txt`.
    pub fn with_template(mut self, name: &str, template_dir: &Path) -> Self {
        let info = template_dir.join("template.info.txt");
        self.record(
            format!("template.{name}"),
            &info,
            "template.info.txt unreadable",
        );
        self
    }

    /// Names of all subdirectories of `plugin_dir`, sorted
    pub fn discover_plugins(plugin_dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(plugin_dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path: PathBuf| path.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    pub fn into_modules(self) -> BTreeMap<String, String> {
        self.modules
    }

    fn record(&mut self, key: String, info: &Path, unreadable: &str) {
        let value = read_info_date(info).unwrap_or_else(|| unreadable.to_string());
        self.modules.insert(key, value);
    }
}
