//! Filesystem plugin discovery.
//!
//! Walks one or more source locations and produces unloaded descriptors.
//! A file is a candidate iff its extension matches the configured source
//! extension, its name is not private-prefixed (`_`, except the designated
//! entry-point file name), and its name does not carry the `.example`
//! marker. A directory containing the entry-point file is itself a plugin;
//! other directories are recursed into when recursion is enabled.
//!
//! Derived names are dotted relative paths: `a/b/c.so` under a source root
//! becomes `a.b.c`, and the entry-point file in directory `a/b` names the
//! plugin `a.b`. Blacklist patterns are checked first; a non-empty
//! whitelist must then match (an empty whitelist admits everything not
//! blacklisted).

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};

use wirehub_core::config::plugins::PluginsConfig;

use crate::descriptor::PluginDescriptor;

/// Marker excluding sample files from discovery: `name.example.<ext>`.
const EXAMPLE_MARKER: &str = "example";

/// Prefix excluding private files from discovery.
const PRIVATE_PREFIX: char = '_';

/// Returns whether a plugin name should be ignored.
///
/// Blacklist wins over whitelist; an empty whitelist admits every name not
/// blacklisted. Matching is case-sensitive glob.
pub fn should_ignore(name: &str, whitelist: &[String], blacklist: &[String]) -> bool {
    if matches_any(name, blacklist) {
        return true;
    }
    if whitelist.is_empty() {
        return false;
    }
    !matches_any(name, whitelist)
}

fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| match Pattern::new(p) {
        Ok(pattern) => pattern.matches(name),
        Err(e) => {
            warn!(pattern = %p, error = %e, "Ignoring invalid filter pattern");
            false
        }
    })
}

/// Walks source locations and produces unloaded plugin descriptors.
#[derive(Debug, Clone)]
pub struct PluginLoader {
    sources: Vec<PathBuf>,
    recursive: bool,
    whitelist: Vec<String>,
    blacklist: Vec<String>,
    search_paths: Vec<PathBuf>,
    extension: String,
    entry_point: String,
}

impl PluginLoader {
    /// Creates a loader over the given source locations.
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self {
            sources,
            recursive: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            search_paths: Vec::new(),
            extension: std::env::consts::DLL_EXTENSION.to_string(),
            entry_point: format!("plugin.{}", std::env::consts::DLL_EXTENSION),
        }
    }

    /// Creates a loader from the plugin configuration section.
    pub fn from_config(config: &PluginsConfig) -> Self {
        Self {
            sources: config.sources.iter().map(PathBuf::from).collect(),
            recursive: config.recursive,
            whitelist: config.whitelist.clone(),
            blacklist: config.blacklist.clone(),
            search_paths: config.search_paths.iter().map(PathBuf::from).collect(),
            extension: config.extension.clone(),
            entry_point: config.entry_point.clone(),
        }
    }

    /// Sets whether directories are searched recursively.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets the whitelist patterns.
    pub fn whitelist(mut self, patterns: Vec<String>) -> Self {
        self.whitelist = patterns;
        self
    }

    /// Sets the blacklist patterns.
    pub fn blacklist(mut self, patterns: Vec<String>) -> Self {
        self.blacklist = patterns;
        self
    }

    /// Sets additional library search paths handed to each descriptor.
    pub fn search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Overrides the source extension (without the leading dot).
    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// Overrides the entry-point file name.
    pub fn entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = entry_point.to_string();
        self
    }

    /// Discovers plugins under every source location.
    ///
    /// Returns one unloaded descriptor per admitted candidate.
    pub fn discover(&self) -> Vec<PluginDescriptor> {
        let mut descriptors = Vec::new();

        for source in &self.sources {
            if source.is_dir() {
                self.walk_dir(source, source, &mut descriptors);
            } else if source.is_file() {
                let root = source.parent().unwrap_or(Path::new("")).to_path_buf();
                self.consider_file(source, &root, &mut descriptors);
            } else {
                warn!(
                    source = %source.display(),
                    "Skipping plugin source that is neither file nor directory"
                );
            }
        }

        descriptors
    }

    fn walk_dir(&self, dir: &Path, root: &Path, out: &mut Vec<PluginDescriptor>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read plugin directory");
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        for path in paths {
            if path.is_file() {
                self.consider_file(&path, root, out);
            } else if path.is_dir() {
                // Private-prefixed directories are skipped entirely.
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(PRIVATE_PREFIX))
                {
                    continue;
                }
                if path.join(&self.entry_point).is_file() {
                    // The directory is a plugin of its own.
                    self.admit(&path.join(&self.entry_point), &path, root, out);
                } else if self.recursive {
                    self.walk_dir(&path, root, out);
                }
            } else {
                warn!(
                    path = %path.display(),
                    "Skipping plugin candidate that is neither file nor directory"
                );
            }
        }
    }

    fn consider_file(&self, file: &Path, root: &Path, out: &mut Vec<PluginDescriptor>) {
        let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
            return;
        };

        if file.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return;
        }

        // Private-prefixed files are skipped, except the entry point.
        if file_name.starts_with(PRIVATE_PREFIX) && file_name != self.entry_point {
            return;
        }

        // Sample files (`name.example.<ext>`) are never plugins.
        if let Some(stem) = file.file_stem().and_then(|s| s.to_str())
            && stem
                .rsplit('.')
                .next()
                .is_some_and(|marker| marker == EXAMPLE_MARKER)
        {
            return;
        }

        if file_name == self.entry_point {
            // Entry-point file: the containing directory is the plugin.
            let Some(parent) = file.parent() else {
                return;
            };
            self.admit(file, parent, root, out);
        } else {
            self.admit(file, &file.with_extension(""), root, out);
        }
    }

    /// Derives the dotted name for `named_as` relative to `root` and, when
    /// admitted by the filters, pushes a descriptor for `file`.
    fn admit(&self, file: &Path, named_as: &Path, root: &Path, out: &mut Vec<PluginDescriptor>) {
        let relative = named_as.strip_prefix(root).unwrap_or(named_as);
        let name = dotted_name(relative);

        if name.is_empty() {
            warn!(file = %file.display(), "Skipping plugin with empty derived name");
            return;
        }

        if should_ignore(&name, &self.whitelist, &self.blacklist) {
            debug!(plugin = %name, "Plugin excluded by whitelist/blacklist");
            return;
        }

        debug!(plugin = %name, file = %file.display(), "Discovered plugin");
        out.push(PluginDescriptor::discovered(
            &name,
            file.to_path_buf(),
            self.search_paths.clone(),
        ));
    }
}

/// Joins path components with dots: `a/b/c` becomes `a.b.c`.
fn dotted_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join(".")
        .trim_matches('.')
        .to_string()
}
