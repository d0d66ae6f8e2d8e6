//! Filesystem discovery: derived names and filter precedence.

use std::fs;
use std::path::Path;

use wirehub_plugin::PluginLoader;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
}

fn discovered_names(loader: &PluginLoader) -> Vec<String> {
    let mut names: Vec<String> = loader
        .discover()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn names_derive_from_paths_and_entry_points() {
    let dir = tempfile::TempDir::new().unwrap();
    let plugins = dir.path().join("plugins");

    touch(&plugins.join("foo/bar.so"));
    touch(&plugins.join("foo/plugin.so"));

    // A directory containing the entry point is one plugin; its other
    // files are not scanned separately.
    let loader = PluginLoader::new(vec![plugins.clone()])
        .extension("so")
        .entry_point("plugin.so");
    assert_eq!(discovered_names(&loader), vec!["foo"]);

    // Without the entry point the directory is recursed into.
    fs::remove_file(plugins.join("foo/plugin.so")).unwrap();
    assert_eq!(discovered_names(&loader), vec!["foo.bar"]);
}

#[test]
fn filters_compose_blacklist_first() {
    let dir = tempfile::TempDir::new().unwrap();
    let plugins = dir.path().join("plugins");
    touch(&plugins.join("core/mail.so"));
    touch(&plugins.join("core/spam.so"));
    touch(&plugins.join("extras/ads.so"));

    let loader = PluginLoader::new(vec![plugins])
        .extension("so")
        .entry_point("plugin.so")
        .whitelist(vec!["core.*".to_string()])
        .blacklist(vec!["*.spam".to_string()]);

    // `core.spam` matches both lists; the blacklist wins.
    assert_eq!(discovered_names(&loader), vec!["core.mail"]);
}

#[test]
fn discovered_descriptors_start_unloaded() {
    let dir = tempfile::TempDir::new().unwrap();
    touch(&dir.path().join("mail.so"));

    let loader = PluginLoader::new(vec![dir.path().to_path_buf()])
        .extension("so")
        .entry_point("plugin.so");

    let descriptors = loader.discover();
    assert_eq!(descriptors.len(), 1);
    assert!(!descriptors[0].loaded());
}
