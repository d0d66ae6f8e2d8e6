//! Convenience macros for plugin development.

/// Exports a manifest factory as the entry point of a dynamic plugin.
///
/// The factory must have the signature
/// `fn() -> AppResult<PluginManifest>`. The generated symbol is the one the
/// host's plugin loader resolves; a factory error is reported and surfaces
/// to the host as a null manifest (a load error with the plugin's name).
///
/// # Example
/// ```rust,ignore
/// use wirehub_plugin_sdk::prelude::*;
///
/// fn manifest() -> AppResult<PluginManifest> {
///     Ok(PluginManifest::builder().build())
/// }
///
/// wirehub_plugin_sdk::wirehub_plugin_entry!(manifest);
/// ```
#[macro_export]
macro_rules! wirehub_plugin_entry {
    ($factory:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn wirehub_plugin_entry()
        -> *mut $crate::prelude::PluginManifest {
            match $factory() {
                Ok(manifest) => Box::into_raw(Box::new(manifest)),
                Err(e) => {
                    eprintln!("wirehub plugin entry failed: {e}");
                    std::ptr::null_mut()
                }
            }
        }
    };
}
