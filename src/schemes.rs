//! Scheme Registry
//!
//! Maps the short scheme names accepted in legacy backend URIs to the
//! canonical paths of the bundled backend modules. Any other scheme is
//! treated as a backend path already and passes through unchanged.

/// Path prefix under which the bundled backends are registered
pub const BACKENDS_PREFIX: &str = "cache_resolver.backends";

/// Short scheme name -> bundled backend module name
const SCHEMES: &[(&str, &str)] = &[
    ("memcached", "memcached"),
    ("locmem", "locmem"),
    ("file", "filebased"),
    ("db", "db"),
    ("dummy", "dummy"),
];

/// Canonical path of a bundled backend module, e.g. `cache_resolver.backends.locmem`
#[must_use]
pub fn backend_path(module: &str) -> String {
    format!("{BACKENDS_PREFIX}.{module}")
}

/// Resolve a scheme to a backend path
///
/// ```
/// use cache_resolver::schemes::canonicalize;
///
/// assert_eq!(canonicalize("file"), "cache_resolver.backends.filebased");
/// assert_eq!(canonicalize("my_app.cache.Custom"), "my_app.cache.Custom");
/// ```
#[must_use]
pub fn canonicalize(scheme: &str) -> String {
    SCHEMES
        .iter()
        .find(|(short, _)| *short == scheme)
        .map_or_else(|| scheme.to_string(), |(_, module)| backend_path(module))
}

/// Whether `scheme` is one of the registered short names
#[must_use]
pub fn is_registered(scheme: &str) -> bool {
    SCHEMES.iter().any(|(short, _)| *short == scheme)
}
