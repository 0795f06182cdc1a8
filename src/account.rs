//! Account name helpers.
//!
//! Accounts are colon-separated hierarchies such as `Assets:Bank:Checking`.
//! Filed documents live under a directory tree that mirrors this hierarchy,
//! so the helpers here convert between account names and relative paths.

use std::path::{Component, Path, PathBuf};

/// Separator between the components of an account name.
pub const SEP: char = ':';

/// Returns true if `account` is a well-formed account name.
///
/// Each component must be non-empty, start with an uppercase letter or a
/// digit, and contain only letters, digits and dashes. This keeps the
/// account safe to use as a relative path (no `..`, no embedded separators).
///
/// # Examples
///
/// ```
/// use docfile::account;
///
/// assert!(account::is_valid("Assets:Bank:Checking"));
/// assert!(!account::is_valid("Assets::Checking"));
/// assert!(!account::is_valid("assets:bank"));
/// ```
pub fn is_valid(account: &str) -> bool {
    !account.is_empty()
        && account.split(SEP).all(|component| {
            let mut chars = component.chars();
            match chars.next() {
                Some(first) if first.is_uppercase() || first.is_ascii_digit() => {
                    chars.all(|c| c.is_alphanumeric() || c == '-')
                }
                _ => false,
            }
        })
}

/// Converts an account name into a relative path, one directory per component.
pub fn to_path(account: &str) -> PathBuf {
    account.split(SEP).collect()
}

/// Rebuilds an account name from a relative directory path.
///
/// Returns `None` if the path contains anything other than plain components.
pub fn from_path(path: &Path) -> Option<String> {
    let components = path
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if components.is_empty() {
        return None;
    }
    Some(components.join(&SEP.to_string()))
}
