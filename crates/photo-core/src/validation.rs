//! Validation Helpers
//!
//! Shared by the purchase recorder (when accepting cart items) and the
//! download service (before touching the filesystem).

use std::path::{Component, Path};

/// Most copies a single line item may carry; larger cart lines are dropped
pub const MAX_QUANTITY_PER_ITEM: u32 = 100;

/// Whether an asset path may be joined onto the asset root.
///
/// Only non-empty relative paths made of normal components are accepted.
pub fn is_safe_asset_path(asset_path: &str) -> bool {
    let trimmed = asset_path.trim();
    if trimmed.is_empty() || trimmed.contains('\0') {
        return false;
    }

    Path::new(trimmed)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// Final path component of an asset path, used when a cart item has no file name
pub fn default_file_name(asset_path: &str) -> Option<String> {
    Path::new(asset_path.trim())
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
}

/// Name of the `n`th copy inside a bundle: `<basename>_copy_<n>.<ext>`
pub fn copy_file_name(file_name: &str, n: u32) -> String {
    let (stem, extension) = split_extension(file_name);
    match extension {
        Some(ext) => format!("{stem}_copy_{n}.{ext}"),
        None => format!("{stem}_copy_{n}"),
    }
}

/// Name of the bundle archive for a file: `<basename>.zip`
pub fn bundle_file_name(file_name: &str) -> String {
    let (stem, _) = split_extension(file_name);
    format!("{stem}.zip")
}

/// `Content-Disposition` value that forces a download
///
/// Quotes, backslashes and control characters would break the quoted-string,
/// so they are replaced with `_`.
pub fn attachment_disposition(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{cleaned}\"")
}

fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    }
}
