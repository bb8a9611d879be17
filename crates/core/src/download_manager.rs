//! Download manager constants, validation, and helper functions.
//!
//! Provides model-name and revision validation, the default revision,
//! locale-independent byte formatting for status snapshots, and the local
//! directory layout for downloaded models.

use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Revision used when a download request does not name one.
pub const DEFAULT_REVISION: &str = "main";

/// Maximum length of a revision (branch, tag, or commit) name.
const MAX_REVISION_LEN: usize = 255;

/// Binary size units used by [`format_size`], in 1024 steps.
const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Hub model identifiers: `org/model`, letters, digits, `_`, `.`, `-`.
fn model_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_.-]+/[a-zA-Z0-9_.-]+$").expect("static regex is valid")
    })
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

/// Validate a hub model identifier of the form `org/model`.
pub fn validate_model_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Model name must not be empty".to_string(),
        ));
    }
    if !model_name_pattern().is_match(trimmed) {
        return Err(CoreError::Validation(format!(
            "Model name must look like 'org/model', got: '{trimmed}'"
        )));
    }
    // `..` would escape the models directory once joined onto it.
    if trimmed.split('/').any(|part| part == "." || part == "..") {
        return Err(CoreError::Validation(format!(
            "Model name must not contain relative path segments: '{trimmed}'"
        )));
    }
    Ok(())
}

/// Validate an optional revision and resolve it to a concrete ref.
///
/// `None` and blank strings resolve to [`DEFAULT_REVISION`].
pub fn resolve_revision(revision: Option<&str>) -> Result<String, CoreError> {
    let rev = match revision.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_REVISION.to_string()),
        Some(rev) => rev,
    };

    if rev.len() > MAX_REVISION_LEN {
        return Err(CoreError::Validation(format!(
            "Revision must not exceed {MAX_REVISION_LEN} characters"
        )));
    }
    if rev.chars().any(|c| c.is_whitespace() || c.is_control()) || rev.contains("..") {
        return Err(CoreError::Validation(format!(
            "Revision contains invalid characters: '{rev}'"
        )));
    }
    Ok(rev.to_string())
}

// ---------------------------------------------------------------------------
// Local layout
// ---------------------------------------------------------------------------

/// Directory a model is downloaded into: `{models_dir}/{org}/{model}`.
pub fn model_download_dir(models_dir: &Path, model_name: &str) -> Result<PathBuf, CoreError> {
    validate_model_name(model_name)?;
    Ok(models_dir.join(model_name.trim()))
}

/// Check that `path` is located strictly inside `root` without `..` hops.
pub fn is_within(root: &Path, path: &Path) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return false;
    }
    path.starts_with(root) && path != root
}

// ---------------------------------------------------------------------------
// Size formatting
// ---------------------------------------------------------------------------

/// Format a byte count with binary prefixes.
///
/// Whole bytes are printed without decimals (`"512 B"`); larger values use
/// two decimals (`"1.50 MB"`). Values past the largest unit stay in TB.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    // Move up a unit whenever two-decimal rounding would print `1024.00`.
    const ROUNDS_TO_NEXT_UNIT: f64 = 1024.0 - 0.005;

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= ROUNDS_TO_NEXT_UNIT && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", SIZE_UNITS[unit])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- validate_model_name -------------------------------------------------

    #[test]
    fn valid_model_names_accepted() {
        assert!(validate_model_name("acme/model-a").is_ok());
        assert!(validate_model_name("meta-llama/Llama-3.1-8B_Instruct").is_ok());
    }

    #[test]
    fn model_name_without_org_rejected() {
        assert!(validate_model_name("model-a").is_err());
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("   ").is_err());
    }

    #[test]
    fn model_name_with_extra_segments_rejected() {
        assert!(validate_model_name("a/b/c").is_err());
        assert!(validate_model_name("acme/model a").is_err());
    }

    #[test]
    fn model_name_with_parent_segment_rejected() {
        assert!(validate_model_name("../etc").is_err());
        assert!(validate_model_name("acme/..").is_err());
    }

    // -- resolve_revision ----------------------------------------------------

    #[test]
    fn missing_revision_defaults_to_main() {
        assert_eq!(resolve_revision(None).unwrap(), "main");
        assert_eq!(resolve_revision(Some("  ")).unwrap(), "main");
    }

    #[test]
    fn explicit_revision_kept() {
        assert_eq!(resolve_revision(Some("v1.0")).unwrap(), "v1.0");
        assert_eq!(resolve_revision(Some("refs/pr/1")).unwrap(), "refs/pr/1");
    }

    #[test]
    fn revision_with_whitespace_rejected() {
        assert!(resolve_revision(Some("my branch")).is_err());
        assert!(resolve_revision(Some("../main")).is_err());
    }

    // -- model_download_dir / is_within ----------------------------------------

    #[test]
    fn download_dir_nests_org_and_model() {
        let dir = model_download_dir(Path::new("/models"), "acme/model-a").unwrap();
        assert_eq!(dir, PathBuf::from("/models/acme/model-a"));
    }

    #[test]
    fn is_within_rejects_root_and_escapes() {
        let root = Path::new("/models");
        assert!(is_within(root, Path::new("/models/acme/model-a")));
        assert!(!is_within(root, Path::new("/models")));
        assert!(!is_within(root, Path::new("/models/../etc")));
        assert!(!is_within(root, Path::new("/tmp/model")));
    }

    // -- format_size -----------------------------------------------------------

    #[test]
    fn whole_bytes_have_no_decimals() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn larger_sizes_use_two_decimals() {
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn sizes_past_terabytes_stay_in_tb() {
        assert_eq!(format_size(1024u64.pow(4)), "1.00 TB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.00 TB");
    }

    #[test]
    fn values_just_below_a_boundary_use_the_next_unit() {
        assert_eq!(format_size(1024 * 1024 - 1), "1.00 MB");
        assert_eq!(format_size(1024u64.pow(3) - 1), "1.00 GB");
        // 1023.99 KB still rounds below the boundary.
        assert_eq!(format_size(1_048_566), "1023.99 KB");
    }
}
