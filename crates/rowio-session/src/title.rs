//! Session title rules.

use rowio_core::{Result, RowioError};

pub const MIN_TITLE_LEN: usize = 4;
pub const MAX_TITLE_LEN: usize = 32;

/// Titles double as directory names: 4-32 ASCII letters, digits, `_` or `-`.
pub fn validate_title(title: &str) -> Result<()> {
    let len = title.chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(RowioError::Validation(format!(
            "title must be {MIN_TITLE_LEN}-{MAX_TITLE_LEN} characters, got {len}"
        )));
    }
    if let Some(bad) = title
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(RowioError::Validation(format!(
            "title may only contain letters, digits, '_' and '-', found {bad:?}"
        )));
    }
    Ok(())
}
