//! Half-width / full-width alphanumeric normalization.
//!
//! The registry publishes names with full-width alphanumerics
//! (`ＡＢＣ１２３`). Queries typed by users usually arrive half-width, so they
//! are widened before any index lookup.

/// Distance between an ASCII alphanumeric and its full-width form.
const WIDE_OFFSET: u32 = 0xFEE0;

fn is_narrow_alnum(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn is_wide_alnum(c: char) -> bool {
    matches!(c, 'Ａ'..='Ｚ' | 'ａ'..='ｚ' | '０'..='９')
}

fn shift(c: char, up: bool) -> char {
    let code = if up {
        c as u32 + WIDE_OFFSET
    } else {
        c as u32 - WIDE_OFFSET
    };
    char::from_u32(code).unwrap_or(c)
}

/// Convert `A-Z`, `a-z` and `0-9` to their full-width counterparts.
///
/// Every other character passes through unchanged.
///
/// ```
/// use invoice_registry::normalize::to_wide;
///
/// assert_eq!(to_wide("ABC株式会社123"), "ＡＢＣ株式会社１２３");
/// ```
pub fn to_wide(text: &str) -> String {
    text.chars()
        .map(|c| if is_narrow_alnum(c) { shift(c, true) } else { c })
        .collect()
}

/// Inverse of [`to_wide`], restricted to full-width alphanumerics.
pub fn to_narrow(text: &str) -> String {
    text.chars()
        .map(|c| if is_wide_alnum(c) { shift(c, false) } else { c })
        .collect()
}
