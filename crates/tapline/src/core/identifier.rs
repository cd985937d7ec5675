//! Stream identifier derivation and validation.
//!
//! Streams declared without an explicit id get one derived from the name of
//! their implementing type. The derivation is fixed so that catalogs and state
//! files stay stable across builds:
//!
//! 1. Take the last path segment of the type name and drop generic arguments.
//! 2. Scan left to right. Wherever a character is followed by an uppercase
//!    letter and then a lowercase letter, insert `_` before the uppercase
//!    letter and resume scanning after the lowercase one.
//! 3. Lower-case the result.
//!
//! | Type name          | Identifier           |
//! |--------------------|----------------------|
//! | `TestStream`       | `test_stream`        |
//! | `HTTPClientStream` | `http_client_stream` |
//! | `Contacts`         | `contacts`           |

use crate::error::{Result, TapError};

/// Maximum stream identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Convert a PascalCase type name into a lower-case, underscore separated identifier.
pub fn pascal_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut i = 0;

    while i < chars.len() {
        let boundary = i + 2 < chars.len()
            && chars[i + 1].is_ascii_uppercase()
            && chars[i + 2].is_ascii_lowercase();

        if boundary {
            out.push(chars[i]);
            out.push('_');
            out.push(chars[i + 1]);
            out.push(chars[i + 2]);
            i += 3;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out.to_lowercase()
}

/// Short name of a type: the last path segment with generic arguments removed.
///
/// `my_tap::streams::Invoices<Client>` becomes `Invoices`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Default stream identifier for an implementing type.
pub fn stream_id_for<T: ?Sized>() -> String {
    pascal_to_snake(short_type_name::<T>())
}

/// Validate a stream identifier.
///
/// Rejects empty identifiers, identifiers containing null bytes or
/// whitespace, and identifiers exceeding the maximum length.
pub fn validate_stream_id(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TapError::invalid_stream_id(name, "cannot be empty"));
    }

    if name.contains('\0') || name.chars().any(char::is_whitespace) {
        return Err(TapError::invalid_stream_id(
            name,
            "contains null bytes or whitespace",
        ));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TapError::invalid_stream_id(
            name,
            format!(
                "exceeds maximum length of {} bytes (got {} bytes)",
                MAX_IDENTIFIER_LENGTH,
                name.len()
            ),
        ));
    }

    Ok(())
}
