//! Greeting Template
//!
//! The notify endpoint answers every submitted name with the same fixed
//! template, independent of whether anyone is listening.

/// Build the greeting returned for `name`.
///
/// ```rust
/// use greet_stream::domain::greeting::greeting_for;
///
/// assert_eq!(greeting_for("Ada"), "Hello, Ada!");
/// ```
#[must_use]
pub fn greeting_for(name: &str) -> String {
    format!("Hello, {name}!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_uses_name_verbatim() {
        assert_eq!(greeting_for("Ada"), "Hello, Ada!");
        assert_eq!(greeting_for(""), "Hello, !");
        assert_eq!(greeting_for("Grace Hopper"), "Hello, Grace Hopper!");
    }
}
