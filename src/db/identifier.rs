use std::fmt;

use super::error::StoreError;

/// A table or column name that passed the allow-list check
///
/// Only ASCII letters, digits, underscore, comma and space are accepted. Names
/// go into SQL text through [`SqlIdent::quoted`] only, so a name containing
/// spaces stays one identifier. Values never go through this type; they are
/// always bound as parameters.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SqlIdent(String);

impl SqlIdent {
    /// Validate a caller-supplied identifier
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        if is_allowed(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(StoreError::Validation(format!(
                "identifier {:?} must only contain letters, numbers, underscores, commas, and spaces",
                name
            )))
        }
    }

    /// Identifier known at compile time
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(is_allowed(name), "invalid static identifier {}", name);
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text; the allow-list excludes `"`
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

fn is_allowed(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ',' || c == ' ')
}

impl fmt::Display for SqlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allow_listed_characters() {
        for name in ["miner_queue", "speed_data", "Table1", "name, date", "a b"] {
            assert!(SqlIdent::parse(name).is_ok(), "{} should be accepted", name);
        }
    }

    #[test]
    fn quoted_form_keeps_spaces_inside_one_identifier() {
        let ident = SqlIdent::parse("id OR id").unwrap();
        assert_eq!(ident.quoted(), "\"id OR id\"");
        assert_eq!(ident.to_string(), "id OR id");
    }

    #[test]
    fn rejects_everything_else() {
        for name in [
            "jobs; DROP TABLE jobs",
            "name'--",
            "a\"b",
            "tab\tle",
            "line\nbreak",
            "(select)",
            "col=1",
            "naïve",
            "",
            "   ",
        ] {
            match SqlIdent::parse(name) {
                Err(StoreError::Validation(_)) => {}
                other => panic!("{:?} should be rejected, got {:?}", name, other),
            }
        }
    }
}
