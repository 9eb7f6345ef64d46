use crate::error::{Error, Result};

/// The `default:`db`.`scope`` prefix that lets a statement use unqualified
/// collection names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryContext {
    formatted: String,
}

impl QueryContext {
    pub(crate) fn new(database: &str, scope: &str) -> Result<Self> {
        if database.contains('`') {
            return Err(Error::new_invalid_argument_error(
                format!("database name must not contain backtick (`), but got: {database}"),
                "database".to_string(),
            ));
        }
        if scope.contains('`') {
            return Err(Error::new_invalid_argument_error(
                format!("scope name must not contain backtick (`), but got: {scope}"),
                "scope".to_string(),
            ));
        }
        Ok(Self {
            formatted: format!("default:`{database}`.`{scope}`"),
        })
    }

    pub(crate) fn format(&self) -> &str {
        &self.formatted
    }
}
