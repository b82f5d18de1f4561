//! Tagged result for lookups where absence is an expected outcome

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorKind};

/// Outcome of a lookup in the retrieval and extraction chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Error(ErrorKind),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Lookup::Error(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Error(kind) => Lookup::Error(kind),
        }
    }

    /// Try the next resolution step only when nothing was found
    pub fn or_else(self, f: impl FnOnce() -> Lookup<T>) -> Lookup<T> {
        match self {
            Lookup::NotFound => f(),
            other => other,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

impl<T> From<Error> for Lookup<T> {
    fn from(err: Error) -> Self {
        Lookup::Error(err.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_else_only_runs_on_not_found() {
        let found: Lookup<u32> = Lookup::Found(1);
        assert_eq!(found.or_else(|| Lookup::Found(2)), Lookup::Found(1));

        let missing: Lookup<u32> = Lookup::NotFound;
        assert_eq!(missing.or_else(|| Lookup::Found(2)), Lookup::Found(2));

        let failed: Lookup<u32> = Lookup::Error(ErrorKind::Embedding);
        assert_eq!(failed.or_else(|| Lookup::Found(2)), Lookup::Error(ErrorKind::Embedding));
    }

    #[test]
    fn test_from_option_and_error() {
        assert_eq!(Lookup::from(Some("₹500")), Lookup::Found("₹500"));
        assert_eq!(Lookup::<&str>::from(None), Lookup::NotFound);

        let lookup: Lookup<String> = Error::DataIntegrity("bad row".into()).into();
        assert_eq!(lookup, Lookup::Error(ErrorKind::DataIntegrity));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&Lookup::Found("1.00%")).unwrap();
        assert_eq!(json, r#"{"status":"found","value":"1.00%"}"#);
        let json = serde_json::to_string(&Lookup::<String>::NotFound).unwrap();
        assert_eq!(json, r#"{"status":"not_found"}"#);
    }
}
