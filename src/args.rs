//! Captured call arguments and re-invocation overrides.
//!
//! Arguments are JSON values, matching the dynamically typed payloads the
//! RPC peer accepts. [`CallArgs`] holds one positional list and one keyword
//! map; [`Override`] describes how a re-invocation changes a positional slot.
//!
//! # Example
//!
//! ```
//! use rpc_repl::{CallArgs, Keep, Override};
//! use serde_json::Map;
//!
//! let original = CallArgs::positional([2, 3]);
//! let merged = original
//!     .with_overrides(vec![Keep, Override::set(10)], Map::new())
//!     .unwrap();
//! assert_eq!(merged, CallArgs::positional([2, 10]));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReplError, Result};

/// Positional and keyword arguments for one remote call.
///
/// Serializes as `{"args": [...], "kwargs": {...}}` so a shell can save an
/// argument set and replay it later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    /// Positional arguments, in order.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from positional arguments only.
    pub fn positional<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: Map::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Build a new argument set from this one.
    ///
    /// Positional slots follow `overrides`: `Keep` retains the original
    /// value, `Set` replaces it, slots past the original count are appended
    /// and original slots past the override count are retained. Keyword
    /// overrides replace or add keys; other original keys are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ReplError::KeepOutOfRange`] if `Keep` is given for a slot
    /// that has no original argument.
    pub fn with_overrides(
        &self,
        overrides: impl IntoIterator<Item = Override>,
        kwargs: Map<String, Value>,
    ) -> Result<CallArgs> {
        let mut args = self.args.clone();

        for (position, slot) in overrides.into_iter().enumerate() {
            match slot {
                Override::Keep if position < args.len() => {}
                Override::Keep => return Err(ReplError::KeepOutOfRange { position }),
                Override::Set(value) if position < args.len() => args[position] = value,
                // Keep past the end already errored, so this is always the next slot
                Override::Set(value) => args.push(value),
            }
        }

        let mut merged = self.kwargs.clone();
        merged.extend(kwargs);

        Ok(CallArgs {
            args,
            kwargs: merged,
        })
    }
}

/// How a re-invocation treats one positional slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    /// Retain the original argument at this position.
    Keep,
    /// Replace (or append) the argument at this position.
    Set(Value),
}

impl Override {
    /// Shorthand for `Override::Set(value.into())`.
    pub fn set(value: impl Into<Value>) -> Self {
        Override::Set(value.into())
    }
}

impl From<Value> for Override {
    fn from(value: Value) -> Self {
        Override::Set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_builder_methods() {
        let args = CallArgs::new().arg(1).arg("two").kwarg("three", 3.0);
        assert_eq!(args.args, vec![json!(1), json!("two")]);
        assert_eq!(args.kwargs.get("three"), Some(&json!(3.0)));
    }

    #[test]
    fn test_all_keep_is_identity() {
        let original = CallArgs::positional([1, 2, 3]).kwarg("flag", true);
        let merged = original
            .with_overrides(vec![Override::Keep; 3], Map::new())
            .unwrap();
        assert_eq!(merged, original);
    }

    #[test]
    fn test_no_overrides_is_identity() {
        let original = CallArgs::positional(["a", "b"]);
        let merged = original.with_overrides(Vec::new(), Map::new()).unwrap();
        assert_eq!(merged, original);
    }

    #[test]
    fn test_set_replaces_and_keep_retains() {
        let original = CallArgs::positional([2, 3]);
        let merged = original
            .with_overrides(vec![Override::Keep, Override::set(10)], Map::new())
            .unwrap();
        assert_eq!(merged.args, vec![json!(2), json!(10)]);
    }

    #[test]
    fn test_trailing_originals_retained() {
        let original = CallArgs::positional([1, 2, 3]);
        let merged = original
            .with_overrides(vec![Override::set(9)], Map::new())
            .unwrap();
        assert_eq!(merged.args, vec![json!(9), json!(2), json!(3)]);
    }

    #[test]
    fn test_extra_positions_appended() {
        let original = CallArgs::positional([1]);
        let merged = original
            .with_overrides(
                vec![Override::Keep, Override::set(2), Override::set(3)],
                Map::new(),
            )
            .unwrap();
        assert_eq!(merged.args, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_keep_out_of_range() {
        let original = CallArgs::positional([1]);
        let err = original
            .with_overrides(vec![Override::Keep, Override::Keep], Map::new())
            .unwrap_err();
        assert!(matches!(err, ReplError::KeepOutOfRange { position: 1 }));
    }

    #[test]
    fn test_kwarg_override_replaces_only_that_key() {
        let original = CallArgs::new().kwarg("a", 1).kwarg("b", 2);
        let merged = original
            .with_overrides(Vec::new(), kwargs(&[("b", json!(20)), ("c", json!(30))]))
            .unwrap();
        assert_eq!(merged.kwargs.get("a"), Some(&json!(1)));
        assert_eq!(merged.kwargs.get("b"), Some(&json!(20)));
        assert_eq!(merged.kwargs.get("c"), Some(&json!(30)));
        // original untouched
        assert_eq!(original.kwargs.get("b"), Some(&json!(2)));
        assert!(original.kwargs.get("c").is_none());
    }

    #[test]
    fn test_json_form() {
        let args = CallArgs::positional([1, 2]).kwarg("scale", 3);
        let encoded = serde_json::to_value(&args).unwrap();
        assert_eq!(encoded, json!({"args": [1, 2], "kwargs": {"scale": 3}}));

        let decoded: CallArgs = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_override_from_value() {
        assert_eq!(Override::from(json!("x")), Override::Set(json!("x")));
    }
}
