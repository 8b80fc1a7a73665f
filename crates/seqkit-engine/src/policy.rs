use seqkit_domain::{BlockKind, OnExists};
use serde_yaml::Value;

use crate::error::ValidationError;

pub const ON_EXISTS_FIELD: &str = "on_exists";
pub const OVERWRITE_FIELD: &str = "overwrite";

/// What to do with a create operation once remote existence is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
    Replace,
    Fail,
}

/// Resolve the effective policy for one item.
///
/// A run-wide override wins over the item's `on_exists`, which wins over the
/// legacy `overwrite` flag. The item's own value is validated even when
/// overridden.
///
/// # Errors
///
/// Returns an error if `on_exists` is not a known option or `overwrite` is not a
/// boolean.
pub fn resolve_policy(
    block: BlockKind,
    global: Option<OnExists>,
    on_exists: Option<&Value>,
    overwrite: Option<&Value>,
) -> Result<OnExists, ValidationError> {
    let item = match on_exists {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(raw.parse::<OnExists>().map_err(|_| {
            ValidationError::InvalidOnExists {
                block,
                value: raw.clone(),
            }
        })?),
        Some(other) => {
            return Err(ValidationError::InvalidOnExists {
                block,
                value: scalar_text(other),
            });
        }
    };

    let legacy = match overwrite {
        None | Some(Value::Null) => None,
        Some(Value::Bool(true)) => Some(OnExists::Overwrite),
        Some(Value::Bool(false)) => Some(OnExists::Fail),
        Some(other) => {
            return Err(ValidationError::InvalidOverwrite {
                block,
                value: scalar_text(other),
            });
        }
    };

    Ok(global.or(item).or(legacy).unwrap_or_default())
}

#[must_use]
pub const fn decide(policy: OnExists, exists: bool) -> Decision {
    match (exists, policy) {
        (false, _) => Decision::Proceed,
        (true, OnExists::Fail) => Decision::Fail,
        (true, OnExists::Ignore) => Decision::Skip,
        (true, OnExists::Overwrite) => Decision::Replace,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        _ => serde_yaml::to_string(value)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use seqkit_domain::{BlockKind, OnExists};
    use serde_yaml::Value;

    use super::{Decision, decide, resolve_policy};
    use crate::error::ValidationError;

    fn text(value: &str) -> Value {
        Value::String(value.to_string())
    }

    #[test]
    fn defaults_to_fail() {
        let policy = resolve_policy(BlockKind::Pipelines, None, None, None).expect("policy");
        assert_eq!(policy, OnExists::Fail);
    }

    #[test]
    fn item_value_is_case_insensitive() {
        let value = text("IGNORE");
        let policy =
            resolve_policy(BlockKind::Pipelines, None, Some(&value), None).expect("policy");
        assert_eq!(policy, OnExists::Ignore);
    }

    #[test]
    fn on_exists_wins_over_legacy_overwrite() {
        let on_exists = text("ignore");
        let overwrite = Value::Bool(true);
        let policy = resolve_policy(
            BlockKind::Credentials,
            None,
            Some(&on_exists),
            Some(&overwrite),
        )
        .expect("policy");
        assert_eq!(policy, OnExists::Ignore);
    }

    #[test]
    fn legacy_overwrite_maps_to_overwrite() {
        let overwrite = Value::Bool(true);
        let policy =
            resolve_policy(BlockKind::Workspaces, None, None, Some(&overwrite)).expect("policy");
        assert_eq!(policy, OnExists::Overwrite);
    }

    #[test]
    fn run_override_wins_over_item_value() {
        let on_exists = text("fail");
        let policy = resolve_policy(
            BlockKind::Pipelines,
            Some(OnExists::Overwrite),
            Some(&on_exists),
            None,
        )
        .expect("policy");
        assert_eq!(policy, OnExists::Overwrite);
    }

    #[test]
    fn run_override_wins_over_legacy_overwrite() {
        let overwrite = Value::Bool(false);
        let policy = resolve_policy(
            BlockKind::Pipelines,
            Some(OnExists::Ignore),
            None,
            Some(&overwrite),
        )
        .expect("policy");
        assert_eq!(policy, OnExists::Ignore);
    }

    #[test]
    fn invalid_item_value_is_rejected_even_with_run_override() {
        let on_exists = text("replace");
        let error = resolve_policy(
            BlockKind::Pipelines,
            Some(OnExists::Ignore),
            Some(&on_exists),
            None,
        )
        .expect_err("must fail");
        assert!(matches!(error, ValidationError::InvalidOnExists { .. }));
        assert_eq!(
            error.to_string(),
            "Invalid on_exists option 'replace' for pipelines. Valid options are: fail, ignore, overwrite"
        );
    }

    #[test]
    fn non_boolean_overwrite_is_rejected() {
        let overwrite = text("yes please");
        let error = resolve_policy(BlockKind::Pipelines, None, None, Some(&overwrite))
            .expect_err("must fail");
        assert!(matches!(error, ValidationError::InvalidOverwrite { .. }));
    }

    #[test]
    fn decision_table() {
        assert_eq!(decide(OnExists::Fail, false), Decision::Proceed);
        assert_eq!(decide(OnExists::Ignore, false), Decision::Proceed);
        assert_eq!(decide(OnExists::Overwrite, false), Decision::Proceed);
        assert_eq!(decide(OnExists::Fail, true), Decision::Fail);
        assert_eq!(decide(OnExists::Ignore, true), Decision::Skip);
        assert_eq!(decide(OnExists::Overwrite, true), Decision::Replace);
    }
}
