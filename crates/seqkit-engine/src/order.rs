use std::collections::HashSet;

use seqkit_domain::{BlockKind, NormalizedCommand};

use crate::error::ValidationError;

/// Blocks in processing order for a run.
///
/// Creation runs use the canonical order; destroy runs reverse it and drop
/// action-only blocks. A target list only filters, it never reorders.
#[must_use]
pub fn block_order(destroy: bool, targets: Option<&[BlockKind]>) -> Vec<BlockKind> {
    let mut order: Vec<BlockKind> = if destroy {
        BlockKind::ALL
            .iter()
            .rev()
            .copied()
            .filter(|kind| !kind.is_action_only())
            .collect()
    } else {
        BlockKind::ALL.to_vec()
    };
    if let Some(targets) = targets {
        order.retain(|kind| targets.contains(kind));
    }
    order
}

/// Parse a comma separated block allow-list.
///
/// # Errors
///
/// Returns an error naming the first entry that is not a known block.
pub fn parse_targets(raw: &str) -> Result<Vec<BlockKind>, ValidationError> {
    let mut targets = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let kind = name
            .parse::<BlockKind>()
            .map_err(|_| ValidationError::UnknownTarget {
                name: name.to_string(),
                expected: BlockKind::expected_names(),
            })?;
        if !targets.contains(&kind) {
            targets.push(kind);
        }
    }
    Ok(targets)
}

/// Flags that identify a resource within its block.
#[must_use]
pub const fn identity_flags(block: BlockKind) -> &'static [&'static str] {
    match block {
        BlockKind::Members => &["user"],
        BlockKind::Labels => &["name", "value"],
        _ => &["name", "user", "email"],
    }
}

/// Identity of a normalized resource, used for duplicate detection.
#[must_use]
pub fn identity_of(block: BlockKind, command: &NormalizedCommand) -> Option<String> {
    let lookup = |flag: &str| command.flag_value(flag);

    match block {
        BlockKind::Labels => {
            let name = lookup("name")?;
            Some(match lookup("value") {
                Some(value) => format!("{name}={value}"),
                None => name.to_string(),
            })
        }
        _ => identity_flags(block)
            .iter()
            .find_map(|flag| lookup(flag))
            .map(str::to_string),
    }
}

/// Reject a block in which two resources share an identity.
///
/// # Errors
///
/// Returns an error naming the block and the repeated identity.
pub fn ensure_unique_identities<'a, I>(block: BlockKind, identities: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = HashSet::new();
    for identity in identities.into_iter().flatten() {
        if !seen.insert(identity) {
            return Err(ValidationError::DuplicateIdentity {
                block,
                identity: identity.to_string(),
            });
        }
    }
    Ok(())
}
