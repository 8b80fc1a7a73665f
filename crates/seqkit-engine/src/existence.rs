use std::collections::HashMap;
use std::collections::hash_map::Entry;

use seqkit_domain::{BlockKind, DatasetRef, NormalizedCommand, Tree};
use tracing::debug;

use crate::env::EnvContext;
use crate::error::{ExecError, ResolveError, ValidationError};
use crate::normalize::is_url;
use crate::params::DatasetLookup;
use crate::runner::{Invocation, TwRunner};

/// Listing scope of an existence query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Workspace(String),
    Organization(String),
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeRule {
    Global,
    Organization,
    Workspace,
    WorkspaceOrGlobal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKey {
    Fixed(&'static str),
    /// `teamName` for team participants, `email` otherwise.
    ParticipantType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deletion {
    /// Copy `(command flag, delete flag)` pairs from the resource's own command.
    ByFlags(&'static [(&'static str, &'static str)]),
    /// Look the id up in the listing, matching `(listing key, command flag)` pairs.
    ById {
        id_field: &'static str,
        matches: &'static [(&'static str, &'static str)],
        flags: &'static [(&'static str, &'static str)],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KindRule {
    scope: ScopeRule,
    identity_flag: &'static str,
    name_key: NameKey,
    deletion: Deletion,
}

const GENERIC_RULE: KindRule = KindRule {
    scope: ScopeRule::WorkspaceOrGlobal,
    identity_flag: "name",
    name_key: NameKey::Fixed("name"),
    deletion: Deletion::ByFlags(&[("name", "--name"), ("workspace", "--workspace")]),
};

const fn kind_rule(block: BlockKind) -> Option<KindRule> {
    let rule = match block {
        BlockKind::Organizations => KindRule {
            scope: ScopeRule::Global,
            identity_flag: "name",
            name_key: NameKey::Fixed("orgName"),
            deletion: Deletion::ByFlags(&[("name", "--name")]),
        },
        BlockKind::Teams => KindRule {
            scope: ScopeRule::Organization,
            identity_flag: "name",
            name_key: NameKey::Fixed("name"),
            deletion: Deletion::ById {
                id_field: "teamId",
                matches: &[("name", "name")],
                flags: &[("organization", "--organization")],
            },
        },
        BlockKind::Workspaces => KindRule {
            scope: ScopeRule::Organization,
            identity_flag: "name",
            name_key: NameKey::Fixed("workspaceName"),
            deletion: Deletion::ById {
                id_field: "workspaceId",
                matches: &[("orgName", "organization"), ("workspaceName", "name")],
                flags: &[],
            },
        },
        BlockKind::Labels => KindRule {
            scope: ScopeRule::Workspace,
            identity_flag: "name",
            name_key: NameKey::Fixed("name"),
            deletion: Deletion::ById {
                id_field: "id",
                matches: &[("name", "name"), ("value", "value")],
                flags: &[("workspace", "-w")],
            },
        },
        BlockKind::Members => KindRule {
            scope: ScopeRule::Organization,
            identity_flag: "user",
            name_key: NameKey::Fixed("email"),
            deletion: Deletion::ByFlags(&[("user", "--user"), ("organization", "--organization")]),
        },
        BlockKind::Participants => KindRule {
            scope: ScopeRule::Workspace,
            identity_flag: "name",
            name_key: NameKey::ParticipantType,
            deletion: Deletion::ByFlags(&[
                ("name", "--name"),
                ("type", "--type"),
                ("workspace", "--workspace"),
            ]),
        },
        BlockKind::DataLinks => KindRule {
            scope: ScopeRule::Workspace,
            identity_flag: "name",
            name_key: NameKey::Fixed("name"),
            deletion: Deletion::ById {
                id_field: "id",
                matches: &[("name", "name")],
                flags: &[("workspace", "-w")],
            },
        },
        BlockKind::Launch => return None,
        BlockKind::Credentials
        | BlockKind::Secrets
        | BlockKind::ComputeEnvs
        | BlockKind::Datasets
        | BlockKind::Actions
        | BlockKind::Pipelines
        | BlockKind::Studios => GENERIC_RULE,
    };
    Some(rule)
}

/// Whether resources of `block` can be looked up and deleted.
#[must_use]
pub const fn is_checkable(block: BlockKind) -> bool {
    kind_rule(block).is_some()
}

/// Delete arguments for display, with listing ids shown as placeholders.
#[must_use]
pub fn deletion_preview(block: BlockKind, command: &NormalizedCommand) -> Option<Vec<String>> {
    let rule = kind_rule(block)?;
    let mut args = vec![block.as_str().to_string(), "delete".to_string()];
    match rule.deletion {
        Deletion::ByFlags(flags) => push_flags(&mut args, command, flags),
        Deletion::ById {
            id_field, flags, ..
        } => {
            args.push("--id".to_string());
            args.push(format!("<{id_field}>"));
            push_flags(&mut args, command, flags);
        }
    }
    Some(args)
}

fn push_flags(args: &mut Vec<String>, command: &NormalizedCommand, flags: &[(&str, &str)]) {
    for (source, target) in flags {
        if let Some(value) = command.flag_value(source) {
            args.push((*target).to_string());
            args.push(value.to_string());
        }
    }
}

/// Answers "does this resource exist?" by listing resources through `tw`,
/// caching one listing per block and scope for the whole run.
pub struct ExistenceResolver<'a> {
    runner: &'a dyn TwRunner,
    env: &'a EnvContext,
    listings: HashMap<(BlockKind, Scope), Tree>,
    dataset_urls: HashMap<(String, String), String>,
}

impl<'a> ExistenceResolver<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn TwRunner, env: &'a EnvContext) -> Self {
        Self {
            runner,
            env,
            listings: HashMap::new(),
            dataset_urls: HashMap::new(),
        }
    }

    #[must_use]
    pub fn cached_listings(&self) -> usize {
        self.listings.len()
    }

    /// Whether the resource described by `command` exists remotely.
    ///
    /// Blocks that are never checked report `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required flag is missing, an environment reference
    /// is unset, or the listing call fails.
    pub fn exists(
        &mut self,
        block: BlockKind,
        command: &NormalizedCommand,
    ) -> Result<bool, ResolveError> {
        let Some(rule) = kind_rule(block) else {
            return Ok(false);
        };
        let identity = self.required_flag(block, command, rule.identity_flag)?;
        let found = match rule.deletion {
            Deletion::ById {
                id_field, matches, ..
            } => {
                let pairs = self.match_pairs(block, command, matches)?;
                let borrowed: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(key, value)| (*key, value.as_str()))
                    .collect();
                self.listing(block, rule, command)?
                    .find_field(&borrowed, id_field)
                    .is_some()
            }
            Deletion::ByFlags(_) => {
                let name_key = match rule.name_key {
                    NameKey::Fixed(key) => key,
                    NameKey::ParticipantType => participant_name_key(command),
                };
                self.listing(block, rule, command)?
                    .contains_pair(name_key, &identity)
            }
        };
        debug!(block = %block, %identity, found, "checked resource existence");
        Ok(found)
    }

    /// Full `tw` arguments that delete the resource described by `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be deleted, the listing call fails,
    /// or the resource id cannot be found.
    pub fn deletion_args(
        &mut self,
        block: BlockKind,
        command: &NormalizedCommand,
    ) -> Result<Vec<String>, ResolveError> {
        let Some(rule) = kind_rule(block) else {
            return Err(ResolveError::NotDeletable { block });
        };
        let mut args = vec![block.as_str().to_string(), "delete".to_string()];
        match rule.deletion {
            Deletion::ByFlags(flags) => push_flags(&mut args, command, flags),
            Deletion::ById {
                id_field,
                matches,
                flags,
            } => {
                let identity = self.required_flag(block, command, rule.identity_flag)?;
                let pairs = self.match_pairs(block, command, matches)?;
                let borrowed: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(key, value)| (*key, value.as_str()))
                    .collect();
                let listing = self.listing(block, rule, command)?;
                let id = listing.find_field(&borrowed, id_field).ok_or(
                    ResolveError::IdNotFound {
                        block,
                        identity,
                        field: id_field,
                    },
                )?;
                args.push("--id".to_string());
                args.push(id);
                push_flags(&mut args, command, flags);
            }
        }
        Ok(args)
    }

    fn listing(
        &mut self,
        block: BlockKind,
        rule: KindRule,
        command: &NormalizedCommand,
    ) -> Result<&Tree, ResolveError> {
        let (scope, scope_args) = self.scope(block, rule.scope, command)?;
        let tree = match self.listings.entry((block, scope)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut args = vec![block.as_str().to_string(), "list".to_string()];
                args.extend(scope_args);
                let output = self
                    .runner
                    .execute(&Invocation::new(args).json(true).quiet())?;
                let env = self.env;
                let tree = parse_listing(block, &output)?
                    .map_scalars(&|value: String| env.expand_lossy(&value));
                entry.insert(tree)
            }
        };
        Ok(tree)
    }

    fn scope(
        &self,
        block: BlockKind,
        rule: ScopeRule,
        command: &NormalizedCommand,
    ) -> Result<(Scope, Vec<String>), ResolveError> {
        let scoped = |field: &'static str, flag: &str| -> Result<(String, Vec<String>), ResolveError> {
            let raw = command
                .flag_value(field)
                .ok_or(ValidationError::MissingField { block, field })?;
            Ok((
                self.env.expand(raw)?,
                vec![flag.to_string(), raw.to_string()],
            ))
        };
        Ok(match rule {
            ScopeRule::Global => (Scope::Global, Vec::new()),
            ScopeRule::Organization => {
                let (value, args) = scoped("organization", "-o")?;
                (Scope::Organization(value), args)
            }
            ScopeRule::Workspace => {
                let (value, args) = scoped("workspace", "-w")?;
                (Scope::Workspace(value), args)
            }
            ScopeRule::WorkspaceOrGlobal => {
                if command.flag_value("workspace").is_some() {
                    let (value, args) = scoped("workspace", "-w")?;
                    (Scope::Workspace(value), args)
                } else {
                    (Scope::Global, Vec::new())
                }
            }
        })
    }

    fn required_flag(
        &self,
        block: BlockKind,
        command: &NormalizedCommand,
        field: &'static str,
    ) -> Result<String, ResolveError> {
        let raw = command
            .flag_value(field)
            .ok_or(ValidationError::MissingField { block, field })?;
        Ok(self.env.expand(raw)?)
    }

    fn match_pairs(
        &self,
        block: BlockKind,
        command: &NormalizedCommand,
        matches: &[(&'static str, &'static str)],
    ) -> Result<Vec<(&'static str, String)>, ResolveError> {
        matches
            .iter()
            .map(|(key, flag)| Ok((*key, self.required_flag(block, command, flag)?)))
            .collect()
    }
}

impl DatasetLookup for ExistenceResolver<'_> {
    fn dataset_url(&mut self, dataset: &DatasetRef) -> Result<String, ResolveError> {
        let workspace = self.env.expand(&dataset.workspace)?;
        let name = self.env.expand(&dataset.name)?;
        let key = (workspace.clone(), name.clone());
        if let Some(url) = self.dataset_urls.get(&key) {
            return Ok(url.clone());
        }

        let invocation = Invocation::new([
            "datasets",
            "url",
            "--name",
            dataset.name.as_str(),
            "--workspace",
            dataset.workspace.as_str(),
        ])
        .json(true)
        .quiet();
        let not_found = || ValidationError::DatasetNotFound {
            dataset: name.clone(),
            workspace: workspace.clone(),
        };
        let output = match self.runner.execute(&invocation) {
            Ok(output) => output,
            Err(ExecError::ResourceNotFound { .. } | ExecError::CommandFailed { .. }) => {
                return Err(not_found().into());
            }
            Err(error) => return Err(error.into()),
        };
        let url = extract_dataset_url(&output).ok_or_else(not_found)?;
        debug!(dataset = %name, %workspace, %url, "resolved dataset url");
        self.dataset_urls.insert(key, url.clone());
        Ok(url)
    }
}

fn parse_listing(block: BlockKind, output: &str) -> Result<Tree, ResolveError> {
    if output.trim().is_empty() {
        return Ok(Tree::Null);
    }
    let value: serde_json::Value = serde_json::from_str(output)
        .map_err(|source| ResolveError::ListingParse { block, source })?;
    Ok(Tree::from(value))
}

fn extract_dataset_url(output: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(output) {
        let tree = Tree::from(value);
        if let Some(url) = tree.find_field(&[], "datasetUrl") {
            return Some(url);
        }
    }
    output
        .split_whitespace()
        .map(|token| token.trim_matches(|ch| ch == '"' || ch == '\''))
        .find(|token| is_url(token))
        .map(str::to_string)
}

fn participant_name_key(command: &NormalizedCommand) -> &'static str {
    let is_team = command
        .flag_value("type")
        .is_some_and(|kind| kind.eq_ignore_ascii_case("TEAM"));
    if is_team { "teamName" } else { "email" }
}
