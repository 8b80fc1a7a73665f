mod apply;
mod env;
mod error;
mod existence;
mod item;
mod normalize;
mod order;
mod params;
mod pipeline;
mod plan;
mod policy;
mod runner;

#[cfg(test)]
mod testing;

pub use apply::{ApplyOptions, apply_plan, preview_plan};
pub use env::EnvContext;
pub use error::{
    ApplyError, EnvError, ExecError, ParamsError, PipelineError, PlanError, ResolveError,
    ValidationError,
};
pub use existence::{ExistenceResolver, Scope, deletion_preview, is_checkable};
pub use item::ResourceItem;
pub use normalize::{NormalizeContext, normalize_item};
pub use order::{block_order, parse_targets};
pub use params::{DatasetLookup, ScratchFiles, bind_dataset_url, load_params_file, merge_params};
pub use pipeline::{has_destructive_operations, plan_from_sources};
pub use plan::{PlanOptions, build_plan, creation_invocations};
pub use policy::{Decision, decide, resolve_policy};
pub use runner::{
    Invocation, TW_BINARY, TwCli, TwRunner, classify_failure, display_command, parse_pass_through,
};
