#![allow(clippy::expect_used)]

use std::fs;

use seqkit_domain::{Outcome, PlanReport, RunReport};
use seqkit_source::{SourceDocument, merge_sources};

use super::{ApplyOptions, apply_plan, preview_plan};
use crate::env::EnvContext;
use crate::error::ExecError;
use crate::existence::ExistenceResolver;
use crate::params::ScratchFiles;
use crate::plan::{PlanOptions, build_plan};
use crate::runner::TwCli;
use crate::testing::{FakeRunner, Reply};

fn plan_with(text: &str, options: &PlanOptions) -> (PlanReport, ScratchFiles) {
    let document = merge_sources(&[SourceDocument {
        name: "config.yml".to_string(),
        text: text.to_string(),
    }])
    .expect("merge");
    let mut scratch = ScratchFiles::new();
    let report = build_plan(&document, options, &EnvContext::default(), &mut scratch)
        .expect("plan");
    (report, scratch)
}

fn plan(text: &str) -> (PlanReport, ScratchFiles) {
    plan_with(text, &PlanOptions::default())
}

fn run(report: &PlanReport, runner: &FakeRunner, options: &ApplyOptions) -> RunReport {
    let env = EnvContext::default();
    let mut resolver = ExistenceResolver::new(runner, &env);
    apply_plan(report, runner, &mut resolver, options)
}

const SECRET: &str = "secrets:\n  - name: s1\n    value: v\n    workspace: acme/dev\n";

const WORKSPACES: &str = r#"{"workspaces": [
    {"orgName": "acme", "workspaceName": "dev", "workspaceId": 101}
]}"#;

#[test]
fn missing_resource_is_created() {
    let (report, _scratch) = plan(SECRET);
    let runner = FakeRunner::new().reply("secrets list -w acme/dev", "[]");

    let result = run(&report, &runner, &ApplyOptions::default());
    assert!(!result.has_failures());
    assert_eq!(result.results[0].outcome, Outcome::Created);
    assert_eq!(
        runner.calls(),
        vec![
            "secrets list -w acme/dev",
            "secrets add --name s1 --value v --workspace acme/dev"
        ]
    );
    assert_eq!(
        result.results[0].commands,
        vec!["tw secrets add --name s1 --value v --workspace acme/dev"]
    );
}

#[test]
fn existing_resource_fails_and_aborts_the_run() {
    let (report, _scratch) = plan(
        "secrets:\n  - name: s1\n    value: v\n    workspace: acme/dev\n  - name: s2\n    value: w\n    workspace: acme/dev\n",
    );
    let runner = FakeRunner::new().reply("secrets list -w acme/dev", r#"[{"name": "s1"}]"#);

    let result = run(&report, &runner, &ApplyOptions::default());
    assert!(result.has_failures());
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].outcome, Outcome::Failed);
    assert_eq!(
        result.results[0].error.as_deref(),
        Some(
            "The secrets resource 's1' already exists and will not be created. Please set 'on_exists: overwrite' or 'on_exists: ignore' in your config file."
        )
    );
    assert_eq!(
        result.errors.last().map(String::as_str),
        Some("run aborted after first failure (1 operation(s) not attempted)")
    );
    assert_eq!(runner.calls(), vec!["secrets list -w acme/dev"]);
}

#[test]
fn ignore_policy_skips_existing_resources() {
    let (report, _scratch) = plan(
        "secrets:\n  - name: s1\n    value: v\n    workspace: acme/dev\n    on_exists: ignore\n",
    );
    let runner = FakeRunner::new().reply("secrets list -w acme/dev", r#"[{"name": "s1"}]"#);

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(result.results[0].outcome, Outcome::Skipped);
    assert!(result.results[0].commands.is_empty());
    assert_eq!(runner.calls(), vec!["secrets list -w acme/dev"]);
}

#[test]
fn overwrite_deletes_before_creating() {
    let (report, _scratch) = plan(
        "secrets:\n  - name: s1\n    value: v\n    workspace: acme/dev\n    overwrite: true\n",
    );
    let runner = FakeRunner::new().reply("secrets list -w acme/dev", r#"[{"name": "s1"}]"#);

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(result.results[0].outcome, Outcome::Replaced);
    assert_eq!(
        runner.calls(),
        vec![
            "secrets list -w acme/dev",
            "secrets delete --name s1 --workspace acme/dev",
            "secrets add --name s1 --value v --workspace acme/dev"
        ]
    );
}

#[test]
fn overwrite_of_id_keyed_kind_deletes_by_id() {
    let (report, _scratch) = plan(
        "workspaces:\n  - name: dev\n    organization: acme\n    on_exists: overwrite\n",
    );
    let runner = FakeRunner::new().reply("workspaces list -o acme", WORKSPACES);

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(result.results[0].outcome, Outcome::Replaced);
    assert_eq!(
        runner.calls(),
        vec![
            "workspaces list -o acme",
            "workspaces delete --id 101",
            "workspaces add --name dev --organization acme"
        ]
    );
}

#[test]
fn listing_is_shared_across_resources_of_a_block() {
    let (report, _scratch) = plan(
        "workspaces:\n  - name: qa\n    organization: acme\n  - name: stage\n    organization: acme\n",
    );
    let runner = FakeRunner::new().reply("workspaces list -o acme", WORKSPACES);

    let result = run(&report, &runner, &ApplyOptions::default());
    assert!(!result.has_failures());
    assert_eq!(runner.count("workspaces list -o acme"), 1);
}

#[test]
fn destroy_deletes_present_and_reports_absent() {
    let options = PlanOptions {
        destroy: true,
        ..PlanOptions::default()
    };
    let (report, _scratch) = plan_with(
        "workspaces:\n  - name: dev\n    organization: acme\n  - name: qa\n    organization: acme\n",
        &options,
    );
    let runner = FakeRunner::new().reply("workspaces list -o acme", WORKSPACES);

    let result = run(&report, &runner, &ApplyOptions::default());
    let outcomes: Vec<_> = result.results.iter().map(|entry| entry.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Deleted, Outcome::Absent]);
    assert_eq!(
        runner.calls(),
        vec!["workspaces list -o acme", "workspaces delete --id 101"]
    );
}

#[test]
fn launch_runs_without_existence_check() {
    let (report, _scratch) = plan("launch:\n  - pipeline: hello\n    workspace: acme/dev\n");
    let runner = FakeRunner::new();

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(result.results[0].outcome, Outcome::Created);
    assert_eq!(runner.calls(), vec!["launch hello --workspace acme/dev"]);
}

#[test]
fn team_members_follow_the_team() {
    let (report, _scratch) =
        plan("teams:\n  - name: core\n    organization: acme\n    members: [a@x.io]\n");
    let runner = FakeRunner::new().reply("teams list -o acme", "[]");

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(result.results[0].commands.len(), 2);
    assert_eq!(
        runner.calls(),
        vec![
            "teams list -o acme",
            "teams add --name core --organization acme",
            "teams members --team core --organization acme add --member a@x.io"
        ]
    );
}

#[test]
fn json_output_applies_to_creation_only() {
    let (report, _scratch) = plan(
        "secrets:\n  - name: s1\n    value: v\n    workspace: acme/dev\n    on_exists: overwrite\n",
    );
    let runner = FakeRunner::new().reply("secrets list -w acme/dev", r#"[{"name": "s1"}]"#);
    let options = ApplyOptions {
        json_output: true,
        ..ApplyOptions::default()
    };

    run(&report, &runner, &options);
    let flags: Vec<bool> = runner
        .invocations()
        .iter()
        .skip(1)
        .map(|invocation| invocation.json)
        .collect();
    assert_eq!(flags, vec![false, true]);
}

#[test]
fn command_failure_continues_without_fail_fast() {
    let (report, _scratch) = plan(
        "organizations:\n  - name: acme\n  - name: globex\n",
    );
    let runner = FakeRunner::new()
        .reply("organizations list", "[]")
        .reply_with(
            "organizations add --name acme",
            Reply::Failed("ERROR: Unauthorized".to_string()),
        );
    let options = ApplyOptions {
        fail_fast: false,
        ..ApplyOptions::default()
    };

    let result = run(&report, &runner, &options);
    let outcomes: Vec<_> = result.results.iter().map(|entry| entry.outcome).collect();
    assert_eq!(outcomes, vec![Outcome::Failed, Outcome::Created]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("Resource creation failed: 'ERROR: Unauthorized'"));
}

#[test]
fn dataset_reference_is_bound_before_launch() {
    let (report, scratch) = plan(
        "launch:\n  - pipeline: hello\n    workspace: acme/dev\n    params:\n      dataset: samples\n",
    );
    assert_eq!(scratch.len(), 1);
    let runner = FakeRunner::new().reply(
        "datasets url --name samples --workspace acme/dev",
        r#"{"datasetUrl": "https://api.example/datasets/7/v/1/n/samples.csv"}"#,
    );

    let result = run(&report, &runner, &ApplyOptions::default());
    assert!(!result.has_failures());
    let path = report.operations[0]
        .command
        .params
        .as_ref()
        .map(|params| params.path.clone())
        .expect("params file");
    let written: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(path).expect("read params")).expect("yaml");
    assert_eq!(
        written.get("input").and_then(serde_yaml::Value::as_str),
        Some("https://api.example/datasets/7/v/1/n/samples.csv")
    );
    assert!(written.get("dataset").is_none());
}

#[test]
fn unknown_dataset_fails_the_operation() {
    let (report, _scratch) = plan(
        "launch:\n  - pipeline: hello\n    workspace: acme/dev\n    params:\n      dataset: ghost\n",
    );
    let runner = FakeRunner::new().reply_with(
        "datasets url --name ghost --workspace acme/dev",
        Reply::NotFound,
    );

    let result = run(&report, &runner, &ApplyOptions::default());
    assert_eq!(
        result.results[0].error.as_deref(),
        Some("Dataset 'ghost' not found in workspace 'acme/dev'")
    );
    assert!(runner.calls().iter().all(|call| !call.starts_with("launch")));
}

#[test]
fn preview_validates_without_running() {
    let (report, _scratch) = plan("secrets:\n  - name: s1\n    value: $TOKEN\n");
    let cli = TwCli::new(Vec::new(), EnvContext::from_vars([("TOKEN", "hunter2")]))
        .expect("cli");

    let lines = preview_plan(&report, &cli, &ApplyOptions::default()).expect("preview");
    assert_eq!(lines, vec!["tw secrets add --name s1 --value '$TOKEN'"]);
}

#[test]
fn preview_rejects_unset_references() {
    let (report, _scratch) = plan("secrets:\n  - name: s1\n    value: $TOKEN\n");
    let cli = TwCli::new(Vec::new(), EnvContext::default()).expect("cli");

    let error = preview_plan(&report, &cli, &ApplyOptions::default()).expect_err("must fail");
    assert!(matches!(error, ExecError::Env(_)));
}
