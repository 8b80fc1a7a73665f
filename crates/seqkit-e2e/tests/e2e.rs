#![cfg(unix)]
#![allow(clippy::expect_used)]

use std::path::Path;

use seqkit_e2e::harness::{FakeTw, RunResult, run_seqkit, write_file};
use tempfile::TempDir;

const CONFIG: &str = "\
organizations:
  - name: acme
workspaces:
  - name: dev
    organization: acme
";

fn setup(config: &str) -> (TempDir, String) {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("seqkit.yml");
    write_file(&path, config).expect("write config");
    let shown = path.to_str().expect("utf-8 path").to_string();
    (temp, shown)
}

fn fake(root: &Path) -> FakeTw {
    FakeTw::new(&root.join("bin"))
}

fn run(root: &Path, args: &[&str], tw: Option<&FakeTw>) -> RunResult {
    if let Some(tw) = tw {
        tw.install().expect("install fake tw");
    }
    let output = run_seqkit(root, args, tw, None).expect("run seqkit");
    println!("{}", output.transcript());
    output
}

#[test]
fn dry_run_prints_commands_without_calling_tw() {
    let (temp, config) = setup(CONFIG);
    let tw = fake(temp.path());

    let output = run(temp.path(), &["--dryrun", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("tw organizations add --name acme"));
    assert!(output.stdout.contains("tw workspaces add --name dev --organization acme"));
    assert!(output.stderr.contains("DRYRUN: Running command tw organizations add --name acme"));
    assert!(tw.calls().is_empty());
}

#[test]
fn missing_resources_are_created_in_block_order() {
    let (temp, config) = setup(CONFIG);
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"{"organizations": []}"#)
        .respond("-o json workspaces list -o acme", r#"{"workspaces": []}"#);

    let output = run(temp.path(), &[&config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(
        tw.calls(),
        vec![
            "-o json organizations list",
            "organizations add --name acme",
            "-o json workspaces list -o acme",
            "workspaces add --name dev --organization acme",
        ]
    );
    assert!(output.stdout.contains("Run: 2 created"));
}

#[test]
fn existing_resource_fails_the_run() {
    let (temp, config) = setup(CONFIG);
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"{"organizations": [{"orgName": "acme"}]}"#);

    let output = run(temp.path(), &[&config], Some(&tw));
    assert_eq!(output.exit_code, 1);
    assert!(
        output
            .stdout
            .contains("The organizations resource 'acme' already exists and will not be created.")
    );
    assert_eq!(tw.calls(), vec!["-o json organizations list"]);
}

#[test]
fn overwrite_deletes_then_recreates() {
    let (temp, config) = setup("organizations:\n  - name: acme\n");
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"{"organizations": [{"orgName": "acme"}]}"#);

    let output = run(temp.path(), &["--overwrite", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(
        tw.calls(),
        vec![
            "-o json organizations list",
            "organizations delete --name acme",
            "organizations add --name acme",
        ]
    );
}

#[test]
fn verbose_run_prints_plan_before_results() {
    let (temp, config) = setup("organizations:\n  - name: acme\n");
    let tw = fake(temp.path());

    let output = run(temp.path(), &["--verbose", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.starts_with("plan "));
    assert!(output.stdout.contains("\nrun "));
    assert!(output.stdout.contains("Plan: 1 to create"));
    assert!(output.stdout.contains("Run: 1 created"));
}

#[test]
fn run_override_beats_item_policy() {
    let (temp, config) = setup("organizations:\n  - name: acme\n    on_exists: fail\n");
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"[{"orgName": "acme"}]"#);

    let output = run(temp.path(), &["--on-exists", "ignore", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(tw.calls(), vec!["-o json organizations list"]);
}

#[test]
fn ignore_policy_leaves_existing_resources() {
    let (temp, config) = setup("organizations:\n  - name: acme\n    on_exists: ignore\n");
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"[{"orgName": "acme"}]"#);

    let output = run(temp.path(), &[&config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(tw.calls(), vec!["-o json organizations list"]);
}

#[test]
fn targets_limit_processed_blocks() {
    let (temp, config) = setup(CONFIG);
    let tw = fake(temp.path());

    let output = run(temp.path(), &["--targets", "workspaces", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(
        tw.calls(),
        vec![
            "-o json workspaces list -o acme",
            "workspaces add --name dev --organization acme",
        ]
    );
}

#[test]
fn delete_runs_in_reverse_order() {
    let (temp, config) = setup(CONFIG);
    let tw = fake(temp.path())
        .respond("-o json organizations list", r#"[{"orgName": "acme"}]"#)
        .respond(
            "-o json workspaces list -o acme",
            r#"{"workspaces": [{"orgName": "acme", "workspaceName": "dev", "workspaceId": 42}]}"#,
        );

    let output = run(temp.path(), &["--delete", &config], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert_eq!(
        tw.calls(),
        vec![
            "-o json workspaces list -o acme",
            "workspaces delete --id 42",
            "-o json organizations list",
            "organizations delete --name acme",
        ]
    );
}

#[test]
fn duplicate_names_fail_before_any_call() {
    let (temp, config) = setup(
        "workspaces:\n  - name: dev\n    organization: acme\n  - name: dev\n    organization: globex\n",
    );
    let tw = fake(temp.path());

    let output = run(temp.path(), &[&config], Some(&tw));
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains(
        "Duplicate name key specified in config file for workspaces: dev. Please specify a unique value."
    ));
    assert!(tw.calls().is_empty());
}

#[test]
fn pass_through_options_lead_every_call() {
    let (temp, config) = setup("organizations:\n  - name: acme\n");
    let tw = fake(temp.path());

    let output = run(
        temp.path(),
        &["--cli=--url https://tower.example --insecure", &config],
        Some(&tw),
    );
    assert_eq!(output.exit_code, 0);
    assert_eq!(
        tw.calls(),
        vec![
            "--url https://tower.example --insecure -o json organizations list",
            "--url https://tower.example --insecure organizations add --name acme",
        ]
    );
}

#[test]
fn command_failure_is_reported() {
    let (temp, config) = setup("organizations:\n  - name: acme\n");
    let tw = fake(temp.path()).fail(
        "organizations add --name acme",
        "ERROR: Unauthorized",
        1,
    );

    let output = run(temp.path(), &[&config], Some(&tw));
    assert_eq!(output.exit_code, 1);
    assert!(output.stdout.contains(
        "Resource creation failed: 'ERROR: Unauthorized'. Check your config and try again."
    ));
}

#[test]
fn config_is_read_from_stdin() {
    let temp = TempDir::new().expect("tempdir");
    let tw = fake(temp.path());
    tw.install().expect("install fake tw");

    let output = run_seqkit(
        temp.path(),
        &["--dryrun"],
        Some(&tw),
        Some("organizations:\n  - name: acme\n"),
    )
    .expect("run seqkit");
    println!("{}", output.transcript());
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("dry run stdin"));
    assert!(output.stdout.contains("tw organizations add --name acme"));
}

#[test]
fn env_file_values_are_redacted_from_output() {
    let (temp, config) = setup("secrets:\n  - name: token\n    value: $SEQKIT_E2E_TOKEN\n");
    let env_file = temp.path().join("seqkit.env");
    write_file(&env_file, "SEQKIT_E2E_TOKEN=super-secret-value\n").expect("write env file");
    let tw = fake(temp.path()).respond(
        "secrets add --name token --value super-secret-value",
        "Secret 'token' created: super-secret-value",
    );

    let output = run(
        temp.path(),
        &[
            "--verbose",
            "--env-file",
            env_file.to_str().expect("utf-8 path"),
            &config,
        ],
        Some(&tw),
    );
    assert_eq!(output.exit_code, 0);
    assert!(
        tw.calls()
            .contains(&"secrets add --name token --value super-secret-value".to_string())
    );
    assert!(output.stdout.contains("[REDACTED]"));
    assert!(!output.stdout.contains("super-secret-value"));
}

#[test]
fn info_runs_tw_info() {
    let temp = TempDir::new().expect("tempdir");
    let tw = fake(temp.path()).respond("info", "Seqera Platform 24.1");

    let output = run(temp.path(), &["--info"], Some(&tw));
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("Seqera Platform 24.1"));
    assert_eq!(tw.calls(), vec!["info"]);
}
