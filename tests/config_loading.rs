// tests/config_loading.rs

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tempfile::{NamedTempFile, tempdir};

use phasegraph::config::{config_root_dir, load_and_validate, load_from_str};
use phasegraph::errors::PhasegraphError;
use phasegraph::types::CacheMode;
use phasegraph::workspace::{ParameterArg, ScriptLookup, Workspace};
use phasegraph_test_utils::init_tracing;

fn demo_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/basic/phasegraph.toml")
}

fn expect_config_error(toml: &str, needle: &str) {
    match load_from_str(toml) {
        Err(PhasegraphError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message '{msg}' should mention '{needle}'");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn demo_config_loads_with_defaults() {
    init_tracing();

    let cfg = load_and_validate(demo_config_path()).unwrap();

    assert_eq!(cfg.settings.parallelism, Some(2));
    assert_eq!(cfg.settings.grace_period_ms, 2000);
    assert!(cfg.settings.allow_incremental);
    assert!(cfg.settings.build_cache.is_none());
    assert_eq!(cfg.phase.len(), 2);
    assert_eq!(
        cfg.phase["_phase:build"].dependencies.self_phases,
        vec!["_phase:lint".to_string()]
    );
    assert_eq!(cfg.project.len(), 3);
}

#[test]
fn demo_workspace_reads_package_json_scripts_and_dependencies() {
    init_tracing();

    let path = demo_config_path();
    let cfg = load_and_validate(&path).unwrap();
    let ws = Workspace::from_config(&config_root_dir(&path), &cfg, &[]).unwrap();

    let alpha = ws.project("alpha").unwrap();
    assert_eq!(alpha.script("_phase:build"), ScriptLookup::Command("echo build alpha"));
    assert!(alpha.dependencies.contains("beta"));

    let beta = ws.project("beta").unwrap();
    assert_eq!(beta.script("_phase:lint"), ScriptLookup::Empty);

    let gamma = ws.project("gamma").unwrap();
    assert_eq!(gamma.script("_phase:lint"), ScriptLookup::Null);
    assert_eq!(gamma.script("_phase:test"), ScriptLookup::Missing);
    // Only configured projects become local dependencies.
    assert_eq!(gamma.dependencies.iter().collect::<Vec<_>>(), vec!["beta"]);

    let build = ws.phase("_phase:build").unwrap();
    assert_eq!(
        build.associated_parameters,
        vec!["--locale".to_string(), "--production".to_string()]
    );
}

#[test]
fn parameter_arguments_are_bound_and_validated() {
    init_tracing();

    let path = demo_config_path();
    let cfg = load_and_validate(&path).unwrap();
    let root = config_root_dir(&path);

    let args: Vec<ParameterArg> = vec!["production".parse().unwrap(), "--locale=fr".parse().unwrap()];
    let ws = Workspace::from_config(&root, &cfg, &args).unwrap();
    let mut rendered = Vec::new();
    for p in ws.parameters.iter() {
        p.append_to_arg_list(&mut rendered);
    }
    assert_eq!(rendered, vec!["--locale", "fr", "--production"]);

    let bad_choice: Vec<ParameterArg> = vec!["--locale=de".parse().unwrap()];
    assert!(matches!(
        Workspace::from_config(&root, &cfg, &bad_choice),
        Err(PhasegraphError::ConfigError(_))
    ));

    let unknown: Vec<ParameterArg> = vec!["--nope".parse().unwrap()];
    assert!(matches!(
        Workspace::from_config(&root, &cfg, &unknown),
        Err(PhasegraphError::ConfigError(_))
    ));
}

#[test]
fn build_cache_section_is_parsed() {
    let cfg = load_from_str(
        r#"
[settings.build_cache]
mode = "memory"

[phase."_phase:build"]

[project.a]
folder = "a"
"#,
    )
    .unwrap();

    let cache = cfg.settings.build_cache.expect("build cache section");
    assert_eq!(cache.mode, CacheMode::Memory);
    assert_eq!(cache.dir, None);
}

#[test]
fn missing_phases_or_projects_is_rejected() {
    expect_config_error(
        r#"
[project.a]
folder = "a"
"#,
        "[phase.<name>]",
    );
    expect_config_error(
        r#"
[phase."_phase:build"]
"#,
        "[project.<name>]",
    );
}

#[test]
fn declared_phase_names_must_use_the_prefix() {
    expect_config_error(
        r#"
[phase.build]

[project.a]
folder = "a"
"#,
        "_phase:",
    );

    // Synthetic phases may use any name.
    load_from_str(
        r#"
[phase.build]
synthetic = true

[project.a]
folder = "a"
"#,
    )
    .unwrap();
}

#[test]
fn unknown_phase_dependency_is_rejected() {
    expect_config_error(
        r#"
[phase."_phase:build"]
dependencies = { upstream = ["_phase:compile"] }

[project.a]
folder = "a"
"#,
        "_phase:compile",
    );
}

#[test]
fn self_dependency_cycle_between_phases_is_rejected() {
    let result = load_from_str(
        r#"
[phase."_phase:a"]
dependencies = { self = ["_phase:b"] }

[phase."_phase:b"]
dependencies = { self = ["_phase:a"] }

[project.x]
folder = "x"
"#,
    );
    match result {
        Err(PhasegraphError::DependencyCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
        }
        other => panic!("Expected DependencyCycle, got: {:?}", other),
    }
}

#[test]
fn upstream_dependency_on_same_phase_is_allowed() {
    load_from_str(
        r#"
[phase."_phase:build"]
dependencies = { upstream = ["_phase:build"] }

[project.a]
folder = "a"
"#,
    )
    .unwrap();
}

#[test]
fn project_dependency_errors_are_reported() {
    expect_config_error(
        r#"
[phase."_phase:build"]

[project.a]
folder = "a"
dependencies = ["missing"]
"#,
        "unknown dependency 'missing'",
    );
    expect_config_error(
        r#"
[phase."_phase:build"]

[project.a]
folder = "a"
dependencies = ["a"]
"#,
        "cannot depend on itself",
    );
}

#[test]
fn parameter_errors_are_reported() {
    expect_config_error(
        r#"
[phase."_phase:build"]

[parameter.production]
kind = "flag"

[project.a]
folder = "a"
"#,
        "must start with '--'",
    );
    expect_config_error(
        r#"
[phase."_phase:build"]

[parameter."--mode"]
kind = "choice"

[project.a]
folder = "a"
"#,
        "at least one alternative",
    );
    expect_config_error(
        r#"
[phase."_phase:build"]

[parameter."--mode"]
kind = "flag"
phases = ["_phase:deploy"]

[project.a]
folder = "a"
"#,
        "unknown phase",
    );
}

#[test]
fn zero_parallelism_is_rejected() {
    expect_config_error(
        r#"
[settings]
parallelism = 0

[phase."_phase:build"]

[project.a]
folder = "a"
"#,
        "parallelism",
    );
}

#[test]
fn invalid_toml_returns_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[phase.\"_phase:build\"\nbroken").unwrap();

    match load_and_validate(file.path()) {
        Err(PhasegraphError::TomlError(_)) => {}
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn malformed_package_json_is_reported() {
    init_tracing();

    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("a/package.json"), "{ not json").unwrap();
    let config_path = dir.path().join("phasegraph.toml");
    fs::write(
        &config_path,
        r#"
[phase."_phase:build"]

[project.a]
folder = "a"
"#,
    )
    .unwrap();

    let cfg = load_and_validate(&config_path).unwrap();
    match Workspace::from_config(dir.path(), &cfg, &[]) {
        Err(PhasegraphError::JsonError(_)) => {}
        other => panic!("Expected JsonError, got: {:?}", other),
    }
}
