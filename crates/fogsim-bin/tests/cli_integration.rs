use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn fogsim() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("esnode-fogsim");
    cmd.env_remove("FOGSIM_CONFIG");
    cmd
}

#[test]
fn run_prints_a_summary_block_per_policy() {
    fogsim()
        .args([
            "--fog", "9", "--iot", "12", "--cells", "3", "--ticks", "40", "run",
        ])
        .assert()
        .success()
        .stdout(contains("Policy static"))
        .stdout(contains("Policy dynamic"))
        .stdout(contains("Policy hybrid"))
        .stdout(contains("Completion rate"));
}

#[test]
fn invalid_cell_ratio_exits_with_code_one() {
    fogsim()
        .args(["--fog", "6", "--cells", "5", "run"])
        .assert()
        .code(1)
        .stderr(contains("cell count"));
}

#[test]
fn csv_export_writes_header_and_rows() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("summary.csv");
    fogsim()
        .args([
            "--fog", "9", "--iot", "12", "--cells", "3", "--ticks", "30", "run", "--policy",
            "hybrid", "--csv",
        ])
        .arg(&csv)
        .assert()
        .success();

    let body = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("policy,config,completion_rate"));
    assert!(lines[1].starts_with("hybrid,"));
}

#[test]
fn json_mode_emits_one_record_per_line() {
    let output = fogsim()
        .args([
            "--fog", "9", "--iot", "12", "--cells", "3", "--ticks", "30", "run", "--policy",
            "dynamic", "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let line = text.lines().next().unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["policy"], "dynamic");
    assert!(value["generated"].as_u64().unwrap() > 0);
}

#[test]
fn identical_seeds_give_identical_stdout() {
    let run = || {
        let output = fogsim()
            .args([
                "--fog", "9", "--iot", "12", "--cells", "3", "--ticks", "40", "--seed", "5",
                "run", "--policy", "hybrid",
            ])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(output).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn policies_command_lists_all_three() {
    fogsim()
        .arg("policies")
        .assert()
        .success()
        .stdout(contains("static"))
        .stdout(contains("dynamic"))
        .stdout(contains("hybrid"));
}

#[test]
fn config_set_persists_and_show_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fogsim.toml");

    fogsim()
        .args(["--config"])
        .arg(&path)
        .args(["config", "set", "ticks=123"])
        .assert()
        .success()
        .stdout(contains("Updated ticks"));

    fogsim()
        .args(["--config"])
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("ticks = 123"));
}

#[test]
fn unknown_config_key_is_a_runtime_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fogsim.toml");
    fogsim()
        .args(["--config"])
        .arg(&path)
        .args(["config", "set", "warp_factor=9"])
        .assert()
        .code(2)
        .stderr(contains("unknown config key"));
}
