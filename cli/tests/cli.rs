//! End-to-end tests for the `fibb-ledger` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FLAT_WALLET: &str = r#"{
    "fibbTokens": 15,
    "enhancedTokens": 0,
    "researchTokens": 0,
    "subsFibb": 5,
    "paidFibb": 10,
    "subsEnhanced": 0,
    "paidEnhanced": 0,
    "subsResearch": 0,
    "paidResearch": 0
}"#;

const NESTED_WALLET: &str = r#"{
    "fibb": {"monthly": 2, "purchased": 1},
    "enhanced": {"monthly": 0, "purchased": 0},
    "research": {"monthly": 7, "purchased": 3}
}"#;

#[allow(deprecated)]
fn ledger_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fibb-ledger").expect("Failed to find fibb-ledger binary");
    // Keep the user's config out of the tests
    cmd.arg("--config").arg(dir.path().join("config.toml"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_wallet(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("wallet.json");
    fs::write(&path, contents).expect("Failed to write wallet");
    path
}

#[test]
fn test_consume_prints_new_wallet() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, FLAT_WALLET);

    ledger_cmd(&dir)
        .args(["consume", "--type", "fibb", "--amount", "7"])
        .arg(&wallet)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"subsFibb\": 0"))
        .stdout(predicate::str::contains("\"paidFibb\": 8"));

    // Without --write the file is untouched
    assert_eq!(fs::read_to_string(&wallet).unwrap(), FLAT_WALLET);
}

#[test]
fn test_consume_insufficient_exits_3() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, NESTED_WALLET);

    ledger_cmd(&dir)
        .args(["consume", "--type", "fibb", "--amount", "5"])
        .arg(&wallet)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Insufficient fibb tokens"));
}

#[test]
fn test_reset_write_keeps_shape() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, NESTED_WALLET);

    ledger_cmd(&dir)
        .args(["reset", "--write"])
        .arg(&wallet)
        .assert()
        .success();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&wallet).unwrap()).unwrap();
    assert_eq!(written["research"]["monthly"], 0);
    assert_eq!(written["research"]["purchased"], 3);
    assert_eq!(written["fibb"]["purchased"], 1);
}

#[test]
fn test_write_keeps_other_keys() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(
        &dir,
        r#"{
            "userId": "u1",
            "version": 4,
            "fibbTokens": 15,
            "enhancedTokens": 0,
            "researchTokens": 0,
            "subsFibb": 5,
            "paidFibb": 10,
            "subsEnhanced": 0,
            "paidEnhanced": 0,
            "subsResearch": 0,
            "paidResearch": 0
        }"#,
    );

    ledger_cmd(&dir)
        .args(["consume", "--type", "fibb", "--amount", "1", "--write"])
        .arg(&wallet)
        .assert()
        .success();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&wallet).unwrap()).unwrap();
    assert_eq!(written["userId"], "u1");
    assert_eq!(written["version"], 4);
    assert_eq!(written["subsFibb"], 4);
    assert_eq!(written["paidFibb"], 10);
    assert_eq!(written["fibbTokens"], 14);
}

#[test]
fn test_cost_rounds_up_packs() {
    let dir = TempDir::new().unwrap();
    ledger_cmd(&dir)
        .args(["cost", "--type", "enhanced", "--quantity", "11", "--tier", "basic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$9.98 (2 packs)"));
}

#[test]
fn test_price_unavailable_exits_3() {
    let dir = TempDir::new().unwrap();
    ledger_cmd(&dir)
        .args(["price", "--type", "fibb", "--tier", "basic"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No fibb price configured"));
}

#[test]
fn test_negative_amount_rejected() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, NESTED_WALLET);

    ledger_cmd(&dir)
        .args(["refill", "--type", "fibb", "--amount=-3"])
        .arg(&wallet)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_wallet_file() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, r#"{"subsFibb": -1}"#);

    ledger_cmd(&dir)
        .arg("show")
        .arg(&wallet)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid wallet"));
}

#[test]
fn test_config_file_overrides_price() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[pricing.fibb]\nname = \"Fibb Token\"\npack_size = 1\npricing = { basic = 2500 }\n",
    )
    .unwrap();

    ledger_cmd(&dir)
        .args(["price", "--type", "fibb", "--tier", "basic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$25.00"));
}

#[test]
fn test_show_and_billing() {
    let dir = TempDir::new().unwrap();
    let wallet = write_wallet(&dir, NESTED_WALLET);

    ledger_cmd(&dir)
        .arg("show")
        .arg(&wallet)
        .assert()
        .success()
        .stdout(predicate::str::contains("research"))
        .stdout(predicate::str::contains("13"));

    ledger_cmd(&dir)
        .arg("billing")
        .assert()
        .success()
        .stdout(predicate::str::contains("Enhanced Token Pack"))
        .stdout(predicate::str::contains("unavailable"));
}
