use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const DESCRIPTOR: &str = include_str!("../docker-compose.yml");

fn compose_check(dir: &Path, extra: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_compose-check"))
        .arg("-f")
        .arg(dir.join("docker-compose.yml"))
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_clean_descriptor_exits_zero() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("docker-compose.yml"), DESCRIPTOR).unwrap();
    std::fs::write(dir.path().join(".env"), "DB_NAME=fit-check-db\n").unwrap();

    let output = compose_check(dir.path(), &["--order"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0), "{}", stdout);
    assert!(stdout.contains("1. mongo"));
    assert!(stdout.contains("2. app"));
}

#[test]
fn test_missing_env_file_exits_two() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("docker-compose.yml"), DESCRIPTOR).unwrap();

    let output = compose_check(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("warning: service 'app' needs env file '.env'"), "{}", stdout);

    let output = compose_check(dir.path(), &["--skip-env-files"]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_structural_issue_exits_one() {
    let dir = TempDir::new().unwrap();
    let broken = DESCRIPTOR.replace("mongo_data:/data/db", "other:/data/db");
    std::fs::write(dir.path().join("docker-compose.yml"), broken).unwrap();

    let output = compose_check(dir.path(), &["--skip-env-files"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("error: service 'mongo' mounts volume 'other'"));

    let output = compose_check(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("warning:"));
}

#[test]
fn test_unreadable_descriptor_exits_three() {
    let dir = TempDir::new().unwrap();
    let output = compose_check(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(3));

    std::fs::write(dir.path().join("docker-compose.yml"), "services: [").unwrap();
    let output = compose_check(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(3));
}
