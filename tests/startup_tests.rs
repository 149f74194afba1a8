//! Tests for main.rs startup validation (JWT_SECRET, app URL, TTL) and the
//! generate-secret command.

use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

fn valid_secret() -> String {
    STANDARD.encode([42u8; 48])
}

/// Binary command with a clean environment and a throwaway database.
fn command(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_storefront-auth"));
    cmd.env_remove("JWT_SECRET")
        .env_remove("APP_URL")
        .env_remove("JWT_TTL")
        .args(["--database", dir.path().join("test.db").to_str().unwrap()])
        .stderr(Stdio::piped())
        .stdout(Stdio::piped());
    cmd
}

fn combined_output(output: &Output) -> String {
    // tracing logs to stdout by default
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Give the server a moment, then assert it is still running and stop it.
fn assert_still_running(mut child: Child) {
    std::thread::sleep(Duration::from_millis(500));

    match child.try_wait() {
        Ok(Some(status)) => {
            let output = child.wait_with_output().unwrap();
            panic!(
                "Server exited unexpectedly with status {:?}, output: {}",
                status,
                combined_output(&output)
            );
        }
        Ok(None) => {
            child.kill().ok();
        }
        Err(e) => {
            panic!("Error checking process status: {}", e);
        }
    }
}

#[test]
fn test_missing_jwt_secret_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir).output().expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("JWT_SECRET") && combined.contains("required"),
        "Should mention JWT_SECRET is required, got: {}",
        combined
    );
}

#[test]
fn test_short_jwt_secret_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .env("JWT_SECRET", STANDARD.encode([1u8; 16]))
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("fewer than 32 bytes"),
        "Should mention minimum length, got: {}",
        combined
    );
}

#[test]
fn test_non_base64_jwt_secret_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .env("JWT_SECRET", "this is definitely not base64 !!!!!!!!")
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("Invalid JWT secret"));
}

#[test]
fn test_http_non_localhost_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .env("JWT_SECRET", valid_secret())
        .args(["--app-url", "http://shop.example.com"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("HTTPS"),
        "Should mention HTTPS requirement, got: {}",
        combined
    );
}

#[test]
fn test_zero_ttl_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .env("JWT_SECRET", valid_secret())
        .args(["--jwt-ttl", "0"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("greater than zero"));
}

#[test]
fn test_jwt_secret_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .args(["--jwt-secret-file", "/nonexistent/path/to/secret"])
        .output()
        .expect("Failed to run binary");

    assert!(!output.status.success());
    assert!(combined_output(&output).contains("Failed to read JWT secret file"));
}

#[test]
fn test_starts_with_env_secret() {
    let dir = tempfile::tempdir().unwrap();
    let child = command(&dir)
        .env("JWT_SECRET", valid_secret())
        .args(["--port", "0"])
        .spawn()
        .expect("Failed to run binary");

    assert_still_running(child);
}

#[test]
fn test_starts_with_secret_file_and_https_url() {
    let dir = tempfile::tempdir().unwrap();
    let secret_file = dir.path().join("secret");
    std::fs::write(&secret_file, format!("{}\n", valid_secret())).unwrap();

    let child = command(&dir)
        .args([
            "--jwt-secret-file",
            secret_file.to_str().unwrap(),
            "--app-url",
            "https://shop.example.com",
            "--port",
            "0",
        ])
        .spawn()
        .expect("Failed to run binary");

    assert_still_running(child);
}

#[test]
fn test_generate_secret_prints_secret() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir)
        .arg("generate-secret")
        .output()
        .expect("Failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let secret = stdout.lines().last().unwrap();
    assert_eq!(STANDARD.decode(secret).unwrap().len(), 48);
}

#[test]
fn test_generate_secret_env_file() {
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join(".env");
    let env_path = env_file.to_str().unwrap();

    let output = command(&dir)
        .args(["generate-secret", "--env-file", env_path])
        .output()
        .expect("Failed to run binary");
    assert!(output.status.success());
    let first = std::fs::read_to_string(&env_file).unwrap();
    assert!(first.starts_with("JWT_SECRET="));

    // Existing entry without a flag is an error and leaves the file alone.
    let output = command(&dir)
        .args(["generate-secret", "--env-file", env_path])
        .output()
        .expect("Failed to run binary");
    assert!(!output.status.success());
    assert_eq!(std::fs::read_to_string(&env_file).unwrap(), first);

    let output = command(&dir)
        .args(["generate-secret", "--env-file", env_path, "--skip-if-present"])
        .output()
        .expect("Failed to run binary");
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(&env_file).unwrap(), first);

    let output = command(&dir)
        .args(["generate-secret", "--env-file", env_path, "--force"])
        .output()
        .expect("Failed to run binary");
    assert!(output.status.success());
    let replaced = std::fs::read_to_string(&env_file).unwrap();
    assert_ne!(replaced, first);
    assert_eq!(replaced.matches("JWT_SECRET=").count(), 1);
}
