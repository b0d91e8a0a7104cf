//! Tests for the hook-relay-cli library module.

use super::*;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

const TEST_SECRET_ENV: &str = "HOOK_RELAY_CLI_TEST_SECRET";
const TEST_TOKEN_ENV: &str = "HOOK_RELAY_CLI_TEST_TOKEN";

fn body_file(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_sign_defaults_secret_env() {
    let cli = parse(&["hook-relay", "sign", "--body", "payload.json"]);

    match cli.command {
        Commands::Sign { secret_env, body } => {
            assert_eq!(secret_env, "WEBHOOK_SECRET");
            assert_eq!(body, PathBuf::from("payload.json"));
        }
        other => panic!("Expected Sign command, got {:?}", other),
    }
}

#[test]
fn test_verify_requires_signature() {
    let result = Cli::try_parse_from(["hook-relay", "verify", "--body", "payload.json"]);
    assert!(result.is_err());
}

#[test]
fn test_seal_requires_token_env() {
    let result = Cli::try_parse_from(["hook-relay", "seal"]);
    assert!(result.is_err());

    let cli = parse(&["hook-relay", "seal", "--token-env", "TOKEN", "--iv", "00"]);
    match cli.command {
        Commands::Seal { token_env, iv, .. } => {
            assert_eq!(token_env, "TOKEN");
            assert_eq!(iv.as_deref(), Some("00"));
        }
        other => panic!("Expected Seal command, got {:?}", other),
    }
}

// ============================================================================
// Sign / Verify
// ============================================================================

#[test]
#[serial]
fn test_sign_matches_documented_vector() {
    std::env::set_var(TEST_SECRET_ENV, "It's a Secret to Everybody");
    let body = body_file(b"Hello, World!");

    let output = execute_sign(TEST_SECRET_ENV, body.path());
    std::env::remove_var(TEST_SECRET_ENV);

    assert_eq!(
        output.unwrap(),
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
    );
}

#[test]
#[serial]
fn test_verify_accepts_and_rejects() {
    std::env::set_var(TEST_SECRET_ENV, "secret");
    let body = body_file(b"{\"action\":\"closed\"}");
    let good = signature::sign(&SharedSecret::from("secret"), b"{\"action\":\"closed\"}");

    let valid = execute_verify(TEST_SECRET_ENV, body.path(), &good);
    let invalid = execute_verify(TEST_SECRET_ENV, body.path(), "sha256=00");
    std::env::remove_var(TEST_SECRET_ENV);

    assert!(valid.is_ok());
    let err = invalid.unwrap_err();
    assert!(matches!(err, CliError::VerificationFailed));
    assert_eq!(err.exit_code(), 1);
}

#[test]
#[serial]
fn test_missing_secret_env_is_reported() {
    std::env::remove_var(TEST_SECRET_ENV);
    let body = body_file(b"{}");

    let err = execute_sign(TEST_SECRET_ENV, body.path()).unwrap_err();

    assert!(matches!(err, CliError::MissingEnvironment { ref name } if name == TEST_SECRET_ENV));
}

#[test]
#[serial]
fn test_missing_body_file_is_io_error() {
    std::env::set_var(TEST_SECRET_ENV, "secret");
    let err = execute_sign(TEST_SECRET_ENV, Path::new("/nonexistent/body.json")).unwrap_err();
    std::env::remove_var(TEST_SECRET_ENV);

    assert!(matches!(err, CliError::Io(_)));
}

// ============================================================================
// Seal
// ============================================================================

#[test]
#[serial]
fn test_seal_output_decrypts_to_token() {
    std::env::set_var(TEST_SECRET_ENV, "seal-secret");
    std::env::set_var(TEST_TOKEN_ENV, "ghp_sealedToken");

    let output = execute_seal(TEST_SECRET_ENV, TEST_TOKEN_ENV, None);
    std::env::remove_var(TEST_SECRET_ENV);
    std::env::remove_var(TEST_TOKEN_ENV);

    let output = output.unwrap();
    let mut lines = output.lines();
    let ciphertext = lines
        .next()
        .unwrap()
        .strip_prefix("X-Encrypted-Token: ")
        .unwrap();
    let iv = lines.next().unwrap().strip_prefix("X-Token-IV: ").unwrap();
    assert_eq!(iv.len(), 32);

    let sealed = credential::EncryptedCredential::new(ciphertext, iv);
    let outcome = credential::decrypt(&SharedSecret::from("seal-secret"), &sealed).unwrap();
    assert_eq!(outcome.into_credential().expose_secret(), "ghp_sealedToken");
}

#[test]
#[serial]
fn test_seal_with_fixed_iv_is_deterministic() {
    std::env::set_var(TEST_SECRET_ENV, "seal-secret");
    std::env::set_var(TEST_TOKEN_ENV, "ghp_sealedToken");
    let iv = "000102030405060708090a0b0c0d0e0f";

    let first = execute_seal(TEST_SECRET_ENV, TEST_TOKEN_ENV, Some(iv));
    let second = execute_seal(TEST_SECRET_ENV, TEST_TOKEN_ENV, Some(iv));
    std::env::remove_var(TEST_SECRET_ENV);
    std::env::remove_var(TEST_TOKEN_ENV);

    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert!(first.ends_with(&format!("X-Token-IV: {}", iv)));
}

#[test]
fn test_parse_iv_rejects_bad_input() {
    assert!(matches!(
        parse_iv("zz"),
        Err(CliError::InvalidArgument { .. })
    ));
    assert!(matches!(
        parse_iv("0001"),
        Err(CliError::InvalidArgument { .. })
    ));
    assert_eq!(parse_iv(&"ab".repeat(16)).unwrap(), [0xab; 16]);
}

// ============================================================================
// Config
// ============================================================================

#[test]
#[serial]
fn test_config_prints_resolved_json() {
    std::env::remove_var(SECRET_ENV_VAR);
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("service.yaml");
    std::fs::write(&path, "server:\n  port: 9300\n").unwrap();

    let output = execute_config(&path).unwrap();

    let rendered: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(rendered["server"]["port"], 9300);
    assert_eq!(rendered["webhook"]["endpoint_path"], "/github-webhook");
    assert_eq!(rendered["webhook"]["trigger_policy"], "literal");
}

#[test]
#[serial]
fn test_config_reports_invalid_file_with_exit_code_3() {
    std::env::remove_var(SECRET_ENV_VAR);
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("service.yaml");
    std::fs::write(&path, "webhook:\n  require_signature: true\n").unwrap();

    let err = execute_config(&path).unwrap_err();

    assert!(matches!(err, CliError::Configuration(_)));
    assert_eq!(err.exit_code(), 3);
}
