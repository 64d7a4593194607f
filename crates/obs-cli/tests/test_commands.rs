//! Integration tests for the command implementations

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use obs_cli::cli::CliConfig;
use obs_cli::commands::check::{check_command, CheckArgs};
use obs_cli::commands::encode::{encode_command, EncodeArgs};
use obs_cli::commands::inspect::{decode_loader_text, inspect_command, InspectArgs, LoaderKind};
use obs_cli::commands::transform::{transform_command, TransformArgs};
use obs_cli::CliError;
use obs_pipeline::FallbackPolicy;
use obs_python::RenamePolicy;
use pretty_assertions::assert_eq;

const PROGRAM: &str = "\
def shout(text):
    return text.upper() + '!'

print(shout('hello'))
";

fn write_program(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn transform_args(input: PathBuf, level: u8) -> TransformArgs {
    TransformArgs {
        input,
        level: Some(level),
        output: None,
        policy: None,
        strict: false,
    }
}

#[tokio::test]
async fn test_transform_writes_next_to_input() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "app.py", PROGRAM);

    let output = transform_command(transform_args(input, 2), &CliConfig::default())
        .await
        .unwrap();

    assert_eq!(output, temp_dir.path().join("app_obf_l2.py"));
    let text = fs::read_to_string(&output).unwrap();
    assert!(!text.contains("shout"), "{text}");
    assert!(!text.contains("'hello'"), "{text}");
    assert!(text.contains("b64decode"));
}

#[tokio::test]
async fn test_transform_level_three_can_be_inspected() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "app.py", PROGRAM);
    let config = CliConfig::default();

    let level_two = transform_command(transform_args(input.clone(), 2), &config)
        .await
        .unwrap();
    let level_three = transform_command(transform_args(input, 3), &config)
        .await
        .unwrap();

    let loader = fs::read_to_string(&level_three).unwrap();
    let (kind, source) = decode_loader_text(&loader).unwrap();
    assert_eq!(kind, LoaderKind::Bytecode);
    assert_eq!(source, fs::read_to_string(level_two).unwrap());

    let recovered = temp_dir.path().join("recovered.py");
    let args = InspectArgs {
        input: level_three,
        output: Some(recovered.clone()),
    };
    inspect_command(args, &config).await.unwrap();
    assert_eq!(fs::read_to_string(recovered).unwrap(), source);
}

#[tokio::test]
async fn test_transform_with_explicit_output_and_policy() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "app.py", "def f(a):\n    return a\n");
    let output = temp_dir.path().join("out").join("renamed.py");

    let args = TransformArgs {
        input,
        level: Some(1),
        output: Some(output.clone()),
        policy: Some(RenamePolicy::Lexical),
        strict: false,
    };
    transform_command(args, &CliConfig::default()).await.unwrap();

    assert_eq!(
        fs::read_to_string(output).unwrap(),
        "def f(a):\n    return var_0001\n"
    );
}

#[tokio::test]
async fn test_transform_keeps_unparseable_input_unless_strict() {
    let temp_dir = TempDir::new().unwrap();
    let broken = "def broken(:\n    pass\n";
    let input = write_program(&temp_dir, "broken.py", broken);
    let mut config = CliConfig::default();
    config.input.require_valid_syntax = false;

    let output = transform_command(transform_args(input.clone(), 2), &config)
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(output).unwrap(), broken);

    let mut strict = transform_args(input, 2);
    strict.strict = true;
    let err = transform_command(strict, &config).await.unwrap_err();
    assert!(matches!(err, CliError::Transform(_)), "got {err:?}");
}

#[tokio::test]
async fn test_transform_applies_configured_abort_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "broken.py", "def broken(:\n");
    let mut config = CliConfig::default();
    config.input.require_valid_syntax = false;
    config.obfuscation.fallback = FallbackPolicy::Abort;

    let err = transform_command(transform_args(input, 1), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Transform(_)), "got {err:?}");
    assert!(!temp_dir.path().join("broken_obf_l1.py").exists());
}

#[tokio::test]
async fn test_transform_and_encode_refuse_invalid_programs() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "broken.py", "def broken(:\n");
    let config = CliConfig::default();

    let err = transform_command(transform_args(input.clone(), 2), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Diagnostic(_)), "got {err:?}");
    assert!(!temp_dir.path().join("broken_obf_l2.py").exists());

    let args = EncodeArgs {
        input,
        layers: Some(1),
        output: None,
    };
    let err = encode_command(args, &config).await.unwrap_err();
    assert!(matches!(err, CliError::Diagnostic(_)), "got {err:?}");

    let misplaced = write_program(&temp_dir, "misplaced.py", "break\n");
    let err = transform_command(transform_args(misplaced, 1), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Diagnostic(_)), "got {err:?}");
}

#[tokio::test]
async fn test_encode_round_trips_through_inspect() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "app.py", PROGRAM);

    let args = EncodeArgs {
        input,
        layers: Some(2),
        output: None,
    };
    let output = encode_command(args, &CliConfig::default()).await.unwrap();
    assert_eq!(output, temp_dir.path().join("app_obf_ml2.py"));

    let loader = fs::read_to_string(output).unwrap();
    let (kind, source) = decode_loader_text(&loader).unwrap();
    assert_eq!(kind, LoaderKind::MultiLayer);
    assert_eq!(source, PROGRAM);
}

#[tokio::test]
async fn test_encode_rejects_zero_layers() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "app.py", PROGRAM);

    let args = EncodeArgs {
        input,
        layers: Some(0),
        output: None,
    };
    let err = encode_command(args, &CliConfig::default()).await.unwrap_err();
    assert!(matches!(err, CliError::Encoding(_)), "got {err:?}");
}

#[tokio::test]
async fn test_check_reports_syntax_and_structure_errors() {
    let temp_dir = TempDir::new().unwrap();
    let config = CliConfig::default();

    let good = write_program(&temp_dir, "good.py", PROGRAM);
    check_command(CheckArgs { input: good }, &config).await.unwrap();

    let broken = write_program(&temp_dir, "broken.py", "x = (1,\n");
    match check_command(CheckArgs { input: broken }, &config).await {
        Err(CliError::Diagnostic(diagnostic)) => assert_eq!(diagnostic.code_name(), "syntax"),
        other => panic!("expected syntax diagnostic, got {other:?}"),
    }

    let misplaced = write_program(&temp_dir, "misplaced.py", "return 1\n");
    match check_command(CheckArgs { input: misplaced }, &config).await {
        Err(CliError::Diagnostic(diagnostic)) => {
            assert_eq!(diagnostic.code_name(), "structure")
        }
        other => panic!("expected structure diagnostic, got {other:?}"),
    }
}

#[tokio::test]
async fn test_inspect_rejects_plain_source() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_program(&temp_dir, "plain.py", PROGRAM);
    let args = InspectArgs {
        input,
        output: None,
    };
    let err = inspect_command(args, &CliConfig::default()).await.unwrap_err();
    assert!(matches!(err, CliError::Decode(_)), "got {err:?}");
}
