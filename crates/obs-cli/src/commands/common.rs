//! Input validation and output naming shared by the commands

use crate::diagnostics::{structure_error, syntax_error};
use crate::{cli::CliConfig, CliError, Result};
use obs_core::Error;
use obs_python::{check_structure, PythonFrontend, SourceUnit};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Substrings worth a warning before obfuscating a program. They are logged,
/// never rejected.
pub const SUSPICIOUS_PATTERNS: &[&str] = &[
    "import os.system",
    "import subprocess",
    "eval(",
    "exec(",
    "__import__",
    "open(",
    "compile(",
];

/// Checks existence, extension and size limits, then reads the file.
pub async fn read_source(path: &Path, config: &CliConfig) -> Result<String> {
    if !path.exists() {
        return Err(CliError::InvalidInput(format!(
            "Input file '{}' does not exist",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if !config
        .input
        .extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.') == extension)
    {
        return Err(CliError::InvalidInput(format!(
            "'{}' has an unsupported extension (allowed: {})",
            path.display(),
            config.input.extensions.join(", ")
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > config.input.max_file_size {
        return Err(CliError::InvalidInput(format!(
            "'{}' is {} bytes, larger than the {} byte limit",
            path.display(),
            metadata.len(),
            config.input.max_file_size
        )));
    }

    let source = tokio::fs::read_to_string(path).await?;
    debug!(path = %path.display(), bytes = source.len(), "read input");
    Ok(source)
}

/// Parses `source` and runs the structural checks the bytecode serializer
/// applies, turning failures into source diagnostics.
pub fn validate_program(path: &Path, source: &str) -> Result<SourceUnit> {
    let name = path.display().to_string();
    let mut unit = match PythonFrontend::new().parse(source, Some(path)) {
        Ok(unit) => unit,
        Err(Error::Parse { message, offset }) => {
            return Err(CliError::Diagnostic(Box::new(syntax_error(
                &name, source, offset.0, message,
            ))));
        }
        Err(err) => return Err(err.into()),
    };

    match check_structure(&mut unit.suite) {
        Ok(()) => Ok(unit),
        Err(Error::Compile(message)) => {
            Err(CliError::Diagnostic(Box::new(structure_error(message))))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn suspicious_patterns(source: &str) -> Vec<&'static str> {
    SUSPICIOUS_PATTERNS
        .iter()
        .copied()
        .filter(|pattern| source.contains(pattern))
        .collect()
}

/// Checks a program about to be obfuscated: warns about suspicious patterns
/// and, unless disabled, refuses input that does not compile.
pub fn screen_program(path: &Path, source: &str, config: &CliConfig) -> Result<()> {
    for pattern in suspicious_patterns(source) {
        warn!(path = %path.display(), pattern, "input contains a suspicious pattern");
    }
    if config.input.require_valid_syntax {
        validate_program(path, source)?;
    }
    Ok(())
}

/// `dir/name.py` with suffix `obf_l2` becomes `dir/name_obf_l2.py`.
pub fn derived_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    input.with_file_name(file_name)
}

pub async fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    debug!(path = %path.display(), bytes = text.len(), "wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_derived_output_path() {
        assert_eq!(
            derived_output_path(Path::new("src/app.py"), "obf_l2"),
            PathBuf::from("src/app_obf_l2.py")
        );
        assert_eq!(
            derived_output_path(Path::new("script"), "obf_ml3"),
            PathBuf::from("script_obf_ml3")
        );
    }

    #[tokio::test]
    async fn test_read_source_validates_input() {
        let temp_dir = TempDir::new().unwrap();
        let config = CliConfig::default();

        let missing = temp_dir.path().join("missing.py");
        let err = read_source(&missing, &config).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let text_file = temp_dir.path().join("notes.txt");
        std::fs::write(&text_file, "x = 1\n").unwrap();
        let err = read_source(&text_file, &config).await.unwrap_err();
        assert!(err.to_string().contains("unsupported extension"));

        let mut small = CliConfig::default();
        small.input.max_file_size = 4;
        let script = temp_dir.path().join("app.py");
        std::fs::write(&script, "x = 1\n").unwrap();
        let err = read_source(&script, &small).await.unwrap_err();
        assert!(err.to_string().contains("byte limit"));

        assert_eq!(read_source(&script, &config).await.unwrap(), "x = 1\n");
    }

    #[test]
    fn test_suspicious_patterns_are_reported() {
        let source = "import subprocess\ndata = open('f').read()\nexec(data)\n";
        assert_eq!(
            suspicious_patterns(source),
            vec!["import subprocess", "exec(", "open("]
        );
        assert!(suspicious_patterns("print('hi')\n").is_empty());
    }

    #[test]
    fn test_screen_program_honours_the_syntax_flag() {
        let path = Path::new("broken.py");
        let broken = "def broken(:\n";
        let mut config = CliConfig::default();

        match screen_program(path, broken, &config) {
            Err(CliError::Diagnostic(diagnostic)) => assert_eq!(diagnostic.code_name(), "syntax"),
            other => panic!("expected syntax diagnostic, got {other:?}"),
        }
        assert!(screen_program(path, "eval('1')\n", &config).is_ok());

        config.input.require_valid_syntax = false;
        assert!(screen_program(path, broken, &config).is_ok());
    }
}
