use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use obs_bytecode::{extract_unit, BytecodeError, CompileToLoadableUnit, LoadableUnit};
use obs_core::Level;
use obs_layers::decode_loader;
use obs_pipeline::{
    multi_layer_encode, transform, FallbackPolicy, PipelineOptions, SkipReason, StageStatus,
    TransformPipeline,
};
use obs_python::RenamePolicy;
use pretty_assertions::assert_eq;

const SOURCE: &str = "\
# greeting script
def greet(name):
    message = 'hello, ' + name
    return message

users = ['ada', 'linus']
for user in users:
    print(greet(user))
";

struct NoRuntime;

impl CompileToLoadableUnit for NoRuntime {
    fn runtime(&self) -> &'static str {
        "none"
    }

    fn compile(&self, _source: &str) -> Result<LoadableUnit, BytecodeError> {
        Err(BytecodeError::compile("runtime unavailable"))
    }
}

fn decoded_literals(text: &str) -> Vec<String> {
    text.split("b64decode('")
        .skip(1)
        .filter_map(|rest| rest.split('\'').next())
        .map(|encoded| String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap())
        .collect()
}

#[test]
fn test_level_zero_returns_input_unchanged() {
    let outcome = transform(SOURCE, 0);
    assert_eq!(outcome.text, SOURCE);
    assert_eq!(outcome.applied_level, Level::NONE);
    assert!(outcome
        .stages
        .iter()
        .all(|report| report.status == StageStatus::Skipped(SkipReason::NotRequested)));
}

#[test]
fn test_level_one_renames_identifiers() {
    let outcome = transform(SOURCE, 1);
    assert_eq!(outcome.applied_level, Level::RENAME);
    for name in ["greet", "message", "users", "user"] {
        let pattern = format!("{name}(");
        let assignment = format!("{name} =");
        assert!(
            !outcome.text.contains(&pattern) && !outcome.text.contains(&assignment),
            "{name} survived:\n{}",
            outcome.text
        );
    }
    assert!(outcome.text.contains("var_0001"));
    assert!(!outcome.text.contains("# greeting script"));
}

#[test]
fn test_level_two_wraps_strings_that_decode_back() {
    let outcome = transform(SOURCE, 2);
    assert_eq!(outcome.applied_level, Level::STRINGS);
    assert!(!outcome.text.contains("'ada'"));
    assert_eq!(decoded_literals(&outcome.text), vec!["hello, ", "ada", "linus"]);
}

#[test]
fn test_level_three_embeds_the_level_two_program() {
    let level_two = transform(SOURCE, 2).text;
    let outcome = transform(SOURCE, 3);
    assert_eq!(outcome.applied_level, Level::BYTECODE);
    assert_eq!(outcome.text.lines().count(), 2);
    let unit = extract_unit(&outcome.text).unwrap();
    assert_eq!(unit.source().unwrap(), level_two);
}

#[test]
fn test_levels_above_max_behave_like_max() {
    let outcome = transform(SOURCE, 7);
    assert_eq!(outcome.requested, Level(7));
    assert_eq!(outcome.applied_level, Level::BYTECODE);
    assert!(outcome.is_complete());
}

#[test]
fn test_unparseable_input_is_returned_unchanged() {
    let broken = "def broken(:\n    return 'x'\n";
    for level in 0..=3u8 {
        let outcome = transform(broken, level);
        assert_eq!(outcome.text, broken, "level {level}");
        assert_eq!(outcome.applied_level, Level::NONE);
    }
    let outcome = transform(broken, 3);
    assert_eq!(outcome.diagnostics.len(), 3);
    let kinds = outcome
        .stages
        .iter()
        .map(|report| match &report.status {
            StageStatus::Skipped(SkipReason::Failed { kind, .. }) => *kind,
            other => panic!("unexpected status {other:?}"),
        })
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["parse", "parse", "compile"]);
}

#[test]
fn test_lone_surrogate_literals_are_kept_verbatim() {
    let source = "s = '\\ud800'\nprint(len(s), ascii(s))\n";
    for level in 1..=3u8 {
        let outcome = transform(source, level);
        assert_eq!(outcome.text, source, "level {level}");
        assert_eq!(outcome.applied_level, Level::NONE);
        assert!(!outcome.is_complete());
        match &outcome.stages[0].status {
            StageStatus::Skipped(SkipReason::Failed { kind, .. }) => {
                assert_eq!(*kind, "regeneration")
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    let strict = TransformPipeline::default();
    let err = strict.try_transform(source, 1).unwrap_err();
    assert_eq!(err.stage, "identifier-renamer");
}

#[test]
fn test_strict_mode_reports_the_failing_stage() {
    let pipeline = TransformPipeline::default();
    let err = pipeline.try_transform("def broken(:\n", 2).unwrap_err();
    assert_eq!(err.stage, "identifier-renamer");

    let strict = TransformPipeline::new(PipelineOptions::default().with_fallback(FallbackPolicy::Abort));
    assert!(strict.run("def broken(:\n", 1).is_err());
    assert!(strict.run(SOURCE, 1).is_ok());
}

#[test]
fn test_failing_compiler_keeps_level_two_output() {
    let pipeline = TransformPipeline::with_compiler(PipelineOptions::default(), NoRuntime);
    let outcome = pipeline.transform(SOURCE, 3);
    assert_eq!(outcome.text, transform(SOURCE, 2).text);
    assert_eq!(outcome.applied_level, Level::STRINGS);
    assert!(!outcome.is_complete());
    assert_eq!(outcome.diagnostics[0].code.as_deref(), Some("compile"));
}

#[test]
fn test_lexical_policy_is_selectable() {
    let pipeline =
        TransformPipeline::new(PipelineOptions::default().with_rename_policy(RenamePolicy::Lexical));
    let outcome = pipeline.transform("def f(a):\n    return a\n", 1);
    assert_eq!(outcome.text, "def f(a):\n    return var_0001\n");
}

#[test]
fn test_pipeline_is_shareable_across_threads() {
    let pipeline = TransformPipeline::default();
    let outputs = std::thread::scope(|scope| {
        let handles = (0..4)
            .map(|_| scope.spawn(|| pipeline.transform(SOURCE, 2).text))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_multi_layer_round_trip() {
    let output = multi_layer_encode("print('hi')", 2).unwrap();
    assert_eq!(output.keys.len(), 2);
    assert_eq!(decode_loader(&output.loader).unwrap(), "print('hi')");
    assert!(multi_layer_encode("print('hi')", 0).is_err());
}
