pub(crate) use super::*;
use std::sync::Mutex;

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{i}")).collect()
}

fn test_rows(n: usize) -> Matrix<f32> {
    let data = (0..n * 3).map(|v| v as f32 * 0.1 - 1.0).collect();
    Matrix::from_vec(n, 3, data).expect("n x 3")
}

/// Records the steps it was asked to run and fails at `fail_at`.
struct ScriptedCompiler {
    fail_at: Option<CompileStep>,
    seen: Mutex<Vec<CompileStep>>,
}

impl ScriptedCompiler {
    fn new(fail_at: Option<CompileStep>) -> Self {
        Self {
            fail_at,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<CompileStep> {
        self.seen.lock().expect("not poisoned").clone()
    }
}

impl CircuitCompiler for ScriptedCompiler {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run_step(&self, step: CompileStep, _: &ZkmlPaths, _: &VisibilitySettings) -> Result<()> {
        self.seen.lock().expect("not poisoned").push(step);
        if self.fail_at == Some(step) {
            return Err(PipelineError::Other("step rejected".to_string()));
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json")
}

#[test]
fn test_input_files_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let net = FeedForwardNet::new(3, 4, 2, 1);
    let x = test_rows(25);
    let artifacts = ArtifactExporter::new(dir.path().join("zkml"))
        .export(&net, &names(3), &x, None)
        .expect("export");
    assert!(!artifacts.compiled);
    assert_eq!(artifacts.proof_rows, 25);

    let input: BatchInput =
        serde_json::from_value(read_json(&artifacts.paths.input_data())).expect("schema");
    assert_eq!(input.input_data, vec![x.row_slice(0).to_vec()]);

    let cal: FlatInput =
        serde_json::from_value(read_json(&artifacts.paths.cal_data())).expect("schema");
    assert_eq!(cal.input_data.len(), 20 * 3);
    assert_eq!(&cal.input_data[..3], x.row_slice(0));

    let proof: BatchInput =
        serde_json::from_value(read_json(&artifacts.paths.proof_data())).expect("schema");
    assert_eq!(proof.input_data.len(), 25);
    assert_eq!(proof.input_data[24], x.row_slice(24).to_vec());

    let graph = OnnxModel::from_file(artifacts.paths.model()).expect("onnx");
    assert_eq!(graph.feature_names(), Some(names(3)));
}

#[test]
fn test_calibration_rows_capped_by_test_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let net = FeedForwardNet::new(3, 4, 1, 1);
    let artifacts = ArtifactExporter::new(dir.path())
        .with_calibration_rows(20)
        .export(&net, &names(3), &test_rows(4), None)
        .expect("export");
    let cal: FlatInput =
        serde_json::from_value(read_json(&artifacts.paths.cal_data())).expect("schema");
    assert_eq!(cal.input_data.len(), 12);
}

#[test]
fn test_all_steps_run_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let compiler = ScriptedCompiler::new(None);
    let artifacts = ArtifactExporter::new(dir.path())
        .export(
            &FeedForwardNet::new(3, 4, 1, 1),
            &names(3),
            &test_rows(2),
            Some(&compiler as &dyn CircuitCompiler),
        )
        .expect("export");
    assert!(artifacts.compiled);
    assert_eq!(compiler.seen(), CompileStep::ALL.to_vec());
}

#[test]
fn test_failed_step_aborts_remaining() {
    let dir = tempfile::tempdir().expect("tempdir");
    let compiler = ScriptedCompiler::new(Some(CompileStep::Calibration));
    let err = ArtifactExporter::new(dir.path())
        .export(
            &FeedForwardNet::new(3, 4, 1, 1),
            &names(3),
            &test_rows(2),
            Some(&compiler as &dyn CircuitCompiler),
        )
        .expect_err("calibration fails");
    match err {
        PipelineError::Compilation { step, message } => {
            assert_eq!(step, "calibration");
            assert!(message.contains("step rejected"));
        }
        other => panic!("expected Compilation, got {other:?}"),
    }
    assert_eq!(
        compiler.seen(),
        vec![CompileStep::Settings, CompileStep::Calibration]
    );
}

#[test]
fn test_empty_test_partition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ArtifactExporter::new(dir.path())
        .export(&FeedForwardNet::new(3, 4, 1, 1), &names(3), &Matrix::zeros(0, 3), None)
        .expect_err("empty");
    assert!(matches!(err, PipelineError::Schema { .. }));
}

#[test]
fn test_default_visibility() {
    let v = VisibilitySettings::default();
    assert_eq!(
        (v.input, v.output, v.param),
        (Visibility::Public, Visibility::Public, Visibility::Fixed)
    );
}

#[test]
fn test_ezkl_arguments() {
    let paths = ZkmlPaths::new("/out/zkml");
    let vis = VisibilitySettings::default();
    let settings = EzklCli::args(CompileStep::Settings, &paths, &vis);
    assert_eq!(settings[0], "gen-settings");
    assert!(settings.windows(2).any(|w| w == ["--param-visibility", "fixed"]));
    let calibrate = EzklCli::args(CompileStep::Calibration, &paths, &vis);
    assert_eq!(calibrate[0], "calibrate-settings");
    assert!(calibrate.windows(2).any(|w| w == ["--target", "resources"]));
    assert!(calibrate.contains(&"/out/zkml/cal_data.json".to_string()));
    let compile = EzklCli::args(CompileStep::Compile, &paths, &vis);
    assert_eq!(compile[0], "compile-circuit");
    assert!(compile.contains(&"/out/zkml/network.ezkl".to_string()));
}

#[test]
fn test_missing_ezkl_binary_fails_settings_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let compiler = EzklCli::new(dir.path().join("no-such-ezkl"));
    let err = compile_circuit(&compiler, &ZkmlPaths::new(dir.path()), &VisibilitySettings::default())
        .expect_err("binary missing");
    assert!(matches!(err, PipelineError::Compilation { ref step, .. } if step == "settings"));
}

#[cfg(unix)]
#[test]
fn test_ezkl_exit_status_drives_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = ZkmlPaths::new(dir.path());
    let vis = VisibilitySettings::default();
    compile_circuit(&EzklCli::new("true"), &paths, &vis).expect("true succeeds");
    let err = compile_circuit(&EzklCli::new("false"), &paths, &vis).expect_err("false fails");
    assert!(matches!(err, PipelineError::Compilation { ref step, .. } if step == "settings"));
}
