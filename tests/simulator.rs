#![cfg(unix)]

use noc_sweep::decoder::ReportDecoder;
use noc_sweep::error::SimulatorError;
use noc_sweep::simulator::{ExternalSimulator, Simulator};
use noc_sweep_common::{ParamKey, SimulatorParams};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

const REPORT: &str = "cat <<'EOF'
Incoming packets 324
**************************************************
routers: 81
**************************************************
**************************************************
total finished:       300
average Delay:        41.25
total mem power:      1.5e-02
total crossbar power: 2.5e-03
total arbiter power:  1e-04
total link power:     4.0e-02
total power:          5.76e-02
**************************************************
EOF";

// Scripts are created and executed from a single test so no concurrent fork
// can hold one of them open for writing.
#[test]
fn external_simulator_runs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path();
    let trace = dir.join("bench");
    fs::write(&trace, "1 0 0 1 1 5\n").expect("write trace");

    // Arguments arrive as separate entries in declared order, report decodes.
    let args_file = dir.join("args.txt");
    let echo = script(
        dir,
        "echo_sim",
        &format!("for a in \"$@\"; do echo \"$a\"; done > '{}'\n{}", args_file.display(), REPORT),
    );
    let params = SimulatorParams::default().with(ParamKey::LinkLength, 200);
    let output = ExternalSimulator::new(&echo).simulate(&params, &trace).expect("simulator succeeds");
    let report = ReportDecoder::default().decode(&output).expect("report decodes");
    assert_eq!(report.total_packets, 324);
    assert_eq!(report.finished_packets, 300);

    let args = fs::read_to_string(&args_file).expect("args recorded");
    let mut expected: Vec<String> = params.to_args();
    expected.push("-I".to_string());
    expected.push(trace.display().to_string());
    assert_eq!(args.lines().collect::<Vec<_>>(), expected);
    assert_eq!(&expected[..4], ["-A", "9", "-c", "2"]);
    assert_eq!(&expected[12..14], ["-L", "200"]);

    // A non-zero exit is surfaced with its stderr instead of being decoded.
    let failing = script(dir, "failing_sim", "echo partial\necho 'bad trace' >&2\nexit 3");
    match ExternalSimulator::new(&failing).simulate(&params, &trace) {
        Err(SimulatorError::Failed { code, stderr }) => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "bad trace");
        }
        other => panic!("expected a failed run, got {:?}", other),
    }

    // The raw runner still hands back everything that was captured.
    let output = ExternalSimulator::new(&failing).run(&params, &trace).expect("runs");
    assert!(!output.status.success());
    assert_eq!(output.stdout, "partial\n");

    // A hung simulator is killed once the timeout expires.
    let hung = script(dir, "hung_sim", "exec sleep 30");
    let simulator = ExternalSimulator::new(&hung).with_timeout(Some(Duration::from_millis(200)));
    match simulator.run(&params, &trace) {
        Err(SimulatorError::Timeout { limit }) => assert_eq!(limit, Duration::from_millis(200)),
        other => panic!("expected a timeout, got {:?}", other),
    }

    let missing = dir.join("no_such_simulator");
    match ExternalSimulator::new(&missing).simulate(&params, &trace) {
        Err(SimulatorError::Spawn { executable, .. }) => assert_eq!(executable, missing),
        other => panic!("expected a spawn failure, got {:?}", other),
    }
}
