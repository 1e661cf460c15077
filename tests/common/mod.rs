#![allow(dead_code)]

use std::env;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use allocdiff::{run, RunStats, TrackerConfig};

/// Prefix used by the hand-written traces in these tests.
pub const TAG: &str = "TAG: ";

/// Config whose polling window never fires during a test run, so the
/// report only depends on the input.
pub fn quiet_config(prefix: &str) -> TrackerConfig {
    TrackerConfig::default()
        .with_prefix(prefix)
        .with_poll_interval(Duration::from_secs(60))
}

/// Feed `lines` through a full run and return the report text.
pub fn run_lines(lines: &[&str], config: &TrackerConfig) -> (String, RunStats) {
    let mut input = lines.join("\n");
    input.push('\n');

    let mut out = Vec::new();
    let stats = run(Cursor::new(input), &mut out, config).expect("run succeeds");
    (String::from_utf8(out).expect("report is UTF-8"), stats)
}

/// Compare a report against `tests/golden/<name>`.
///
/// Run with `ALLOCDIFF_BLESS=1` to rewrite the stored report instead.
pub fn check_golden(name: &str, report: &str) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/golden")
        .join(name);

    if env::var_os("ALLOCDIFF_BLESS").is_some() {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, report).unwrap();
        return;
    }

    let stored = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("cannot read golden report {}: {err}", path.display()));

    let mut stored_lines = stored.lines();
    let mut report_lines = report.lines();
    for number in 1.. {
        match (stored_lines.next(), report_lines.next()) {
            (None, None) => break,
            (want, got) if want == got => {}
            (want, got) => panic!(
                "{} differs at line {number}\n  golden: {want:?}\n  report: {got:?}\n\
                 (ALLOCDIFF_BLESS=1 rewrites it)",
                path.display()
            ),
        }
    }
}
