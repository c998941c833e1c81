//! Run summary, verdict and console report.

use std::io::{self, Write};
use std::process::ExitCode;

use crate::harness::AttemptResult;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every artifact passed.
    Passed,
    /// At least one artifact failed.
    Failed,
    /// Discovery found nothing to test.
    NoArtifacts,
    /// The operator stopped the run.
    Interrupted,
}

/// All attempt results of a run plus what was left undone.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    results: Vec<AttemptResult>,
    interrupted: bool,
    skipped: usize,
}

impl RunSummary {
    pub fn new(results: Vec<AttemptResult>) -> Self {
        Self {
            results,
            interrupted: false,
            skipped: 0,
        }
    }

    /// Summary for a run whose discovery came back empty.
    pub fn no_artifacts() -> Self {
        Self::default()
    }

    /// Mark the run as interrupted with `skipped` artifacts never attempted.
    pub fn interrupted(mut self, skipped: usize) -> Self {
        self.interrupted = true;
        self.skipped = skipped;
        self
    }

    pub fn results(&self) -> &[AttemptResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Failed attempts, sorted by artifact path for stable output.
    pub fn failures(&self) -> Vec<&AttemptResult> {
        let mut failures: Vec<&AttemptResult> = self.results.iter().filter(|r| !r.success).collect();
        failures.sort_by(|a, b| a.artifact.cmp(&b.artifact));
        failures
    }

    pub fn verdict(&self) -> Verdict {
        if self.interrupted {
            Verdict::Interrupted
        } else if self.results.is_empty() {
            Verdict::NoArtifacts
        } else if self.results.iter().any(|r| !r.success) {
            Verdict::Failed
        } else {
            Verdict::Passed
        }
    }

    /// Process exit status: 0 only when every artifact passed.
    pub fn exit_status(&self) -> u8 {
        match self.verdict() {
            Verdict::Passed => 0,
            Verdict::Failed | Verdict::NoArtifacts => 1,
            Verdict::Interrupted => 130,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Write the summary line, then every failure's full log in its own block.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let failures = self.failures();

        for failure in &failures {
            let path = failure.artifact.display();
            writeln!(
                out,
                "==== FAIL {path} ({}, port {}) ====",
                failure.behavior, failure.port
            )?;
            out.write_all(failure.log.as_bytes())?;
            if !failure.log.ends_with('\n') {
                writeln!(out)?;
            }
            writeln!(out, "==== END {path} ====")?;
            writeln!(out)?;
        }

        match self.verdict() {
            Verdict::Passed => writeln!(out, "All {} artifacts passed.", self.total()),
            Verdict::Failed => writeln!(
                out,
                "{}/{} artifacts failed.",
                failures.len(),
                self.total()
            ),
            Verdict::NoArtifacts => writeln!(out, "No artifacts found; nothing was tested."),
            Verdict::Interrupted => writeln!(
                out,
                "Run interrupted: {} tested, {} failed, {} not attempted.",
                self.total(),
                failures.len(),
                self.skipped
            ),
        }
    }
}
