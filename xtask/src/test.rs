use anyhow::{Result, bail};
use clap::Args;

use crate::ci::run_cargo;

#[derive(Args)]
pub struct TestArgs {
    /// Package to test
    #[arg(short, long)]
    package: Option<String>,

    /// Test name filter
    filter: Option<String>,
}

pub async fn run(args: TestArgs) -> Result<()> {
    println!("Running tests\n");

    let mut cmd_args = vec!["test"];
    match &args.package {
        Some(package) => {
            cmd_args.push("-p");
            cmd_args.push(package);
        }
        None => cmd_args.push("--workspace"),
    }
    cmd_args.push("--");
    if let Some(filter) = &args.filter {
        cmd_args.push(filter);
    }
    cmd_args.push("--nocapture");

    println!("Command: cargo {}\n", cmd_args.join(" "));

    let result = run_cargo(&cmd_args).await?;

    let mut summary = TestSummary::default();
    for line in result.stdout_lines() {
        summary.parse_line(line);
    }
    println!("\n{summary}");

    if !result.success() || summary.failed > 0 {
        bail!("Tests failed");
    }
    Ok(())
}

#[derive(Default)]
struct TestSummary {
    total: usize,
    passed: usize,
    failed: usize,
    ignored: usize,
}

impl TestSummary {
    fn parse_line(&mut self, line: &str) {
        if line.starts_with("test ") && line.contains(" ... ") {
            self.total += 1;
            if line.ends_with(" ... ok") {
                self.passed += 1;
            } else if line.ends_with(" ... FAILED") {
                self.failed += 1;
            } else if line.ends_with(" ... ignored") {
                self.ignored += 1;
            }
        }
    }
}

impl std::fmt::Display for TestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.total > 0 {
            write!(
                f,
                "Test Summary: {} total, {} passed, {} failed, {} ignored",
                self.total, self.passed, self.failed, self.ignored
            )
        } else {
            write!(f, "No test results captured")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = TestSummary::default();
        for line in [
            "running 3 tests",
            "test fanout::test_map ... ok",
            "test platform::test_reset ... FAILED",
            "test docker::test_lifecycle ... ignored",
            "test result: FAILED. 1 passed; 1 failed; 1 ignored",
        ] {
            summary.parse_line(line);
        }
        assert_eq!((summary.total, summary.passed, summary.failed, summary.ignored), (3, 1, 1, 1));
    }
}
