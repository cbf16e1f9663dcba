// src/generate.rs

use glob::{glob, Pattern};
use std::{
    fs, io,
    path::{Path, PathBuf},
    process::Command,
    time::Instant,
};
use tracing::{debug, error, info, instrument};

use crate::error::{PrepError, Result};

/// Exit status and captured streams of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        if !self.stderr.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(self.stderr.trim_end());
        }
        out
    }
}

/// Runs an external program to completion.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> io::Result<ProcessOutput>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> io::Result<ProcessOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let out = cmd.output()?;
        Ok(ProcessOutput {
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Builds and runs dbgen, then moves its `.tbl` files into the dataset directory.
pub struct Generator<R: ProcessRunner> {
    generator_dir: PathBuf,
    runner: R,
}

impl Generator<SystemRunner> {
    pub fn system(generator_dir: impl Into<PathBuf>) -> Self {
        Self::new(generator_dir, SystemRunner)
    }
}

impl<R: ProcessRunner> Generator<R> {
    pub fn new(generator_dir: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            generator_dir: generator_dir.into(),
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Returns the relocated raw files, sorted by path.
    #[instrument(level = "info", skip(self, output_dir), fields(dir = %self.generator_dir.display()))]
    pub fn generate(&self, scale_factor: u32, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let start = Instant::now();

        let dir = self.generator_dir.to_string_lossy().into_owned();
        self.run_step("build", "make", &["-C".into(), dir, "dbgen".into()], None)?;

        self.run_step(
            "run",
            "./dbgen",
            &["-vf".into(), "-s".into(), scale_factor.to_string()],
            Some(&self.generator_dir),
        )?;

        let moved = self.relocate(output_dir)?;
        info!(
            files = moved.len(),
            elapsed = ?start.elapsed(),
            "generated tables at scale factor {}",
            scale_factor
        );
        Ok(moved)
    }

    fn run_step(
        &self,
        step: &str,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<ProcessOutput> {
        debug!(step, program, ?args, "running generator step");
        let out = self
            .runner
            .run(program, args, cwd)
            .map_err(|e| PrepError::Generation {
                step: step.to_string(),
                code: None,
                output: format!("failed to spawn {}: {}", program, e),
            })?;

        if !out.success() {
            error!(step, code = ?out.code, "generator step failed");
            return Err(PrepError::Generation {
                step: step.to_string(),
                code: out.code,
                output: out.combined(),
            });
        }
        Ok(out)
    }

    fn relocate(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(output_dir)
            .map_err(|e| PrepError::io(format!("creating {}", output_dir.display()), e))?;

        let pattern = format!(
            "{}/*.tbl",
            Pattern::escape(&self.generator_dir.to_string_lossy())
        );
        let mut produced: Vec<PathBuf> = glob(&pattern)
            .map_err(|e| PrepError::Config(format!("bad generator directory pattern: {}", e)))?
            .filter_map(|entry| entry.ok())
            .collect();
        produced.sort();

        if produced.is_empty() {
            return Err(PrepError::Generation {
                step: "relocate".into(),
                code: Some(0),
                output: format!("no .tbl files in {}", self.generator_dir.display()),
            });
        }

        let mut moved = Vec::with_capacity(produced.len());
        for src in produced {
            let Some(name) = src.file_name() else {
                continue;
            };
            let dst = output_dir.join(name);
            move_file(&src, &dst)
                .map_err(|e| PrepError::io(format!("moving {} to {}", src.display(), dst.display()), e))?;
            debug!(from = %src.display(), to = %dst.display(), "moved raw table");
            moved.push(dst);
        }
        Ok(moved)
    }
}

/// Rename, falling back to copy + remove when crossing filesystems.
fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records every call; optionally fails one program and drops `.tbl`
    /// files into the working directory when dbgen "runs".
    struct FakeRunner {
        calls: Mutex<Vec<(String, Vec<String>, Option<PathBuf>)>>,
        fail_program: Option<&'static str>,
        tables: Vec<&'static str>,
    }

    impl FakeRunner {
        fn new(tables: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_program: None,
                tables,
            }
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[String],
            cwd: Option<&Path>,
        ) -> io::Result<ProcessOutput> {
            self.calls.lock().unwrap().push((
                program.to_string(),
                args.to_vec(),
                cwd.map(Path::to_path_buf),
            ));
            if self.fail_program == Some(program) {
                return Ok(ProcessOutput {
                    code: Some(2),
                    stdout: String::new(),
                    stderr: "boom".into(),
                });
            }
            if program == "./dbgen" {
                let dir = cwd.expect("dbgen runs in its own dir");
                for t in &self.tables {
                    fs::write(dir.join(format!("{}.tbl", t)), "1|x|\n")?;
                }
            }
            Ok(ProcessOutput {
                code: Some(0),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_generate_builds_runs_and_relocates() -> Result<()> {
        let gen_dir = tempdir()?;
        let out_dir = tempdir()?;
        let generator = Generator::new(gen_dir.path(), FakeRunner::new(vec!["region", "nation"]));

        let moved = generator.generate(10, out_dir.path())?;

        assert_eq!(
            moved,
            vec![out_dir.path().join("nation.tbl"), out_dir.path().join("region.tbl")]
        );
        assert!(!gen_dir.path().join("nation.tbl").exists());

        let calls = generator.runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "make");
        assert_eq!(calls[0].1.last().unwrap(), "dbgen");
        assert_eq!(calls[1].0, "./dbgen");
        assert_eq!(calls[1].1, vec!["-vf", "-s", "10"]);
        assert_eq!(calls[1].2.as_deref(), Some(gen_dir.path()));
        Ok(())
    }

    #[test]
    fn test_build_failure_stops_before_running() -> Result<()> {
        let gen_dir = tempdir()?;
        let out_dir = tempdir()?;
        let mut runner = FakeRunner::new(vec!["region"]);
        runner.fail_program = Some("make");
        let generator = Generator::new(gen_dir.path(), runner);

        match generator.generate(1, out_dir.path()) {
            Err(PrepError::Generation { step, code, output }) => {
                assert_eq!(step, "build");
                assert_eq!(code, Some(2));
                assert!(output.contains("boom"));
            }
            other => panic!("expected Generation error, got {:?}", other),
        }
        assert_eq!(generator.runner.calls.lock().unwrap().len(), 1);
        assert!(!out_dir.path().join("region.tbl").exists());
        Ok(())
    }

    #[test]
    fn test_run_failure_is_fatal() -> Result<()> {
        let gen_dir = tempdir()?;
        let out_dir = tempdir()?;
        let mut runner = FakeRunner::new(vec![]);
        runner.fail_program = Some("./dbgen");
        let generator = Generator::new(gen_dir.path(), runner);

        let err = generator.generate(1, out_dir.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PrepError::Generation { ref step, .. } if step == "run"));
        Ok(())
    }

    #[test]
    fn test_no_output_files_is_a_failure() -> Result<()> {
        let gen_dir = tempdir()?;
        let out_dir = tempdir()?;
        let generator = Generator::new(gen_dir.path(), FakeRunner::new(vec![]));

        let err = generator.generate(1, out_dir.path()).unwrap_err();
        assert!(matches!(err, PrepError::Generation { ref step, .. } if step == "relocate"));
        Ok(())
    }

    #[test]
    fn test_process_output_combines_streams() {
        let out = ProcessOutput {
            code: Some(1),
            stdout: "building\n".into(),
            stderr: "error: missing makefile\n".into(),
        };
        assert!(!out.success());
        assert_eq!(out.combined(), "building\nerror: missing makefile");
    }

    #[test]
    fn test_relocate_from_dir_with_glob_characters() -> Result<()> {
        let root = tempdir()?;
        let gen_dir = root.path().join("dbgen[v3]*");
        fs::create_dir(&gen_dir)?;
        let decoy = root.path().join("dbgenv");
        fs::create_dir(&decoy)?;
        fs::write(decoy.join("orders.tbl"), "1|x|\n")?;
        let out_dir = tempdir()?;

        let generator = Generator::new(&gen_dir, FakeRunner::new(vec!["nation"]));
        let moved = generator.generate(1, out_dir.path())?;

        assert_eq!(moved, vec![out_dir.path().join("nation.tbl")]);
        assert!(decoy.join("orders.tbl").exists());
        Ok(())
    }
}
