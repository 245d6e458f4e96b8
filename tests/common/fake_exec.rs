use std::{
  fs,
  path::{Path, PathBuf},
  sync::Mutex,
};

use anyhow::{Result, bail};

use eksctl::git::Executor;

/// A command the fake executor was asked to run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
  pub command: String,
  pub dir: PathBuf,
  pub args: Vec<String>,
}

impl Call {
  /// The command line without the working directory
  pub fn line(&self) -> String {
    format!("{} {}", self.command, self.args.join(" "))
  }
}

/// Records commands instead of running them
///
/// `git clone <url> <dir>` writes `clone_files` into `<dir>`. Commands whose line starts with one of
/// `failing` return an error.
#[derive(Default)]
pub struct FakeExecutor {
  pub clone_files: Vec<(String, String)>,
  pub failing: Vec<String>,
  calls: Mutex<Vec<Call>>,
}

impl FakeExecutor {
  pub fn with_files(files: &[(&str, &str)]) -> Self {
    Self {
      clone_files: files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect(),
      ..Default::default()
    }
  }

  pub fn failing(mut self, lines: &[&str]) -> Self {
    self.failing = lines.iter().map(|line| line.to_string()).collect();
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn lines(&self) -> Vec<String> {
    self.calls().iter().map(Call::line).collect()
  }
}

impl Executor for FakeExecutor {
  async fn exec_in_dir(&self, command: &str, dir: &Path, args: &[String]) -> Result<()> {
    let call = Call {
      command: command.to_string(),
      dir: dir.to_path_buf(),
      args: args.to_vec(),
    };
    let line = call.line();
    self.calls.lock().unwrap().push(call);

    if self.failing.iter().any(|failing| line.starts_with(failing.as_str())) {
      bail!("fake failure: {line}");
    }

    if args.first().map(String::as_str) == Some("clone")
      && let Some(target) = args.get(2)
    {
      for (path, contents) in &self.clone_files {
        let path = Path::new(target).join(path);
        if let Some(parent) = path.parent() {
          fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
      }
    }

    Ok(())
  }
}
