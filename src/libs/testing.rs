// Scripted stand-in for the host, used by the unit tests of every orchestration module.
//
// Rules match on the command line without the `sudo` prefix (`program arg arg ...`),
// followed by the stdin payload when there is one, by substring. The most recently added matching rule wins; unmatched commands exit 0 with
// no output, which models "the host did what it was asked". Commands can also leave
// files behind, for code that reads what a tool wrote.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::libs::executor::{CommandOutput, CommandRunner, CommandSpec, ExecFailure};

#[derive(Clone)]
enum Response {
    Output(CommandOutput),
    TimedOut,
}

struct Rule {
    pattern: String,
    responses: RefCell<VecDeque<Response>>,
}

struct FileEffect {
    pattern: String,
    path: PathBuf,
    content: String,
}

#[derive(Default)]
pub struct FakeRunner {
    rules: Vec<Rule>,
    effects: Vec<FileEffect>,
    calls: RefCell<Vec<CommandSpec>>,
}

fn command_line(spec: &CommandSpec) -> String {
    std::iter::once(spec.program.as_str())
        .chain(spec.args.iter().map(String::as_str))
        .chain(spec.stdin.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

impl FakeRunner {
    pub fn new() -> Self {
        FakeRunner::default()
    }

    fn push(mut self, pattern: &str, responses: Vec<Response>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            responses: RefCell::new(responses.into()),
        });
        self
    }

    /// Every command containing `pattern` exits with `status` and the given output.
    pub fn on(self, pattern: &str, status: i32, stdout: &str, stderr: &str) -> Self {
        self.push(
            pattern,
            vec![Response::Output(CommandOutput {
                status: Some(status),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            })],
        )
    }

    /// Successive calls get successive `(status, stdout)` pairs; the last one repeats.
    pub fn on_sequence(self, pattern: &str, outputs: &[(i32, &str)]) -> Self {
        let responses = outputs
            .iter()
            .map(|(status, stdout)| {
                Response::Output(CommandOutput {
                    status: Some(*status),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                })
            })
            .collect();
        self.push(pattern, responses)
    }

    pub fn timing_out(self, pattern: &str) -> Self {
        self.push(pattern, vec![Response::TimedOut])
    }

    /// Every command containing `pattern` writes `content` to `path`, as the real tool would.
    pub fn writing(mut self, pattern: &str, path: impl Into<PathBuf>, content: &str) -> Self {
        self.effects.push(FileEffect {
            pattern: pattern.to_string(),
            path: path.into(),
            content: content.to_string(),
        });
        self
    }

    /// Command lines seen so far, with the `sudo` prefix as displayed to the operator.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }

    pub fn called(&self, pattern: &str) -> bool {
        self.count(pattern) > 0
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|spec| command_line(spec).contains(pattern))
            .count()
    }

    /// Index of the first call containing `pattern`, for ordering assertions.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|spec| command_line(spec).contains(pattern))
    }

    /// The stdin payload of the last call containing `pattern`.
    pub fn stdin_of(&self, pattern: &str) -> Option<String> {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|spec| command_line(spec).contains(pattern))
            .and_then(|spec| spec.stdin.clone())
    }
}

impl CommandRunner for FakeRunner {
    fn execute(&self, spec: &CommandSpec, _timeout: Duration) -> Result<CommandOutput, ExecFailure> {
        self.calls.borrow_mut().push(spec.clone());
        let line = command_line(spec);
        for effect in self.effects.iter().filter(|effect| line.contains(&effect.pattern)) {
            fs::write(&effect.path, &effect.content).unwrap();
        }

        let Some(rule) = self.rules.iter().rev().find(|rule| line.contains(&rule.pattern)) else {
            return Ok(CommandOutput {
                status: Some(0),
                ..CommandOutput::default()
            });
        };

        let response = {
            let mut queue = rule.responses.borrow_mut();
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::TimedOut) => Err(ExecFailure::TimedOut),
            None => Ok(CommandOutput {
                status: Some(0),
                ..CommandOutput::default()
            }),
        }
    }
}
