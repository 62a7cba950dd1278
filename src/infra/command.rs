// ============================================================
// Layer 6 — External Command Collaborators
// ============================================================
// Dependency parsers and role labelers usually live in another
// ecosystem (spaCy, GiNZA, an SRL model server …). They are
// plugged in as a command that reads the text on stdin and
// prints one JSON object per token on stdout:
//
//   $ echo いざという時は頼りになる | ginza-dep.py
//   {"text": "いざ", "dep": "advmod"}
//   {"text": "という", "dep": "case"}
//   {"text": "時", "dep": "obl"}
//   …
//
//   $ echo … | srl.py
//   {"text": "時", "role": "B-ARGM-TMP"}
//
// The program is resolved through PATH with `which` once, when
// the collaborator is built.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::domain::tags::{DependencyLabel, SemanticRole};
use crate::domain::traits::{DependencyParser, DependencyToken, RoleToken, SemanticRoleLabeler};

/// A program plus its fixed arguments
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: PathBuf,
    args:    Vec<String>,
}

impl CommandSpec {
    /// Split "python3 tools/dep.py --model ja" on whitespace and
    /// resolve the program through PATH.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| anyhow!("empty collaborator command"))?;
        let program = which::which(name)
            .with_context(|| format!("'{name}' not found on PATH"))?;
        Ok(Self {
            program,
            args: words.map(str::to_string).collect(),
        })
    }

    #[cfg(test)]
    pub fn with_args(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Run once with `input` on stdin; stdout as UTF-8
    pub fn run(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Cannot start '{}'", self.program.display()))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("no stdin for '{}'", self.program.display()))?;
            stdin.write_all(input.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("'{}' did not finish", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "'{}' exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout)
            .with_context(|| format!("'{}' printed non-UTF-8 output", self.program.display()))
    }
}

// ─── JSON lines ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct DepLine {
    text: String,
    dep:  String,
}

#[derive(Debug, Deserialize)]
struct RoleLine {
    text: String,
    role: String,
}

fn json_lines<T: for<'de> Deserialize<'de>>(stdout: &str) -> Result<Vec<T>> {
    stdout
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l).with_context(|| format!("line {}: not a token object: {l}", i + 1))
        })
        .collect()
}

pub fn parse_dependency_lines(stdout: &str) -> Result<Vec<DependencyToken>> {
    Ok(json_lines::<DepLine>(stdout)?
        .into_iter()
        .map(|l| DependencyToken {
            surface: l.text,
            label:   DependencyLabel::from_tag(&l.dep),
        })
        .collect())
}

pub fn parse_role_lines(stdout: &str) -> Result<Vec<RoleToken>> {
    Ok(json_lines::<RoleLine>(stdout)?
        .into_iter()
        .map(|l| RoleToken {
            surface: l.text,
            role:    SemanticRole::from_tag(&l.role),
        })
        .collect())
}

// ─── Collaborators ────────────────────────────────────────────────────────────

pub struct CommandDependencyParser {
    command: CommandSpec,
}

impl CommandDependencyParser {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl DependencyParser for CommandDependencyParser {
    fn parse(&self, text: &str) -> Result<Vec<DependencyToken>> {
        parse_dependency_lines(&self.command.run(text)?)
    }
}

pub struct CommandRoleLabeler {
    command: CommandSpec,
}

impl CommandRoleLabeler {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

impl SemanticRoleLabeler for CommandRoleLabeler {
    fn label(&self, text: &str) -> Result<Vec<RoleToken>> {
        parse_role_lines(&self.command.run(text)?)
    }
}
