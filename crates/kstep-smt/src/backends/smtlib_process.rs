//! SMT-LIB solvers run as child processes and spoken to over pipes.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;
use tracing::{debug, trace};

use crate::backends::smtlib_parser::parse_get_value_response;
use crate::backends::smtlib_printer::{sort_to_smtlib, to_smtlib};
use crate::solver::{Model, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum SmtLibError {
    #[error("solver pipe: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot start solver {0}")]
    NotFound(String),
    #[error("solver reported: {0}")]
    SolverError(String),
    #[error("unreadable solver output: {0}")]
    ParseError(String),
}

/// Which solver binary is on the other end, and so which flags it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Cvc5,
    Z3,
}

impl Dialect {
    pub fn default_command(self) -> &'static str {
        match self {
            Dialect::Cvc5 => "cvc5",
            Dialect::Z3 => "z3",
        }
    }

    fn args(self, timeout_ms: Option<u64>) -> Vec<String> {
        let (fixed, limit): (&[&str], Option<String>) = match self {
            Dialect::Cvc5 => (
                &["--lang", "smt2", "--incremental", "--produce-models"],
                timeout_ms.map(|ms| format!("--tlimit-per={ms}")),
            ),
            Dialect::Z3 => (&["-in", "-smt2"], timeout_ms.map(|ms| format!("-t:{ms}"))),
        };
        fixed.iter().map(|a| a.to_string()).chain(limit).collect()
    }
}

/// Line-oriented command/response framing over any pair of streams.
struct Channel<W, R> {
    to_solver: W,
    from_solver: R,
}

impl<W: Write, R: BufRead> Channel<W, R> {
    fn send(&mut self, command: &str) -> Result<(), SmtLibError> {
        trace!(command, "smt2 >");
        writeln!(self.to_solver, "{command}")?;
        self.to_solver.flush()?;
        Ok(())
    }

    /// Next complete answer: one atom, or an s-expression that may span
    /// several lines. Empty once the solver has closed its output.
    fn receive(&mut self) -> Result<String, SmtLibError> {
        let mut answer = String::new();
        let mut open = 0i64;
        let mut quoted = false;
        let mut line = String::new();
        loop {
            line.clear();
            if self.from_solver.read_line(&mut line)? == 0 {
                break;
            }
            for ch in line.chars() {
                match ch {
                    '"' => quoted = !quoted,
                    '(' if !quoted => open += 1,
                    ')' if !quoted => open -= 1,
                    _ => {}
                }
            }
            answer.push_str(&line);
            if open <= 0 && !quoted && !answer.trim().is_empty() {
                break;
            }
        }
        let answer = answer.trim().to_string();
        trace!(answer = %answer, "smt2 <");
        Ok(answer)
    }
}

/// A solver process fed SMT-LIB v2 on stdin.
pub struct SmtLibSolver {
    dialect: Dialect,
    child: Child,
    io: Channel<ChildStdin, BufReader<ChildStdout>>,
    stderr: Option<ChildStderr>,
    declared: HashMap<String, SmtSort>,
}

impl SmtLibSolver {
    /// Per-check limit in seconds; `0` leaves checks unbounded.
    pub fn with_timeout_secs(dialect: Dialect, timeout_secs: u64) -> Result<Self, SmtLibError> {
        let timeout_ms = Some(timeout_secs.saturating_mul(1000)).filter(|ms| *ms > 0);
        Self::spawn(dialect, dialect.default_command(), timeout_ms)
    }

    pub fn spawn(dialect: Dialect, cmd: &str, timeout_ms: Option<u64>) -> Result<Self, SmtLibError> {
        let args = dialect.args(timeout_ms);
        debug!(cmd, ?args, "starting solver process");
        let mut child = Command::new(cmd)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SmtLibError::NotFound(format!("`{cmd}`: {e}")))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SmtLibError::SolverError(format!("`{cmd}` has no piped stdio")));
        };
        let stderr = child.stderr.take();
        let mut solver = Self {
            dialect,
            child,
            io: Channel {
                to_solver: stdin,
                from_solver: BufReader::new(stdout),
            },
            stderr,
            declared: HashMap::new(),
        };
        solver.prelude()?;
        Ok(solver)
    }

    fn prelude(&mut self) -> Result<(), SmtLibError> {
        self.io.send("(set-option :produce-models true)")?;
        self.io.send("(set-logic ALL)")
    }

    fn ask(&mut self, command: &str) -> Result<String, SmtLibError> {
        self.io.send(command)?;
        let answer = self.io.receive()?;
        if answer.is_empty() {
            let mut stderr = String::new();
            if let Some(pipe) = self.stderr.as_mut() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(SmtLibError::SolverError(format!(
                "{} exited while answering `{command}` ({})",
                self.dialect.default_command(),
                stderr.trim()
            )));
        }
        if answer.starts_with("(error") {
            return Err(SmtLibError::SolverError(answer));
        }
        Ok(answer)
    }
}

impl Drop for SmtLibSolver {
    fn drop(&mut self) {
        if self.io.send("(exit)").is_err() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl SmtSolver for SmtLibSolver {
    type Error = SmtLibError;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), SmtLibError> {
        match self.declared.get(name) {
            Some(existing) if existing == sort => Ok(()),
            Some(existing) => Err(SmtLibError::SolverError(format!(
                "`{name}` is already a {existing}"
            ))),
            None => {
                self.io
                    .send(&format!("(declare-const {name} {})", sort_to_smtlib(sort)))?;
                self.declared.insert(name.to_string(), *sort);
                Ok(())
            }
        }
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), SmtLibError> {
        self.io.send(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), SmtLibError> {
        self.io.send("(push 1)")
    }

    fn pop(&mut self) -> Result<(), SmtLibError> {
        self.io.send("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, SmtLibError> {
        let answer = self.ask("(check-sat)")?;
        Ok(match answer.as_str() {
            "sat" => SatResult::Sat,
            "unsat" => SatResult::Unsat,
            "unknown" | "timeout" => SatResult::Unknown(format!(
                "{} answered {answer}",
                self.dialect.default_command()
            )),
            _ => return Err(SmtLibError::SolverError(answer)),
        })
    }

    fn check_sat_with_model(
        &mut self,
        symbols: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), SmtLibError> {
        let result = self.check_sat()?;
        if !result.is_sat() {
            return Ok((result, None));
        }
        let model = symbols
            .iter()
            .map(|&(name, sort)| {
                let answer = self.ask(&format!("(get-value ({name}))"))?;
                let value = parse_get_value_response(&answer, name, sort)
                    .map_err(SmtLibError::ParseError)?;
                Ok((name.to_string(), value))
            })
            .collect::<Result<Model, SmtLibError>>()?;
        Ok((result, Some(model)))
    }

    fn reset(&mut self) -> Result<(), SmtLibError> {
        self.io.send("(reset)")?;
        self.prelude()?;
        self.declared.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scripted(output: &str) -> Channel<Vec<u8>, Cursor<Vec<u8>>> {
        Channel {
            to_solver: Vec::new(),
            from_solver: Cursor::new(output.as_bytes().to_vec()),
        }
    }

    #[test]
    fn cvc5_args_carry_per_check_limit() {
        let args = Dialect::Cvc5.args(Some(2000));
        assert!(args.contains(&"--incremental".to_string()));
        assert!(args.contains(&"--produce-models".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--tlimit-per=2000"));
    }

    #[test]
    fn z3_args_read_script_from_stdin() {
        assert_eq!(Dialect::Z3.args(None), vec!["-in", "-smt2"]);
        assert_eq!(
            Dialect::Z3.args(Some(500)).last().map(String::as_str),
            Some("-t:500")
        );
    }

    #[test]
    fn receive_joins_multiline_values() -> Result<(), SmtLibError> {
        let mut io = scripted("sat\n((sA_2\n  (- 1)))\n(error \"a (b\")\nunsat\n");
        assert_eq!(io.receive()?, "sat");
        assert_eq!(io.receive()?, "((sA_2\n  (- 1)))");
        assert_eq!(io.receive()?, "(error \"a (b\")");
        assert_eq!(io.receive()?, "unsat");
        assert_eq!(io.receive()?, "");
        Ok(())
    }

    #[test]
    fn send_writes_one_line_per_command() -> Result<(), SmtLibError> {
        let mut io = scripted("");
        io.send("(push 1)")?;
        io.send("(check-sat)")?;
        assert_eq!(io.to_solver, b"(push 1)\n(check-sat)\n");
        Ok(())
    }

    #[test]
    fn missing_binary_is_reported_as_not_found() {
        let result = SmtLibSolver::spawn(Dialect::Cvc5, "kstep-no-such-solver-binary", None);
        assert!(matches!(result, Err(SmtLibError::NotFound(_))));
    }
}
