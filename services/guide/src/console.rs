//! Host-loop commands typed on stdin.
//!
//! `a` and `b` play the role of the controller buttons: `a` starts a new goal
//! from the current scene, `b` asks for the next step.

use std::path::PathBuf;

/// A command the host loop acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartGoal,
    NextStep,
    /// Adds dictated text to the prompt of the next request.
    Say(String),
    /// Swaps the scene image the camera sees.
    Load(PathBuf),
    Resume,
    Cancel,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (type 'help' for a list)")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

pub const HELP: &str = "\
commands:
  a | start       snapshot the scene and start a new goal
  b | next        snapshot the scene and ask for the next step
  say <text>      dictate text for the next request
  load <path>     change the scene image
  resume          switch back to the live camera
  cancel          abort the outstanding request
  status          print the current session state
  quit            exit";

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "a" | "start" => Ok(Command::StartGoal),
        "b" | "next" => Ok(Command::NextStep),
        "say" if rest.is_empty() => Err(ParseError::MissingArgument("say")),
        "say" => Ok(Command::Say(rest.to_string())),
        "load" if rest.is_empty() => Err(ParseError::MissingArgument("load")),
        "load" => Ok(Command::Load(PathBuf::from(rest))),
        "resume" => Ok(Command::Resume),
        "cancel" => Ok(Command::Cancel),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "q" | "quit" | "exit" => Ok(Command::Quit),
        _ => Err(ParseError::Unknown(word.to_string())),
    };
    Some(command)
}
