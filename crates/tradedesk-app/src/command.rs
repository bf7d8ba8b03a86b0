//! Interactive watch-loop commands.

use std::fmt;
use std::str::FromStr;

/// One line typed into the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    List,
    /// Sign in; the argument is a user id or access token depending on
    /// the configured auth provider.
    SignIn(Option<String>),
    SignOut,
    Guest,
    Metrics,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err(ParseCommandError("empty command".to_string()));
        };
        // Symbols may contain spaces ("s&p 500")
        let rest = parts.collect::<Vec<_>>().join(" ");
        let arg = (!rest.is_empty()).then_some(rest);

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("add" | "a", Some(symbol)) => Ok(Self::Add(symbol)),
            ("remove" | "rm" | "r", Some(symbol)) => Ok(Self::Remove(symbol)),
            ("add" | "a" | "remove" | "rm" | "r", None) => {
                Err(ParseCommandError(format!("usage: {verb} <symbol>")))
            }
            ("list" | "ls", _) => Ok(Self::List),
            ("signin" | "login", arg) => Ok(Self::SignIn(arg)),
            ("signout" | "logout", _) => Ok(Self::SignOut),
            ("guest", _) => Ok(Self::Guest),
            ("metrics" | "stats", _) => Ok(Self::Metrics),
            ("help" | "?", _) => Ok(Self::Help),
            ("quit" | "exit" | "q", _) => Ok(Self::Quit),
            (other, _) => Err(ParseCommandError(format!("unknown command: {other}"))),
        }
    }
}

pub const HELP: &str = "\
commands:
  add <symbol>       track a symbol (aliases like \"s&p 500\" work)
  remove <symbol>    stop tracking a symbol
  list               print the watchlist
  signin [id|token]  sign in
  signout            sign out and clear the list
  guest              start a guest session
  metrics            print counters
  quit               exit";
