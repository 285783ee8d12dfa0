// Console command language.
//
// One command per line. Session arguments accept a full draft id or any
// unique prefix of one.

use snakedraft_core::AdmissionPolicy;
use thiserror::Error;

use crate::render::PickAction;

pub const HELP: &str = "\
Commands:
  as <identity> [display name]          act as another user
  create <name> | <teams> [| <alliance>] teams: 254,971,... | file.csv | event code
  join <draft>                          join a draft
  leave <draft>                         leave a draft
  start <draft>                         start a draft (owner)
  pick <draft_id,item_id,turn>          press a pick button
  pick-label <draft> <team>             pick a team by label
  show <draft>                          print a draft
  list [all]                            your drafts, or every draft
  rename <draft> <name>                 rename a draft (owner)
  target <draft> <n>                    split on start above n players (owner)
  admission <draft> <lenient|strict|open>
  add-player <draft> <id>[=<name>], ...  enrol users, ignoring capacity (owner)
  add-team <draft> <teams>              add teams to the pool (owner)
  remove-team <draft> <team>            withdraw a team, even if picked (owner)
  preview-split <draft>                 show how a start would split (owner)
  unstart <draft>                       return a draft to registration (owner)
  reprint <draft>                       post a draft's messages again
  delete <draft>                        delete a draft (owner)
  help
  quit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    As {
        identity: String,
        display_name: String,
    },
    Create {
        name: String,
        teams: String,
        alliance_size: Option<usize>,
    },
    Join {
        session: String,
    },
    Leave {
        session: String,
    },
    Start {
        session: String,
    },
    Pick {
        action: PickAction,
    },
    PickLabel {
        session: String,
        label: String,
    },
    Show {
        session: String,
    },
    List {
        all: bool,
    },
    Rename {
        session: String,
        name: String,
    },
    Target {
        session: String,
        size: usize,
    },
    Admission {
        session: String,
        policy: AdmissionPolicy,
    },
    AddPlayer {
        session: String,
        /// (identity, display name) pairs.
        players: Vec<(String, String)>,
    },
    AddTeam {
        session: String,
        teams: String,
    },
    RemoveTeam {
        session: String,
        team: String,
    },
    PreviewSplit {
        session: String,
    },
    Unstart {
        session: String,
    },
    Reprint {
        session: String,
    },
    Delete {
        session: String,
    },
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{command}` needs {what}")]
    Missing { command: String, what: &'static str },
    #[error("`{0}` is not a number")]
    BadNumber(String),
    #[error("unknown admission policy `{0}`")]
    BadPolicy(String),
    #[error("bad pick: {0}")]
    BadPick(String),
}

impl UserCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        if verb.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let verb = verb.to_ascii_lowercase();

        let missing = |what| ProtocolError::Missing {
            command: verb.clone(),
            what,
        };
        let session = || first_word(rest).map(str::to_string).ok_or_else(|| missing("a draft"));

        let command = match verb.as_str() {
            "as" => {
                let (identity, name) = split_word(rest);
                if identity.is_empty() {
                    return Err(missing("an identity"));
                }
                let display_name = if name.is_empty() { identity } else { name };
                UserCommand::As {
                    identity: identity.to_string(),
                    display_name: display_name.to_string(),
                }
            }
            "create" => {
                let mut parts = rest.split('|').map(str::trim);
                let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| missing("a name"))?;
                let teams = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| missing("a team source"))?;
                let alliance_size = parts
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(parse_number)
                    .transpose()?;
                UserCommand::Create {
                    name: name.to_string(),
                    teams: teams.to_string(),
                    alliance_size,
                }
            }
            "join" => UserCommand::Join { session: session()? },
            "leave" => UserCommand::Leave { session: session()? },
            "start" => UserCommand::Start { session: session()? },
            "pick" => {
                if rest.is_empty() {
                    return Err(missing("a pick payload"));
                }
                let action = rest
                    .parse::<PickAction>()
                    .map_err(|e| ProtocolError::BadPick(e.to_string()))?;
                UserCommand::Pick { action }
            }
            "pick-label" => {
                let (session, label) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                if label.is_empty() {
                    return Err(missing("a team"));
                }
                UserCommand::PickLabel {
                    session: session.to_string(),
                    label: label.to_string(),
                }
            }
            "show" => UserCommand::Show { session: session()? },
            "list" => UserCommand::List {
                all: rest.eq_ignore_ascii_case("all"),
            },
            "rename" => {
                let (session, name) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                if name.is_empty() {
                    return Err(missing("a name"));
                }
                UserCommand::Rename {
                    session: session.to_string(),
                    name: name.to_string(),
                }
            }
            "target" => {
                let (session, size) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                if size.is_empty() {
                    return Err(missing("a player count"));
                }
                UserCommand::Target {
                    session: session.to_string(),
                    size: parse_number(size)?,
                }
            }
            "admission" => {
                let (session, policy) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                let policy = AdmissionPolicy::from_str_policy(policy)
                    .ok_or_else(|| ProtocolError::BadPolicy(policy.to_string()))?;
                UserCommand::Admission {
                    session: session.to_string(),
                    policy,
                }
            }
            "add-player" => {
                let (session, list) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                let players: Vec<(String, String)> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| match entry.split_once('=') {
                        Some((identity, name)) if !name.trim().is_empty() => {
                            (identity.trim().to_string(), name.trim().to_string())
                        }
                        Some((identity, _)) => (identity.trim().to_string(), identity.trim().to_string()),
                        None => (entry.to_string(), entry.to_string()),
                    })
                    .filter(|(identity, _)| !identity.is_empty())
                    .collect();
                if players.is_empty() {
                    return Err(missing("at least one player"));
                }
                UserCommand::AddPlayer {
                    session: session.to_string(),
                    players,
                }
            }
            "add-team" | "remove-team" => {
                let (session, teams) = split_word(rest);
                if session.is_empty() {
                    return Err(missing("a draft"));
                }
                if teams.is_empty() {
                    return Err(missing("a team"));
                }
                let session = session.to_string();
                if verb == "add-team" {
                    UserCommand::AddTeam {
                        session,
                        teams: teams.to_string(),
                    }
                } else {
                    UserCommand::RemoveTeam {
                        session,
                        team: teams.to_string(),
                    }
                }
            }
            "preview-split" => UserCommand::PreviewSplit { session: session()? },
            "unstart" => UserCommand::Unstart { session: session()? },
            "reprint" => UserCommand::Reprint { session: session()? },
            "delete" => UserCommand::Delete { session: session()? },
            "help" | "?" => UserCommand::Help,
            "quit" | "exit" => UserCommand::Quit,
            other => return Err(ProtocolError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn first_word(s: &str) -> Option<&str> {
    s.split_whitespace().next()
}

/// Split off the first word; the remainder is trimmed.
fn split_word(s: &str) -> (&str, &str) {
    match s.trim().split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (s.trim(), ""),
    }
}

fn parse_number(s: &str) -> Result<usize, ProtocolError> {
    s.trim()
        .parse()
        .map_err(|_| ProtocolError::BadNumber(s.trim().to_string()))
}
