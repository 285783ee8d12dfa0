// Turns progress snapshots into postable messages.
//
// Pure functions of a `ProgressSnapshot`; nothing here reads or writes a
// session.

use std::fmt;
use std::str::FromStr;

use snakedraft_core::draft::session::DraftPhase;
use snakedraft_core::{ProgressSnapshot, SessionId};
use thiserror::Error;
use uuid::Uuid;

/// Pick buttons per message.
pub const PICK_CHUNK: usize = 21;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Something a reader of a message can do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Join(SessionId),
    Leave(SessionId),
    Start(SessionId),
    Pick { label: String, action: PickAction },
}

impl Action {
    /// Button caption.
    pub fn caption(&self) -> &str {
        match self {
            Action::Join(_) => "Join Game",
            Action::Leave(_) => "Leave Game",
            Action::Start(_) => "Start Draft",
            Action::Pick { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedMessage {
    pub text: String,
    pub actions: Vec<Action>,
}

/// The payload carried by a pick button: which session, which item, and the
/// turn token the message was rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickAction {
    pub session_id: SessionId,
    pub item_id: Uuid,
    pub turn: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PickActionParseError {
    #[error("expected session_id,item_id,turn")]
    WrongArity,
    #[error("bad id {0:?}")]
    BadId(String),
    #[error("bad turn {0:?}")]
    BadTurn(String),
}

impl fmt::Display for PickAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.session_id, self.item_id, self.turn)
    }
}

impl FromStr for PickAction {
    type Err = PickActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        let [session, item, turn] = parts.as_slice() else {
            return Err(PickActionParseError::WrongArity);
        };
        let id = |raw: &str| Uuid::parse_str(raw).map_err(|_| PickActionParseError::BadId(raw.to_string()));
        Ok(PickAction {
            session_id: id(session)?,
            item_id: id(item)?,
            turn: turn
                .parse()
                .map_err(|_| PickActionParseError::BadTurn(turn.to_string()))?,
        })
    }
}

fn joining_actions(id: SessionId) -> Vec<Action> {
    vec![Action::Join(id), Action::Leave(id), Action::Start(id)]
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Registration message: the name, the teams on offer, who has joined.
pub fn registration_message(snap: &ProgressSnapshot) -> RenderedMessage {
    let teams = snap
        .available
        .iter()
        .map(|i| i.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let players = if snap.participants.is_empty() {
        "No players have joined yet".to_string()
    } else {
        snap.participants
            .iter()
            .map(|p| p.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    RenderedMessage {
        text: format!(
            "*A Fantasy First Game has been created: {}*\nTeams:\n{}\n---\nPlayers:\n{}",
            snap.name, teams, players
        ),
        actions: joining_actions(snap.session_id),
    }
}

/// Fixed-width table of every participant and their picks so far.
pub fn draft_table(snap: &ProgressSnapshot) -> String {
    let name_width = snap
        .participants
        .iter()
        .map(|p| p.display_name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    let header_width = 4 + snap.alliance_size.to_string().len();
    let team_width = snap
        .available
        .iter()
        .chain(snap.participants.iter().flat_map(|p| p.picks.iter()))
        .map(|i| i.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(header_width);

    let mut header = format!("{:<name_width$} | ", "Name");
    for slot in 1..=snap.alliance_size {
        header.push_str(&format!("{:<team_width$} | ", format!("team{slot}")));
    }
    let divider = "-".repeat(header.trim_end().chars().count());

    let mut table = String::from("```\n");
    table.push_str(header.trim_end());
    table.push('\n');
    table.push_str(&divider);
    table.push('\n');
    for p in &snap.participants {
        let mut row = format!("{:<name_width$} | ", p.display_name);
        for slot in 0..snap.alliance_size {
            let label = p.picks.get(slot).map(|i| i.label.as_str()).unwrap_or("");
            row.push_str(&format!("{label:<team_width$} | "));
        }
        table.push_str(row.trim_end());
        table.push('\n');
    }
    table.push_str(&divider);
    table.push_str("\n```");
    table
}

/// Messages for a started draft: whose turn it is with the table, the pick
/// buttons in chunks, and a footer that still offers joining. A finished
/// draft gets a single closing message.
pub fn drafting_messages(snap: &ProgressSnapshot) -> Vec<RenderedMessage> {
    let table = draft_table(snap);
    let Some(up) = &snap.up_next else {
        return vec![RenderedMessage {
            text: format!("The draft is over!\n{table}"),
            actions: Vec::new(),
        }];
    };

    let mut messages = vec![RenderedMessage {
        text: format!("It is {}'s turn to pick a team\n{table}", up.display_name),
        actions: Vec::new(),
    }];
    for chunk in snap.available.chunks(PICK_CHUNK) {
        messages.push(RenderedMessage {
            text: String::new(),
            actions: chunk
                .iter()
                .map(|item| Action::Pick {
                    label: item.label.clone(),
                    action: PickAction {
                        session_id: snap.session_id,
                        item_id: item.id,
                        turn: snap.turn_token,
                    },
                })
                .collect(),
        });
    }
    messages.push(RenderedMessage {
        text: "You can still join the draft!".to_string(),
        actions: joining_actions(snap.session_id),
    });
    messages
}

/// Whatever should currently be on screen for a session.
pub fn session_messages(snap: &ProgressSnapshot) -> Vec<RenderedMessage> {
    match snap.phase {
        DraftPhase::Registering => vec![registration_message(snap)],
        DraftPhase::Started | DraftPhase::Complete => drafting_messages(snap),
    }
}

/// One line per session for listings.
pub fn session_summary(snap: &ProgressSnapshot) -> String {
    let phase = match snap.phase {
        DraftPhase::Registering => "registering",
        DraftPhase::Started => "drafting",
        DraftPhase::Complete => "complete",
    };
    format!(
        "*{}* ({}) ({} players, {} teams left) {}",
        snap.name,
        phase,
        snap.participants.len(),
        snap.available.len(),
        snap.session_id
    )
}
