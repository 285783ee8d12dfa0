// Draft session aggregate: pool, roster, lifecycle and the pick protocol.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::item::{Item, ItemRef};
use super::pool::ItemPool;
use super::roster::{AdmissionPolicy, Participant, Roster};
use super::split::split_groups;
use super::turn::{current_round, next_to_pick};
use crate::error::DraftError;

pub type SessionId = Uuid;

/// Where a session is in its lifecycle. `Complete` is derived from the
/// roster on every call, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftPhase {
    Registering,
    Started,
    Complete,
}

/// One draft: the items, the people picking them, and whose turn it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSession {
    id: SessionId,
    owner: String,
    name: String,
    /// Opaque destination for rendered messages (e.g. a chat channel id).
    channel: String,
    /// Items each participant ends up with.
    alliance_size: usize,
    pool: ItemPool,
    roster: Roster,
    started: bool,
    /// Turn token. Only ever increases.
    turn: u64,
    /// Split the roster on start when it exceeds this many participants
    /// (0 = never split).
    #[serde(default)]
    target_group_size: usize,
    #[serde(default)]
    admission: AdmissionPolicy,
    /// Handles of the last messages the presentation layer posted for this
    /// session. Stored, never interpreted.
    #[serde(default)]
    message_handles: Vec<String>,
    /// Set once this session has split its roster into numbered groups.
    #[serde(default)]
    split: Option<SplitLineage>,
    created_at: DateTime<Utc>,
}

/// Naming state left behind by a split, so a later split continues the
/// numbering instead of nesting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SplitLineage {
    base_name: String,
    groups: usize,
}

/// Result of a successful pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickOutcome {
    pub identity: String,
    pub display_name: String,
    pub item: Item,
    /// Turn token after the pick was applied.
    pub turn: u64,
}

/// Read-only copy of a participant for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub identity: String,
    pub display_name: String,
    pub picks: Vec<Item>,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        ParticipantView {
            identity: p.identity.clone(),
            display_name: p.display_name.clone(),
            picks: p.picks.clone(),
        }
    }
}

/// Rendering-agnostic view of a session at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub session_id: SessionId,
    pub name: String,
    pub owner: String,
    pub channel: String,
    pub alliance_size: usize,
    pub phase: DraftPhase,
    pub turn_token: u64,
    /// Round the next pick belongs to, when someone is up.
    pub round: Option<usize>,
    pub participants: Vec<ParticipantView>,
    pub available: Vec<Item>,
    pub up_next: Option<ParticipantView>,
}

impl DraftSession {
    /// Create a session in registration with the given pool and no
    /// participants.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        channel: impl Into<String>,
        alliance_size: usize,
        items: impl IntoIterator<Item = Item>,
    ) -> Result<Self, DraftError> {
        if alliance_size == 0 {
            return Err(DraftError::InvalidAllianceSize(alliance_size));
        }
        let session = DraftSession {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            channel: channel.into(),
            alliance_size,
            pool: items.into_iter().collect(),
            roster: Roster::new(),
            started: false,
            turn: 0,
            target_group_size: 0,
            admission: AdmissionPolicy::default(),
            message_handles: Vec::new(),
            split: None,
            created_at: Utc::now(),
        };
        info!(
            session_id = %session.id,
            owner = %session.owner,
            items = session.pool.len(),
            alliance_size,
            "Draft session created"
        );
        Ok(session)
    }

    pub fn with_admission(mut self, admission: AdmissionPolicy) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_target_group_size(mut self, target_group_size: usize) -> Self {
        self.target_group_size = target_group_size;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_owner(&self, identity: &str) -> bool {
        self.owner == identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn alliance_size(&self) -> usize {
        self.alliance_size
    }

    pub fn pool(&self) -> &ItemPool {
        &self.pool
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The token a pick request must echo back to be accepted.
    pub fn turn_token(&self) -> u64 {
        self.turn
    }

    pub fn target_group_size(&self) -> usize {
        self.target_group_size
    }

    pub fn admission(&self) -> AdmissionPolicy {
        self.admission
    }

    pub fn message_handles(&self) -> &[String] {
        &self.message_handles
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> DraftPhase {
        if !self.started {
            DraftPhase::Registering
        } else if self.next_index().is_none() {
            DraftPhase::Complete
        } else {
            DraftPhase::Started
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == DraftPhase::Complete
    }

    /// Whoever the snake order says picks next. Side-effect free.
    pub fn next_to_pick(&self) -> Option<&Participant> {
        self.next_index().map(|idx| &self.roster.participants()[idx])
    }

    /// Whether `join` would currently be refused for capacity.
    pub fn is_full(&self) -> bool {
        !self.roster.admits(
            self.admission,
            self.started,
            self.pool.len(),
            self.alliance_size,
        )
    }

    fn next_index(&self) -> Option<usize> {
        next_to_pick(self.roster.participants(), self.alliance_size)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Add a participant at the end of the roster.
    ///
    /// Joining a running draft changes whose turn it may be, so it advances
    /// the turn token.
    pub fn join(
        &mut self,
        identity: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<(), DraftError> {
        let participant = Participant::new(identity, display_name);
        if self.roster.contains(&participant.identity) {
            return Err(DraftError::DuplicateParticipant {
                identity: participant.identity,
            });
        }
        if self.is_full() {
            return Err(DraftError::RegistrationFull);
        }
        self.admit(participant)
    }

    /// Administrative enrolment: add a participant regardless of the
    /// admission policy. Returns false when the identity is already on the
    /// roster.
    pub fn enroll(&mut self, identity: impl Into<String>, display_name: impl Into<String>) -> bool {
        let participant = Participant::new(identity, display_name);
        if self.roster.contains(&participant.identity) {
            return false;
        }
        self.admit(participant).is_ok()
    }

    fn admit(&mut self, participant: Participant) -> Result<(), DraftError> {
        let identity = participant.identity.clone();
        self.roster.add_participant(participant)?;
        if self.started {
            self.turn += 1;
        }
        info!(session_id = %self.id, %identity, roster = self.roster.len(), "Participant joined");
        Ok(())
    }

    /// Remove a participant, returning their picks to the pool.
    ///
    /// Absent identities are a no-op. Leaving a running draft advances the
    /// turn token.
    pub fn leave(&mut self, identity: &str) -> Option<Participant> {
        let removed = self.roster.remove_participant(identity, &mut self.pool)?;
        if self.started {
            self.turn += 1;
        }
        info!(session_id = %self.id, %identity, roster = self.roster.len(), "Participant left");
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the draft.
    ///
    /// Fixes the pick order with one uniform shuffle and, when the roster is
    /// larger than the target group size, keeps the first group here and
    /// returns one new started session per remaining group.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<DraftSession>, DraftError> {
        if self.started {
            return Err(DraftError::AlreadyStarted);
        }
        if self.roster.is_empty() {
            return Err(DraftError::EmptyRoster);
        }

        // A draft resumed after an administrative unstart keeps its order.
        let fresh = self.roster.participants().iter().all(|p| p.picks.is_empty());
        let mut siblings = Vec::new();

        if fresh {
            self.roster.shuffle(rng);

            if self.target_group_size > 0 && self.roster.len() > self.target_group_size {
                let mut groups = split_groups(
                    self.roster.participants().to_vec(),
                    self.alliance_size,
                    self.pool.len(),
                    self.target_group_size,
                    rng,
                )
                .into_iter();

                let (base_name, first_number) = match &self.split {
                    Some(lineage) => (lineage.base_name.clone(), lineage.groups + 1),
                    None => (self.name.clone(), 2),
                };
                self.roster.replace(groups.next().unwrap_or_default());
                for (offset, group) in groups.enumerate() {
                    siblings.push(self.spawn_sibling(&base_name, first_number + offset, group));
                }
                if !siblings.is_empty() {
                    if self.split.is_none() {
                        self.name = format!("{base_name} 1");
                    }
                    self.split = Some(SplitLineage {
                        groups: first_number - 1 + siblings.len(),
                        base_name,
                    });
                    info!(
                        session_id = %self.id,
                        groups = siblings.len() + 1,
                        "Roster split into sibling sessions"
                    );
                }
            }
        }

        self.started = true;
        self.turn += 1;
        info!(
            session_id = %self.id,
            participants = self.roster.len(),
            turn = self.turn,
            "Draft started"
        );
        Ok(siblings)
    }

    fn spawn_sibling(&self, base_name: &str, number: usize, group: Vec<Participant>) -> DraftSession {
        let sibling = DraftSession {
            id: Uuid::new_v4(),
            owner: self.owner.clone(),
            name: format!("{base_name} {number}"),
            channel: self.channel.clone(),
            alliance_size: self.alliance_size,
            pool: self.pool.clone(),
            roster: group.into(),
            started: true,
            turn: 1,
            target_group_size: self.target_group_size,
            admission: self.admission,
            message_handles: Vec::new(),
            split: None,
            created_at: Utc::now(),
        };
        debug!(
            parent = %self.id,
            session_id = %sibling.id,
            participants = sibling.roster.len(),
            "Spawned sibling session"
        );
        sibling
    }

    /// Administrative override: put a started draft back into registration.
    /// Picks and the turn token are kept.
    pub fn unstart(&mut self) -> bool {
        if !self.started {
            return false;
        }
        warn!(session_id = %self.id, "Draft unstarted by administrative override");
        self.started = false;
        true
    }

    // -----------------------------------------------------------------------
    // Pick protocol
    // -----------------------------------------------------------------------

    /// Give `item_ref` to whoever is up, if `turn_token` is current.
    pub fn pick_item(&mut self, item_ref: &ItemRef, turn_token: u64) -> Result<PickOutcome, DraftError> {
        self.apply_pick(item_ref, turn_token, None)
    }

    /// Like [`pick_item`](Self::pick_item), but only when `actor` is the
    /// participant whose turn it is.
    pub fn pick_item_as(
        &mut self,
        actor: &str,
        item_ref: &ItemRef,
        turn_token: u64,
    ) -> Result<PickOutcome, DraftError> {
        self.apply_pick(item_ref, turn_token, Some(actor))
    }

    fn apply_pick(
        &mut self,
        item_ref: &ItemRef,
        turn_token: u64,
        actor: Option<&str>,
    ) -> Result<PickOutcome, DraftError> {
        if turn_token != self.turn {
            debug!(
                session_id = %self.id,
                submitted = turn_token,
                current = self.turn,
                "Rejected stale pick"
            );
            return Err(DraftError::StaleTurn {
                submitted: turn_token,
                current: self.turn,
            });
        }
        if !self.started {
            return Err(DraftError::NotStarted);
        }
        let unavailable = || DraftError::ItemUnavailable {
            item: item_ref.to_string(),
        };
        let item_id = self.pool.find(item_ref).map(|i| i.id).ok_or_else(unavailable)?;
        let idx = self.next_index().ok_or(DraftError::NoActiveTurn)?;
        if let Some(actor) = actor {
            if self.roster.participants()[idx].identity != actor {
                return Err(DraftError::NotYourTurn {
                    identity: actor.to_string(),
                });
            }
        }

        // Validation is complete; from here the pick cannot fail halfway.
        let item = self.pool.remove(item_id).ok_or_else(unavailable)?;
        let picker = self.roster.participant_mut(idx);
        picker.picks.push(item.clone());
        let outcome = PickOutcome {
            identity: picker.identity.clone(),
            display_name: picker.display_name.clone(),
            item,
            turn: self.turn + 1,
        };
        self.turn += 1;

        info!(
            session_id = %self.id,
            picker = %outcome.identity,
            item = %outcome.item.label,
            turn = self.turn,
            "Pick applied"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Rename the draft. A renamed draft numbers any later split afresh.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.split = None;
    }

    pub fn set_target_group_size(&mut self, target_group_size: usize) {
        self.target_group_size = target_group_size;
    }

    pub fn set_admission(&mut self, admission: AdmissionPolicy) {
        self.admission = admission;
    }

    /// Seed another item into the pool.
    pub fn add_item(&mut self, item: Item) {
        debug!(session_id = %self.id, item = %item.label, "Item added");
        self.pool.add(item);
    }

    /// Withdraw an item from the draft entirely.
    ///
    /// The pool is searched first, then every participant's picks. Taking an
    /// item back from a participant in a running draft changes whose turn it
    /// is, so that advances the turn token.
    pub fn remove_item(&mut self, item_ref: &ItemRef) -> Option<Item> {
        if let Some(id) = self.pool.find(item_ref).map(|i| i.id) {
            let item = self.pool.remove(id)?;
            debug!(session_id = %self.id, item = %item.label, "Item withdrawn from pool");
            return Some(item);
        }

        let (holder, item) = self.roster.take_pick(item_ref)?;
        if self.started {
            self.turn += 1;
        }
        warn!(
            session_id = %self.id,
            holder = %holder,
            item = %item.label,
            "Picked item withdrawn"
        );
        Some(item)
    }

    /// How the current roster would be split on start, without changing
    /// anything.
    pub fn preview_split<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec<ParticipantView>> {
        let views = self.roster.participants().iter().map(ParticipantView::from).collect();
        split_groups(
            views,
            self.alliance_size,
            self.pool.len(),
            self.target_group_size,
            rng,
        )
    }

    /// Record the handles of freshly posted messages, returning the previous
    /// ones so the caller can retract them.
    pub fn replace_message_handles(&mut self, handles: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.message_handles, handles)
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        let participants = self.roster.participants();
        ProgressSnapshot {
            session_id: self.id,
            name: self.name.clone(),
            owner: self.owner.clone(),
            channel: self.channel.clone(),
            alliance_size: self.alliance_size,
            phase: self.phase(),
            turn_token: self.turn,
            round: current_round(participants, self.alliance_size),
            participants: participants.iter().map(ParticipantView::from).collect(),
            available: self.pool.list().to_vec(),
            up_next: self.next_to_pick().map(ParticipantView::from),
        }
    }
}
