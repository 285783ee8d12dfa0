// Draft service: ties the engine to storage, team lookup, and messaging.
//
// Every mutating call runs load -> mutate -> publish -> save while holding
// that session's lock, so two requests against one session never interleave.
// Requests against different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use snakedraft_core::draft::session::PickOutcome;
use snakedraft_core::{
    AdmissionPolicy, DraftError, DraftSession, Item, ItemRef, ParticipantView, ProgressSnapshot,
    SessionId,
};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::{AdminConfig, Config, DraftConfig};
use crate::notify::Notifier;
use crate::protocol::UserCommand;
use crate::render::{self, PickAction};
use crate::store::SessionStore;
use crate::teams::{self, PoolSource, TeamListError, TeamRosterProvider};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("could not find draft {0}")]
    SessionNotFound(String),

    #[error("draft reference {0:?} matches more than one draft")]
    AmbiguousSession(String),

    #[error(transparent)]
    Teams(#[from] TeamListError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: String,
    pub display_name: String,
}

impl Actor {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
        }
    }
}

/// Settings applied to every new draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftDefaults {
    pub alliance_size: usize,
    pub target_group_size: usize,
    pub admission: AdmissionPolicy,
    pub strip_name_suffix: Option<String>,
    pub channel: String,
}

impl Default for DraftDefaults {
    fn default() -> Self {
        Self {
            alliance_size: 3,
            target_group_size: 0,
            admission: AdmissionPolicy::default(),
            strip_name_suffix: Some("Draft".to_string()),
            channel: "#draft".to_string(),
        }
    }
}

impl DraftDefaults {
    fn from_config(draft: &DraftConfig, channel: &str) -> Self {
        Self {
            alliance_size: draft.alliance_size,
            target_group_size: draft.target_group_size,
            admission: draft.admission,
            strip_name_suffix: draft.strip_name_suffix.clone(),
            channel: channel.to_string(),
        }
    }
}

/// Input for [`DraftService::create_session`].
#[derive(Debug, Clone, Default)]
pub struct NewDraft {
    pub name: String,
    /// Comma-separated team numbers, a `.csv` path, or an event code.
    pub teams: String,
    pub alliance_size: Option<usize>,
    pub channel: Option<String>,
}

/// Trim `name` and drop a trailing `suffix` ("Regional Draft" -> "Regional").
/// A name that is nothing but the suffix is kept.
pub fn strip_name_suffix(name: &str, suffix: Option<&str>) -> String {
    let name = name.trim();
    match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => match name.strip_suffix(suffix).map(str::trim_end) {
            Some(rest) if !rest.is_empty() => rest.to_string(),
            _ => name.to_string(),
        },
        None => name.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Per-session locks
// ---------------------------------------------------------------------------

/// One async mutex per (workspace, session). The table itself is only
/// locked long enough to find or insert an entry.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<(String, SessionId), Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub async fn lock(&self, workspace: &str, id: SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.locks.lock().expect("session lock table poisoned");
            table
                .entry((workspace.to_string(), id))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn forget(&self, workspace: &str, id: SessionId) {
        self.locks
            .lock()
            .expect("session lock table poisoned")
            .remove(&(workspace.to_string(), id));
    }
}

// ---------------------------------------------------------------------------
// DraftService
// ---------------------------------------------------------------------------

pub struct DraftService {
    workspace: String,
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn TeamRosterProvider>,
    notifier: Arc<dyn Notifier>,
    rng: Mutex<StdRng>,
    locks: SessionLocks,
    admins: AdminConfig,
    defaults: DraftDefaults,
}

impl DraftService {
    pub fn new(
        workspace: impl Into<String>,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn TeamRosterProvider>,
        notifier: Arc<dyn Notifier>,
        rng: StdRng,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            store,
            provider,
            notifier,
            rng: Mutex::new(rng),
            locks: SessionLocks::default(),
            admins: AdminConfig::default(),
            defaults: DraftDefaults::default(),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn TeamRosterProvider>,
        notifier: Arc<dyn Notifier>,
        rng: StdRng,
    ) -> Self {
        Self::new(config.workspace.id.clone(), store, provider, notifier, rng)
            .with_admins(config.admin.users.clone())
            .with_defaults(DraftDefaults::from_config(&config.draft, &config.workspace.channel))
    }

    pub fn with_admins(mut self, users: Vec<String>) -> Self {
        self.admins = AdminConfig { users };
        self
    }

    pub fn with_defaults(mut self, defaults: DraftDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn load(&self, id: SessionId) -> ServiceResult<DraftSession> {
        self.store
            .get(&self.workspace, id)?
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    fn authorize(&self, session: &DraftSession, actor: &Actor, action: &str) -> Result<(), DraftError> {
        if session.is_owner(&actor.identity) || self.admins.is_admin(&actor.identity) {
            return Ok(());
        }
        warn!(
            session_id = %session.id(),
            identity = %actor.identity,
            action,
            "Permission denied"
        );
        Err(DraftError::PermissionDenied {
            identity: actor.identity.clone(),
            action: action.to_string(),
        })
    }

    /// Run `f` against the stored session under its lock and save the result.
    /// When `repost` is set the session's messages are refreshed first.
    async fn update<T, F>(&self, id: SessionId, repost: bool, f: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut DraftSession) -> ServiceResult<T> + Send,
        T: Send,
    {
        let _guard = self.locks.lock(&self.workspace, id).await;
        let mut session = self.load(id)?;
        let out = f(&mut session)?;
        if repost {
            self.publish(&mut session).await;
        }
        self.store.put(&self.workspace, &session)?;
        Ok(out)
    }

    /// Post the session's current messages and retract the previous ones.
    /// Delivery failures are logged and otherwise ignored.
    async fn publish(&self, session: &mut DraftSession) {
        let snapshot = session.progress_snapshot();
        let channel = session.channel().to_string();

        let mut handles = Vec::new();
        for message in render::session_messages(&snapshot) {
            match self.notifier.post(&channel, &message).await {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(session_id = %snapshot.session_id, error = %e, "Failed to post draft message"),
            }
        }
        debug!(session_id = %snapshot.session_id, posted = handles.len(), "Published draft messages");

        for old in session.replace_message_handles(handles) {
            if let Err(e) = self.notifier.delete(&channel, &old).await {
                warn!(session_id = %snapshot.session_id, handle = %old, error = %e, "Failed to retract message");
            }
        }
    }

    fn next_rng(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().expect("rng mutex poisoned")
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Resolve a full session id or a unique prefix of one.
    pub fn resolve(&self, reference: &str) -> ServiceResult<SessionId> {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<SessionId>() {
            return Ok(id);
        }
        let prefix = reference.to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(ServiceError::SessionNotFound(reference.to_string()));
        }
        let mut matches = self
            .store
            .list_workspace(&self.workspace)?
            .into_iter()
            .map(|s| s.id())
            .filter(|id| id.to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(ServiceError::AmbiguousSession(reference.to_string())),
            (None, _) => Err(ServiceError::SessionNotFound(reference.to_string())),
        }
    }

    pub fn snapshot(&self, id: SessionId) -> ServiceResult<ProgressSnapshot> {
        Ok(self.load(id)?.progress_snapshot())
    }

    pub fn list_by_owner(&self, owner: &str) -> ServiceResult<Vec<ProgressSnapshot>> {
        Ok(self
            .store
            .list_by_owner(&self.workspace, owner)?
            .iter()
            .map(DraftSession::progress_snapshot)
            .collect())
    }

    pub fn list_all(&self) -> ServiceResult<Vec<ProgressSnapshot>> {
        Ok(self
            .store
            .list_workspace(&self.workspace)?
            .iter()
            .map(DraftSession::progress_snapshot)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Create a draft owned by `owner`, seeding its pool from `request.teams`.
    pub async fn create_session(&self, owner: &Actor, request: NewDraft) -> ServiceResult<ProgressSnapshot> {
        let items = PoolSource::parse(&request.teams)
            .load(self.provider.as_ref())
            .await?;
        let name = strip_name_suffix(&request.name, self.defaults.strip_name_suffix.as_deref());
        let channel = request.channel.unwrap_or_else(|| self.defaults.channel.clone());
        let alliance_size = request.alliance_size.unwrap_or(self.defaults.alliance_size);

        let mut session = DraftSession::new(&owner.identity, name, channel, alliance_size, items)?
            .with_admission(self.defaults.admission)
            .with_target_group_size(self.defaults.target_group_size);

        self.publish(&mut session).await;
        self.store.put(&self.workspace, &session)?;
        info!(
            workspace = %self.workspace,
            session_id = %session.id(),
            name = session.name(),
            "Draft created"
        );
        Ok(session.progress_snapshot())
    }

    pub async fn join(&self, actor: &Actor, id: SessionId) -> ServiceResult<()> {
        self.update(id, true, |s| Ok(s.join(&actor.identity, &actor.display_name)?))
            .await
    }

    /// Returns whether the actor was in the draft.
    pub async fn leave(&self, actor: &Actor, id: SessionId) -> ServiceResult<bool> {
        let _guard = self.locks.lock(&self.workspace, id).await;
        let mut session = self.load(id)?;
        if session.leave(&actor.identity).is_none() {
            return Ok(false);
        }
        self.publish(&mut session).await;
        self.store.put(&self.workspace, &session)?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the draft. Returns the snapshot of this draft followed by one
    /// per sibling split off from it.
    pub async fn start(&self, actor: &Actor, id: SessionId) -> ServiceResult<Vec<ProgressSnapshot>> {
        let (first, siblings) = self
            .update(id, true, |s| {
                self.authorize(s, actor, "start")?;
                let siblings = s.start(&mut *self.next_rng())?;
                Ok((s.progress_snapshot(), siblings))
            })
            .await?;

        let mut snapshots = vec![first];
        for mut sibling in siblings {
            let _guard = self.locks.lock(&self.workspace, sibling.id()).await;
            self.publish(&mut sibling).await;
            self.store.put(&self.workspace, &sibling)?;
            snapshots.push(sibling.progress_snapshot());
        }
        Ok(snapshots)
    }

    /// Put a started draft back into registration. Returns false when it was
    /// not started.
    pub async fn unstart(&self, actor: &Actor, id: SessionId) -> ServiceResult<bool> {
        self.update(id, true, |s| {
            self.authorize(s, actor, "unstart")?;
            Ok(s.unstart())
        })
        .await
    }

    pub async fn delete(&self, actor: &Actor, id: SessionId) -> ServiceResult<()> {
        {
            let _guard = self.locks.lock(&self.workspace, id).await;
            let mut session = self.load(id)?;
            self.authorize(&session, actor, "delete")?;
            let channel = session.channel().to_string();
            for handle in session.replace_message_handles(Vec::new()) {
                if let Err(e) = self.notifier.delete(&channel, &handle).await {
                    warn!(session_id = %id, error = %e, "Failed to retract message");
                }
            }
            self.store.delete(&self.workspace, id)?;
        }
        self.locks.forget(&self.workspace, id);
        info!(workspace = %self.workspace, session_id = %id, "Draft deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Picks
    // -----------------------------------------------------------------------

    /// Apply a pick submitted from a rendered pick button.
    pub async fn pick(&self, actor: &Actor, action: PickAction) -> ServiceResult<PickOutcome> {
        self.update(action.session_id, true, |s| {
            Ok(s.pick_item_as(&actor.identity, &ItemRef::Id(action.item_id), action.turn)?)
        })
        .await
    }

    /// Pick by typed label against whatever turn is current.
    pub async fn pick_by_label(&self, actor: &Actor, id: SessionId, label: &str) -> ServiceResult<PickOutcome> {
        self.update(id, true, |s| {
            let turn = s.turn_token();
            Ok(s.pick_item_as(&actor.identity, &ItemRef::parse(label), turn)?)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Post the session's messages again, retracting the old ones.
    pub async fn reprint(&self, id: SessionId) -> ServiceResult<()> {
        self.update(id, true, |_| Ok(())).await
    }

    pub async fn rename(&self, actor: &Actor, id: SessionId, name: &str) -> ServiceResult<()> {
        let name = name.trim().to_string();
        self.update(id, true, |s| {
            self.authorize(s, actor, "rename")?;
            s.rename(name);
            Ok(())
        })
        .await
    }

    pub async fn set_target_group_size(&self, actor: &Actor, id: SessionId, target: usize) -> ServiceResult<()> {
        self.update(id, false, |s| {
            self.authorize(s, actor, "set target group size")?;
            s.set_target_group_size(target);
            Ok(())
        })
        .await
    }

    pub async fn set_admission(&self, actor: &Actor, id: SessionId, admission: AdmissionPolicy) -> ServiceResult<()> {
        self.update(id, false, |s| {
            self.authorize(s, actor, "set admission")?;
            s.set_admission(admission);
            Ok(())
        })
        .await
    }

    /// Enrol other users, skipping anyone already in the draft. Capacity is
    /// not checked. Returns the identities actually added.
    pub async fn add_participants(
        &self,
        actor: &Actor,
        id: SessionId,
        players: &[(String, String)],
    ) -> ServiceResult<Vec<String>> {
        self.update(id, true, |s| {
            self.authorize(s, actor, "add players")?;
            let added: Vec<String> = players
                .iter()
                .filter(|(identity, name)| s.enroll(identity.as_str(), name.as_str()))
                .map(|(identity, _)| identity.clone())
                .collect();
            info!(session_id = %id, by = %actor.identity, added = added.len(), "Players enrolled");
            Ok(added)
        })
        .await
    }

    /// Add teams from a comma-separated list to the pool. Teams already in the
    /// draft, whether available or picked, are skipped.
    pub async fn add_teams(&self, actor: &Actor, id: SessionId, teams: &str) -> ServiceResult<Vec<Item>> {
        let candidates = teams::parse_team_list(teams);
        if candidates.is_empty() {
            return Err(TeamListError::Empty(teams.trim().to_string()).into());
        }
        self.update(id, true, |s| {
            self.authorize(s, actor, "add teams")?;
            let mut added = Vec::new();
            for item in candidates {
                let label = ItemRef::Label(item.label.clone());
                let present = s.pool().find(&label).is_some()
                    || s.roster()
                        .participants()
                        .iter()
                        .any(|p| p.picks.iter().any(|i| label.matches(i)));
                if !present {
                    s.add_item(item.clone());
                    added.push(item);
                }
            }
            Ok(added)
        })
        .await
    }

    /// Withdraw a team from the draft, taking it back from whoever picked it.
    pub async fn remove_team(&self, actor: &Actor, id: SessionId, team: &str) -> ServiceResult<Option<Item>> {
        let item_ref = ItemRef::parse(team);
        self.update(id, true, |s| {
            self.authorize(s, actor, "remove teams")?;
            Ok(s.remove_item(&item_ref))
        })
        .await
    }

    /// How the roster would be split if the draft started now.
    pub async fn preview_split(&self, actor: &Actor, id: SessionId) -> ServiceResult<Vec<Vec<ParticipantView>>> {
        let session = self.load(id)?;
        self.authorize(&session, actor, "preview split")?;
        let groups = session.preview_split(&mut *self.next_rng());
        Ok(groups)
    }

    // -----------------------------------------------------------------------
    // Command dispatch
    // -----------------------------------------------------------------------

    /// Execute a parsed command on behalf of `actor` and describe the result.
    pub async fn handle_command(&self, actor: &Actor, command: UserCommand) -> ServiceResult<String> {
        match command {
            UserCommand::Create {
                name,
                teams,
                alliance_size,
            } => {
                let request = NewDraft {
                    name,
                    teams,
                    alliance_size,
                    channel: None,
                };
                let snap = self.create_session(actor, request).await?;
                Ok(format!("Created draft {} ({})", snap.name, snap.session_id))
            }
            UserCommand::Join { session } => {
                self.join(actor, self.resolve(&session)?).await?;
                Ok("Joined".to_string())
            }
            UserCommand::Leave { session } => {
                let reply = if self.leave(actor, self.resolve(&session)?).await? {
                    "Left the draft"
                } else {
                    "You were not in that draft"
                };
                Ok(reply.to_string())
            }
            UserCommand::Start { session } => {
                let snaps = self.start(actor, self.resolve(&session)?).await?;
                let names: Vec<String> = snaps
                    .iter()
                    .map(|s| format!("{} ({})", s.name, s.session_id))
                    .collect();
                Ok(format!("Started {}", names.join(", ")))
            }
            UserCommand::Pick { action } => {
                let outcome = self.pick(actor, action).await?;
                Ok(format!("{} picked {}", outcome.display_name, outcome.item.label))
            }
            UserCommand::PickLabel { session, label } => {
                let outcome = self.pick_by_label(actor, self.resolve(&session)?, &label).await?;
                Ok(format!("{} picked {}", outcome.display_name, outcome.item.label))
            }
            UserCommand::Show { session } => {
                let snap = self.snapshot(self.resolve(&session)?)?;
                Ok(render::session_messages(&snap)
                    .iter()
                    .map(crate::notify::format_plain)
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            UserCommand::List { all } => {
                let snaps = if all {
                    self.list_all()?
                } else {
                    self.list_by_owner(&actor.identity)?
                };
                if snaps.is_empty() {
                    return Ok("No drafts".to_string());
                }
                Ok(snaps
                    .iter()
                    .map(render::session_summary)
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            UserCommand::Rename { session, name } => {
                self.rename(actor, self.resolve(&session)?, &name).await?;
                Ok(format!("Renamed draft to {}", name.trim()))
            }
            UserCommand::Target { session, size } => {
                self.set_target_group_size(actor, self.resolve(&session)?, size)
                    .await?;
                Ok(format!("Set target player count to {size}"))
            }
            UserCommand::Admission { session, policy } => {
                self.set_admission(actor, self.resolve(&session)?, policy).await?;
                Ok(format!("Admission policy is now {policy:?}"))
            }
            UserCommand::AddPlayer { session, players } => {
                let added = self
                    .add_participants(actor, self.resolve(&session)?, &players)
                    .await?;
                Ok(format!("Added players: {}", added.join(", ")))
            }
            UserCommand::AddTeam { session, teams } => {
                let added = self.add_teams(actor, self.resolve(&session)?, &teams).await?;
                let labels: Vec<&str> = added.iter().map(|i| i.label.as_str()).collect();
                Ok(format!("Added teams: {}", labels.join(", ")))
            }
            UserCommand::RemoveTeam { session, team } => {
                let reply = match self.remove_team(actor, self.resolve(&session)?, &team).await? {
                    Some(item) => format!("Removed team {}", item.label),
                    None => format!("No team {} in that draft", team.trim()),
                };
                Ok(reply)
            }
            UserCommand::PreviewSplit { session } => {
                let groups = self.preview_split(actor, self.resolve(&session)?).await?;
                Ok(groups
                    .iter()
                    .enumerate()
                    .map(|(i, g)| {
                        let names: Vec<&str> = g.iter().map(|p| p.display_name.as_str()).collect();
                        format!("Group {}: {}", i + 1, names.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            UserCommand::Unstart { session } => {
                let reply = if self.unstart(actor, self.resolve(&session)?).await? {
                    "Game unstarted"
                } else {
                    "Game was not started"
                };
                Ok(reply.to_string())
            }
            UserCommand::Reprint { session } => {
                self.reprint(self.resolve(&session)?).await?;
                Ok("Reprinted".to_string())
            }
            UserCommand::Delete { session } => {
                self.delete(actor, self.resolve(&session)?).await?;
                Ok("Deleted game".to_string())
            }
            UserCommand::As {
                identity,
                display_name,
            } => Ok(format!("Acting as {display_name} ({identity})")),
            UserCommand::Help => Ok(crate::protocol::HELP.to_string()),
            UserCommand::Quit => Ok("Bye".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_draft() {
        assert_eq!(strip_name_suffix("Silicon Valley Draft", Some("Draft")), "Silicon Valley");
        assert_eq!(strip_name_suffix("  Chezy Draft  ", Some("Draft")), "Chezy");
        assert_eq!(strip_name_suffix("Draft", Some("Draft")), "Draft");
        assert_eq!(strip_name_suffix("Drafts Day", Some("Draft")), "Drafts Day");
        assert_eq!(strip_name_suffix("Worlds Draft", None), "Worlds Draft");
        assert_eq!(strip_name_suffix("Worlds Draft", Some("")), "Worlds Draft");
    }

    #[tokio::test]
    async fn lock_table_reuses_entries() {
        let locks = SessionLocks::default();
        let id = uuid::Uuid::new_v4();
        {
            let _a = locks.lock("T1", id).await;
            // A different workspace is a different lock.
            let _b = locks.lock("T2", id).await;
        }
        let again = locks.lock("T1", id).await;
        assert_eq!(locks.locks.lock().unwrap().len(), 2);
        drop(again);
        locks.forget("T1", id);
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
