// Participants and the ordered roster they join.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::item::{Item, ItemRef};
use super::pool::ItemPool;
use crate::error::DraftError;

/// Someone competing in the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// External identity (chat user id or similar). Opaque to the engine.
    pub identity: String,
    pub display_name: String,
    /// Items picked so far, in pick order.
    pub picks: Vec<Item>,
}

impl Participant {
    pub fn new(identity: impl Into<String>, display_name: impl Into<String>) -> Self {
        Participant {
            identity: identity.into(),
            display_name: display_name.into(),
            picks: Vec::new(),
        }
    }

    pub fn pick_count(&self) -> usize {
        self.picks.len()
    }
}

/// When the roster refuses new participants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Capped during registration, open once the draft has started.
    #[default]
    Lenient,
    /// Capped before and after start.
    Strict,
    /// Never capped; oversized rosters are left to the group split.
    Open,
}

impl AdmissionPolicy {
    pub fn from_str_policy(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Some(AdmissionPolicy::Lenient),
            "strict" => Some(AdmissionPolicy::Strict),
            "open" => Some(AdmissionPolicy::Open),
            _ => None,
        }
    }
}

/// Participants in join order (or shuffled order once started).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant to the end of the roster.
    pub fn add_participant(&mut self, participant: Participant) -> Result<(), DraftError> {
        if self.contains(&participant.identity) {
            return Err(DraftError::DuplicateParticipant {
                identity: participant.identity,
            });
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Remove a participant and hand every item they picked back to `pool`.
    ///
    /// Returns the removed participant with an empty pick list, or `None` if
    /// the identity was not on the roster.
    pub fn remove_participant(&mut self, identity: &str, pool: &mut ItemPool) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.identity == identity)?;
        let mut removed = self.participants.remove(idx);
        for item in removed.picks.drain(..) {
            pool.add(item);
        }
        Some(removed)
    }

    /// Take a picked item away from whoever holds it. Returns the holder's
    /// identity with the item.
    pub fn take_pick(&mut self, item_ref: &ItemRef) -> Option<(String, Item)> {
        self.participants.iter_mut().find_map(|p| {
            let idx = p.picks.iter().position(|item| item_ref.matches(item))?;
            Some((p.identity.clone(), p.picks.remove(idx)))
        })
    }

    /// Structural capacity check: one participant per `alliance_size` items.
    pub fn is_full(&self, pool_size: usize, alliance_size: usize) -> bool {
        self.participants.len() >= pool_size / alliance_size.max(1)
    }

    /// Capacity check as seen through an admission policy.
    pub fn admits(
        &self,
        policy: AdmissionPolicy,
        started: bool,
        pool_size: usize,
        alliance_size: usize,
    ) -> bool {
        match policy {
            AdmissionPolicy::Open => true,
            AdmissionPolicy::Lenient if started => true,
            AdmissionPolicy::Lenient | AdmissionPolicy::Strict => {
                !self.is_full(pool_size, alliance_size)
            }
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.participants.iter().any(|p| p.identity == identity)
    }

    pub fn get(&self, identity: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub(crate) fn participant_mut(&mut self, idx: usize) -> &mut Participant {
        &mut self.participants[idx]
    }

    /// Uniformly permute the roster.
    pub(crate) fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.participants.shuffle(rng);
    }

    /// Replace the whole roster, e.g. with one group after a split.
    pub(crate) fn replace(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }
}

impl From<Vec<Participant>> for Roster {
    fn from(participants: Vec<Participant>) -> Self {
        Roster { participants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_identity() {
        let mut roster = Roster::new();
        roster.add_participant(Participant::new("U1", "Ada")).unwrap();
        let err = roster
            .add_participant(Participant::new("U1", "Someone Else"))
            .unwrap_err();
        assert_eq!(
            err,
            DraftError::DuplicateParticipant {
                identity: "U1".into()
            }
        );
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.participants()[0].display_name, "Ada");
    }

    #[test]
    fn add_appends_in_join_order() {
        let mut roster = Roster::new();
        for id in ["U3", "U1", "U2"] {
            roster.add_participant(Participant::new(id, id)).unwrap();
        }
        let order: Vec<&str> = roster.participants().iter().map(|p| p.identity.as_str()).collect();
        assert_eq!(order, vec!["U3", "U1", "U2"]);
    }

    #[test]
    fn remove_returns_picks_to_pool_sorted() {
        let mut pool: ItemPool = vec![Item::new("100", 100), Item::new("500", 500)].into();
        let mut leaver = Participant::new("U1", "Ada");
        leaver.picks.push(Item::new("900", 900));
        leaver.picks.push(Item::new("50", 50));
        let mut stayer = Participant::new("U2", "Bob");
        stayer.picks.push(Item::new("7", 7));
        let mut roster: Roster = vec![leaver, stayer.clone()].into();

        let removed = roster.remove_participant("U1", &mut pool).unwrap();
        assert!(removed.picks.is_empty());

        let labels: Vec<&str> = pool.list().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["50", "100", "500", "900"]);
        assert_eq!(roster.participants(), &[stayer]);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut pool = ItemPool::new();
        let mut roster: Roster = vec![Participant::new("U1", "Ada")].into();
        assert!(roster.remove_participant("U9", &mut pool).is_none());
        assert_eq!(roster.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn take_pick_removes_from_holder() {
        let mut holder = Participant::new("U1", "Ada");
        holder.picks.push(Item::new("254", 254));
        holder.picks.push(Item::new("971", 971));
        let mut roster: Roster = vec![Participant::new("U2", "Bob"), holder].into();

        let (who, item) = roster.take_pick(&ItemRef::Label("254".into())).unwrap();
        assert_eq!(who, "U1");
        assert_eq!(item.label, "254");
        assert_eq!(roster.get("U1").unwrap().picks.len(), 1);
        assert!(roster.take_pick(&ItemRef::Label("254".into())).is_none());
    }

    #[test]
    fn is_full_uses_floor_division() {
        let roster: Roster = vec![Participant::new("U1", "a"), Participant::new("U2", "b")].into();
        // 7 items / 3 per alliance = 2 seats
        assert!(roster.is_full(7, 3));
        // 9 items / 3 per alliance = 3 seats
        assert!(!roster.is_full(9, 3));
    }

    #[test]
    fn admission_policies() {
        let roster: Roster = vec![Participant::new("U1", "a"), Participant::new("U2", "b")].into();
        assert!(!roster.admits(AdmissionPolicy::Lenient, false, 6, 3));
        assert!(roster.admits(AdmissionPolicy::Lenient, true, 6, 3));
        assert!(!roster.admits(AdmissionPolicy::Strict, true, 6, 3));
        assert!(roster.admits(AdmissionPolicy::Open, false, 6, 3));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(AdmissionPolicy::from_str_policy("STRICT"), Some(AdmissionPolicy::Strict));
        assert_eq!(AdmissionPolicy::from_str_policy("lenient"), Some(AdmissionPolicy::Lenient));
        assert_eq!(AdmissionPolicy::from_str_policy("open"), Some(AdmissionPolicy::Open));
        assert_eq!(AdmissionPolicy::from_str_policy("closed"), None);
    }
}
