// Snake-draft turn order.

use super::roster::Participant;

/// Index of the participant whose turn it is, or `None` when the draft is
/// complete.
///
/// Rounds run 1..=alliance_size. Odd rounds walk the roster front to back,
/// even rounds back to front; the first participant holding fewer than
/// `round` items is up. Pure: repeated calls without mutation agree.
pub fn next_to_pick(participants: &[Participant], alliance_size: usize) -> Option<usize> {
    for round in 1..=alliance_size {
        let found = if round % 2 == 0 {
            participants
                .iter()
                .rposition(|p| p.pick_count() < round)
        } else {
            participants.iter().position(|p| p.pick_count() < round)
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// 1-indexed round the next pick belongs to, if the draft is still running.
pub fn current_round(participants: &[Participant], alliance_size: usize) -> Option<usize> {
    let idx = next_to_pick(participants, alliance_size)?;
    Some(participants[idx].pick_count() + 1)
}
