//! `§4.3.1` behaviour-selection policy: a pure function over `(profile, tick context, a
//! source of uniform randomness)`. Kept separate from execution (`mta_runner::behaviour_loop`)
//! so selection can be unit-tested without a game client.

use mta_contracts::scenario::Profile;

use crate::registry::lookup_profile;

/// What one tick decided to do: an action tag to execute, or a chat line to send instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Action(String),
    Chat(ChatPool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPool {
    MediateToRebel,
    MediateToLeader,
}

/// Source of randomness the selector draws from. A trait (rather than a bare closure type)
/// so tests can supply a scripted sequence.
pub trait Roll {
    /// Uniform float in `[0, 1)`.
    fn unit(&mut self) -> f64;
    /// Uniform index in `[0, len)`. `len` is always > 0 when called.
    fn index(&mut self, len: usize) -> usize;
}

pub struct RandRoll;

impl Roll for RandRoll {
    fn unit(&mut self) -> f64 {
        rand::random::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        (rand::random::<f64>() * len as f64) as usize % len
    }
}

fn pick_excluding_chest<'a>(pool: &'a [&'a str], has_planks: bool, roll: &mut impl Roll) -> &'a str {
    if !has_planks {
        if let Some(chest) = pool.iter().find(|b| b.contains("chest")) {
            return chest;
        }
    }
    pool[roll.index(pool.len())]
}

/// Leader's opening script (`§4.3.1`): the first three ticks are deterministic so the run
/// always has a stable, predictable opening regardless of dice rolls.
fn leader_selection(action_count: u64, has_planks: bool, roll: &mut impl Roll) -> Selection {
    match action_count {
        0 => return Selection::Action("open-chest-and-take-materials".to_string()),
        1 => return Selection::Action("give-initial-tasks".to_string()),
        2 => return Selection::Action("place-three-blocks".to_string()),
        _ => {}
    }

    const PRIMARY: &[&str] = &[
        "open-chest-and-take-materials",
        "place-blocks-for-house",
        "lead-building-effort",
        "coordinate-with-team",
        "assist-with-tasks",
        "gather-requested-resources",
    ];

    if roll.unit() < 0.85 {
        Selection::Action(pick_excluding_chest(PRIMARY, has_planks, roll).to_string())
    } else if roll.unit() < 0.5 {
        Selection::Action("reason-with-rebel".to_string())
    } else {
        Selection::Action(pick_excluding_chest(PRIMARY, has_planks, roll).to_string())
    }
}

fn follower_selection(has_planks: bool, roll: &mut impl Roll) -> Selection {
    const ACTION_POOL: &[&str] = &[
        "open-chest-and-take-materials",
        "place-blocks-for-house",
        "follow-leader-tasks",
        "assist-with-tasks",
        "follow-instructions",
        "coordinate-with-team",
    ];

    if roll.unit() < 0.85 {
        return Selection::Action(pick_excluding_chest(ACTION_POOL, has_planks, roll).to_string());
    }

    if roll.unit() < 0.3 {
        let pool = if roll.unit() < 0.5 { ChatPool::MediateToRebel } else { ChatPool::MediateToLeader };
        Selection::Chat(pool)
    } else {
        Selection::Action(pick_excluding_chest(ACTION_POOL, has_planks, roll).to_string())
    }
}

fn non_cooperator_selection(roll: &mut impl Roll) -> Selection {
    if roll.unit() < 0.65 {
        return Selection::Action("break-leader-blocks".to_string());
    }
    let profile = lookup_profile(Profile::NonCooperator);
    let pool: Vec<&str> = profile
        .minecraft_behaviors
        .iter()
        .map(|b| b.as_str())
        .filter(|b| !b.contains("chest") && !b.contains("gather"))
        .collect();
    let chosen = if pool.is_empty() {
        "break-leader-blocks".to_string()
    } else {
        pool[roll.index(pool.len())].to_string()
    };
    Selection::Action(chosen)
}

fn uniform_selection(profile: Profile, roll: &mut impl Roll) -> Selection {
    let table = lookup_profile(profile);
    let idx = roll.index(table.minecraft_behaviors.len());
    Selection::Action(table.minecraft_behaviors[idx].clone())
}

/// `§4.3.1`: select the behaviour for this tick.
pub fn select_behaviour(profile: Profile, action_count: u64, has_planks: bool, roll: &mut impl Roll) -> Selection {
    match profile {
        Profile::Leader => leader_selection(action_count, has_planks, roll),
        Profile::Follower => follower_selection(has_planks, roll),
        Profile::NonCooperator => non_cooperator_selection(roll),
        Profile::Confuser => uniform_selection(Profile::Confuser, roll),
        Profile::ResourceHoarder => uniform_selection(Profile::ResourceHoarder, roll),
        Profile::TaskAbandoner => uniform_selection(Profile::TaskAbandoner, roll),
    }
}

/// Per-behaviour message rotation (`§4.3.1`): cursor advances modulo pool length so the
/// same line never repeats until the pool is exhausted.
#[derive(Debug, Default)]
pub struct MessageRotation {
    cursor: usize,
}

impl MessageRotation {
    pub fn next<'a>(&mut self, pool: &'a [String]) -> Option<&'a str> {
        if pool.is_empty() {
            return None;
        }
        let msg = pool[self.cursor % pool.len()].as_str();
        self.cursor += 1;
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A roll sequence fed from a fixed script, for deterministic tests.
    struct Scripted {
        units: Vec<f64>,
        indices: Vec<usize>,
    }

    impl Roll for Scripted {
        fn unit(&mut self) -> f64 {
            self.units.remove(0)
        }

        fn index(&mut self, len: usize) -> usize {
            let i = self.indices.remove(0);
            i % len
        }
    }

    #[test]
    fn leader_first_three_ticks_are_scripted() {
        let mut roll = Scripted { units: vec![], indices: vec![] };
        assert_eq!(
            leader_selection(0, true, &mut roll),
            Selection::Action("open-chest-and-take-materials".to_string())
        );
        assert_eq!(leader_selection(1, true, &mut roll), Selection::Action("give-initial-tasks".to_string()));
        assert_eq!(leader_selection(2, true, &mut roll), Selection::Action("place-three-blocks".to_string()));
    }

    #[test]
    fn leader_prefers_chest_when_out_of_planks() {
        let mut roll = Scripted { units: vec![0.1], indices: vec![0] };
        assert_eq!(
            leader_selection(10, false, &mut roll),
            Selection::Action("open-chest-and-take-materials".to_string())
        );
    }

    #[test]
    fn non_cooperator_excludes_resource_gathering_on_the_uniform_branch() {
        let mut roll = Scripted { units: vec![0.9], indices: vec![0] };
        let selection = non_cooperator_selection(&mut roll);
        if let Selection::Action(a) = selection {
            assert!(!a.contains("chest"));
        } else {
            panic!("expected an action");
        }
    }

    #[test]
    fn message_rotation_cycles_without_repeating_before_exhaustion() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut rotation = MessageRotation::default();
        let seq: Vec<&str> = (0..6).map(|_| rotation.next(&pool).unwrap()).collect();
        assert_eq!(seq, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn uniform_selection_always_returns_a_behaviour_from_the_table() {
        let mut roll = Scripted { units: vec![], indices: vec![2] };
        let table = lookup_profile(Profile::Confuser);
        let selection = uniform_selection(Profile::Confuser, &mut roll);
        if let Selection::Action(a) = selection {
            assert!(table.minecraft_behaviors.contains(&a));
        } else {
            panic!("expected an action");
        }
    }
}
