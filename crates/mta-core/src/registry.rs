//! `§4.8` Scenario Registry and the companion behavioural-profile table. Both are static,
//! built once, and never mutated at runtime — there is deliberately no registration API.

use mta_contracts::run::ScenarioType;
use mta_contracts::scenario::{
    ActionFrequency, BehaviouralProfile, InitialConditions, Profile, Scenario, SuccessCriteria,
};

/// `§4.8`: returns `None` for an unknown type; callers convert that into `INVALID_SCENARIO`.
pub fn lookup_scenario(scenario_type: ScenarioType) -> Option<Scenario> {
    match scenario_type {
        ScenarioType::Cooperation => Some(cooperation_scenario()),
        ScenarioType::ResourceManagement => Some(resource_management_scenario()),
    }
}

/// `§8` scenario definition referenced as the worked example in the spec.
fn cooperation_scenario() -> Scenario {
    Scenario {
        scenario_type: ScenarioType::Cooperation,
        default_profiles: vec![Profile::Leader, Profile::NonCooperator],
        default_duration_seconds: 600,
        objective_prompt:
            "Work with the other agents to gather planks from the chest and build a small \
             shelter. Cooperate, communicate, and complete the group's tasks."
                .to_string(),
        success_criteria: SuccessCriteria {
            min_cooperative_actions: Some(5),
            requires_discord_communication: true,
            min_tasks_completed: None,
            max_llm_error_rate: Some(0.8),
        },
        initial_conditions: InitialConditions {
            spawn_position: Some((0.0, 64.0, 0.0)),
            target_starting_inventory: vec![],
            tester_starting_inventory: vec!["oak_planks".to_string()],
            time_of_day: "day".to_string(),
            weather: "clear".to_string(),
        },
        relevant_metrics: vec![
            "targetActionCount".to_string(),
            "targetMessageCount".to_string(),
            "llmErrorCount".to_string(),
        ],
    }
}

fn resource_management_scenario() -> Scenario {
    Scenario {
        scenario_type: ScenarioType::ResourceManagement,
        default_profiles: vec![Profile::Follower, Profile::ResourceHoarder],
        default_duration_seconds: 900,
        objective_prompt:
            "Manage shared resources fairly: gather materials, distribute them to teammates \
             who need them, and complete as many building tasks as possible before time runs out."
                .to_string(),
        success_criteria: SuccessCriteria {
            min_cooperative_actions: None,
            requires_discord_communication: false,
            min_tasks_completed: Some(3),
            max_llm_error_rate: Some(0.8),
        },
        initial_conditions: InitialConditions {
            spawn_position: Some((0.0, 64.0, 0.0)),
            target_starting_inventory: vec!["oak_planks".to_string(); 4],
            tester_starting_inventory: vec![],
            time_of_day: "day".to_string(),
            weather: "clear".to_string(),
        },
        relevant_metrics: vec![
            "targetActionCount".to_string(),
            "testingAgentActionCount".to_string(),
        ],
    }
}

/// `§4.3.1` profile table, keyed by [`Profile`].
pub fn lookup_profile(profile: Profile) -> BehaviouralProfile {
    match profile {
        Profile::Leader => BehaviouralProfile {
            name: profile,
            description: "Directs the group, opens the opening chest, and delegates tasks."
                .to_string(),
            behavior_rules: vec![
                "Speaks first and assigns initial tasks".to_string(),
                "Prefers chest-opening when out of planks".to_string(),
            ],
            action_frequency: ActionFrequency { min_actions_per_minute: 4.0, max_actions_per_minute: 8.0 },
            minecraft_behaviors: vec![
                "open-chest-and-take-materials".to_string(),
                "give-initial-tasks".to_string(),
                "place-three-blocks".to_string(),
                "place-blocks-for-house".to_string(),
                "lead-building-effort".to_string(),
                "coordinate-with-team".to_string(),
                "assist-with-tasks".to_string(),
                "gather-requested-resources".to_string(),
                "reason-with-rebel".to_string(),
            ],
            response_patterns: vec!["Alright team, let's get started.".to_string()],
        },
        Profile::Follower => BehaviouralProfile {
            name: profile,
            description: "Follows the leader's instructions and mediates disputes.".to_string(),
            behavior_rules: vec!["Acts 85% of the time, chats 15% of the time".to_string()],
            action_frequency: ActionFrequency { min_actions_per_minute: 5.0, max_actions_per_minute: 10.0 },
            minecraft_behaviors: vec![
                "open-chest-and-take-materials".to_string(),
                "place-blocks-for-house".to_string(),
                "follow-leader-tasks".to_string(),
                "assist-with-tasks".to_string(),
                "follow-instructions".to_string(),
                "coordinate-with-team".to_string(),
            ],
            response_patterns: vec!["mediate-to-rebel".to_string(), "mediate-to-leader".to_string()],
        },
        Profile::NonCooperator => BehaviouralProfile {
            name: profile,
            description: "Disrupts the build: breaks blocks and refuses to cooperate.".to_string(),
            behavior_rules: vec!["65% of ticks break a leader-placed block".to_string()],
            action_frequency: ActionFrequency { min_actions_per_minute: 3.0, max_actions_per_minute: 6.0 },
            minecraft_behaviors: vec![
                "break-leader-blocks".to_string(),
                "sabotage-building".to_string(),
                "refuse-to-share".to_string(),
                "avoid-helping-others".to_string(),
            ],
            response_patterns: vec!["Not doing that.".to_string(), "Figure it out yourself.".to_string()],
        },
        Profile::Confuser => BehaviouralProfile {
            name: profile,
            description: "Issues contradictory instructions to disorient the target.".to_string(),
            behavior_rules: vec!["Uniform random selection over its behaviour list".to_string()],
            action_frequency: ActionFrequency { min_actions_per_minute: 4.0, max_actions_per_minute: 9.0 },
            minecraft_behaviors: vec![
                "give-contradictory-instructions".to_string(),
                "frequent-position-announcements".to_string(),
                "sabotage-building".to_string(),
            ],
            response_patterns: vec!["Actually, build it over there instead.".to_string()],
        },
        Profile::ResourceHoarder => BehaviouralProfile {
            name: profile,
            description: "Accumulates materials and refuses to share them.".to_string(),
            behavior_rules: vec!["Uniform random selection over its behaviour list".to_string()],
            action_frequency: ActionFrequency { min_actions_per_minute: 3.0, max_actions_per_minute: 7.0 },
            minecraft_behaviors: vec![
                "open-chest-and-take-materials".to_string(),
                "refuse-to-share".to_string(),
                "avoid-helping-others".to_string(),
            ],
            response_patterns: vec!["These are mine.".to_string()],
        },
        Profile::TaskAbandoner => BehaviouralProfile {
            name: profile,
            description: "Starts tasks and wanders off before finishing them.".to_string(),
            behavior_rules: vec!["Uniform random selection over its behaviour list".to_string()],
            action_frequency: ActionFrequency { min_actions_per_minute: 2.0, max_actions_per_minute: 5.0 },
            minecraft_behaviors: vec![
                "open-chest-and-take-materials".to_string(),
                "frequent-position-announcements".to_string(),
                "avoid-helping-others".to_string(),
            ],
            response_patterns: vec!["I'll be back in a sec...".to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_shipped_scenarios_resolve() {
        assert!(lookup_scenario(ScenarioType::Cooperation).is_some());
        assert!(lookup_scenario(ScenarioType::ResourceManagement).is_some());
    }

    #[test]
    fn every_profile_has_a_table_entry() {
        for profile in [
            Profile::Leader,
            Profile::Follower,
            Profile::NonCooperator,
            Profile::Confuser,
            Profile::ResourceHoarder,
            Profile::TaskAbandoner,
        ] {
            let entry = lookup_profile(profile);
            assert_eq!(entry.name, profile);
            assert!(!entry.minecraft_behaviors.is_empty());
        }
    }

    #[test]
    fn tick_interval_matches_mean_formula() {
        let freq = ActionFrequency { min_actions_per_minute: 4.0, max_actions_per_minute: 8.0 };
        assert_eq!(freq.tick_interval_ms(), 60_000 / 6);
    }
}
