//! Speaker selection.
//!
//! [`decide`] is a pure function of scene state and the caller-supplied
//! seeded RNG; it performs no I/O and mutates nothing, so a scene replayed
//! with the same seed and the same generation output makes identical
//! decisions. All randomness flows through the `rng` argument — there is no
//! global RNG anywhere in the crate.

use rand::Rng;

use crate::stagecraft::narrator;
use crate::stagecraft::scene::Scene;

/// What the loop should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnDecision {
    /// Invoke the character with this id.
    Character(String),
    /// Invoke the narrator.
    Narrator,
    /// Suspend until the user submits a line.
    AwaitUser,
    /// Terminate the scene.
    EndScene,
}

/// Pick the next turn. Checks run in a fixed order:
///
/// 1. End when an agent asked for it or the turn cap is reached.
/// 2. Yield to the user when requested or when the configured interval of
///    agent turns has elapsed since the last user line.
/// 3. Narrate when the narrator trigger fires.
/// 4. Weighted pick over active characters, weight
///    `turns_since_last_spoke + 1`. A character silent for at least
///    roster-size turns is picked outright so nobody starves.
/// 5. Yield to the user when no active characters remain.
pub fn decide<R: Rng>(scene: &Scene, rng: &mut R) -> TurnDecision {
    let config = scene.config();

    if scene.end_requested() || scene.turns_taken() >= config.max_turns {
        return TurnDecision::EndScene;
    }

    if scene.user_requested()
        || (config.user_turn_interval > 0
            && scene.agent_turns_since_user() >= config.user_turn_interval)
    {
        return TurnDecision::AwaitUser;
    }

    if narrator::should_narrate(scene, rng) {
        return TurnDecision::Narrator;
    }

    let active = scene.active_character_ids();
    if active.is_empty() {
        return TurnDecision::AwaitUser;
    }

    if let Some(starved) = starved_character(scene, &active) {
        return TurnDecision::Character(starved.to_string());
    }

    TurnDecision::Character(weighted_pick(scene, &active, rng).to_string())
}

/// The first active character (lowest silence count, then registration
/// order) that has been silent for at least roster-size turns, if any.
fn starved_character<'a>(scene: &Scene, active: &[&'a str]) -> Option<&'a str> {
    let threshold = active.len();
    active
        .iter()
        .filter(|id| silence(scene, id) >= threshold)
        .min_by_key(|id| silence(scene, id))
        .copied()
}

fn weighted_pick<'a, R: Rng>(scene: &Scene, active: &[&'a str], rng: &mut R) -> &'a str {
    let weights: Vec<usize> = active.iter().map(|id| silence(scene, id) + 1).collect();
    let total: usize = weights.iter().sum();
    let mut roll = rng.gen_range(0..total);
    for (id, weight) in active.iter().zip(&weights) {
        if roll < *weight {
            return id;
        }
        roll -= weight;
    }
    // Unreachable while weights sum to `total`; keep the last id as the
    // arithmetic backstop.
    active[active.len() - 1]
}

fn silence(scene: &Scene, id: &str) -> usize {
    scene
        .state(id)
        .map(|s| s.turns_since_last_spoke)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stagecraft::config::SceneConfig;
    use crate::stagecraft::scenario::Scenario;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_config() -> SceneConfig {
        SceneConfig {
            narrator_chance: 0.0,
            narration_cadence: 0,
            user_turn_interval: 0,
            ..SceneConfig::default()
        }
    }

    fn scene_with(config: SceneConfig) -> Scene {
        Scene::new(Scenario::fallback(0), config)
    }

    #[test]
    fn end_takes_priority() {
        let mut scene = scene_with(quiet_config());
        scene.request_end();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(decide(&scene, &mut rng), TurnDecision::EndScene);
    }

    #[test]
    fn turn_cap_ends_the_scene() {
        let mut scene = scene_with(SceneConfig {
            max_turns: 2,
            ..quiet_config()
        });
        scene.count_turn();
        scene.count_turn();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(decide(&scene, &mut rng), TurnDecision::EndScene);
    }

    #[test]
    fn user_request_yields_before_narration() {
        let mut scene = scene_with(SceneConfig {
            narration_cadence: 1,
            ..quiet_config()
        });
        scene.request_user();
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(decide(&scene, &mut rng), TurnDecision::AwaitUser);
    }

    #[test]
    fn decisions_replay_identically_per_seed() {
        let scene = scene_with(quiet_config());
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(decide(&scene, &mut a), decide(&scene, &mut b));
        }
    }

    #[test]
    fn starved_character_is_forced() {
        let mut scene = scene_with(quiet_config());
        scene.state_mut("guide").unwrap().turns_since_last_spoke = 3;
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            decide(&scene, &mut rng),
            TurnDecision::Character("guide".into())
        );
    }

    #[test]
    fn no_active_characters_yields_to_user() {
        let mut scene = scene_with(quiet_config());
        for id in ["adventurer", "scholar", "guide"] {
            scene.state_mut(id).unwrap().active = false;
        }
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(decide(&scene, &mut rng), TurnDecision::AwaitUser);
    }

    #[test]
    fn fairness_bound_holds_over_many_turns() {
        // Simulate selection + merge bookkeeping without generation. The
        // policy must pick a starved character whenever one exists; since
        // several characters can cross the threshold on the same turn and
        // drain one per turn, the counters stay within twice the roster
        // size.
        let mut scene = scene_with(SceneConfig {
            max_turns: usize::MAX,
            ..quiet_config()
        });
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let ids: Vec<String> = scene
                .active_character_ids()
                .iter()
                .map(|s| s.to_string())
                .collect();
            let starved: Vec<String> = ids
                .iter()
                .filter(|id| scene.state(id).unwrap().turns_since_last_spoke >= ids.len())
                .cloned()
                .collect();

            let picked = match decide(&scene, &mut rng) {
                TurnDecision::Character(id) => id,
                other => panic!("unexpected decision: {:?}", other),
            };
            if !starved.is_empty() {
                assert!(starved.contains(&picked), "passed over starved characters");
            }

            for id in &ids {
                let state = scene.state_mut(id).unwrap();
                if *id == picked {
                    state.turns_since_last_spoke = 0;
                } else {
                    state.turns_since_last_spoke += 1;
                }
                assert!(state.turns_since_last_spoke <= 2 * ids.len());
            }
        }
    }
}
