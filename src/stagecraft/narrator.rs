//! Narrator trigger evaluation.
//!
//! Decides when the narrator interjects. Pure: the answer depends only on
//! the transcript, the config, a queued description beat, and the seeded
//! RNG handed in by the caller.

use rand::Rng;

use crate::stagecraft::scene::Scene;

/// Whether the next turn should be a narration beat. Fires when a
/// `DescribeScene` signal queued a beat, when `narration_cadence` agent
/// lines have passed since the last narration, or on the seeded
/// `narrator_chance` roll. The chance roll draws from the RNG only when the
/// deterministic triggers did not fire, so replays stay aligned.
pub fn should_narrate<R: Rng>(scene: &Scene, rng: &mut R) -> bool {
    if scene.narration_requested() {
        return true;
    }
    let config = scene.config();
    if config.narration_cadence > 0
        && scene.transcript().agent_lines_since_narration() >= config.narration_cadence
    {
        return true;
    }
    config.narrator_chance > 0.0 && rng.gen::<f64>() < config.narrator_chance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stagecraft::config::SceneConfig;
    use crate::stagecraft::scenario::Scenario;
    use crate::stagecraft::transcript::Speaker;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene(cadence: usize, chance: f64) -> Scene {
        Scene::new(
            Scenario::fallback(0),
            SceneConfig {
                narration_cadence: cadence,
                narrator_chance: chance,
                ..SceneConfig::default()
            },
        )
    }

    #[test]
    fn queued_beat_always_fires() {
        let mut scene = scene(0, 0.0);
        scene.request_narration();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(should_narrate(&scene, &mut rng));
    }

    #[test]
    fn cadence_counts_agent_lines_since_narration() {
        let mut scene = scene(2, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!should_narrate(&scene, &mut rng));

        scene
            .transcript_mut()
            .append(Speaker::character("guide"), "Guide", "This way.");
        assert!(!should_narrate(&scene, &mut rng));

        scene
            .transcript_mut()
            .append(Speaker::character("scholar"), "Scholar", "Wait.");
        assert!(should_narrate(&scene, &mut rng));

        // A narration resets the count.
        scene
            .transcript_mut()
            .append(Speaker::Narrator, "Narrator", "The door creaks open.");
        assert!(!should_narrate(&scene, &mut rng));
    }

    #[test]
    fn zero_cadence_and_zero_chance_never_fire() {
        let mut scene = scene(0, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..10 {
            scene.transcript_mut().append(
                Speaker::character("guide"),
                "Guide",
                format!("Line {}.", i),
            );
            assert!(!should_narrate(&scene, &mut rng));
        }
    }

    #[test]
    fn chance_roll_is_deterministic_per_seed() {
        let scene = scene(0, 0.5);
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(should_narrate(&scene, &mut a), should_narrate(&scene, &mut b));
        }
    }

    #[test]
    fn full_chance_always_fires() {
        let scene = scene(0, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(should_narrate(&scene, &mut rng));
    }
}
