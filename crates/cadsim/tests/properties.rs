//! Property tests over seeds, impacts and starting states

use std::future::Future;
use std::sync::Arc;

use cadsim::config::EventsPerDay;
use cadsim::domain::{derive_depression_level, derive_emotion, Stage, StageConfig, PROTAGONIST_KEY};
use cadsim::{
    DailySnapshot, EventType, InitialState, MemorySnapshotRepository, MentalState, Scenario,
    ScriptedEvent, ScriptedEvents, SimulationConfig, SimulationDriver, SimulationOutcome,
};
use proptest::prelude::*;

const SCENARIO: &str = include_str!("../../../scenarios/school_bullying.json");

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn scenario() -> Scenario {
    Scenario::from_json_str(SCENARIO).unwrap()
}

fn quiet_scenario(initial: Option<InitialState>) -> Scenario {
    let mut scenario = scenario();
    scenario.conditional_events.clear();
    scenario.stage_config = vec![Stage {
        name: "baseline".to_string(),
        config: StageConfig::default(),
    }];
    scenario
        .characters
        .get_mut(PROTAGONIST_KEY)
        .unwrap()
        .initial_state = initial;
    scenario
}

fn simulate(
    scenario: Scenario,
    config: SimulationConfig,
    scripted: ScriptedEvents,
) -> SimulationOutcome {
    block_on(async move {
        SimulationDriver::new(
            Arc::new(scenario),
            config,
            Arc::new(MemorySnapshotRepository::new()),
            None,
        )
        .unwrap()
        .with_scripted_events(scripted)
        .run(None)
        .await
        .unwrap()
    })
}

fn one_event_score(seed: u64, impact: i32) -> f64 {
    let mut config = SimulationConfig::rule_only(seed, 1);
    config.events_per_day = EventsPerDay::fixed(0);
    let mut scripted = ScriptedEvents::new();
    scripted.insert(
        1,
        vec![ScriptedEvent::new(EventType::Bullying, "同学当众嘲笑李明的外貌", impact)],
    );
    let depression = config.constants.depression.clone();
    let outcome = simulate(quiet_scenario(None), config, scripted);
    outcome.final_state.cad.depression_score(&depression)
}

fn check_snapshot(
    snapshot: &DailySnapshot,
    config: &SimulationConfig,
) -> Result<(), TestCaseError> {
    let c = &config.constants.depression;
    let view = &snapshot.protagonist.current_mental_state;
    let state = MentalState::from_view(view, c);
    prop_assert!(state.check_invariants(c).is_ok(), "day {}", snapshot.day);

    prop_assert_eq!(view.depression_level, derive_depression_level(&view.cad_state, c));
    prop_assert_eq!(
        view.emotion,
        derive_emotion(
            view.stress_level,
            view.self_esteem,
            view.depression_level,
            view.cad_state.affective_tone
        )
    );

    let restored = DailySnapshot::from_json_str(&snapshot.to_json_pretty().unwrap()).unwrap();
    prop_assert_eq!(&restored, snapshot);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_generated_runs_respect_bounds(seed in any::<u64>()) {
        let mut config = SimulationConfig::rule_only(seed, 6);
        config.events_per_day = EventsPerDay { min: 2, max: 5 };
        let outcome = simulate(scenario(), config.clone(), ScriptedEvents::new());

        prop_assert_eq!(outcome.snapshots.len(), 6);
        for snapshot in &outcome.snapshots {
            check_snapshot(snapshot, &config)?;
            for record in &snapshot.events {
                prop_assert!((-10..=10).contains(&record.event.impact_score));
                prop_assert_eq!(record.event.day, snapshot.day);
            }
        }
    }

    #[test]
    fn test_same_seed_same_run(seed in any::<u64>()) {
        let mut config = SimulationConfig::rule_only(seed, 4);
        config.events_per_day = EventsPerDay { min: 1, max: 4 };
        let first = simulate(scenario(), config.clone(), ScriptedEvents::new());
        let second = simulate(scenario(), config, ScriptedEvents::new());
        prop_assert_eq!(first.snapshots, second.snapshots);
    }

    #[test]
    fn test_harsher_event_never_helps(seed in any::<u64>(), a in -10i32..=10, b in -10i32..=10) {
        prop_assume!(a != b);
        let (mild, harsh) = if a > b { (a, b) } else { (b, a) };
        let mild_score = one_event_score(seed, mild);
        let harsh_score = one_event_score(seed, harsh);
        prop_assert!(
            harsh_score >= mild_score - 1e-9,
            "impact {} scored {} but {} scored {}",
            harsh, harsh_score, mild, mild_score
        );
    }

    #[test]
    fn test_quiet_days_only_decay(
        tone in -10.0f64..=10.0,
        rumination in 0.0f64..=10.0,
        distortions in 0.0f64..=10.0,
        withdrawal in 0.0f64..=10.0,
        avolition in 0.0f64..=10.0,
    ) {
        let initial = InitialState {
            affective_tone: Some(tone),
            rumination: Some(rumination),
            distortions: Some(distortions),
            social_withdrawal: Some(withdrawal),
            avolition: Some(avolition),
            ..InitialState::default()
        };
        let mut config = SimulationConfig::rule_only(1, 5);
        config.events_per_day = EventsPerDay::fixed(0);
        let outcome = simulate(quiet_scenario(Some(initial)), config, ScriptedEvents::new());

        let mut previous = (tone.abs(), rumination, distortions, withdrawal, avolition);
        for snapshot in &outcome.snapshots {
            prop_assert!(snapshot.events.is_empty());
            let cad = &snapshot.protagonist.current_mental_state.cad_state;
            let current = (
                cad.affective_tone.abs(),
                cad.cognitive_processing.rumination,
                cad.cognitive_processing.distortions,
                cad.behavioral_inclination.social_withdrawal,
                cad.behavioral_inclination.avolition,
            );
            prop_assert!(current.0 <= previous.0);
            prop_assert!(current.1 <= previous.1);
            prop_assert!(current.2 <= previous.2);
            prop_assert!(current.3 <= previous.3);
            prop_assert!(current.4 <= previous.4);
            previous = current;
        }
    }
}
