//! End-to-end runs of the school bullying scenario

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cadsim::config::{EventsPerDay, LlmSettings};
use cadsim::domain::{InitialState, Stage, StageConfig, PROTAGONIST_KEY};
use cadsim::{
    parse_transcript, DailySnapshot, DepressionLevel, EventType, FileSnapshotRepository,
    LlmOracle, MemorySnapshotRepository, MentalStateView, RecordingOracle, ReplayOracle,
    RunStatus, Scenario, ScriptedEvent, ScriptedEvents, Sentiment, SimulationConfig,
    SimulationDriver, SimulationOutcome, SnapshotRepository, TranscriptEntry,
};
use tokio::sync::watch;
use uuid::Uuid;

const SCENARIO: &str = include_str!("../../../scenarios/school_bullying.json");

const MOCKERY: &str = "同学当众嘲笑李明的外貌";
const HOPELESS_BULLYING: &str = "李明被同学霸凌并嘲笑外貌，对未来感到绝望";
const FAMILY_WEEKEND: &str = "李明和家人一起度过了愉快的周末";

fn scenario() -> Scenario {
    Scenario::from_json_str(SCENARIO).unwrap()
}

/// The fixture with one neutral stage and no conditional rules, so only
/// injected events move the state
fn isolated_scenario() -> Scenario {
    let mut scenario = scenario();
    scenario.conditional_events.clear();
    scenario.stage_config = vec![Stage {
        name: "baseline".to_string(),
        config: StageConfig::default(),
    }];
    scenario
}

fn with_initial_state(mut scenario: Scenario, initial: InitialState) -> Scenario {
    scenario
        .characters
        .get_mut(PROTAGONIST_KEY)
        .unwrap()
        .initial_state = Some(initial);
    scenario
}

/// Rule-only, noise-free and with no generated events
fn scripted_config(days: u32) -> SimulationConfig {
    let mut config = SimulationConfig::rule_only(7, days).deterministic();
    config.events_per_day = EventsPerDay::fixed(0);
    config
}

fn inject(days: &[u32], per_day: usize, event: ScriptedEvent) -> ScriptedEvents {
    days.iter()
        .map(|day| (*day, vec![event.clone(); per_day]))
        .collect::<BTreeMap<_, _>>()
}

async fn run(
    scenario: Scenario,
    config: SimulationConfig,
    scripted: ScriptedEvents,
    oracle: Option<Arc<dyn LlmOracle>>,
) -> SimulationOutcome {
    SimulationDriver::new(
        Arc::new(scenario),
        config,
        Arc::new(MemorySnapshotRepository::new()),
        oracle,
    )
    .unwrap()
    .with_scripted_events(scripted)
    .run(None)
    .await
    .unwrap()
}

fn day(outcome: &SimulationOutcome, day: u32) -> &DailySnapshot {
    &outcome.snapshots[(day - 1) as usize]
}

fn world(outcome: &SimulationOutcome, d: u32) -> f64 {
    day(outcome, d)
        .protagonist
        .current_mental_state
        .cad_state
        .core_beliefs
        .world_belief
}

fn withdrawal(outcome: &SimulationOutcome, d: u32) -> f64 {
    day(outcome, d)
        .protagonist
        .current_mental_state
        .cad_state
        .behavioral_inclination
        .social_withdrawal
}

fn assert_in_bounds(snapshot: &DailySnapshot) {
    let m = &snapshot.protagonist.current_mental_state;
    for basic in [
        m.stress_level,
        m.self_esteem,
        m.social_connection,
        m.academic_pressure,
    ] {
        assert!((0..=10).contains(&basic), "day {}: {}", snapshot.day, basic);
    }
    let cad = &m.cad_state;
    for belief in [
        cad.affective_tone,
        cad.core_beliefs.self_belief,
        cad.core_beliefs.world_belief,
        cad.core_beliefs.future_belief,
    ] {
        assert!((-10.0..=10.0).contains(&belief), "day {}: {}", snapshot.day, belief);
    }
    for load in [
        cad.cognitive_processing.rumination,
        cad.cognitive_processing.distortions,
        cad.behavioral_inclination.social_withdrawal,
        cad.behavioral_inclination.avolition,
    ] {
        assert!((0.0..=10.0).contains(&load), "day {}: {}", snapshot.day, load);
    }
}

fn assessment_json(confidence: f64) -> String {
    format!(
        r#"{{"stress_level": 2, "self_esteem": -1, "affective_tone": -1.5, "self_belief": -1.0,
            "world_belief": -0.5, "rumination": 1.0, "confidence": {},
            "reasoning": "public humiliation"}}"#,
        confidence
    )
}

fn assessment_transcript(count: usize) -> Vec<TranscriptEntry> {
    (0..count)
        .map(|i| TranscriptEntry::response(assessment_json(0.7 + 0.05 * (i % 4) as f64)))
        .collect()
}

fn assessor_only() -> LlmSettings {
    LlmSettings {
        assessor_enabled: true,
        ..LlmSettings::disabled()
    }
}

#[tokio::test]
async fn test_supportive_stream_stays_healthy() {
    let mut scenario = scenario();
    let mut weights = BTreeMap::new();
    weights.insert(Sentiment::Positive, 0.7);
    weights.insert(Sentiment::Neutral, 0.3);
    scenario.stage_config = vec![Stage {
        name: "supportive".to_string(),
        config: StageConfig {
            sentiment_weights: weights,
            ..StageConfig::default()
        },
    }];
    let mut config = SimulationConfig::rule_only(11, 5);
    config.events_per_day = EventsPerDay::fixed(3);

    let outcome = run(scenario, config, ScriptedEvents::new(), None).await;

    let total_events: usize = outcome.snapshots.iter().map(|s| s.events.len()).sum();
    assert_eq!(total_events, 15);
    assert!(outcome
        .snapshots
        .iter()
        .flat_map(|s| &s.events)
        .all(|r| r.event.impact_score >= -1));

    let last = &outcome.snapshots[4].protagonist.current_mental_state;
    assert!(last.depression_level <= DepressionLevel::MinimalSymptoms);
    assert!(last.cad_state.core_beliefs.self_belief >= 0.0);

    let report = outcome.final_report.unwrap();
    assert_eq!(report.simulation_metadata.event_count, 15);
    assert_eq!(report.simulation_metadata.days_completed, 5);
    assert!(report.simulation_metadata.status.is_completed());
}

#[tokio::test]
async fn test_escalating_bullying_erodes_world_belief() {
    let mockery = ScriptedEvent::new(EventType::Bullying, MOCKERY, -6);
    let outcome = run(
        isolated_scenario(),
        scripted_config(10),
        inject(&[3, 5, 7], 1, mockery),
        None,
    )
    .await;

    assert!((world(&outcome, 2) - 0.5).abs() < 1e-9);
    assert!(world(&outcome, 3) < world(&outcome, 2));
    assert!(world(&outcome, 5) < world(&outcome, 3));
    assert!(world(&outcome, 7) < world(&outcome, 5));

    assert!(withdrawal(&outcome, 3) > withdrawal(&outcome, 2));
    assert!(withdrawal(&outcome, 5) > withdrawal(&outcome, 3));
    assert!(withdrawal(&outcome, 7) > withdrawal(&outcome, 5));

    let last = &day(&outcome, 10).protagonist.current_mental_state;
    assert!(last.depression_level >= DepressionLevel::Moderate);
    for snapshot in &outcome.snapshots {
        assert_in_bounds(snapshot);
    }
}

#[tokio::test]
async fn test_sustained_extreme_stream_pins_the_state() {
    let event = ScriptedEvent::new(EventType::Bullying, HOPELESS_BULLYING, -8);
    let days: Vec<u32> = (1..=30).collect();
    let outcome = run(
        isolated_scenario(),
        scripted_config(30),
        inject(&days, 4, event),
        None,
    )
    .await;

    for snapshot in &outcome.snapshots {
        assert_in_bounds(snapshot);
        let m = &snapshot.protagonist.current_mental_state;
        let beliefs = &m.cad_state.core_beliefs;
        assert!((beliefs.self_belief + 10.0).abs() < 1e-9, "day {}", snapshot.day);
        assert!((beliefs.world_belief + 10.0).abs() < 1e-9, "day {}", snapshot.day);
        assert!((beliefs.future_belief + 10.0).abs() < 1e-9, "day {}", snapshot.day);
        assert_eq!(m.stress_level, 10);
        assert_eq!(m.self_esteem, 0);
        assert_eq!(m.social_connection, 0);
    }

    let first_critical = outcome
        .snapshots
        .iter()
        .position(|s| {
            s.protagonist.current_mental_state.depression_level == DepressionLevel::Critical
        })
        .unwrap();
    assert!(first_critical < 3);
    assert!(outcome.snapshots[first_critical..]
        .iter()
        .all(|s| s.protagonist.current_mental_state.depression_level == DepressionLevel::Critical));

    for snapshot in &outcome.snapshots[1..] {
        let cad = &snapshot.protagonist.current_mental_state.cad_state;
        assert!(cad.cognitive_processing.rumination >= 9.0, "day {}", snapshot.day);
        assert!(cad.behavioral_inclination.social_withdrawal >= 9.0, "day {}", snapshot.day);
    }
    for snapshot in &outcome.snapshots[19..] {
        let cad = &snapshot.protagonist.current_mental_state.cad_state;
        assert!(cad.affective_tone <= -9.5, "day {}", snapshot.day);
    }
    let last = &day(&outcome, 30).protagonist.current_mental_state;
    assert!(last.cad_state.cognitive_processing.distortions >= 9.0);
    assert_eq!(outcome.final_state.depression_level(), DepressionLevel::Critical);
}

#[tokio::test]
async fn test_family_support_lifts_negative_self_belief() {
    let scenario = with_initial_state(
        isolated_scenario(),
        InitialState {
            self_belief: Some(-3.0),
            ..InitialState::default()
        },
    );
    let weekend = ScriptedEvent::new(EventType::SocialSupport, FAMILY_WEEKEND, 4);
    let outcome = run(scenario, scripted_config(5), inject(&[1, 2, 3], 1, weekend), None).await;

    let self_belief = |d: u32| {
        day(&outcome, d)
            .protagonist
            .current_mental_state
            .cad_state
            .core_beliefs
            .self_belief
    };
    assert!((self_belief(1) + 3.0).abs() < 1e-9);
    assert!(self_belief(5) - (-3.0) >= 0.3);
    for d in 2..=5 {
        assert!(self_belief(d) > self_belief(d - 1), "day {}", d);
    }
}

#[tokio::test(start_paused = true)]
async fn test_assessor_timeouts_fall_back_to_rules() {
    let mockery = ScriptedEvent::new(EventType::Bullying, MOCKERY, -6);
    let scripted = inject(&[3, 5, 7], 1, mockery);

    let baseline = run(isolated_scenario(), scripted_config(10), scripted.clone(), None).await;

    let mut config = scripted_config(10);
    config.llm = LlmSettings::default();
    let oracle: Arc<dyn LlmOracle> = Arc::new(ReplayOracle::always_timeout());
    let degraded = run(isolated_scenario(), config, scripted, Some(oracle)).await;

    let records: Vec<_> = degraded.snapshots.iter().flat_map(|s| &s.events).collect();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.provenance.llm_degraded && !r.provenance.llm_used));

    for (a, b) in baseline.snapshots.iter().zip(&degraded.snapshots) {
        assert_eq!(a.protagonist, b.protagonist, "day {}", a.day);
    }
    assert_eq!(degraded.llm_failures.assessor_timeouts, 3);
    assert_eq!(degraded.llm_failures.analysis_failures, 1);
    assert!(degraded.status.is_completed());

    let report = degraded.final_report.unwrap();
    assert!(report.ai_analysis.is_none());
    assert_eq!(report.simulation_metadata.llm_failures.assessor_timeouts, 3);
}

#[tokio::test]
async fn test_high_stress_spawns_conditional_crisis() {
    let scenario = with_initial_state(
        scenario(),
        InitialState {
            stress_level: Some(9),
            ..InitialState::default()
        },
    );
    let mut config = SimulationConfig::rule_only(3, 1);
    config.events_per_day = EventsPerDay::fixed(0);

    let outcome = run(scenario, config, ScriptedEvents::new(), None).await;

    let crisis = outcome.snapshots[0]
        .events
        .iter()
        .find(|r| r.event.conditional_tag.as_deref() == Some("high_stress"))
        .expect("high_stress rule should fire on day 1");
    assert!(crisis.event.impact_score <= -4);
    assert_eq!(crisis.event.event_type, EventType::StressCrisis);
    assert_eq!(crisis.event.participants.first().map(String::as_str), Some("李明"));
}

#[tokio::test]
async fn test_same_seed_writes_identical_day_files() {
    let root = std::env::temp_dir().join(format!("cadsim-repro-{}", Uuid::new_v4()));
    let mut files = Vec::new();

    for _ in 0..2 {
        let repository = Arc::new(FileSnapshotRepository::new(&root));
        let mut config = SimulationConfig::rule_only(2024, 6);
        config.events_per_day = EventsPerDay { min: 2, max: 5 };
        let run_id = Uuid::new_v4();
        let outcome = SimulationDriver::new(Arc::new(scenario()), config, repository, None)
            .unwrap()
            .with_run_id(run_id)
            .run(None)
            .await
            .unwrap();
        assert!(outcome.status.is_completed());

        let mut days = Vec::new();
        for d in 1..=6 {
            let path = root.join(run_id.to_string()).join(format!("day_{}.json", d));
            days.push(std::fs::read(path).unwrap());
        }
        files.push(days);
    }

    assert_eq!(files[0], files[1]);
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_recorded_transcript_replays_identically() {
    let mockery = ScriptedEvent::new(EventType::Bullying, MOCKERY, -6);
    let scripted = inject(&[1, 2, 4], 2, mockery);
    let mut config = SimulationConfig::rule_only(99, 5);
    config.llm = assessor_only();
    config.events_per_day = EventsPerDay { min: 1, max: 2 };

    let recorder = Arc::new(RecordingOracle::new(Arc::new(ReplayOracle::new(
        assessment_transcript(6),
    ))));
    let recorded = run(
        scenario(),
        config.clone(),
        scripted.clone(),
        Some(Arc::clone(&recorder) as Arc<dyn LlmOracle>),
    )
    .await;
    assert!(recorded
        .snapshots
        .iter()
        .flat_map(|s| &s.events)
        .any(|r| r.provenance.llm_used));

    let transcript = parse_transcript(&recorder.transcript_json().unwrap()).unwrap();
    let replay: Arc<dyn LlmOracle> = Arc::new(ReplayOracle::new(transcript));
    let replayed = run(scenario(), config, scripted, Some(replay)).await;

    assert_eq!(recorded.snapshots, replayed.snapshots);
    assert_eq!(recorded.llm_failures, replayed.llm_failures);
}

#[tokio::test]
async fn test_parallel_and_serial_assessment_agree() {
    let mockery = ScriptedEvent::new(EventType::Bullying, MOCKERY, -6);
    let scripted = inject(&[1, 3], 2, mockery);
    let mut outcomes = Vec::new();

    for parallel in [true, false] {
        let mut config = SimulationConfig::rule_only(5, 4);
        config.llm = assessor_only();
        config.fusion.parallel_assessment = parallel;
        config.events_per_day = EventsPerDay::fixed(0);
        let oracle: Arc<dyn LlmOracle> = Arc::new(ReplayOracle::new(assessment_transcript(4)));
        outcomes.push(run(isolated_scenario(), config, scripted.clone(), Some(oracle)).await);
    }

    assert_eq!(outcomes[0].snapshots, outcomes[1].snapshots);
    assert!(outcomes[0]
        .snapshots
        .iter()
        .flat_map(|s| &s.events)
        .all(|r| r.provenance.llm_used));
}

#[tokio::test]
async fn test_snapshot_write_failure_marks_run_incomplete() {
    let repository = Arc::new(MemorySnapshotRepository::failing_on_day(2));
    let config = SimulationConfig::rule_only(8, 4);
    let driver = SimulationDriver::new(
        Arc::new(scenario()),
        config,
        Arc::clone(&repository) as Arc<dyn SnapshotRepository>,
        None,
    )
    .unwrap();
    let run_id = driver.run_id();

    let outcome = driver.run(None).await.unwrap();

    match &outcome.status {
        RunStatus::Incomplete { day, .. } => assert_eq!(*day, 2),
        other => panic!("expected incomplete run, got {}", other),
    }
    assert_eq!(outcome.snapshots.len(), 4);
    assert_eq!(repository.list_days(run_id).await.unwrap(), vec![1, 3, 4]);

    let report = repository.load_final_report(run_id).await.unwrap().unwrap();
    assert!(!report.simulation_metadata.status.is_completed());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let outcome = SimulationDriver::new(
        Arc::new(scenario()),
        SimulationConfig::rule_only(1, 3),
        Arc::new(MemorySnapshotRepository::new()),
        None,
    )
    .unwrap()
    .run(Some(rx))
    .await
    .unwrap();

    assert_eq!(outcome.status, RunStatus::Cancelled { last_completed_day: 0 });
    assert!(outcome.snapshots.is_empty());
    assert!(outcome.final_report.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_pending_assessment() {
    let repository = Arc::new(MemorySnapshotRepository::new());
    let mut config = scripted_config(5);
    config.llm = assessor_only();
    config.llm.timeout_secs = 600;
    // the first event of day 2 is assessed, the second never gets an answer
    let replay = Arc::new(ReplayOracle::new(vec![
        TranscriptEntry::response(assessment_json(0.9)),
        TranscriptEntry::timeout(),
    ]));
    let oracle: Arc<dyn LlmOracle> = Arc::clone(&replay) as Arc<dyn LlmOracle>;
    let mockery = ScriptedEvent::new(EventType::Bullying, MOCKERY, -6);

    let driver = SimulationDriver::new(
        Arc::new(isolated_scenario()),
        config,
        Arc::clone(&repository) as Arc<dyn SnapshotRepository>,
        Some(oracle),
    )
    .unwrap()
    .with_scripted_events(inject(&[2], 2, mockery));
    let run_id = driver.run_id();

    let (tx, rx) = watch::channel(false);
    let (outcome, _) = tokio::join!(driver.run(Some(rx)), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
    });
    let outcome = outcome.unwrap();

    assert_eq!(outcome.status, RunStatus::Cancelled { last_completed_day: 1 });
    assert_eq!(outcome.snapshots.len(), 1);
    assert_eq!(repository.list_days(run_id).await.unwrap(), vec![1]);
    assert!(repository.load_final_report(run_id).await.unwrap().is_none());

    assert_eq!(replay.remaining(), 0);
    assert_eq!(
        MentalStateView::from(&outcome.final_state),
        outcome.snapshots[0].protagonist.current_mental_state
    );
}
