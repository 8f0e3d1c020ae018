//! Simulation Driver - Runs a scenario day by day
//!
//! Per day: pick the stage, process injected and generated events (rule
//! delta, optional LLM assessment, fusion, apply), fire conditional events,
//! apply stage effects, run daily evolution and persist the snapshot before
//! the next day begins. The driver owns the RNG and the state; the only
//! suspension points are oracle calls and snapshot writes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::domain::{
    clamp_basic, describe_state, relationship_views, risk_factors, significant_events, symptoms,
    Character, DailySnapshot, DomainError, EventRecord, FinalReport, FusionCalculator, Journey,
    LifeEvent, LlmFailures, MentalState, MentalStateView, ProtagonistView, Relationship,
    RuleEngine, RunStatus, Scenario, ScriptedEvent, SimulationMetadata, Stage,
};
use crate::ports::{LlmOracle, SnapshotRepository};
use crate::services::{AnalysisWriter, EventGenerator, LlmAssessor};

/// Injected events keyed by 1-based day
pub type ScriptedEvents = BTreeMap<u32, Vec<ScriptedEvent>>;

/// Virtual hour of the first event of a day
const FIRST_EVENT_HOUR: i64 = 8;
/// Virtual minutes between consecutive events of a day
const EVENT_SPACING_MINUTES: i64 = 45;

/// Everything a finished (or stopped) run produced
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub snapshots: Vec<DailySnapshot>,
    /// Present when every day ran
    pub final_report: Option<FinalReport>,
    pub llm_failures: LlmFailures,
    pub final_state: MentalState,
}

/// Hands out the virtual timestamps of one day
struct DayClock {
    origin: DateTime<Utc>,
    issued: i64,
}

impl DayClock {
    fn new(start_date: DateTime<Utc>, day: u32) -> Self {
        Self {
            origin: start_date
                + ChronoDuration::days(i64::from(day.saturating_sub(1)))
                + ChronoDuration::hours(FIRST_EVENT_HOUR),
            issued: 0,
        }
    }

    fn next(&mut self) -> DateTime<Utc> {
        let at = self.origin + ChronoDuration::minutes(self.issued * EVENT_SPACING_MINUTES);
        self.issued += 1;
        at
    }
}

/// State as of the last completed day
struct DayCheckpoint {
    state: MentalState,
    relationships: Vec<Relationship>,
    history_len: usize,
    fusion: FusionCalculator,
}

pub struct SimulationDriver {
    config: SimulationConfig,
    scenario: Arc<Scenario>,
    protagonist: Character,
    repository: Arc<dyn SnapshotRepository>,
    oracle: Option<Arc<dyn LlmOracle>>,
    generator: EventGenerator,
    assessor: Option<LlmAssessor>,
    rules: RuleEngine,
    fusion: FusionCalculator,
    rng: ChaCha8Rng,
    initial_state: MentalState,
    state: MentalState,
    relationships: Vec<Relationship>,
    /// Every processed event, append-only
    history: Vec<LifeEvent>,
    scripted: ScriptedEvents,
    run_id: Uuid,
    analysis_failures: u32,
}

impl SimulationDriver {
    /// Validate inputs and prepare a run.
    ///
    /// The oracle is used by whichever LLM subsystems the config enables;
    /// without one every subsystem runs rule-only.
    pub fn new(
        scenario: Arc<Scenario>,
        config: SimulationConfig,
        repository: Arc<dyn SnapshotRepository>,
        oracle: Option<Arc<dyn LlmOracle>>,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        scenario.validate()?;
        let protagonist = scenario
            .protagonist()
            .cloned()
            .ok_or_else(|| {
                DomainError::invalid_scenario(&scenario.scenario_name, "no protagonist")
            })?;

        let generator_oracle = oracle
            .clone()
            .filter(|_| config.llm.generator_enabled);
        let generator = EventGenerator::new(Arc::clone(&scenario), &config, generator_oracle)?;
        let assessor = oracle
            .clone()
            .filter(|_| config.llm.assessor_enabled)
            .map(|oracle| LlmAssessor::new(oracle, &config));

        let initial_state = MentalState::new(
            &protagonist.initial_state.clone().unwrap_or_default(),
            &config.constants.depression,
        );

        Ok(Self {
            rules: RuleEngine::new(&config.constants),
            fusion: FusionCalculator::new(&config),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            state: initial_state.clone(),
            initial_state,
            relationships: scenario.relationships.clone(),
            history: Vec::new(),
            scripted: ScriptedEvents::new(),
            run_id: Uuid::new_v4(),
            analysis_failures: 0,
            protagonist,
            generator,
            assessor,
            oracle,
            repository,
            scenario,
            config,
        })
    }

    /// Events injected ahead of the generated ones on their day
    pub fn with_scripted_events(mut self, scripted: ScriptedEvents) -> Self {
        self.scripted = scripted;
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &MentalState {
        &self.state
    }

    pub fn history(&self) -> &[LifeEvent] {
        &self.history
    }

    /// Run every day of the horizon.
    ///
    /// Returns `Err` only when the run directory cannot be prepared or a
    /// state invariant breaks. Cancellation and snapshot write failures are
    /// reported through [`SimulationOutcome::status`].
    pub async fn run(
        mut self,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<SimulationOutcome, DomainError> {
        let total_days = self.config.total_days;
        tracing::info!(
            "🌱 Starting run {} of '{}' ({} days, seed {})",
            self.run_id,
            self.scenario.scenario_name,
            total_days,
            self.config.seed
        );
        self.repository.create_run(self.run_id).await?;

        let mut snapshots = Vec::with_capacity(total_days as usize);
        let mut status = RunStatus::Completed;

        for day in 1..=total_days {
            let last_completed_day = day - 1;
            if is_cancelled(&cancel) {
                status = RunStatus::Cancelled { last_completed_day };
                break;
            }

            let checkpoint = self.checkpoint();
            let finished = tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => None,
                snapshot = self.run_day(day) => Some(snapshot?),
            };
            let Some(snapshot) = finished else {
                self.restore(checkpoint);
                status = RunStatus::Cancelled { last_completed_day };
                break;
            };

            if let Err(e) = self.repository.save_snapshot(self.run_id, &snapshot).await {
                tracing::warn!("⚠️  Could not persist day {}: {}", day, e);
                if status.is_completed() {
                    status = RunStatus::Incomplete {
                        day,
                        reason: e.to_string(),
                    };
                }
            }
            snapshots.push(snapshot);
        }

        if let RunStatus::Cancelled { last_completed_day } = &status {
            tracing::info!(
                "🛑 Run {} cancelled after day {}",
                self.run_id,
                last_completed_day
            );
            return Ok(self.outcome(status, snapshots, None));
        }

        let mut report = self.final_report(&status, snapshots.len() as u32);
        if let Some(writer) = self.analysis_writer() {
            match writer.write(&report, &snapshots).await {
                Ok(analysis) => report.ai_analysis = Some(analysis),
                Err(e) => {
                    tracing::warn!("⚠️  Analysis unavailable: {}", e);
                    self.analysis_failures += 1;
                }
            }
            report.simulation_metadata.llm_failures = self.llm_failures();
        }

        if let Err(e) = self.repository.save_final_report(self.run_id, &report).await {
            tracing::warn!("⚠️  Could not persist final report: {}", e);
        }

        tracing::info!(
            "✅ Run {} finished ({}): {}",
            self.run_id,
            status,
            self.state.summary()
        );
        Ok(self.outcome(status, snapshots, Some(report)))
    }

    /// Process one day and build its snapshot
    async fn run_day(&mut self, day: u32) -> Result<DailySnapshot, DomainError> {
        let total_days = self.config.total_days;
        let Stage { name: stage_name, config: stage } = self
            .scenario
            .stage_for_day(day, total_days)
            .cloned()
            .ok_or_else(|| {
                DomainError::invalid_scenario(&self.scenario.scenario_name, "no stages")
            })?;
        let mut clock = DayClock::new(self.config.start_date, day);
        let mut records = Vec::new();

        let scripted = self.scripted.get(&day).cloned().unwrap_or_default();
        for scripted_event in &scripted {
            let event = self.generator.scripted_event(scripted_event, day, clock.next());
            records.push(self.process_event(event).await?);
        }

        let range = self.config.events_per_day;
        let count = self.rng.gen_range(range.min..=range.max);
        for _ in 0..count {
            let event = self
                .generator
                .generate(&stage, day, clock.next(), &mut self.rng)
                .await;
            records.push(self.process_event(event).await?);
        }

        for tag in self.generator.triggered_rules(&self.state) {
            let spawned = self.generator.conditional_event(
                &tag,
                &self.state,
                day,
                clock.next(),
                &mut self.rng,
            );
            if let Some(event) = spawned {
                records.push(self.process_event(event).await?);
            }
        }

        // stage effects
        let c = &self.config.constants;
        let stressed = f64::from(self.state.stress_level) * stage.stress_modifier;
        self.state.stress_level = clamp_basic(stressed.floor() as i32);
        self.state.refresh(&c.depression);
        for relationship in &mut self.relationships {
            relationship.decay(stage.relationship_decay);
        }

        self.rules.daily_evolution(&mut self.state, &self.history, c);
        self.ensure_invariants()?;

        tracing::info!(
            "📅 Day {}/{} [{}]: {} events, {} / {}",
            day,
            total_days,
            stage_name,
            records.len(),
            self.state.depression_level(),
            self.state.emotion()
        );

        Ok(DailySnapshot {
            day,
            stage: stage_name,
            events: records,
            protagonist: ProtagonistView {
                name: self.protagonist.name.clone(),
                age: self.protagonist.age,
                current_mental_state: MentalStateView::from(&self.state),
                symptoms: symptoms(&self.state),
                risk_factors: risk_factors(&self.state, &self.history),
            },
            relationships: relationship_views(&self.protagonist.name, &self.relationships),
        })
    }

    /// Fuse and apply one event, then append it to the history
    async fn process_event(&mut self, event: LifeEvent) -> Result<EventRecord, DomainError> {
        let recent_len = self.config.constants.events.recent_context;
        let recent = &self.history[self.history.len().saturating_sub(recent_len)..];
        let rules = &self.rules;
        let state = &self.state;
        let profile = &self.protagonist;

        let (rule, assessment) = match self.assessor.as_mut() {
            Some(assessor) if self.config.fusion.parallel_assessment => {
                let (rule, assessment) = tokio::join!(
                    async { rules.rule_delta(&event, state) },
                    assessor.assess(&event, state, recent, profile)
                );
                (rule, Some(assessment))
            }
            Some(assessor) => {
                let rule = rules.rule_delta(&event, state);
                (rule, Some(assessor.assess(&event, state, recent, profile).await))
            }
            None => (rules.rule_delta(&event, state), None),
        };

        let fused = self.fusion.fuse(
            &rule,
            assessment.as_ref(),
            &self.state,
            &self.protagonist.personality,
            event.event_type.is_social(),
            &mut self.rng,
        );
        self.state.apply_delta(&fused.delta, &self.config.constants);
        self.ensure_invariants()?;

        tracing::debug!(
            "🧠 Day {}: '{}' ({:+}) -> total {:+.2}, {}",
            event.day,
            event.description,
            event.impact_score,
            fused.delta.total_impact(),
            self.state.depression_level()
        );

        self.history.push(event.clone());
        Ok(EventRecord {
            event,
            fused_delta: fused.delta,
            provenance: fused.provenance,
        })
    }

    fn checkpoint(&self) -> DayCheckpoint {
        DayCheckpoint {
            state: self.state.clone(),
            relationships: self.relationships.clone(),
            history_len: self.history.len(),
            fusion: self.fusion.clone(),
        }
    }

    /// Drop whatever a day that did not finish applied
    fn restore(&mut self, checkpoint: DayCheckpoint) {
        tracing::debug!(
            "↩️  Discarding {} events of the unfinished day",
            self.history.len() - checkpoint.history_len
        );
        self.state = checkpoint.state;
        self.relationships = checkpoint.relationships;
        self.history.truncate(checkpoint.history_len);
        self.fusion = checkpoint.fusion;
    }

    fn ensure_invariants(&self) -> Result<(), DomainError> {
        self.state
            .check_invariants(&self.config.constants.depression)
            .map_err(|violation| {
                tracing::error!("❌ State invariant violated: {}", violation);
                DomainError::Validation(format!("state invariant violated: {}", violation))
            })
    }

    fn analysis_writer(&self) -> Option<AnalysisWriter> {
        if !self.config.llm.analysis_enabled {
            return None;
        }
        self.oracle
            .as_ref()
            .map(|oracle| AnalysisWriter::new(Arc::clone(oracle), self.config.llm_timeout()))
    }

    fn llm_failures(&self) -> LlmFailures {
        let (assessor_degraded, assessor_timeouts) = self
            .assessor
            .as_ref()
            .map(|a| (a.stats().degraded, a.stats().timeouts))
            .unwrap_or_default();
        LlmFailures {
            assessor_degraded,
            assessor_timeouts,
            generator_fallbacks: self.generator.stats().llm_fallbacks,
            analysis_failures: self.analysis_failures,
        }
    }

    fn final_report(&self, status: &RunStatus, days_completed: u32) -> FinalReport {
        let name = &self.protagonist.name;
        FinalReport {
            simulation_metadata: SimulationMetadata {
                run_id: self.run_id,
                scenario_name: self.scenario.scenario_name.clone(),
                seed: self.config.seed,
                end_time: Utc::now(),
                total_days: self.config.total_days,
                days_completed,
                event_count: self.history.len(),
                status: status.clone(),
                llm_failures: self.llm_failures(),
            },
            protagonist_character_profile: self.protagonist.clone(),
            final_psychological_state: MentalStateView::from(&self.state),
            protagonist_journey: Journey {
                initial_state: describe_state(name, &self.initial_state),
                final_state: describe_state(name, &self.state),
                symptoms: symptoms(&self.state),
                risk_factors: risk_factors(&self.state, &self.history),
            },
            significant_events: significant_events(&self.history),
            ai_analysis: None,
        }
    }

    fn outcome(
        &self,
        status: RunStatus,
        snapshots: Vec<DailySnapshot>,
        final_report: Option<FinalReport>,
    ) -> SimulationOutcome {
        SimulationOutcome {
            run_id: self.run_id,
            status,
            snapshots,
            final_report,
            llm_failures: self.llm_failures(),
            final_state: self.state.clone(),
        }
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
}

/// Resolves once cancellation is signalled; never resolves without a receiver
async fn wait_for_cancel(cancel: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // sender gone without cancelling
            return std::future::pending().await;
        }
    }
}
