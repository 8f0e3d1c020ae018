//! CadSim - Cognitive-Affective Dynamics simulation engine
//!
//! Simulates the multi-day psychological trajectory of a synthetic patient
//! under scenario-driven life events.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure simulation logic
//!   - `entities/`: State, deltas, events, characters, scenarios, snapshots
//!   - `value_objects/`: Emotion, DepressionLevel, Sentiment, EventType
//!   - `services/`: Rule engine, stochastic layer, fusion, conditions, report
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Snapshot storage
//!   - `services/`: The LLM oracle
//!
//! - **Adapters** (`adapters/`): File and in-memory snapshot stores,
//!   replay and recording oracles
//!
//! - **Services** (`services/`): Assessor, event generator, analysis writer
//!   and the simulation driver
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cadsim::{FileSnapshotRepository, Scenario, SimulationConfig, SimulationDriver};
//!
//! let scenario = Arc::new(Scenario::from_json_str(&json)?);
//! let config = SimulationConfig::rule_only(42, 30);
//! let repository = Arc::new(FileSnapshotRepository::new(&config.log_dir));
//! let outcome = SimulationDriver::new(scenario, config, repository, None)?
//!     .run(None)
//!     .await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export commonly used types
pub use adapters::{
    parse_transcript, FileSnapshotRepository, MemorySnapshotRepository, RecordingOracle,
    ReplayOracle, ReplayOutcome, TranscriptEntry,
};
pub use config::{DynamicsConstants, SimulationConfig};
pub use domain::{
    Assessment, CadState, Character, DailySnapshot, DepressionLevel, DomainError, Emotion,
    EventType, FinalReport, InitialState, LifeEvent, MentalState, MentalStateView, Provenance,
    RunStatus, Scenario, ScriptedEvent, Sentiment, StateDelta,
};
pub use ports::{
    ChatMessage, CompletionOptions, CompletionResponse, LlmOracle, MessageRole, OraclePurpose,
    SnapshotRepository, TokenUsage,
};
pub use services::{
    EventGenerator, LlmAssessor, ScriptedEvents, SimulationDriver, SimulationOutcome,
};
