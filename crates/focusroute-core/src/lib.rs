//! # Focusroute Core Library
//!
//! This library provides the planning logic behind the `focusroute` CLI: it
//! picks the day's most important tasks from a to-do list and recent mail,
//! then places them as focus blocks on a calendar.
//!
//! ## Architecture
//!
//! - **Scheduler**: Free-time computation and greedy block placement inside a
//!   workday, with lunch, buffers and quotas
//! - **Ranking**: LLM-assisted mail filtering, MIT selection and duration
//!   estimates with deterministic fallbacks
//! - **Integrations**: Google Calendar/Gmail, Notion, Ollama and in-memory
//!   collaborators behind small synchronous traits
//! - **Storage**: TOML configuration and the SQLite linkage store
//!
//! ## Key Components
//!
//! - [`BlockPlacer`]: Places tasks for one day
//! - [`DailyRouter`]: Runs the whole daily pipeline
//! - [`Config`]: Application configuration management
//! - [`LinkageStore`]: Mail thread to to-do/event mapping

pub mod error;
pub mod integrations;
pub mod interval;
pub mod ranking;
pub mod scheduler;
pub mod storage;
pub mod workflow;

pub use error::{ConfigError, CoreError, DatabaseError, OAuthError, RunError, ValidationError};
pub use interval::{BusySet, TimeInterval};
pub use ranking::{Candidate, CandidateSource, EstimatedTask};
pub use scheduler::{
    BlockKind, BlockPlacer, DayPlan, DropReason, DroppedTask, PlacedBlock, TaskRequest,
    WorkdayRules,
};
pub use storage::{Config, LinkageRecorder, LinkageStore, Mapping};
pub use workflow::{DailyRouter, PlanSummary};
