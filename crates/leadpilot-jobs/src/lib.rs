//! # LeadPilot Jobs
//!
//! Everything that runs work and records it.
//!
//! ## Architecture
//! ```text
//! trigger (HTTP /run-workflow, CLI `run`, cron schedule)
//!   └── WorkflowRunner ── PhaseDispatch ─┬── HttpDispatch  (POST own endpoints)
//!         │                              └── LocalDispatch (in-process)
//!         │                                     ├── fetch: ContactSource → LeadStore
//!         │                                     ├── sync:  LeadStore → CrmSink → LeadStore
//!         │                                     └── score: LeadStore → LanguageModel → LeadStore
//!         ├── JobLog (workflow_runner + one job per phase)
//!         └── NotificationSink (summary)
//! ```

pub mod cron;
pub mod joblog;
pub mod notify;
pub mod phases;
pub mod runner;
pub mod scheduler;

pub use cron::CronSchedule;
pub use joblog::JobLog;
pub use notify::SlackNotifier;
pub use phases::PhaseContext;
pub use runner::{
    HttpDispatch, LocalDispatch, Phase, PhaseDispatch, WorkflowFailure, WorkflowReport,
    WorkflowRunner,
};
pub use scheduler::spawn_workflow_schedule;
