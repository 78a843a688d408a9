//! Agent Runtime - conversational scheduling turns
//!
//! This crate drives one scheduling conversation per session:
//! - Extracts scheduling details deterministically from each message
//! - Asks an external decision function for the next action
//! - Holds mutating actions behind an explicit yes/no confirmation
//! - Executes confirmed actions against calendar and mail collaborators
//!
//! # Architecture
//!
//! Each turn follows a constrained loop:
//! 1. **Slot Extraction** (`conversation`) - Parse text into a `SlotDelta`
//! 2. **Confirmation Gate** (`guardrails`) - Resolve a pending proposal first
//! 3. **Decision Policy** (`policy`, `llm`) - Validate the model's JSON into an `Action`
//! 4. **Tool Execution** (`tools`) - Call the calendar or mail collaborator
//! 5. **Reply** (`runtime`) - Record the reply in session history
//!
//! # Key Types
//!
//! - `TurnOrchestrator` - Main entry point (see `runtime` module)
//! - `DecisionFunction` - Pluggable trait for the model backend
//! - `AuthorizedAction` - The only input the executor accepts
//!
//! # Safety Principle
//!
//! The model is strictly an advisor. It never creates events or sends email on
//! its own; only a confirmed proposal reaches the collaborators.

pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod policy;
pub mod runtime;
pub mod session;
pub mod tools;

pub use runtime::{OrchestratorSettings, SessionStart, TurnOrchestrator, TurnReply};
