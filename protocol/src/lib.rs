//! Logical protocol types for the tamer battle engine.
//!
//! This crate defines the shared vocabulary between the engine
//! (`tamer-battle`), the effect compiler (`tamer-dsl`), and external
//! consumers (transport, presentation, persistence):
//!
//! ```text
//! tamer-protocol (ids, elements, messages, selections) ← THIS CRATE
//!        │
//!        ▼
//! tamer-battle (engine) ──> message stream ──> transport/presentation
//!        ▲
//! tamer-dsl (effect compiler)
//! ```
//!
//! Nothing in here performs I/O or interprets message contents; these are
//! plain serde-serializable data shapes.

pub mod element;
pub mod ids;
pub mod message;
pub mod selection;
pub mod stat;

pub use element::{Element, ELEMENT_CHART};
pub use ids::{BaseMarkId, BaseSkillId, EffectId, MarkId, PetId, PlayerId, SkillId, SpeciesId};
pub use message::{BattleEvent, BattleMessage, DamageKind, EndReason, SkillFailReason};
pub use selection::PlayerSelection;
pub use stat::{StatStages, StatType, BattleStat};
