//! Turn-based battle engine.
//!
//! A [`Battle`] owns two players, their pets, every mark on the field, and
//! a seeded RNG; callers feed it [`PlayerSelection`]s and drive it with
//! [`Battle::advance`], draining the message stream after each call.
//!
//! ```text
//!   submit(selection)        advance()
//!        │                       │
//!        ▼                       ▼
//!   ┌─────────┐   all in   ┌───────────┐  faints  ┌────────┐
//!   │Selection│ ─────────► │ Execution │ ───────► │ Switch │
//!   └─────────┘            └───────────┘          └────────┘
//!        ▲                       │                     │
//!        └───────────────────────┴─────────────────────┘
//! ```
//!
//! Skills and marks carry data-driven [`effect::Effect`] programs; the
//! engine interprets them at fixed trigger sites instead of hard-coding
//! per-skill behavior.
//!
//! [`PlayerSelection`]: tamer_protocol::PlayerSelection

pub mod attribute;
pub mod battle;
pub mod config;
pub mod context;
pub mod effect;
pub mod mark;
pub mod pet;
pub mod player;
pub mod rng;
pub mod skill;
pub mod species;
pub mod store;
pub mod transform;

pub use attribute::{AttributeModifier, ModifierOp, ModifierType};
pub use battle::{Advance, Battle, BattleError, BattlePhase, PlayerSetup, SelectionError};
pub use context::{
    AddMarkCtx, DamageCtx, DamageSource, EffectSource, HealCtx, ParentCtx, RageCtx, SkillCtx,
};
pub use effect::{Effect, Trigger};
pub use mark::{Mark, MarkConfig, MarkDef, StackStrategy};
pub use pet::{Pet, PetBlueprint};
pub use player::{Player, RageReason};
pub use rng::BattleRng;
pub use skill::{Category, Multihit, Skill, SkillDef, TargetOpinion};
pub use species::{Nature, Species, StatSpread};
pub use store::{DataStore, StoreError};
pub use transform::{
    EntityKind, EntityRef, TransformationRecord, TransformationState, TransformationStrategy,
    TransformationSystem,
};
