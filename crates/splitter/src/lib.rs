//! Session modifiers: the conditional splitter, expression filters and the
//! per-property registry that chains them.

pub mod conditions;
pub mod expr;
pub mod filter;
pub mod modifier;
pub mod registry;
pub mod splitter;

pub use conditions::{
    ElapsedTimeCondition, MaxEventsCondition, SplitCondition, SplitContext, ValueChangedCondition,
};
pub use filter::{FilterCondition, FilterModifier, FilterType, FiltersConfig};
pub use modifier::{ModifierChain, NoopModifier, SessionModifier};
pub use registry::{SettingsSplitterRegistry, SplitSettings, SplitterRegistry, StaticSplitterRegistry};
pub use splitter::Splitter;
