//! Document templates: field maps, checkpoints and provider definitions.

mod definition;
mod field;
mod map;

pub use definition::TemplateDefinition;
pub use field::{Field, FieldKind};
pub use map::{Checkpoint, Coercion, FieldSpec, TemplateMap};
