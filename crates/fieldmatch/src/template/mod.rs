pub mod merge;
pub mod model;
pub mod store;

pub use merge::{
    apply_contribution, ConflictPolicy, ConflictResolution, FieldConflict, RowContribution,
    UpsertOutcome,
};
pub use model::{
    FieldError, FieldType, InstanceStats, InstanceStatus, RowFilter, RowStatus, Template,
    TemplateField, TemplateInstance, TemplateInstanceRow,
};
pub use store::InstanceStore;
