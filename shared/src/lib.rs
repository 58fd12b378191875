pub mod task;
pub mod validation;

pub use task::{
    timestamp_now, CreateTaskRequest, Task, TaskPatch, TaskResponse, TaskStatus,
    UnknownStatus, UpdateTaskRequest, DESCRIPTION_MAX_LENGTH, TITLE_MAX_LENGTH,
};
pub use validation::{Constraint, FieldRule, Validate, ValidationError};
