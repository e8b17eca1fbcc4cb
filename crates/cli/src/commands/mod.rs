pub(crate) mod forms;
pub(crate) mod schema;
pub(crate) mod submit;
pub(crate) mod validate;
