pub(crate) mod activity;
pub(crate) mod plots;
pub(crate) mod route;
pub(crate) mod task;
pub(crate) mod visit;
