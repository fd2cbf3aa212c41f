mod bootstrap;
mod runner;
mod sim;

pub(crate) use bootstrap::build_app;
pub(crate) use runner::run;
