//! Concrete providers: the model CLI behind the generation phases and the
//! subprocess commands behind the enrichment jobs.

mod command;
mod json;
mod model_cli;

pub use command::providers_from_config;
pub use model_cli::ModelCliGenerator;
