use thiserror::Error;

use crate::config::ConfigError;
use crate::eval::error::EvalError;
use crate::function_registry::RegistryError;
use crate::ruleset::LoadError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type EngineResult<T> = Result<T, Error>;
