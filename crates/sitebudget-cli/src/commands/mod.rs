pub mod config;
pub mod domain;
pub mod run;
pub mod stats;

use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use sitebudget_core::clock::now_ms;
use sitebudget_core::storage::data_dir;
use sitebudget_core::{Config, Database, DomainRegistry, Records};

pub type CliResult = Result<(), Box<dyn Error>>;

/// Where this invocation keeps `config.toml` and `sitebudget.db`.
pub struct Context {
    data_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self { data_dir }
    }

    pub fn dir(&self) -> Result<PathBuf, Box<dyn Error>> {
        match &self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => Ok(data_dir()?),
        }
    }

    pub fn config_path(&self) -> Result<PathBuf, Box<dyn Error>> {
        Ok(self.dir()?.join("config.toml"))
    }

    pub fn config(&self) -> Result<Config, Box<dyn Error>> {
        Ok(Config::load_from(&self.config_path()?)?)
    }

    pub fn database(&self) -> Result<Database, Box<dyn Error>> {
        Ok(Database::open_at(&self.dir()?.join("sitebudget.db"))?)
    }

    /// Registry over the on-disk store, seeded with the default domains on
    /// first use.
    pub fn registry(&self) -> Result<DomainRegistry, Box<dyn Error>> {
        let config = self.config()?;
        let records = Records::new(Arc::new(self.database()?));
        let registry = DomainRegistry::new(records);
        block_on(registry.seed_defaults(&config, now_ms()))??;
        Ok(registry)
    }
}

/// Drive an async core call from a synchronous command.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
