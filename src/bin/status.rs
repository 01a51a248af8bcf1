//! Post the most recent observation and annotated image to the social feed.

use std::process::ExitCode;

use anyhow::{Result, bail};

use seeds_core::notify::{Notifier, StatusNotifier};
use seeds_core::storage::LogStore;
use seeds_rs::job;

fn run() -> Result<()> {
    let config = job::load_config()?;
    let mut notifier = StatusNotifier::new(config.social()?.clone());

    let store = LogStore::new(config.log_path(), config.log.schema);
    let Some(observation) = store.last()? else {
        bail!("no observations in {}", store.path().display());
    };

    let image = config.latest_stamped_path();
    let outcome = notifier.publish(&observation, Some(&image));
    outcome.into_result(notifier.name())?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    job::finish("seeds-status", run())
}
