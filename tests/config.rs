mod support;

use std::time::Duration;

use tasklens::app::App;
use tasklens::cache::{AnalyticsCache, FileCache};
use tasklens::config::{CacheBackend, Config};
use tasklens::context::Context;
use tasklens::jobs::CycleOutcome;
use tasklens::task::NewTask;

use support::{days_ago, TestEnv};

#[test]
fn relative_paths_resolve_next_to_the_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new();
    let path = env.write_cli_config()?;

    let config = Config::load(&path)?;
    assert_eq!(config.database_path(), env.db_path());
    assert_eq!(config.cache_dir(), env.path().join("cache"));
    assert_eq!(config.cache.backend, CacheBackend::File);
    assert_eq!(config.refresh.policy()?.delay, Duration::from_millis(10));
    assert_eq!(config.refresh_period()?, Duration::from_secs(6 * 3600));
    assert_eq!(config.sweep_period()?, Duration::from_secs(24 * 3600));
    Ok(())
}

#[tokio::test]
async fn app_refresh_writes_the_configured_file_cache() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new();
    env.add(NewTask::new("due soon", days_ago(1)));
    let config = Config::load(&env.write_cli_config()?)?;

    let app = App::open(&config)?;
    let outcome = app.refresh_job().run_cycle(&Context::background()).await;
    assert!(matches!(outcome, CycleOutcome::Refreshed(_)));

    let cached = FileCache::new(config.cache_dir()).get()?.expect("cached snapshot");
    assert_eq!(cached.pending, 1);

    let served = app.tasks().get_analytics(&Context::background()).await?;
    assert_eq!(served, cached);
    Ok(())
}

#[test]
fn invalid_file_is_rejected_by_app() {
    let env = TestEnv::new();
    let path = env
        .write_file("tasklens.toml", "[refresh]\nretry_delay = \"whenever\"\n")
        .unwrap();
    assert!(Config::load(&path).is_err());

    let mut config = Config::default();
    config.sweep.attempts = 0;
    assert!(App::open(&config).is_err());
}
