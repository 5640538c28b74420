use anyhow::Context;
use momsync_core::config::{Config, WarnLevel};
use momsync_core::cursor::CursorStore;
use momsync_core::repository::{Repository, SqliteRepository};
use momsync_outbound::{Dispatcher, PlanningClient, Poller, TaskQueue};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path).context("failed to load config")?;

    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => tracing::error!("config: {}", w.message),
        }
    }
    if Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors (see `momsync config validate`)");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(bridge(config))
}

/// Resolves once `true` is sent or the sender is gone.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// SIGHUP starts a poll cycle without waiting out the interval.
#[cfg(unix)]
fn wake_on_hangup(waker: Arc<tokio::sync::Notify>) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("cannot listen for SIGHUP")?;
    Ok(tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received; polling now");
            waker.notify_one();
        }
    }))
}

async fn bridge(config: Config) -> anyhow::Result<()> {
    let sqlite = SqliteRepository::open(&config.repository.path).with_context(|| {
        format!(
            "cannot open execution repository {}",
            config.repository.path.display()
        )
    })?;
    tracing::info!(
        path = %config.repository.path.display(),
        observations = sqlite.count()?,
        "execution repository opened"
    );
    let repo: Arc<dyn Repository> = Arc::new(sqlite);
    let queue = Arc::new(TaskQueue::new());

    let poller = Poller::new(
        repo.clone(),
        queue.clone(),
        CursorStore::new(&config.poll.cursor_path),
        config.poll.interval(),
    );
    let client = PlanningClient::new(&config.planning)?;
    let dispatcher = Dispatcher::new(queue.clone(), client, config.dispatch.clone());
    #[cfg(unix)]
    let hangup = wake_on_hangup(poller.waker())?;

    let (stop_tx, stop_rx) = watch::channel(false);

    let poller_task = tokio::spawn(poller.run(stopped(stop_rx.clone())));
    let dispatcher_task = tokio::spawn(dispatcher.run(stopped(stop_rx.clone())));
    let listener = config.listener.clone();
    let mut listener_task =
        tokio::spawn(async move { momsync_server::serve(&listener, repo, stopped(stop_rx)).await });

    let early_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::error!(error = %e, "cannot listen for Ctrl-C; shutting down");
            } else {
                tracing::info!("interrupt received; shutting down");
            }
            None
        }
        result = &mut listener_task => Some(result),
    };

    let _ = stop_tx.send(true);
    #[cfg(unix)]
    hangup.abort();
    let listener_result = match early_exit {
        Some(result) => result,
        None => listener_task.await,
    };
    poller_task.await.context("poller task failed")?;
    dispatcher_task.await.context("dispatcher task failed")?;
    listener_result
        .context("listener task failed")?
        .context("inbound listener failed")?;

    tracing::info!(undelivered = queue.len(), "bridge stopped");
    Ok(())
}
