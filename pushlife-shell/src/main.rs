// pushlife shell: console display shell over the notification lifecycle,
// backed by the loopback transport and an optional HTTP token sink.

mod config;
mod consent;
mod console;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pushlife_core::{LifecycleOrchestrator, LoopbackTransport, NotificationPayload};
use tokio::io::AsyncBufReadExt;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut launch = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("pushlife-shell {}", VERSION);
                return Ok(());
            }
            "--launch" => launch = Some(args.next().context("--launch needs a JSON payload")?),
            "--config" => {
                config_path = Some(PathBuf::from(args.next().context("--config needs a path")?))
            }
            other => anyhow::bail!("unknown argument {:?}", other),
        }
    }

    let filter = std::env::var("PUSHLIFE_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let cfg = config::load(config_path.as_deref());
    let launch = launch
        .map(|s| NotificationPayload::from_json(&s))
        .transpose()
        .context("invalid --launch payload")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cfg, launch))
}

async fn run(cfg: config::Config, launch: Option<NotificationPayload>) -> anyhow::Result<()> {
    let transport = Arc::new(LoopbackTransport::new());
    if let Some(payload) = launch {
        transport.set_launch_notification(payload).await;
    }
    let presenter = Arc::new(console::ConsolePresenter::new());
    let (orchestrator, mut intents) = LifecycleOrchestrator::new(
        cfg.core.clone(),
        cfg.platform,
        transport.clone(),
        Arc::new(consent::StaticConsent(cfg.consent)),
        presenter.clone(),
    );
    let orchestrator = match &cfg.server_url {
        Some(url) => {
            log::info!("token sink: {}", url);
            orchestrator.with_sink(Arc::new(sink::HttpTokenSink::new(url.clone())))
        }
        None => orchestrator,
    };
    let orchestrator = Arc::new(orchestrator);

    tokio::spawn(async move {
        while let Some(intent) = intents.recv().await {
            console::print_intent(&intent);
        }
    });

    let session = orchestrator.mount();

    let mut phase = orchestrator.watch_phase();
    let topic_orchestrator = orchestrator.clone();
    let topics = cfg.topics.clone();
    tokio::spawn(async move {
        let ready = phase.wait_for(|p| p.is_ready()).await.is_ok();
        if ready {
            for topic in &topics {
                topic_orchestrator.subscribe_to_topic(topic).await;
            }
        }
    });

    let console = console::Console {
        orchestrator,
        transport,
        presenter,
    };
    println!("{}", console::HELP);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match console::parse_command(&line) {
                    Ok(cmd) => {
                        if !console.handle(cmd).await {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            r = &mut shutdown => {
                r?;
                break;
            }
        }
    }

    session.shutdown().await;
    log::info!("pushlife shell stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
