use clap::Parser;
use ntrip_rover::{config::NtripConfig, state::LogLevel, NtripClient};
use tokio::signal;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt::Subscriber as FmtSubscriber, EnvFilter};

/// NTRIP rover client command line tool
#[derive(Clone, Debug, Parser)]
struct Args {
    #[clap(flatten)]
    ntrip: NtripConfig,

    #[clap(long, default_value = "info")]
    /// Set log level
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = EnvFilter::from_default_env().add_directive(args.log_level.into());
    let _ = FmtSubscriber::builder()
        .compact()
        .without_time()
        .with_max_level(args.log_level)
        .with_env_filter(filter)
        .try_init();

    info!("NTRIP rover {}", NtripClient::version_full());

    let client = NtripClient::new(args.ntrip);

    client.set_state_callback(|old, new| info!("state: {old} -> {new}"));
    client.set_error_callback(|err, detail| error!("error: {err} ({detail})"));
    client.set_log_callback(|level, msg| match level {
        LogLevel::Debug => tracing::debug!("{msg}"),
        LogLevel::Info => info!("{msg}"),
        LogLevel::Warn => tracing::warn!("{msg}"),
        LogLevel::Error => error!("{msg}"),
    });
    client.set_rtcm_callback(|data| info!("received {} bytes of RTCM", data.len()));

    client.connect();

    signal::ctrl_c().await?;
    info!("received ctrl-c, disconnecting");
    client.disconnect().await;

    Ok(())
}
