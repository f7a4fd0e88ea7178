use anyhow::Context as _;
use kobo::config::Config;
use kobo::context::AppContext;
use kobo::job;
use kobo::outbound::{EmailService, LoggingEmailService, TextStatementRenderer};
use kobo::pipeline::Pipeline;
use kobo::subscriber::{AuditTrail, InsufficientFundsAlert, TransferLogSubscriber};
use kobo_mq::{Dispatcher, OutboxRelay};
use kobo_scheduler::Scheduler;
use kobo_store::Store;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database.url)
        .await
        .context("connecting to the database")?;
    kobo_store::migrate(&pool)
        .await
        .context("applying migrations")?;

    let store = Store::pg(&pool);
    let email: Box<dyn EmailService> = Box::new(LoggingEmailService);

    let dispatcher = Dispatcher::new()
        .on("MoneyTransferred", TransferLogSubscriber)
        .on("InsufficientFunds", InsufficientFundsAlert::new(email.clone()))
        .on_any(AuditTrail);

    let ctx = AppContext {
        store: store.clone(),
        dispatcher: dispatcher.clone(),
        email: email.clone(),
        renderer: Box::new(TextStatementRenderer),
    };

    let token = CancellationToken::new();

    // single logical relay worker per deployment
    let relay = OutboxRelay::new(store, dispatcher).with_config(config.outbox.clone());
    let relay_handle = relay.start(token.clone());

    let scheduler = job::register_handlers(
        Scheduler::new(kobo_scheduler::Pg::new(&pool)).with_config(config.scheduler.clone()),
        &ctx,
    )
    .alert_sink(job::DeadJobAlert::new(email));
    job::register_schedules(&scheduler, &config.scheduled_jobs)
        .await
        .context("registering recurring jobs")?;
    let scheduler_handle = scheduler.start(token.clone());

    // the transport binding (RPC/REST) adapts its wire messages onto this
    // pipeline; none is compiled into the core service
    let _pipeline: Pipeline = Pipeline::new(ctx);

    info!("kobo is up");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    token.cancel();

    let _ = tokio::join!(relay_handle, scheduler_handle);
    info!("kobo stopped");

    Ok(())
}
