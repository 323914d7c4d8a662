use botfleet::config::Config;
use botfleet::supervisor::{EXIT_FATAL, startup_exit_code};
use botfleet::worker::{IdleSession, WorkerArgs};
use mimalloc::MiMalloc;
use tracing::error;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("botfleet-worker: invalid configuration: {e}");
            std::process::exit(EXIT_FATAL);
        }
    };
    botfleet::logging::init_tracing(&cfg.basic.loglevel, true);

    let args = match WorkerArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            error!(error = %e, "usage: botfleet-worker <tenant> [project] [localhost] [args...]");
            std::process::exit(startup_exit_code(&e));
        }
    };

    let code = botfleet::worker::run(args, &cfg, Box::new(IdleSession)).await;
    std::process::exit(code);
}
