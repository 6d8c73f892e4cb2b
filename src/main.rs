mod cli;
mod commands;
mod env_loader;
mod error;
mod lens;
mod logging;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_loader::load_dotenv();
    logging::init();

    if let Err(err) = cli::run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
