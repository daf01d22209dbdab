//! Docker Registry Migrator - migrate Docker images into Artifactory

use docker_registry_migrator::cli::{Cli, Runner};
use docker_registry_migrator::logging::Logger;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let logger = Logger::new(cli.verbose());

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            logger.error(&e.to_string());
            process::exit(2);
        }
    };

    if let Err(e) = Runner::new(config).run().await {
        logger.error(&e.to_string());
        process::exit(1);
    }
}
