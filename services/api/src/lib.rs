mod cli;
mod demo;
mod generator;
mod infra;
mod routes;
mod server;

use revamp::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
