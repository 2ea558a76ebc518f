use tracing::error;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    match ocp4_upi_provisioner::cli::run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_status());
        }
    }
}
