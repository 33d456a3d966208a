use clap::Args;

use etymos::config::Config;
use etymos::db::{ConnectionManager, ConnectionTarget};

/// Check whether the database is reachable
#[derive(Args)]
pub struct StatusCommand {
    /// Check this target instead of the configured one
    #[arg(long)]
    target: Option<String>,
}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let manager = ConnectionManager::new(Some(config.database_url.value.clone()));
        let target = ConnectionTarget::from_override(self.target.as_deref());
        let label = match &target {
            ConnectionTarget::Configured => config.database_url.value.clone(),
            ConnectionTarget::Explicit(target) => target.clone(),
        };

        let handle = manager.acquire(&target).await?;
        let ping = handle.ping().await;
        handle.release().await;
        manager.reset().await;
        ping?;

        println!("Connected: {}", label);
        Ok(())
    }
}
