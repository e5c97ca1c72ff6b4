use crate::announcer::DiscordConfig;
use crate::configuration::Configuration;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Parser)]
#[command(about = "Training session slot manager")]
pub struct ConfigurationHandler {
    /// Port the command server listens on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// File the slot pool is mirrored to.
    #[arg(long, env = "STATE_FILE", default_value = "slots.json")]
    state_file: PathBuf,

    /// Role required to claim and unclaim slots.
    #[arg(long, env = "REQUIRED_ROLE", default_value = "store director")]
    required_role: String,

    /// Seconds between completion scans.
    #[arg(long, env = "SCAN_INTERVAL_SECS", default_value_t = 60)]
    scan_interval_secs: u64,

    #[arg(long, env = "TRAINING_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Channel the schedule message and announcements are posted to.
    #[arg(long, env = "SCHEDULE_CHANNEL_ID")]
    schedule_channel_id: Option<String>,

    /// Role pinged in every posted message.
    #[arg(long, env = "PING_ROLE_ID")]
    ping_role_id: Option<String>,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> u16 {
        self.port
    }

    fn state_path(&self) -> PathBuf {
        self.state_file.clone()
    }

    fn required_role(&self) -> String {
        self.required_role.clone()
    }

    fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    fn discord(&self) -> Option<DiscordConfig> {
        match (
            self.bot_token.clone(),
            self.schedule_channel_id.clone(),
            self.ping_role_id.clone(),
        ) {
            (Some(bot_token), Some(schedule_channel_id), Some(ping_role_id)) => {
                Some(DiscordConfig {
                    bot_token,
                    schedule_channel_id,
                    ping_role_id,
                })
            }
            (None, None, None) => None,
            _ => {
                warn!(
                    "incomplete bot configuration, set TRAINING_BOT_TOKEN, \
                     SCHEDULE_CHANNEL_ID and PING_ROLE_ID together"
                );
                None
            }
        }
    }
}
