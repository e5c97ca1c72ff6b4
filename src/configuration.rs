use crate::announcer::DiscordConfig;
use std::path::PathBuf;
use std::time::Duration;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> u16;
    fn state_path(&self) -> PathBuf;
    fn required_role(&self) -> String;
    fn scan_interval(&self) -> Duration;
    /// `None` when the bot is not fully configured; announcements then
    /// fall back to the log.
    fn discord(&self) -> Option<DiscordConfig>;
}
