use crate::schedule::ScheduleView;
use crate::types::{slot_time, Slot};
use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

/// Outbound side of the bot: the single upserted schedule message and the
/// one-off completion announcements.
#[async_trait]
pub trait Announcer: Send + Sync + 'static {
    /// Verify the channel is usable. Gates the completion scanner.
    async fn ready(&self) -> anyhow::Result<()>;
    /// Create or edit the one persistent schedule message.
    async fn publish_schedule(&self, view: &ScheduleView) -> anyhow::Result<()>;
    /// Post a one-off announcement naming the holder and time.
    async fn announce_completion(&self, slot: &Slot) -> anyhow::Result<()>;
}

/// Drives an announcer from the store's schedule stream and the scanner's
/// completion events. Failures are logged and the loop keeps running.
pub async fn run_announcer<A: Announcer>(
    announcer: A,
    mut schedule: WatchStream<ScheduleView>,
    mut completions: mpsc::Receiver<Slot>,
) {
    loop {
        tokio::select! {
            maybe_view = schedule.next() => {
                let Some(view) = maybe_view else { break };
                if let Err(err) = announcer.publish_schedule(&view).await {
                    error!(?err, "failed to publish the schedule message");
                }
            }
            maybe_slot = completions.recv() => {
                let Some(slot) = maybe_slot else { break };
                if let Err(err) = announcer.announce_completion(&slot).await {
                    error!(?err, "failed to announce a completed session");
                }
            }
        }
    }
    info!("announcer task finished");
}

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub schedule_channel_id: String,
    pub ping_role_id: String,
}

const API_BASE: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Recovery only: how far back to look for a lost schedule message.
const HISTORY_SCAN_LIMIT: u32 = 100;

/// Discord REST announcer. The schedule message id is remembered after the
/// first create; the bounded history scan runs only as a recovery path
/// when the reference is missing or stale.
pub struct DiscordAnnouncer {
    config: DiscordConfig,
    client: reqwest::Client,
    bot_user_id: std::sync::Mutex<Option<String>>,
    // Held across the whole upsert so two publishes cannot race into
    // creating two schedule messages.
    schedule_message_id: tokio::sync::Mutex<Option<String>>,
}

impl DiscordAnnouncer {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            bot_user_id: std::sync::Mutex::new(None),
            schedule_message_id: tokio::sync::Mutex::new(None),
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    fn role_ping(&self) -> String {
        format!("<@&{}>", self.config.ping_role_id)
    }

    fn schedule_content(&self, view: &ScheduleView) -> String {
        format!("{}\n{}", self.role_ping(), view.to_message_body())
    }

    fn completion_content(&self, slot: &Slot) -> String {
        let holder = slot
            .holder
            .as_ref()
            .map(|holder| holder.display.as_str())
            .unwrap_or("someone");
        format!(
            "{} {} has hosted a training @ {}!",
            self.role_ping(),
            holder,
            slot.scheduled_at.format(slot_time::FORMAT)
        )
    }

    async fn create_message(&self, content: &str) -> anyhow::Result<String> {
        let url = format!(
            "{API_BASE}/channels/{}/messages",
            self.config.schedule_channel_id
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "content": content }))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("message create failed ({})", response.status());
        }

        let message: serde_json::Value = response.json().await?;
        message
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .context("message create response had no id")
    }

    async fn edit_message(&self, message_id: &str, content: &str) -> anyhow::Result<()> {
        let url = format!(
            "{API_BASE}/channels/{}/messages/{message_id}",
            self.config.schedule_channel_id
        );
        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth())
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "content": content }))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("message edit failed ({})", response.status());
        }
        Ok(())
    }

    /// One-time recovery: scan recent channel history for the schedule
    /// message (authored by this bot, starting with the role ping).
    async fn find_schedule_message(&self) -> anyhow::Result<Option<String>> {
        let bot_user_id = self.bot_user_id.lock().unwrap().clone();
        let url = format!(
            "{API_BASE}/channels/{}/messages?limit={HISTORY_SCAN_LIMIT}",
            self.config.schedule_channel_id
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("history scan failed ({})", response.status());
        }

        let messages: Vec<serde_json::Value> = response.json().await?;
        let ping = self.role_ping();
        for message in messages {
            let author = message
                .get("author")
                .and_then(|author| author.get("id"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            let content = message
                .get("content")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            if Some(author) == bot_user_id.as_deref() && content.starts_with(&ping) {
                return Ok(message
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Announcer for DiscordAnnouncer {
    async fn ready(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(format!("{API_BASE}/users/@me"))
            .header("Authorization", self.auth())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("discord rejected the bot token ({})", response.status());
        }

        let me: serde_json::Value = response.json().await?;
        let id = me
            .get("id")
            .and_then(serde_json::Value::as_str)
            .context("identity response had no id")?
            .to_owned();
        *self.bot_user_id.lock().unwrap() = Some(id);
        Ok(())
    }

    async fn publish_schedule(&self, view: &ScheduleView) -> anyhow::Result<()> {
        let content = self.schedule_content(view);
        let mut message_id = self.schedule_message_id.lock().await;

        if message_id.is_none() {
            *message_id = self.find_schedule_message().await?;
        }

        if let Some(id) = message_id.clone() {
            match self.edit_message(&id, &content).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    // Stale reference, e.g. the message was deleted.
                    warn!(?err, "editing the schedule message failed, recreating it");
                    *message_id = None;
                }
            }
        }

        let id = self.create_message(&content).await?;
        *message_id = Some(id);
        Ok(())
    }

    async fn announce_completion(&self, slot: &Slot) -> anyhow::Result<()> {
        self.create_message(&self.completion_content(slot)).await?;
        Ok(())
    }
}

/// Fallback used when no bot token is configured: announcements only
/// reach the log.
#[derive(Debug, Clone, Default)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn ready(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn publish_schedule(&self, view: &ScheduleView) -> anyhow::Result<()> {
        info!("schedule update:\n{}", view.to_message_body());
        Ok(())
    }

    async fn announce_completion(&self, slot: &Slot) -> anyhow::Result<()> {
        let holder = slot
            .holder
            .as_ref()
            .map(|holder| holder.display.as_str())
            .unwrap_or("someone");
        info!(
            "completed session: {} @ {}",
            holder,
            slot.scheduled_at.format(slot_time::FORMAT)
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule::project;
    use crate::slot_store::SlotStore;
    use crate::testutils::{claimed_slot, holder, MockPersistence, RecordingAnnouncer};

    fn discord_announcer() -> DiscordAnnouncer {
        DiscordAnnouncer::new(DiscordConfig {
            bot_token: "token".into(),
            schedule_channel_id: "1432077759932530839".into(),
            ping_role_id: "1385368957074276542".into(),
        })
    }

    #[test]
    fn schedule_content_pings_the_role_first() {
        let announcer = discord_announcer();

        let content = announcer.schedule_content(&ScheduleView::NoSessions);
        assert_eq!(
            content,
            "<@&1385368957074276542>\n**Upcoming Training Sessions**\nNo sessions scheduled."
        );

        let view = project(&[claimed_slot(3, "2025-11-10 4:00 PM", "alice")]);
        let content = announcer.schedule_content(&view);
        assert!(content.starts_with("<@&1385368957074276542>\n"));
        assert!(content.contains("**alice** — 2025-11-10 4:00 PM"));
    }

    #[test]
    fn completion_content_names_holder_and_time() {
        let announcer = discord_announcer();
        let slot = claimed_slot(3, "2025-11-10 4:00 PM", "alice");

        assert_eq!(
            announcer.completion_content(&slot),
            "<@&1385368957074276542> alice has hosted a training @ 2025-11-10 4:00 PM!"
        );
    }

    #[tokio::test]
    async fn run_announcer_forwards_schedule_updates_and_completions() {
        let store = SlotStore::open(MockPersistence::new());
        let recording = RecordingAnnouncer::new();
        let (completion_tx, completion_rx) = mpsc::channel(4);

        let task = tokio::spawn(run_announcer(
            recording.clone(),
            store.schedule_stream(),
            completion_rx,
        ));

        // The watch stream yields the view current at first poll, then one
        // per mutation. Claim only after the initial view was delivered so
        // the two publishes cannot coalesce into one.
        tokio::time::timeout(Duration::from_secs(5), async {
            while recording.0.schedules.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("announcer should publish the initial view");

        let claimed = store.claim(3, holder("alice")).unwrap();
        completion_tx.send(claimed.clone()).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let seen_schedule = recording.0.schedules.lock().unwrap().len() >= 2;
                let seen_completion = !recording.0.completions.lock().unwrap().is_empty();
                if seen_schedule && seen_completion {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("announcer should observe both events");

        let schedules = recording.0.schedules.lock().unwrap().clone();
        assert_eq!(schedules[0], ScheduleView::NoSessions);
        assert!(matches!(schedules[1], ScheduleView::Sessions(_)));

        let completions = recording.0.completions.lock().unwrap().clone();
        assert_eq!(completions, vec![claimed]);

        task.abort();
    }
}
