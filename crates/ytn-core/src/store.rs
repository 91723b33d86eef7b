//! Persisted lists of monitored channels and destination chats.
//!
//! Layout under the data directory:
//! - `channels.json`: `{"channels": [{"name": ..., "id": ...}]}`
//! - `telegram_chats.json`: `[{"id", "title", "type", "added_at"}]`
//!
//! A file that is not valid JSON is copied to `<name>.json.corrupt` on open.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    domain::{ChatId, DestinationChat, MonitoredChannel},
    Error, Result,
};

const CHANNELS_FILE: &str = "channels.json";
const CHATS_FILE: &str = "telegram_chats.json";

/// CRUD over the two mutable lists.
///
/// Every mutation is an atomic read-modify-write; readers get a snapshot.
pub trait ConfigStore: Send + Sync {
    fn list_channels(&self) -> Result<Vec<MonitoredChannel>>;
    fn get_channel(&self, channel_id: &str) -> Result<Option<MonitoredChannel>>;
    /// `Ok(false)` when a channel with the same id already exists.
    fn add_channel(&self, channel: MonitoredChannel) -> Result<bool>;
    /// `Ok(false)` when no channel had this id.
    fn remove_channel(&self, channel_id: &str) -> Result<bool>;

    fn list_chats(&self) -> Result<Vec<DestinationChat>>;
    fn add_chat(&self, chat: DestinationChat) -> Result<bool>;
    fn remove_chat(&self, chat_id: ChatId) -> Result<bool>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: Vec<MonitoredChannel>,
}

#[derive(Debug, Default)]
struct StoreState {
    channels: Vec<MonitoredChannel>,
    chats: Vec<DestinationChat>,
}

/// `ConfigStore` backed by two JSON files.
pub struct JsonConfigStore {
    dir: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonConfigStore {
    /// Open (and initialize if needed) the store under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            info!(dir = %dir.display(), "creating data folder");
            fs::create_dir_all(&dir)?;
        }

        let channels_path = dir.join(CHANNELS_FILE);
        let chats_path = dir.join(CHATS_FILE);

        if !channels_path.exists() {
            info!(path = %channels_path.display(), "initializing channels file");
            write_json_atomic(&channels_path, &ChannelsFile::default())?;
        }
        if !chats_path.exists() {
            info!(path = %chats_path.display(), "initializing chats file");
            write_json_atomic(&chats_path, &Vec::<DestinationChat>::new())?;
        }

        let channels = match read_json::<ChannelsFile>(&channels_path) {
            Ok(f) => sanitize_channels(f.channels),
            Err(e) => {
                error!(path = %channels_path.display(), "failed to load channels file: {e}");
                set_aside(&channels_path)?;
                Vec::new()
            }
        };

        let chats = match read_json::<Vec<serde_json::Value>>(&chats_path) {
            Ok(raw) => sanitize_chats(raw),
            Err(e) => {
                warn!(path = %chats_path.display(), "unreadable chats file, starting fresh: {e}");
                set_aside(&chats_path)?;
                write_json_atomic(&chats_path, &Vec::<DestinationChat>::new())?;
                Vec::new()
            }
        };

        info!(
            channels = channels.len(),
            chats = chats.len(),
            dir = %dir.display(),
            "loaded config store"
        );

        Ok(Self {
            dir,
            state: Mutex::new(StoreState { channels, chats }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| Error::Store {
            path: self.dir.clone(),
            reason: "state lock poisoned".to_string(),
        })
    }

    fn persist_channels(&self, channels: &[MonitoredChannel]) -> Result<()> {
        let file = ChannelsFile {
            channels: channels.to_vec(),
        };
        write_json_atomic(&self.dir.join(CHANNELS_FILE), &file)
    }

    fn persist_chats(&self, chats: &[DestinationChat]) -> Result<()> {
        write_json_atomic(&self.dir.join(CHATS_FILE), &chats)
    }
}

impl ConfigStore for JsonConfigStore {
    fn list_channels(&self) -> Result<Vec<MonitoredChannel>> {
        Ok(self.lock()?.channels.clone())
    }

    fn get_channel(&self, channel_id: &str) -> Result<Option<MonitoredChannel>> {
        let id = channel_id.trim();
        Ok(self.lock()?.channels.iter().find(|c| c.id == id).cloned())
    }

    fn add_channel(&self, channel: MonitoredChannel) -> Result<bool> {
        let channel = MonitoredChannel::new(&channel.name, &channel.id)?;
        let mut st = self.lock()?;
        if st.channels.iter().any(|c| c.id == channel.id) {
            return Ok(false);
        }

        let mut next = st.channels.clone();
        next.push(channel);
        self.persist_channels(&next)?;
        st.channels = next;
        Ok(true)
    }

    fn remove_channel(&self, channel_id: &str) -> Result<bool> {
        let id = channel_id.trim();
        let mut st = self.lock()?;
        let next: Vec<_> = st.channels.iter().filter(|c| c.id != id).cloned().collect();
        if next.len() == st.channels.len() {
            return Ok(false);
        }

        self.persist_channels(&next)?;
        st.channels = next;
        Ok(true)
    }

    fn list_chats(&self) -> Result<Vec<DestinationChat>> {
        Ok(self.lock()?.chats.clone())
    }

    fn add_chat(&self, chat: DestinationChat) -> Result<bool> {
        let mut st = self.lock()?;
        if st.chats.iter().any(|c| c.id == chat.id) {
            return Ok(false);
        }

        let mut next = st.chats.clone();
        next.push(chat);
        self.persist_chats(&next)?;
        st.chats = next;
        Ok(true)
    }

    fn remove_chat(&self, chat_id: ChatId) -> Result<bool> {
        let mut st = self.lock()?;
        let next: Vec<_> = st
            .chats
            .iter()
            .filter(|c| c.id != chat_id.0)
            .cloned()
            .collect();
        if next.len() == st.chats.len() {
            return Ok(false);
        }

        self.persist_chats(&next)?;
        st.chats = next;
        Ok(true)
    }
}

/// Drop invalid and duplicate entries from a hand-edited channels file.
fn sanitize_channels(raw: Vec<MonitoredChannel>) -> Vec<MonitoredChannel> {
    let mut out: Vec<MonitoredChannel> = Vec::with_capacity(raw.len());
    for c in raw {
        match MonitoredChannel::new(&c.name, &c.id) {
            Ok(c) if !out.iter().any(|o| o.id == c.id) => out.push(c),
            Ok(c) => warn!(channel_id = %c.id, "duplicate channel entry ignored"),
            Err(e) => warn!("invalid channel entry ignored: {e}"),
        }
    }
    out
}

/// Keep entries that parse, dropping malformed and duplicate ones.
fn sanitize_chats(raw: Vec<serde_json::Value>) -> Vec<DestinationChat> {
    let mut out: Vec<DestinationChat> = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<DestinationChat>(value) {
            Ok(c) if !out.iter().any(|o| o.id == c.id) => out.push(c),
            Ok(c) => warn!(chat_id = c.id, "duplicate chat entry ignored"),
            Err(e) => warn!("invalid chat entry ignored: {e}"),
        }
    }
    out
}

/// Copy an unreadable file to `<name>.corrupt` before it can be overwritten.
fn set_aside(path: &Path) -> Result<()> {
    let backup = path.with_extension("json.corrupt");
    fs::copy(path, &backup).map_err(|e| Error::Store {
        path: path.to_path_buf(),
        reason: format!("could not back up unreadable file: {e}"),
    })?;
    warn!(backup = %backup.display(), "unreadable file copied aside");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let txt = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&txt)?)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path).map_err(|e| Error::Store {
        path: path.to_path_buf(),
        reason: format!("rename failed: {e}"),
    })
}
