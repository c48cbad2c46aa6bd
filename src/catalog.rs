//! Channel catalog lookup
//!
//! The player only needs "give me channel X"; where channels come from is
//! somebody else's business.

use crate::models::Channel;

/// Read-only access to the channel catalog
pub trait ChannelCatalog {
    /// Look up a channel by id
    fn get_channel(&self, id: &str) -> Option<Channel>;

    /// All channels, in display order
    fn channels(&self) -> Vec<Channel>;
}

/// In-memory catalog, usually loaded from the config file
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    channels: Vec<Channel>,
}

impl StaticCatalog {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Distinct categories, in first-seen order
    pub fn categories(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ch in &self.channels {
            if !ch.category.is_empty() && !out.contains(&ch.category) {
                out.push(ch.category.clone());
            }
        }
        out
    }

    /// Channels in `category` (case-insensitive)
    pub fn in_category(&self, category: &str) -> Vec<Channel> {
        self.channels
            .iter()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelCatalog for StaticCatalog {
    fn get_channel(&self, id: &str) -> Option<Channel> {
        self.channels.iter().find(|c| c.id == id).cloned()
    }

    fn channels(&self) -> Vec<Channel> {
        self.channels.clone()
    }
}
