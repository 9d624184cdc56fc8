//! Table configuration.

use pokeroll_session::PresenceConfig;

/// Settings for one table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// How many characters a non-GM player may own at once.
    ///
    /// The GM is exempt: GM-created sheets are unowned NPCs and do not
    /// count against anyone.
    pub max_characters_per_player: usize,

    /// Liveness tuning, passed through to the presence layer.
    pub presence: PresenceConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_characters_per_player: 3,
            presence: PresenceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_table_config_default() {
        let config = TableConfig::default();
        assert_eq!(config.max_characters_per_player, 3);
        assert_eq!(config.presence.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.presence.sweep_interval, Duration::from_secs(10));
    }
}
