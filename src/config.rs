//! Parameters of a Hare instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by every consensus instance of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of participants in an instance.
    /// Default: 10.
    pub n: usize,

    /// Quorum size: distinct senders needed for an SVP, a commit certificate
    /// or a notify quorum. With n = 3f+1 this is 2f+1.
    /// Default: 7.
    pub threshold: usize,

    /// Expected number of values per set, used as a capacity hint.
    /// Default: 20.
    pub set_size: usize,

    /// Length of every round (including the pre-round) in milliseconds.
    /// Default: 1000.
    pub round_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            n: 10,
            threshold: 7,
            set_size: 20,
            round_duration_ms: 1000,
        }
    }
}

impl Config {
    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    /// Number of pre-round messages a value needs to survive pre-round
    /// filtering, f+1 when threshold = 2f+1 and n = 3f+1.
    pub fn pre_round_threshold(&self) -> usize {
        self.n.saturating_sub(self.threshold) + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::NoParticipants);
        }
        if self.threshold == 0 || self.threshold > self.n {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
                n: self.n,
            });
        }
        if self.round_duration_ms == 0 {
            return Err(ConfigError::InvalidRoundDuration);
        }
        Ok(())
    }
}

/// Errors in Hare configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("n must be > 0")]
    NoParticipants,
    #[error("threshold must be in [1, n], got {threshold} with n = {n}")]
    InvalidThreshold { threshold: usize, n: usize },
    #[error("round_duration_ms must be > 0")]
    InvalidRoundDuration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.n, 10);
        assert_eq!(config.threshold, 7);
        assert_eq!(config.set_size, 20);
        assert_eq!(config.round_duration(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pre_round_threshold() {
        let config = Config {
            n: 4,
            threshold: 3,
            ..Default::default()
        };
        assert_eq!(config.pre_round_threshold(), 2);

        let config = Config {
            n: 1,
            threshold: 1,
            ..Default::default()
        };
        assert_eq!(config.pre_round_threshold(), 1);
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = Config::default();
        config.threshold = 11;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { threshold: 11, n: 10 })
        );
        config.threshold = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_invalid_n_and_round_duration() {
        let mut config = Config::default();
        config.round_duration_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRoundDuration));

        config.n = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoParticipants));
    }
}
