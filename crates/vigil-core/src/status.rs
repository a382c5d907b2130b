use serde::{Deserialize, Serialize};

/// Connection status of a managed bot. Records cycle among these three
/// states until removed; failures land in `Offline` with a last-error
/// message rather than a dedicated error state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Connecting,
    Online,
    Offline,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for BotStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connecting" => Ok(Self::Connecting),
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => Err(format!("unknown bot status: {other}")),
        }
    }
}

/// Aggregate counts over a user's bots. Every status key is present even
/// when zero so the dashboard never has to special-case missing fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: u32,
    pub online: u32,
    pub offline: u32,
    pub connecting: u32,
}

impl StatusCounts {
    pub fn count_for(&self, status: BotStatus) -> u32 {
        match status {
            BotStatus::Connecting => self.connecting,
            BotStatus::Online => self.online,
            BotStatus::Offline => self.offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_from_str_roundtrip() {
        for status in [BotStatus::Connecting, BotStatus::Online, BotStatus::Offline] {
            let parsed: BotStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert!("error".parse::<BotStatus>().is_err());
        assert!("".parse::<BotStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&BotStatus::Connecting).unwrap();
        assert_eq!(json, r#""connecting""#);
    }

    #[test]
    fn default_counts_are_zero() {
        let counts = StatusCounts::default();
        assert_eq!(counts.total, 0);
        assert_eq!(counts.count_for(BotStatus::Online), 0);
        assert_eq!(counts.count_for(BotStatus::Offline), 0);
        assert_eq!(counts.count_for(BotStatus::Connecting), 0);
    }

    #[test]
    fn counts_serialize_all_keys() {
        let json = serde_json::to_value(StatusCounts::default()).unwrap();
        for key in ["total", "online", "offline", "connecting"] {
            assert_eq!(json[key], 0, "missing key {key}");
        }
    }
}
