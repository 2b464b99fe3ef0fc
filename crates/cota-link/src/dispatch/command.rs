//! Command tags, envelopes and positional argument access.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::HandlerError;

macro_rules! command_kinds {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        /// Every command the dispatcher knows how to execute.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $(
                #[doc = concat!("`", $tag, "`")]
                $variant,
            )+
        }

        impl CommandKind {
            /// All commands in registration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire tag used by producers.
            #[must_use]
            pub const fn tag(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }

            /// Resolves a tag. Matching is exact.
            #[must_use]
            pub fn parse(tag: &str) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

command_kinds! {
    Connect => "CONNECT",
    SearchForTx => "SEARCH_FOR_TX",
    Quit => "QUIT",
    GetSystemInfo => "GET_SYSTEM_INFO",
    SendSysCmd => "SEND_SYS_CMD",
    SendDiscovery => "send_disc",
    RxList => "rx_list",
    RxDetail => "rx_detail",
    LpmList => "lpm_list",
    LpmDetail => "lpm_detail",
    RegisterRx => "register_rx",
    RemoveRx => "remove_rx",
    RxLeave => "rx_leave",
    RxSleep => "rx_sleep",
    StartCharging => "start_charging",
    StopCharging => "stop_charging",
    IdentifyRx => "identify_rx",
    RxConfig => "rx_config",
    AppCommand => "app_command",
    AppCommandData => "app_command_data",
    SetCommChannel => "set_comm_channel",
    SetValidAmbs => "set_valid_ambs",
    SetPowerLevel => "set_power_level",
    LpmAssign => "lpm_assign",
    LpmFree => "lpm_free",
    RxLpm => "rx_lpm",
    RxLpmStandby => "rx_lpm_standby",
    LpmSlots => "lpm_slots",
    Lpm => "lpm",
    RxScreenUpdate => "rx_screen_update",
    GetTxId => "get_tx_id",
    GetAmbInfo => "get_amb_info",
    ChargeVirtual => "charge_virtual",
    ResetHost => "reset_host",
    GetMcuLog => "get_mcu_log",
    GetAllConfig => "GET_ALL_CONFIG",
    SaveAllConfig => "SAVE_ALL_CONFIG",
    GetCfgParam => "get_cfg_param",
    SetCfgParam => "set_cfg_param",
    UpdateConfigValue => "update_config_value",
    ConnectLog => "CONNECT_LOG",
    ListLogFiles => "LIST_LOGFILES",
    DownloadLog => "DOWNLOAD_LOG",
    DeleteLog => "DELETE_LOG",
    StartLog => "START_LOG",
    StopLog => "STOP_LOG",
}

impl CommandKind {
    /// Commands that may run while no transmitter is connected.
    #[must_use]
    pub const fn runs_disconnected(self) -> bool {
        matches!(self, Self::Connect | Self::SearchForTx | Self::Quit)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A tagged command with optional positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Command tag.
    pub tag: String,
    /// Positional arguments, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<Value>>,
}

impl CommandEnvelope {
    /// Builds an envelope for a known command.
    pub fn new<I, V>(kind: CommandKind, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let payload: Vec<Value> = args.into_iter().map(Into::into).collect();
        Self {
            tag: kind.tag().to_owned(),
            payload: (!payload.is_empty()).then_some(payload),
        }
    }

    /// Builds an argument-less envelope.
    #[must_use]
    pub fn bare(kind: CommandKind) -> Self {
        Self {
            tag: kind.tag().to_owned(),
            payload: None,
        }
    }

    /// Builds an envelope from a raw tag, which may be unknown.
    pub fn from_tag(tag: impl Into<String>, payload: Option<Vec<Value>>) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }

    /// The shutdown command.
    #[must_use]
    pub fn quit() -> Self {
        Self::bare(CommandKind::Quit)
    }

    /// Resolves the tag to a known command.
    #[must_use]
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::parse(&self.tag)
    }

    /// Returns true for the shutdown command.
    #[must_use]
    pub fn is_quit(&self) -> bool {
        self.kind() == Some(CommandKind::Quit)
    }

    /// Positional arguments, empty when none were supplied.
    #[must_use]
    pub fn args(&self) -> Args<'_> {
        Args::new(self.payload.as_deref().unwrap_or_default())
    }
}

/// Borrowed view over an envelope's positional arguments.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    /// Wraps a slice of argument values.
    #[must_use]
    pub const fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    /// Number of supplied arguments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no arguments were supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw argument `index`, if present and not null.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index).filter(|value| !value.is_null())
    }

    /// Argument `index` rendered as text, if present and not null.
    #[must_use]
    pub fn optional_text(&self, index: usize) -> Option<String> {
        match self.values.get(index)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Argument `index` rendered as text.
    pub fn text(&self, index: usize, name: &str) -> Result<String, HandlerError> {
        self.optional_text(index)
            .ok_or_else(|| HandlerError::missing_argument(name))
    }

    /// Argument `index` as an unsigned integer, accepting numeric text.
    pub fn optional_unsigned(&self, index: usize, name: &str) -> Result<Option<u64>, HandlerError> {
        let Some(value) = self.values.get(index) else {
            return Ok(None);
        };
        match value {
            Value::Null => Ok(None),
            Value::Number(number) => number
                .as_u64()
                .map(Some)
                .ok_or_else(|| HandlerError::invalid_argument(name, number.to_string())),
            Value::String(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| HandlerError::invalid_argument(name, text.clone())),
            other => Err(HandlerError::invalid_argument(name, other.to_string())),
        }
    }

    /// Argument `index` as an unsigned integer.
    pub fn unsigned(&self, index: usize, name: &str) -> Result<u64, HandlerError> {
        self.optional_unsigned(index, name)?
            .ok_or_else(|| HandlerError::missing_argument(name))
    }
}
