//! What a command prints.

use std::fmt;

use serde::Serialize;

/// Result of one command, printed as text or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    Get { pin: u32, value: u32 },
    Set { pin: u32, value: u8 },
    Probe { first: u32, last: u32, available: Vec<u32> },
    Blink { pin: u32, cycles: u64 },
    Lcd { text: String },
    Sim { bind: String, handled: u64 },
}

impl Report {
    pub fn render(&self, json: bool) -> serde_json::Result<String> {
        if json {
            serde_json::to_string(self)
        } else {
            Ok(self.to_string())
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Get { pin, value } => write!(f, "pin {pin} = {value}"),
            Report::Set { pin, value } => write!(f, "pin {pin} set to {value}"),
            Report::Probe { first, last, available } => {
                let pins: Vec<String> = available.iter().map(u32::to_string).collect();
                write!(
                    f,
                    "{} of {} pins available in {first}..={last}: {}",
                    available.len(),
                    u64::from(*last) - u64::from(*first) + 1,
                    pins.join(" ")
                )
            }
            Report::Blink { pin, cycles } => write!(f, "pin {pin} blinked {cycles} times"),
            Report::Lcd { text } => write!(f, "wrote {:?}", text),
            Report::Sim { bind, handled } => {
                write!(f, "simulated daemon on {bind} answered {handled} requests")
            }
        }
    }
}
