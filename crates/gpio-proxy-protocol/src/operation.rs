//! Operation codes.

use crate::error::ProtocolError;

/// A single pin operation understood by the daemon.
///
/// The discriminants are the ASCII letters used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    /// Read the pin value.
    Get = b'G',
    /// Drive the pin to a value.
    Set = b'S',
    /// Claim the pin under an owner label.
    Request = b'R',
    /// Release a claimed pin.
    Free = b'F',
    /// Switch the pin to input.
    ConfigureInput = b'I',
    /// Switch the pin to output with an initial value.
    ConfigureOutput = b'O',
}

impl Operation {
    /// All operations, in wire-code order of the original daemon's switch.
    pub const ALL: [Operation; 6] = [
        Operation::Get,
        Operation::Set,
        Operation::Request,
        Operation::Free,
        Operation::ConfigureInput,
        Operation::ConfigureOutput,
    ];

    /// The wire byte for this operation.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Short lowercase name, used for logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Request => "request",
            Operation::Free => "free",
            Operation::ConfigureInput => "input",
            Operation::ConfigureOutput => "output",
        }
    }

    /// Whether the daemon answers this operation with `1` for success in
    /// the value slot.
    pub const fn reports_success_in_value(self) -> bool {
        matches!(
            self,
            Operation::Request | Operation::ConfigureInput | Operation::ConfigureOutput
        )
    }
}

impl TryFrom<u8> for Operation {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            b'G' => Ok(Operation::Get),
            b'S' => Ok(Operation::Set),
            b'R' => Ok(Operation::Request),
            b'F' => Ok(Operation::Free),
            b'I' => Ok(Operation::ConfigureInput),
            b'O' => Ok(Operation::ConfigureOutput),
            other => Err(ProtocolError::UnknownOperation(other)),
        }
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> Self {
        op.code()
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
