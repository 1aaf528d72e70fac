use thiserror::Error;
use zmesh_wire::WireError;

/// Why an inbound envelope could not be turned into a typed command.
#[derive(Debug, Error)]
pub enum MtError {
    /// The envelope or a payload field failed to parse.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The command id is not one this router implements.
    #[error("unknown command id 0x{0:04X}")]
    UnknownCommand(u16),

    /// A response or callback id arrived where a request was expected.
    #[error("not a request id: 0x{0:04X}")]
    NotARequest(u16),
}
