pub mod client;
pub mod mock_client;
pub mod stream;

pub use client::{
    read_relay_stream, ByteStream, PromptRequest, StreamOutcome, StreamTimeouts, TransportClient,
};
pub use stream::{classify_relay_record, RelayRecord, StreamParser};
