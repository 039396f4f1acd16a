use chatrelay::api::mock_client::MockRelayStream;
use chatrelay::api::stream::StreamParser;
use chatrelay::api::{read_relay_stream, StreamOutcome, StreamTimeouts};
use tokio_util::sync::CancellationToken;

const BODY: &str = "data: {\"content\":\"Grüße, \"}\n\n\
data: {\"content\":\"世界 \u{1F30D}\"}\n\n\
data: {\"content\":\"!\"}\n\n\
data: [DONE]\n\n";

#[test]
fn test_every_split_point_yields_same_records() {
    let bytes = BODY.as_bytes();
    let expected = StreamParser::new().process(bytes);
    assert_eq!(expected.len(), 4);

    for cut in 0..=bytes.len() {
        let mut parser = StreamParser::new();
        let mut records = parser.process(&bytes[..cut]);
        records.extend(parser.process(&bytes[cut..]));
        records.extend(parser.flush());
        assert_eq!(records, expected, "split at byte {cut}");
    }
}

#[test]
fn test_byte_at_a_time_decoding() {
    let mut parser = StreamParser::new();
    let mut records = Vec::new();
    for byte in BODY.as_bytes() {
        records.extend(parser.process(std::slice::from_ref(byte)));
    }
    assert_eq!(records[1], "{\"content\":\"世界 \u{1F30D}\"}");
    assert_eq!(records.last().map(String::as_str), Some("[DONE]"));
}

#[tokio::test]
async fn test_hello_from_two_frames() {
    let token = CancellationToken::new();
    let outcome = read_relay_stream(
        MockRelayStream::new()
            .record(r#"{"content":"He"}"#)
            .record(r#"{"content":"llo"}"#)
            .done()
            .into_stream(),
        &token,
        StreamTimeouts::default(),
        |_| {},
    )
    .await;
    assert_eq!(outcome.into_text().as_deref(), Some("Hello"));
}

#[tokio::test]
async fn test_malformed_line_between_valid_frames_is_skipped() {
    let token = CancellationToken::new();
    let outcome = read_relay_stream(
        MockRelayStream::new()
            .content("a")
            .record("{this is not json")
            .content("b")
            .done()
            .into_stream(),
        &token,
        StreamTimeouts::default(),
        |_| {},
    )
    .await;
    assert_eq!(outcome, StreamOutcome::Completed("ab".to_string()));
}

#[tokio::test]
async fn test_frames_split_mid_character_across_chunks() {
    let frame = "data: {\"content\":\"naïve\"}\n\n".as_bytes();
    let cut = frame.iter().position(|byte| *byte == 0xC3).unwrap() + 1;
    let token = CancellationToken::new();
    let outcome = read_relay_stream(
        MockRelayStream::new()
            .raw(frame[..cut].to_vec())
            .raw(frame[cut..].to_vec())
            .into_stream(),
        &token,
        StreamTimeouts::default(),
        |_| {},
    )
    .await;
    assert_eq!(outcome, StreamOutcome::Completed("naïve".to_string()));
}

#[tokio::test]
async fn test_already_cancelled_token_reads_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let mut increments = 0;
    let outcome = read_relay_stream(
        MockRelayStream::new().content("x").done().into_stream(),
        &token,
        StreamTimeouts::default(),
        |_| increments += 1,
    )
    .await;
    assert_eq!(outcome, StreamOutcome::Cancelled);
    assert_eq!(increments, 0);
}
