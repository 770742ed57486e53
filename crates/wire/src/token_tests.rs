use super::*;
use proptest::prop_assert_eq;
use std::io::Cursor;

#[test]
fn encode_frame_matches_the_escape_scheme() {
    let frame = encode_frame(&["a\nb", "c\\d", ""]);
    assert_eq!(frame, b"a\\nb\nc\\\\d\n\n".to_vec());
}

#[test]
fn unescape_is_forgiving_of_trailing_backslash() {
    assert_eq!(unescape("abc\\"), "abc\\");
    assert_eq!(unescape("a\\nb"), "a\nb");
    assert_eq!(unescape("a\\xb"), "axb");
}

#[tokio::test]
async fn write_then_read_one_round_trips() {
    let mut buf = Vec::new();
    {
        let mut writer = TokenWriter::new(&mut buf);
        writer.write(&["hello", "wor\\ld", "line\none"]).await.expect("write");
    }
    let mut reader = TokenReader::new(Cursor::new(buf));
    assert_eq!(reader.read_one().await.expect("read"), "hello");
    assert_eq!(reader.read_one().await.expect("read"), "wor\\ld");
    assert_eq!(reader.read_one().await.expect("read"), "line\none");
}

#[tokio::test]
async fn read_int_reports_raw_text_on_parse_failure() {
    let mut buf = Vec::new();
    TokenWriter::new(&mut buf).write(&["42", "nope"]).await.expect("write");
    let mut reader = TokenReader::new(Cursor::new(buf));
    assert_eq!(reader.read_int().await.expect("io"), Ok(42));
    assert_eq!(reader.read_int().await.expect("io"), Err("nope".to_string()));
}

#[tokio::test]
async fn read_multi_returns_short_list_on_eof() {
    let mut buf = Vec::new();
    TokenWriter::new(&mut buf).write(&["one", "two"]).await.expect("write");
    let mut reader = TokenReader::new(Cursor::new(buf));
    let tokens = reader.read_multi(5).await.expect("io");
    assert_eq!(tokens, vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn read_one_past_end_of_stream_yields_empty_string() {
    let mut reader = TokenReader::new(Cursor::new(Vec::new()));
    assert_eq!(reader.read_one().await.expect("io"), "");
    assert_eq!(reader.read_one().await.expect("io"), "");
}

proptest::proptest! {
    #[test]
    fn round_trip_holds_for_arbitrary_tokens(tokens in proptest::collection::vec("[^\\x00]{0,12}", 0..6)) {
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let frame = encode_frame(&refs);
        let rt = tokio::runtime::Builder::new_current_thread().build().expect("rt");
        let decoded = rt.block_on(async {
            let mut reader = TokenReader::new(Cursor::new(frame));
            reader.read_multi(tokens.len()).await.expect("io")
        });
        prop_assert_eq!(decoded, tokens);
    }
}
