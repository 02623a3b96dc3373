use bytes::{Buf, Bytes, BytesMut};
use relay_core::llm::BackendError;

fn find_event_boundary(buf: &BytesMut) -> Option<usize> {
    if let Some(p) = twoway::find_bytes(&buf[..], b"\r\n\r\n") {
        return Some(p);
    }
    twoway::find_bytes(&buf[..], b"\n\n")
}

/// Split one complete SSE block off the front of the buffer, terminator
/// excluded. Returns None while the buffer holds only a partial block.
pub(crate) fn next_event(buf: &mut BytesMut) -> Option<Bytes> {
    let pos = find_event_boundary(buf)?;
    let ev = buf.split_to(pos).freeze();
    if buf.starts_with(b"\r\n\r\n") {
        buf.advance(4);
    } else {
        buf.advance(2);
    }
    Some(ev)
}

/// The `event:` name (if any) and joined `data:` payload of one block.
pub(crate) fn parse_event(ev: &Bytes) -> Result<(Option<String>, String), BackendError> {
    let s = std::str::from_utf8(ev).map_err(|e| BackendError::Decode(e.to_string()))?;
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    for line in s.lines() {
        if let Some(v) = line.strip_prefix("event:") {
            event = Some(v.trim().to_string());
        }
        if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim_start());
        }
    }
    Ok((event, data_lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_block_yields_nothing() {
        let mut buf = BytesMut::from(&b"data: {\"x\":1}"[..]);
        assert!(next_event(&mut buf).is_none());
        assert_eq!(&buf[..], b"data: {\"x\":1}");
    }

    #[test]
    fn events_split_across_chunks_reassemble() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"data: hel");
        assert!(next_event(&mut buf).is_none());
        buf.extend_from_slice(b"lo\n\ndata: world\n\n");

        let first = next_event(&mut buf).unwrap();
        assert_eq!(parse_event(&first).unwrap(), (None, "hello".to_string()));
        let second = next_event(&mut buf).unwrap();
        assert_eq!(parse_event(&second).unwrap(), (None, "world".to_string()));
        assert!(next_event(&mut buf).is_none());
    }

    #[test]
    fn crlf_terminators_are_handled() {
        let mut buf = BytesMut::from(&b"event: ping\r\ndata: {}\r\n\r\n"[..]);
        let ev = next_event(&mut buf).unwrap();
        let (name, data) = parse_event(&ev).unwrap();
        assert_eq!(name.as_deref(), Some("ping"));
        assert_eq!(data, "{}");
        assert!(buf.is_empty());
    }

    #[test]
    fn multiple_data_lines_join_with_newline() {
        let ev = Bytes::from_static(b"data: one\ndata: two");
        let (_, data) = parse_event(&ev).unwrap();
        assert_eq!(data, "one\ntwo");
    }
}
