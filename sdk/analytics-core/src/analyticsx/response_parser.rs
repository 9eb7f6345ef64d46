use crate::analyticsx::error::{self, Error, ErrorDesc, ServerError};
use crate::analyticsx::query_result::RawMetadata;
use crate::analyticsx::response_json::ErrorCodeAndMessage;
use bytes::Bytes;
use http::StatusCode;

/// Incremental parser for the query response document.
///
/// The response is a single JSON object whose `results` member is an
/// unbounded array. Rows are surfaced one at a time via `next_row` as bytes
/// arrive; the sibling members are captured whenever they appear, before or
/// after `results`. A completed `errors` member aborts parsing with a server
/// error. The document is never materialized: the buffer holds at most the
/// unconsumed tail of the last chunk plus any partially received value.
pub struct ResponseParser {
    endpoint: String,
    statement: String,
    client_context_id: Option<String>,
    status_code: StatusCode,

    buffer: Vec<u8>,
    pos: usize,
    state: ParseState,

    key_buf: Vec<u8>,
    current_key: String,

    value_started: bool,
    value_start: usize,
    depth: u32,
    in_string: bool,
    last_was_escape: bool,

    raw: RawMetadata,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ParseState {
    Start,
    MemberOrEnd,
    Key,
    Colon,
    Value,
    ResultsStart,
    ElementOrEnd,
    Element,
    ElementDelim,
    MemberDelim,
    Trailing,
}

enum ValueEnd {
    // The scanned value ends just before the (unconsumed) delimiter byte.
    Delimited(u8),
    // The scanned value's closing quote/bracket has been consumed.
    Closed,
}

impl ResponseParser {
    pub fn new(
        endpoint: impl Into<String>,
        statement: impl Into<String>,
        client_context_id: Option<String>,
        status_code: StatusCode,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            statement: statement.into(),
            client_context_id,
            status_code,
            buffer: Vec::new(),
            pos: 0,
            state: ParseState::Start,
            key_buf: Vec::new(),
            current_key: String::new(),
            value_started: false,
            value_start: 0,
            depth: 0,
            in_string: false,
            last_was_escape: false,
            raw: RawMetadata::default(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Advances parsing as far as the buffered input allows. Returns the next
    /// `results` element, or `None` when more input is needed or the document
    /// is complete. Raises once the server's `errors` member is complete.
    pub fn next_row(&mut self) -> error::Result<Option<Bytes>> {
        loop {
            if self.pos >= self.buffer.len() {
                self.compact();
                return Ok(None);
            }
            let c = self.buffer[self.pos];

            match self.state {
                ParseState::Start => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b'{' {
                        self.pos += 1;
                        self.state = ParseState::MemberOrEnd;
                    } else {
                        return Err(self.protocol_error("expected the response to be a JSON object"));
                    }
                }
                ParseState::MemberOrEnd => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b'"' {
                        self.pos += 1;
                        self.state = ParseState::Key;
                    } else if c == b'}' {
                        self.pos += 1;
                        self.state = ParseState::Trailing;
                    } else {
                        return Err(self.protocol_error("expected an object key"));
                    }
                }
                ParseState::Key => {
                    if self.last_was_escape {
                        self.last_was_escape = false;
                        self.key_buf.push(c);
                        self.pos += 1;
                    } else if c == b'\\' {
                        self.last_was_escape = true;
                        self.key_buf.push(c);
                        self.pos += 1;
                    } else if c == b'"' {
                        self.pos += 1;
                        self.current_key = String::from_utf8_lossy(&self.key_buf).into_owned();
                        self.key_buf.clear();
                        self.state = ParseState::Colon;
                    } else {
                        self.key_buf.push(c);
                        self.pos += 1;
                    }
                }
                ParseState::Colon => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b':' {
                        self.pos += 1;
                        self.reset_value_scan();
                        if self.current_key == "results" {
                            self.state = ParseState::ResultsStart;
                        } else {
                            self.state = ParseState::Value;
                        }
                    } else {
                        return Err(self.protocol_error("expected ':' after object key"));
                    }
                }
                ParseState::Value => {
                    let end = match self.scan_value()? {
                        Some(end) => end,
                        None => {
                            self.compact();
                            return Ok(None);
                        }
                    };
                    let value = Bytes::copy_from_slice(&self.buffer[self.value_start..self.pos]);
                    let key = std::mem::take(&mut self.current_key);
                    self.reset_value_scan();
                    self.dispatch_member(&key, &value)?;
                    match end {
                        ValueEnd::Delimited(b',') => {
                            self.pos += 1;
                            self.state = ParseState::MemberOrEnd;
                        }
                        ValueEnd::Delimited(b'}') => {
                            self.pos += 1;
                            self.state = ParseState::Trailing;
                        }
                        ValueEnd::Delimited(b']') => {
                            return Err(self.protocol_error("unexpected ']'"));
                        }
                        ValueEnd::Delimited(_) | ValueEnd::Closed => {
                            self.state = ParseState::MemberDelim;
                        }
                    }
                }
                ParseState::ResultsStart => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b'[' {
                        self.pos += 1;
                        self.state = ParseState::ElementOrEnd;
                    } else {
                        return Err(
                            self.protocol_error("expected the results field to be an array")
                        );
                    }
                }
                ParseState::ElementOrEnd => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b']' {
                        self.pos += 1;
                        self.state = ParseState::MemberDelim;
                    } else {
                        self.reset_value_scan();
                        self.state = ParseState::Element;
                    }
                }
                ParseState::Element => {
                    let end = match self.scan_value()? {
                        Some(end) => end,
                        None => {
                            self.compact();
                            return Ok(None);
                        }
                    };
                    let row = Bytes::copy_from_slice(&self.buffer[self.value_start..self.pos]);
                    self.reset_value_scan();
                    match end {
                        ValueEnd::Delimited(b',') => {
                            self.pos += 1;
                            self.state = ParseState::ElementOrEnd;
                        }
                        ValueEnd::Delimited(b']') => {
                            self.pos += 1;
                            self.state = ParseState::MemberDelim;
                        }
                        ValueEnd::Delimited(b'}') => {
                            return Err(self.protocol_error("unexpected '}'"));
                        }
                        ValueEnd::Delimited(_) | ValueEnd::Closed => {
                            self.state = ParseState::ElementDelim;
                        }
                    }
                    return Ok(Some(row));
                }
                ParseState::ElementDelim => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b',' {
                        self.pos += 1;
                        self.state = ParseState::ElementOrEnd;
                    } else if c == b']' {
                        self.pos += 1;
                        self.state = ParseState::MemberDelim;
                    } else {
                        return Err(self.protocol_error("expected ',' or ']' after array element"));
                    }
                }
                ParseState::MemberDelim => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else if c == b',' {
                        self.pos += 1;
                        self.state = ParseState::MemberOrEnd;
                    } else if c == b'}' {
                        self.pos += 1;
                        self.state = ParseState::Trailing;
                    } else {
                        return Err(self.protocol_error("expected ',' or '}' after object member"));
                    }
                }
                ParseState::Trailing => {
                    if c.is_ascii_whitespace() {
                        self.pos += 1;
                    } else {
                        return Err(self.protocol_error("trailing data after the query response"));
                    }
                }
            }
        }
    }

    /// Must be called once the transport signals end of body.
    pub fn end_of_input(&mut self) -> error::Result<()> {
        if self.state == ParseState::Trailing {
            Ok(())
        } else {
            Err(self.protocol_error("unexpected end of query response"))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Trailing
    }

    pub fn into_metadata(self) -> RawMetadata {
        self.raw
    }

    // Scans one JSON value in place. `None` means the buffer ran dry
    // mid-value; scanning resumes on the next call.
    fn scan_value(&mut self) -> error::Result<Option<ValueEnd>> {
        while self.pos < self.buffer.len() {
            let c = self.buffer[self.pos];

            if !self.value_started {
                if c.is_ascii_whitespace() {
                    self.pos += 1;
                    continue;
                }
                if matches!(c, b'}' | b']' | b',' | b':') {
                    return Err(self.protocol_error("expected a value"));
                }
                self.value_started = true;
                self.value_start = self.pos;
                match c {
                    b'{' | b'[' => self.depth = 1,
                    b'"' => self.in_string = true,
                    _ => {}
                }
                self.pos += 1;
                continue;
            }

            if self.in_string {
                if self.last_was_escape {
                    self.last_was_escape = false;
                } else if c == b'\\' {
                    self.last_was_escape = true;
                } else if c == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        self.pos += 1;
                        return Ok(Some(ValueEnd::Closed));
                    }
                }
                self.pos += 1;
                continue;
            }

            match c {
                b'{' | b'[' => {
                    self.depth += 1;
                    self.pos += 1;
                }
                b'"' => {
                    self.in_string = true;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    if self.depth == 0 {
                        return Ok(Some(ValueEnd::Delimited(c)));
                    }
                    self.depth -= 1;
                    self.pos += 1;
                    if self.depth == 0 {
                        return Ok(Some(ValueEnd::Closed));
                    }
                }
                b',' => {
                    if self.depth == 0 {
                        return Ok(Some(ValueEnd::Delimited(c)));
                    }
                    self.pos += 1;
                }
                c if c.is_ascii_whitespace() => {
                    if self.depth == 0 {
                        return Ok(Some(ValueEnd::Delimited(c)));
                    }
                    self.pos += 1;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
        Ok(None)
    }

    fn reset_value_scan(&mut self) {
        self.value_started = false;
        self.value_start = self.pos;
        self.depth = 0;
        self.in_string = false;
        self.last_was_escape = false;
    }

    fn dispatch_member(&mut self, key: &str, value: &Bytes) -> error::Result<()> {
        match key {
            "requestID" => self.raw.request_id = Some(self.parse_string(key, value)?),
            "clientContextID" => {
                self.raw.client_context_id = Some(self.parse_string(key, value)?)
            }
            "status" => self.raw.status = Some(self.parse_string(key, value)?),
            "signature" => self.raw.signature = Some(value.clone()),
            "plans" => self.raw.plans = Some(value.clone()),
            "metrics" => self.raw.metrics = Some(value.clone()),
            "warnings" => self.raw.warnings = Some(value.clone()),
            "errors" => return Err(self.parse_errors(value)),
            _ => {}
        }
        Ok(())
    }

    fn parse_string(&self, key: &str, value: &[u8]) -> error::Result<String> {
        serde_json::from_slice(value)
            .map_err(|_| self.protocol_error(format!("the {key} field was not a string")))
    }

    fn parse_errors(&self, value: &[u8]) -> Error {
        let parsed = ErrorCodeAndMessage::from_json(value);

        // from_json always yields at least one record
        let primary = parsed.iter().find(|e| !e.retry).unwrap_or(&parsed[0]);

        let mut server_error = ServerError::new(
            primary.server_error_kind(),
            &self.endpoint,
            self.status_code,
            primary.code,
            &primary.msg,
            primary.retry,
        )
        .with_reason(primary.reason.clone())
        .with_context(primary.context.clone())
        .with_statement(&self.statement);

        if let Some(client_context_id) = &self.client_context_id {
            server_error = server_error.with_client_context_id(client_context_id);
        }

        if parsed.len() > 1 {
            let descs = parsed
                .iter()
                .map(|e| ErrorDesc::new(e.server_error_kind(), e.code, e.msg.clone(), e.retry))
                .collect();
            server_error = server_error.with_error_descs(descs);
        }

        Error::new_server_error(server_error)
    }

    fn protocol_error(&self, msg: impl Into<String>) -> Error {
        Error::new_protocol_error(msg.into())
    }

    // Drops consumed bytes, keeping any value still being scanned.
    fn compact(&mut self) {
        let keep_from = if self.value_started {
            self.value_start
        } else {
            self.pos
        };
        if keep_from > 0 {
            self.buffer.drain(..keep_from);
            self.pos -= keep_from;
            self.value_start -= keep_from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyticsx::error::{ErrorKind, ServerErrorKind};

    fn new_parser() -> ResponseParser {
        ResponseParser::new(
            "http://10.112.210.101:8095",
            "SELECT 1",
            Some("ctx-1".to_string()),
            StatusCode::OK,
        )
    }

    fn drain(parser: &mut ResponseParser) -> Vec<String> {
        let mut rows = Vec::new();
        while let Some(row) = parser.next_row().unwrap() {
            rows.push(String::from_utf8(row.to_vec()).unwrap());
        }
        rows
    }

    #[test]
    fn successful_query_response() {
        let json = b"{\n\"requestID\": \"5be66457-d623-45e9-a4ae-9da888ee53bb\",\n\"signature\": {\"*\":\"*\"},\n\"results\": [\n{\"travel-sample\":{\"id\":10,\"name\":\"40-Mile Air\"}},\n{\"travel-sample\":{\"id\":10123,\"name\":\"Texas Wings\"}}\n],\n\"status\": \"success\",\n\"metrics\": {\"elapsedTime\": \"1.748019ms\",\"resultCount\": 2}\n}\n";
        let mut parser = new_parser();
        parser.push(json);

        let rows = drain(&mut parser);
        assert_eq!(
            rows,
            vec![
                r#"{"travel-sample":{"id":10,"name":"40-Mile Air"}}"#,
                r#"{"travel-sample":{"id":10123,"name":"Texas Wings"}}"#,
            ]
        );

        parser.end_of_input().unwrap();
        let raw = parser.into_metadata();
        assert_eq!(
            raw.request_id.as_deref(),
            Some("5be66457-d623-45e9-a4ae-9da888ee53bb")
        );
        assert_eq!(raw.status.as_deref(), Some("success"));
        assert_eq!(&raw.signature.unwrap()[..], br#"{"*":"*"}"#);
        assert_eq!(
            &raw.metrics.unwrap()[..],
            br#"{"elapsedTime": "1.748019ms","resultCount": 2}"#
        );
    }

    #[test]
    fn scalar_and_null_rows_in_order() {
        let json = br#"{"requestID":"r1","results":[0, 1, "two", null, true, [3,4], {"five":5}],"status":"success"}"#;
        let mut parser = new_parser();
        parser.push(json);

        let rows = drain(&mut parser);
        assert_eq!(
            rows,
            vec!["0", "1", "\"two\"", "null", "true", "[3,4]", r#"{"five":5}"#]
        );
        parser.end_of_input().unwrap();
    }

    #[test]
    fn empty_results() {
        let json = br#"{"requestID":"r1","results":[],"status":"success"}"#;
        let mut parser = new_parser();
        parser.push(json);
        assert!(drain(&mut parser).is_empty());
        parser.end_of_input().unwrap();
        assert_eq!(parser.into_metadata().request_id.as_deref(), Some("r1"));
    }

    #[test]
    fn siblings_after_results_are_captured() {
        let json = br#"{"results":[1],"requestID":"r9","warnings":[{"code":1,"msg":"w"}],"metrics":{}}"#;
        let mut parser = new_parser();
        parser.push(json);
        assert_eq!(drain(&mut parser), vec!["1"]);
        parser.end_of_input().unwrap();
        let raw = parser.into_metadata();
        assert_eq!(raw.request_id.as_deref(), Some("r9"));
        assert_eq!(&raw.warnings.unwrap()[..], br#"[{"code":1,"msg":"w"}]"#);
    }

    #[test]
    fn byte_at_a_time_feeding_preserves_rows() {
        let json = br#"{"requestID":"r1","results":[{"a":"x,]}"},{"b":2}],"status":"success"}"#;
        let mut parser = new_parser();
        let mut rows = Vec::new();
        for b in json.iter() {
            parser.push(&[*b]);
            while let Some(row) = parser.next_row().unwrap() {
                rows.push(String::from_utf8(row.to_vec()).unwrap());
            }
        }
        assert_eq!(rows, vec![r#"{"a":"x,]}"}"#, r#"{"b":2}"#]);
        parser.end_of_input().unwrap();
    }

    #[test]
    fn errors_before_rows_raise() {
        let json = br#"{"requestID":"r1","errors":[{"code":24000,"msg":"Syntax error"}],"status":"fatal"}"#;
        let mut parser = new_parser();
        parser.push(json);

        let err = loop {
            match parser.next_row() {
                Ok(Some(_)) => panic!("no rows expected"),
                Ok(None) => panic!("expected parsing to fail"),
                Err(e) => break e,
            }
        };
        let server_err = err.server_error().expect("expected a server error");
        assert_eq!(server_err.code(), 24000);
        assert_eq!(*server_err.kind(), ServerErrorKind::ParsingFailure);
        assert!(!err.is_retriable());
        assert_eq!(server_err.statement(), Some("SELECT 1"));
        assert_eq!(server_err.client_context_id(), Some("ctx-1"));
    }

    #[test]
    fn errors_after_rows_raise_without_further_rows() {
        let json = br#"{"requestID":"r1","results":[{"a":1}],"errors":[{"code":23003,"msg":"temp","retriable":true}],"status":"fatal"}"#;
        let mut parser = new_parser();
        parser.push(json);

        let row = parser.next_row().unwrap().expect("expected first row");
        assert_eq!(&row[..], br#"{"a":1}"#);

        let err = parser.next_row().expect_err("expected error after rows");
        assert!(err.is_retriable());
        assert_eq!(err.server_error().unwrap().code(), 23003);
    }

    #[test]
    fn primary_error_is_first_non_retriable() {
        let json = br#"{"errors":[{"code":23003,"msg":"temp","retriable":true},{"code":24000,"msg":"syntax","retriable":false},{"code":25000,"msg":"other","retriable":false}]}"#;
        let mut parser = new_parser();
        parser.push(json);

        let err = parser.next_row().expect_err("expected error");
        let server_err = err.server_error().unwrap();
        assert_eq!(server_err.code(), 24000);
        assert!(!err.is_retriable());
        assert_eq!(server_err.all_error_descs().len(), 3);
        assert_eq!(server_err.all_error_descs()[0].code(), 23003);
    }

    #[test]
    fn all_retriable_errors_choose_first() {
        let json = br#"{"errors":[{"code":23003,"msg":"a","retriable":true},{"code":23007,"msg":"b","retriable":true}]}"#;
        let mut parser = new_parser();
        parser.push(json);

        let err = parser.next_row().expect_err("expected error");
        assert_eq!(err.server_error().unwrap().code(), 23003);
        assert!(err.is_retriable());
    }

    #[test]
    fn truncated_document_is_rejected() {
        let json = br#"{"requestID":"r1","results":[{"a":1}"#;
        let mut parser = new_parser();
        parser.push(json);
        assert!(parser.next_row().unwrap().is_none());
        let err = parser.end_of_input().expect_err("expected truncation error");
        assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
    }

    #[test]
    fn non_object_response_is_rejected() {
        let mut parser = new_parser();
        parser.push(b"<html>service unavailable</html>");
        let err = parser.next_row().expect_err("expected protocol error");
        assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
    }

    #[test]
    fn non_array_results_is_rejected() {
        let mut parser = new_parser();
        parser.push(br#"{"results":{"a":1}}"#);
        let err = parser.next_row().expect_err("expected protocol error");
        assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut parser = new_parser();
        parser.push(br#"{"requestID":"r1","results":[]} {"#);
        assert!(drain_result(&mut parser).is_err());
    }

    fn drain_result(parser: &mut ResponseParser) -> error::Result<Vec<Bytes>> {
        let mut rows = Vec::new();
        while let Some(row) = parser.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    #[test]
    fn buffer_stays_bounded_across_many_rows() {
        let mut parser = new_parser();
        parser.push(br#"{"requestID":"r1","results":["#);
        assert!(parser.next_row().unwrap().is_none());

        let row = br#"{"i":1234567890},"#;
        let mut count = 0usize;
        for _ in 0..100_000 {
            parser.push(row);
            while parser.next_row().unwrap().is_some() {
                count += 1;
            }
            assert!(
                parser.buffer.len() < 4 * row.len(),
                "buffer grew to {} bytes",
                parser.buffer.len()
            );
        }
        assert_eq!(count, 100_000);

        parser.push(br#"{"i":0}],"status":"success"}"#);
        while parser.next_row().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 100_001);
        parser.end_of_input().unwrap();
    }

    #[test]
    fn plans_and_client_context_id_are_captured() {
        let json = br#"{"requestID":"r1","clientContextID":"cc-7","plans":{"optimizedLogicalPlan":{}},"results":[]}"#;
        let mut parser = new_parser();
        parser.push(json);
        drain(&mut parser);
        parser.end_of_input().unwrap();
        let raw = parser.into_metadata();
        assert_eq!(raw.client_context_id.as_deref(), Some("cc-7"));
        assert_eq!(&raw.plans.unwrap()[..], br#"{"optimizedLogicalPlan":{}}"#);
    }
}
