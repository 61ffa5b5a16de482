//! HTTP request head decoding.
//!
//! Parses the request line and header fields with `httparse` and decides the
//! payload strategy from Content-Length / Transfer-Encoding (RFC 9112 §6).
//!
//! Limits: at most 64 header fields, at most 8 KiB of head bytes. Only
//! HTTP/1.0 and HTTP/1.1 are accepted.

use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of header fields in a request head
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes of a request head
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a request head into a [`RequestHeader`] and the [`PayloadSize`]
/// governing the payload phase that follows.
#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest parseable request line: "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut parsed = httparse::Request::new(&mut headers);

        let status = parsed.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        })?;

        match status {
            Status::Complete(head_len) => {
                trace!(head_len, "parsed request head");
                ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

                let version = match parsed.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    v => return Err(ParseError::InvalidVersion(v)),
                };
                let method = parsed
                    .method
                    .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
                    .ok_or(ParseError::InvalidMethod)?;
                let uri =
                    parsed.path.and_then(|p| p.parse::<Uri>().ok()).ok_or(ParseError::InvalidUri)?;

                let mut request = Request::new(());
                *request.method_mut() = method;
                *request.uri_mut() = uri;
                *request.version_mut() = version;

                let header_map = request.headers_mut();
                header_map.reserve(parsed.headers.len());
                for field in parsed.headers.iter() {
                    let name = HeaderName::from_bytes(field.name.as_bytes())
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    let value = HeaderValue::from_bytes(field.value)
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    header_map.append(name, value);
                }

                let header = RequestHeader::from(request);
                let payload_size = parse_payload_size(&header)?;

                src.advance(head_len);
                Ok(Some((header, payload_size)))
            }

            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Decides the payload strategy from the decoded head.
///
/// Carrying both Transfer-Encoding and Content-Length is rejected outright
/// (request smuggling vector per RFC 9112 §6.1).
fn parse_payload_size(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::Empty);
    }

    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str =
                cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            Ok(PayloadSize::Length(length))
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"))
        }
    }
}

/// Chunked must be the final encoding listed to take effect (RFC 9112 §6.1).
fn is_chunked(header_value: &HeaderValue) -> bool {
    header_value
        .as_bytes()
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use indoc::indoc;

    #[test]
    fn decodes_a_curl_get() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Empty);
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_static("127.0.0.1:8080")));

        // the body stays in the buffer for the payload phase
        assert_eq!(&buf[..], b"123");
    }

    #[test]
    fn decodes_a_post_with_content_length() {
        let str = indoc! {r##"
        POST /upload HTTP/1.1
        Host: example.com
        Content-Length: 11

        hello world"##};

        let mut buf = BytesMut::from(str);
        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(payload_size, PayloadSize::Length(11));
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(&buf[..], b"hello world");
    }

    #[test]
    fn partial_head_needs_more_data() {
        let mut buf = BytesMut::from(&b"GET /index.html HTTP/1.1\r\nHost: exa"[..]);
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 35);
    }

    #[test]
    fn oversized_head_is_rejected() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let long_value = "v".repeat(MAX_HEADER_BYTES);
        buf.extend_from_slice(format!("X-Filler: {long_value}\r\n").as_bytes());

        assert!(matches!(
            HeaderDecoder.decode(&mut buf),
            Err(ParseError::TooLargeHeader { .. })
        ));
    }

    #[test]
    fn both_framing_headers_are_rejected() {
        let str = indoc! {r##"
        POST / HTTP/1.1
        Transfer-Encoding: chunked
        Content-Length: 5

        "##};

        let mut buf = BytesMut::from(str);
        assert!(matches!(
            HeaderDecoder.decode(&mut buf),
            Err(ParseError::InvalidContentLength { .. })
        ));
    }

    #[test]
    fn chunked_must_be_the_last_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::TRANSFER_ENCODING, "gzip, chunked".parse().unwrap());
        assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING).unwrap()));

        headers.insert(http::header::TRANSFER_ENCODING, "chunked, gzip".parse().unwrap());
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING).unwrap()));

        headers.insert(http::header::TRANSFER_ENCODING, "gzip".parse().unwrap());
        assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING).unwrap()));
    }
}
