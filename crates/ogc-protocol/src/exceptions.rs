//! OGC service exception reports.
//!
//! Servers answer failed requests with HTTP 200 and an XML report instead of
//! the requested format. Both the WMS `ServiceExceptionReport` and the OWS
//! `ExceptionReport` shapes are recognised.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, thiserror::Error)]
pub enum ExceptionParseError {
    #[error("XML parsing error at position {position}: {source}")]
    Xml {
        position: usize,
        source: quick_xml::Error,
    },

    #[error("document is not an exception report")]
    NotAnExceptionReport,
}

/// One exception from a report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceException {
    pub code: Option<String>,
    pub locator: Option<String>,
    pub message: String,
}

/// Cheap check on a response body before attempting a full parse.
pub fn looks_like_exception_report(body: &[u8]) -> bool {
    let head = &body[..body.len().min(1024)];
    let head = String::from_utf8_lossy(head);
    head.contains("ServiceExceptionReport") || head.contains("ExceptionReport")
}

fn read_attributes(start: &BytesStart<'_>, exception: &mut ServiceException) {
    for attr in start.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.trim().to_string(),
            Err(_) => continue,
        };
        match attr.key.local_name().as_ref() {
            b"code" | b"exceptionCode" => exception.code = Some(value),
            b"locator" => exception.locator = Some(value),
            _ => {}
        }
    }
}

/// Parse every exception in a report.
pub fn parse_exception_report(xml: &str) -> Result<Vec<ServiceException>, ExceptionParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut is_report = false;
    let mut current: Option<ServiceException> = None;
    let mut exceptions = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| ExceptionParseError::Xml {
                position: reader.buffer_position(),
                source,
            })?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ServiceExceptionReport" | b"ExceptionReport" => is_report = true,
                b"ServiceException" | b"Exception" => {
                    let mut exception = ServiceException::default();
                    read_attributes(&e, &mut exception);
                    current = Some(exception);
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"ServiceExceptionReport" | b"ExceptionReport" => is_report = true,
                b"ServiceException" | b"Exception" => {
                    let mut exception = ServiceException::default();
                    read_attributes(&e, &mut exception);
                    exceptions.push(exception);
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(exception) = current.as_mut() {
                    let text = t.unescape().map_err(|source| ExceptionParseError::Xml {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    append_message(&mut exception.message, &text);
                }
            }
            Event::CData(c) => {
                if let Some(exception) = current.as_mut() {
                    let raw = c.into_inner();
                    append_message(&mut exception.message, &String::from_utf8_lossy(&raw));
                }
            }
            Event::End(e) => {
                if matches!(e.local_name().as_ref(), b"ServiceException" | b"Exception") {
                    if let Some(exception) = current.take() {
                        exceptions.push(exception);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !is_report {
        return Err(ExceptionParseError::NotAnExceptionReport);
    }
    Ok(exceptions)
}

fn append_message(message: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !message.is_empty() {
        message.push(' ');
    }
    message.push_str(text);
}

/// All exception messages of a report joined into one line.
pub fn summarize(exceptions: &[ServiceException]) -> String {
    exceptions
        .iter()
        .map(|e| match &e.code {
            Some(code) => format!("{}: {}", code, e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
