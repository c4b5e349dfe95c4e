use std::time::Duration;

use reqwest::header::USER_AGENT;
use tracing::{debug, info};

use crate::error::ExtractError;

/// Anything that can turn a document URL into plain text.
pub trait DocumentSource {
    async fn extract_text(&self, url: &str) -> Result<String, ExtractError>;
}

/// Downloads PDFs over HTTP and converts them to text. One attempt per call.
pub struct PdfDocuments {
    client: reqwest::Client,
    user_agent: String,
    decode_timeout: Duration,
}

impl PdfDocuments {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
            decode_timeout: timeout,
        })
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ExtractError> {
        let retrieval = |reason: String| ExtractError::Retrieval {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| retrieval(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(retrieval(format!("HTTP {}", status)));
        }

        let bytes = resp.bytes().await.map_err(|e| retrieval(e.to_string()))?;
        debug!(url, size = bytes.len(), "Downloaded document");
        Ok(bytes.to_vec())
    }
}

impl DocumentSource for PdfDocuments {
    async fn extract_text(&self, url: &str) -> Result<String, ExtractError> {
        let bytes = self.fetch_bytes(url).await?;
        let url_owned = url.to_string();
        let text = decode_with_deadline(url, self.decode_timeout, move || {
            pdf_text(&url_owned, &bytes)
        })
        .await?;

        info!(url, chars = text.len(), "Extracted document text");
        Ok(text)
    }
}

/// Run a CPU-bound decoder off the async threads. A panic inside it comes
/// back as a `JoinError`, a stall as an elapsed deadline; both are `Parse`.
/// A stalled decoder thread is abandoned, not killed.
async fn decode_with_deadline<F>(
    url: &str,
    deadline: Duration,
    decode: F,
) -> Result<String, ExtractError>
where
    F: FnOnce() -> Result<String, ExtractError> + Send + 'static,
{
    let parse = |reason: String| ExtractError::Parse {
        url: url.to_string(),
        reason,
    };

    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(decode)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(parse(format!("decoder aborted: {}", e))),
        Err(_) => Err(parse(format!("decoder exceeded {:?}", deadline))),
    }
}

/// Convert PDF bytes into one string. A well-formed PDF with no text layer
/// gives `Ok("")`; anything that is not a decodable PDF is a `Parse` error.
pub fn pdf_text(url: &str, bytes: &[u8]) -> Result<String, ExtractError> {
    let parse = |reason: String| ExtractError::Parse {
        url: url.to_string(),
        reason,
    };

    if !has_pdf_header(bytes) {
        return Err(parse("missing %PDF- header".to_string()));
    }

    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| parse(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(text)
}

// The header may be preceded by junk, but only within the first kilobyte.
fn has_pdf_header(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use tiny_http::{Response, Server};

    use crate::matcher::match_ids;
    use crate::registry::IdentifierRegistry;

    const PICKUP_LIST_PDF: &[u8] = include_bytes!("../tests/fixtures/pickup_list.pdf");
    const BLANK_PDF: &[u8] = include_bytes!("../tests/fixtures/blank.pdf");

    /// Serve `count` requests with a fixed status and body, then stop.
    fn serve(status: u16, body: &'static [u8], count: usize) -> String {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        thread::spawn(move || {
            for req in server.incoming_requests().take(count) {
                let _ = req.respond(Response::from_data(body).with_status_code(status));
            }
        });
        format!("http://{}/slip.pdf", addr)
    }

    fn docs() -> PdfDocuments {
        PdfDocuments::new(Duration::from_secs(5), "pickup_watch-test").unwrap()
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = pdf_text("u", b"<html>not a pdf</html>").unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
        assert!(matches!(pdf_text("u", b"").unwrap_err(), ExtractError::Parse { .. }));
    }

    #[test]
    fn decodes_text_layer() {
        let text = pdf_text("u", PICKUP_LIST_PDF).unwrap();
        assert!(text.contains("Liste"));
        assert!(text.contains("587006"));
        assert!(text.contains("15870061"));
    }

    #[test]
    fn decoded_text_keeps_digit_boundaries() {
        let text = pdf_text("u", PICKUP_LIST_PDF).unwrap();
        let reg = IdentifierRegistry::new([("587006", "Adel"), ("587", "Short")]).unwrap();
        let r = match_ids(&text, &reg);
        assert_eq!(r.found, vec!["587006"]);
        assert_eq!(r.missing, vec!["587"]);
    }

    #[test]
    fn blank_pdf_is_empty_text() {
        assert_eq!(pdf_text("u", BLANK_PDF).unwrap(), "");
    }

    #[tokio::test]
    async fn stalled_decoder_hits_deadline() {
        let err = decode_with_deadline("u", Duration::from_millis(50), || {
            thread::sleep(Duration::from_millis(500));
            Ok(String::from("late"))
        })
        .await
        .unwrap_err();
        match err {
            ExtractError::Parse { reason, .. } => assert!(reason.contains("exceeded")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn panicking_decoder_is_parse_error() {
        let err = decode_with_deadline("u", Duration::from_secs(5), || panic!("bad xref"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }

    #[test]
    fn header_after_leading_junk() {
        assert!(has_pdf_header(b"\r\n  %PDF-1.7"));
        assert!(!has_pdf_header(b"%PD"));
    }

    #[tokio::test]
    async fn http_500_is_retrieval_error() {
        let url = serve(500, b"boom", 1);
        let err = docs().extract_text(&url).await.unwrap_err();
        match err {
            ExtractError::Retrieval { reason, .. } => assert!(reason.contains("500")),
            other => panic!("expected retrieval error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_returns_body() {
        let url = serve(200, b"%PDF-1.4 bytes", 1);
        let bytes = docs().fetch_bytes(&url).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 bytes");
    }

    #[tokio::test]
    async fn connection_refused_is_retrieval_error() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = docs()
            .fetch_bytes(&format!("http://127.0.0.1:{}/x.pdf", port))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Retrieval { .. }));
    }
}
