//! Seam for the receipt text-recognition engine.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use trackflow_core::{ReceiptScan, parse_receipt_text};

#[derive(Error, Debug)]
#[error("text recognition failed: {0}")]
pub struct RecognitionError(pub String);

/// Turns a receipt image into free text. The engine is a black box: it
/// either succeeds or fails.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError>;
}

/// Input that has already been through recognition, e.g. a text export.
pub struct PlainText;

#[async_trait]
impl TextRecognizer for PlainText {
    async fn recognize(&self, image: &[u8]) -> Result<String, RecognitionError> {
        String::from_utf8(image.to_vec()).map_err(|e| RecognitionError(e.to_string()))
    }
}

/// Recognise `image` and guess expense fields from the text.
pub async fn scan_receipt(
    recognizer: &dyn TextRecognizer,
    image: &[u8],
) -> Result<ReceiptScan, RecognitionError> {
    let text = recognizer.recognize(image).await?;
    let scan = parse_receipt_text(&text);
    debug!(
        amount = ?scan.amount,
        vendor = ?scan.vendor,
        category = ?scan.category,
        "receipt scanned"
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl TextRecognizer for Broken {
        async fn recognize(&self, _image: &[u8]) -> Result<String, RecognitionError> {
            Err(RecognitionError("engine crashed".into()))
        }
    }

    #[tokio::test]
    async fn scans_plain_text() {
        let scan = scan_receipt(&PlainText, b"Grand Hotel\nTotal EUR 240.00\n")
            .await
            .unwrap();
        assert_eq!(scan.vendor.as_deref(), Some("Grand Hotel"));
        assert_eq!(scan.amount, Some(240.0));
        assert_eq!(scan.category.as_deref(), Some("Accommodation"));
    }

    #[tokio::test]
    async fn engine_failure_propagates() {
        let err = scan_receipt(&Broken, b"ignored").await.unwrap_err();
        assert_eq!(err.to_string(), "text recognition failed: engine crashed");
    }

    #[tokio::test]
    async fn non_utf8_input_fails() {
        assert!(scan_receipt(&PlainText, &[0xff, 0xfe]).await.is_err());
    }
}
