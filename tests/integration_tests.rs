use async_trait::async_trait;
use chrono::NaiveDate;
use statement_insight::*;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Text(String),
    Image { bytes: usize, media_type: String },
}

/// Extraction service that records every call and answers with a fixed reply.
#[derive(Clone)]
struct CountingService {
    calls: Arc<Mutex<Vec<Call>>>,
    reply: Option<String>,
}

impl CountingService {
    fn replying(reply: &str) -> Self {
        Self {
            calls: Arc::default(),
            reply: Some(reply.to_string()),
        }
    }

    fn failing() -> Self {
        Self {
            calls: Arc::default(),
            reply: None,
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self) -> Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| StatementError::Service("429 RESOURCE_EXHAUSTED".to_string()))
    }
}

#[async_trait]
impl ExtractionService for CountingService {
    async fn generate_from_text(&self, text: &str, _instruction: &str) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Text(text.to_string()));
        self.answer()
    }

    async fn generate_from_image(
        &self,
        image: &[u8],
        media_type: &str,
        _instruction: &str,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Image {
            bytes: image.len(),
            media_type: media_type.to_string(),
        });
        self.answer()
    }
}

/// Document reader with canned text and a canned first-page image.
struct CannedReader {
    text: Option<String>,
    page: Vec<u8>,
}

impl DocumentReader for CannedReader {
    fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String> {
        self.text
            .clone()
            .ok_or_else(|| StatementError::PdfParsing("no text layer".to_string()))
    }

    fn render_first_page(&self, _pdf_bytes: &[u8], _scale: f32) -> Result<Vec<u8>> {
        Ok(self.page.clone())
    }
}

const THREE_RECORDS: &str = r#"[
  {"date": "2024-04-02", "description": "Grocery Mart", "amount": -84.12, "category": "Groceries"},
  {"date": "2024-04-05", "description": "Payroll", "amount": 3100.00, "category": "Income"},
  {"date": "2024-04-09", "description": "Metro Card", "amount": -30.00}
]"#;

#[tokio::test]
async fn test_debit_credit_statement_end_to_end() {
    let service = CountingService::replying("[]");
    let processor = StatementProcessor::new(service.clone());
    let csv = "Transaction Date,Narration,Debit,Credit\n\
               2024-03-01,POS Coffee House,4.50,\n\
               2024-03-03,Electricity Board,120.00,\n\
               2024-03-07,Salary March,,2800.00\n\
               2024-03-12,Book Store,35.99,\n\
               2024-03-18,Refund Airline,,220.00\n\
               2024-03-25,Gym Membership,49.00,\n";

    let report = processor
        .process_upload("hdfc_march.csv", csv.as_bytes())
        .await
        .unwrap();

    assert!(service.calls().is_empty());
    assert_eq!(report.transactions.len(), 6);

    let amounts: Vec<f64> = report.transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![-4.50, -120.00, 2800.00, -35.99, 220.00, -49.00]);
    assert!(report
        .transactions
        .iter()
        .all(|t| t.category == UNCATEGORIZED && t.is_anomaly.is_some()));
    assert_eq!(
        report.transactions[2].date,
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    );
}

#[tokio::test]
async fn test_unrecognized_table_uses_one_text_call() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone());
    let csv = "When,What,How Much\n02/04/2024,Grocery Mart,84.12\n";

    let report = processor
        .process_upload("export.csv", csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(service.calls(), vec![Call::Text(csv.to_string())]);
    assert_eq!(report.transactions.len(), 3);
    assert_eq!(report.transactions[2].category, UNCATEGORIZED);
    assert_eq!(report.insight, generate_insight(&report.anomalies));
}

#[tokio::test]
async fn test_unrecognized_table_is_truncated() {
    let service = CountingService::replying(THREE_RECORDS);
    let config = PipelineConfig {
        text_char_limit: 12,
        ..Default::default()
    };
    let processor = StatementProcessor::with_config(service.clone(), config).unwrap();
    let csv = "When,What,How Much\n02/04/2024,Grocery Mart,84.12\n";

    processor
        .process_upload("export.csv", csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(service.calls(), vec![Call::Text("When,What,Ho".to_string())]);
}

#[tokio::test]
async fn test_text_pdf_sends_extracted_text() {
    let service = CountingService::replying(THREE_RECORDS);
    let text = "Statement of account\n".repeat(10);
    let processor = StatementProcessor::new(service.clone()).with_document_reader(CannedReader {
        text: Some(text.clone()),
        page: vec![0x89, b'P', b'N', b'G'],
    });

    let report = processor
        .process_upload("statement.pdf", b"%PDF-1.5")
        .await
        .unwrap();

    assert_eq!(service.calls(), vec![Call::Text(text)]);
    assert_eq!(report.transactions.len(), 3);
}

#[tokio::test]
async fn test_scanned_pdf_sends_one_page_image() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone()).with_document_reader(CannedReader {
        text: Some("  Page 1  ".to_string()),
        page: vec![7; 64],
    });

    processor
        .process_upload("scan.PDF", b"%PDF-1.4")
        .await
        .unwrap();

    assert_eq!(
        service.calls(),
        vec![Call::Image {
            bytes: 64,
            media_type: "image/png".to_string()
        }]
    );
}

#[tokio::test]
async fn test_pdf_without_text_layer_falls_back_to_image() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone()).with_document_reader(CannedReader {
        text: None,
        page: vec![1; 8],
    });

    processor
        .process_upload("scan.pdf", b"%PDF-1.4")
        .await
        .unwrap();

    assert!(matches!(service.calls().as_slice(), [Call::Image { .. }]));
}

#[tokio::test]
async fn test_unreadable_pdf_makes_no_call() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone());

    let result = processor
        .process_upload("broken.pdf", b"this is not a pdf")
        .await;

    assert!(matches!(
        result,
        Err(StatementError::ExtractionEmpty {
            cause: EmptyCause::UnreadableDocument
        })
    ));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_image_with_fenced_reply() {
    let reply = format!("Here you go:\n```json\n{}\n```", THREE_RECORDS);
    let service = CountingService::replying(&reply);
    let processor = StatementProcessor::new(service.clone());

    let report = processor
        .process_upload("receipt.jpeg", &[0xFF, 0xD8, 0xFF, 0xE0])
        .await
        .unwrap();

    assert_eq!(report.transactions.len(), 3);
    assert_eq!(report.transactions[0].description, "Grocery Mart");
    assert_eq!(
        service.calls(),
        vec![Call::Image {
            bytes: 4,
            media_type: "image/jpeg".to_string()
        }]
    );
}

#[tokio::test]
async fn test_service_failure_is_extraction_empty() {
    let service = CountingService::failing();
    let processor = StatementProcessor::new(service.clone());

    let err = processor
        .process_upload("photo.heic", &[0, 0, 0, 24, b'f', b't', b'y', b'p'])
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert_eq!(err.client_reason(), EXTRACTION_EMPTY_MESSAGE);
    assert!(matches!(
        err,
        StatementError::ExtractionEmpty {
            cause: EmptyCause::ServiceFailure
        }
    ));
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_malformed_reply_is_extraction_empty() {
    let service = CountingService::replying("Sorry, I can't read this statement.");
    let processor = StatementProcessor::new(service.clone());

    let err = processor
        .process_upload("receipt.png", &[0x89, b'P', b'N', b'G'])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StatementError::ExtractionEmpty {
            cause: EmptyCause::MalformedResponse
        }
    ));
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected_before_extraction() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone());

    let err = processor
        .process_upload("statement.xlsx", b"PK\x03\x04")
        .await
        .unwrap_err();

    assert!(matches!(err, StatementError::UnsupportedFormat(_)));
    assert!(err.is_client_error());
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_binary_csv_is_a_decode_error() {
    let service = CountingService::replying(THREE_RECORDS);
    let processor = StatementProcessor::new(service.clone());

    let err = processor
        .process_upload("statement.csv", &[0x00, 0x01, 0xFE, 0x02, 0x9C])
        .await
        .unwrap_err();

    assert!(matches!(err, StatementError::Decode(_)));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_latin1_csv_is_accepted() {
    let service = CountingService::replying("[]");
    let processor = StatementProcessor::new(service.clone());
    let mut csv = b"Date,Description,Amount\n2024-06-01,Caf".to_vec();
    csv.push(0xE9);
    csv.extend_from_slice(b" Central,-12.40\n");

    let report = processor.process_upload("cafe.csv", &csv).await.unwrap();

    assert_eq!(report.transactions[0].description, "Café Central");
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_report_payload_shape() {
    let service = CountingService::replying("[]");
    let processor = StatementProcessor::new(service);
    let mut csv = String::from("Date,Description,Amount,Category\n");
    for day in 1..=12 {
        csv.push_str(&format!("2024-07-{:02},Lunch,-{}.00,Dining\n", day, 10 + day % 3));
    }
    csv.push_str("2024-07-20,Laptop,-1899.00,Electronics\n");

    let report = processor
        .process_upload("july.csv", csv.as_bytes())
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    let transactions = json["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 13);
    for record in transactions {
        for key in ["date", "description", "amount", "category", "is_anomaly"] {
            assert!(record.get(key).is_some(), "missing {}", key);
        }
    }
    assert_eq!(json["transactions"][12]["date"], "2024-07-20");

    let anomalies = json["anomalies"].as_array().unwrap();
    assert!(anomalies.iter().all(|a| a["is_anomaly"] == true));
    assert!(anomalies.iter().any(|a| a["description"] == "Laptop"));
    assert!(json["insight"]
        .as_str()
        .unwrap()
        .starts_with(&format!("You had {} unusual transactions", anomalies.len())));
}

#[tokio::test]
async fn test_same_upload_gives_same_flags() {
    let processor = StatementProcessor::new(CountingService::replying("[]"));
    let csv = "Date,Description,Amount\n\
               2024-08-01,Rent,-1500\n\
               2024-08-02,Coffee,-4\n\
               2024-08-03,Coffee,-5\n\
               2024-08-04,Groceries,-62\n\
               2024-08-05,Fuel,-48\n\
               2024-08-06,Coffee,-4.5\n\
               2024-08-07,Salary,4200\n";

    let first = processor.process_upload("a.csv", csv.as_bytes()).await.unwrap();
    let second = processor.process_upload("a.csv", csv.as_bytes()).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_statement_footer_does_not_discard_rows() {
    let service = CountingService::replying("[]");
    let processor = StatementProcessor::new(service.clone());
    let csv = "Date,Description,Amount\n\
               2024-06-01,Coffee,-3.50\n\
               2024-06-02,Salary,2500\n\
               End of statement\n";

    let report = processor
        .process_upload("june.csv", csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.transactions.len(), 2);
    assert!(service.calls().is_empty());
}
