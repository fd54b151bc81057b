//! Test fixtures: file blobs and server graphs.

use bytes::Bytes;
use fleetform_core::StagedFile;
use serde_json::json;

/// Minimal valid 1x1 PNG bytes.
pub fn create_minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
        0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x89, 0x00, 0x00, 0x00,
        0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ]
}

/// PNG of exactly `size` bytes (valid header, zero padding).
pub fn png_of_size(filename: &str, size: usize) -> StagedFile {
    let mut data = create_minimal_png();
    data.resize(size.max(data.len()), 0);
    StagedFile::new(filename, "image/png", Bytes::from(data))
}

pub fn pdf(filename: &str) -> StagedFile {
    StagedFile::new(filename, "application/pdf", Bytes::from_static(b"%PDF-1.4\n%%EOF\n"))
}

/// Invoice 9 as the server returns it: one charge row, one invoice file.
pub fn invoice_graph() -> serde_json::Value {
    json!({
        "id": 9,
        "invoiceNumber": "INV-0042",
        "vendorName": "Acme Logistics",
        "invoiceDate": "2024-05-20",
        "totalAmount": 1250,
        "charges": [
            {"serverId": 41, "description": "Toll", "amount": 100}
        ],
        "documents": [
            {
                "serverId": 3,
                "filename": "invoice.pdf",
                "mimeType": "application/pdf",
                "sizeBytes": 2048,
                "remoteReference": "/files/3",
                "slotFieldName": "INVOICE_FILE"
            }
        ]
    })
}
