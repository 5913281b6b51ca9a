//! Generate JSON test vectors for client interop testing.
//!
//! Run with: cargo run --package protocol --example test_vectors

use protocol::messages::*;

fn main() {
    // Test vector 1: listing of the root with one folder and one file
    let listing = DirectoryListing {
        path: String::new(),
        parent: None,
        breadcrumbs: vec![Breadcrumb {
            name: "Home".to_string(),
            path: String::new(),
        }],
        entries: vec![
            EntryInfo {
                name: "docs".to_string(),
                path: "docs".to_string(),
                kind: EntryKind::Directory,
                size: None,
                size_display: "—".to_string(),
                modified: 1704067200,
                modified_display: "2024-01-01 00:00".to_string(),
            },
            EntryInfo {
                name: "notes.md".to_string(),
                path: "notes.md".to_string(),
                kind: EntryKind::File,
                size: Some(2048),
                size_display: "2.0 KB".to_string(),
                modified: 1704067200,
                modified_display: "2024-01-01 00:00".to_string(),
            },
        ],
        stats: ListingStats {
            files: 1,
            folders: 1,
            total_bytes: 2048,
            total_size: "2.0 KB".to_string(),
        },
    };
    print_test_vector("listing_root", &listing);

    // Test vector 2: text preview
    let preview = FilePreview {
        name: "notes.md".to_string(),
        path: "notes.md".to_string(),
        parent: String::new(),
        kind: PreviewKind::Text,
        text: Some("# Notes\n".to_string()),
    };
    print_test_vector("preview_text", &preview);

    // Test vector 3: upload summary
    let summary = UploadSummary {
        saved: 1,
        skipped: 1,
        failed: 0,
    };
    print_test_vector("upload_summary", &summary);

    // Test vector 4: not found error
    let error = ErrorMessage {
        code: ErrorCode::NotFound,
        message: "not found".to_string(),
    };
    print_test_vector("error_not_found", &error);
}

fn print_test_vector<T: serde::Serialize>(name: &str, message: &T) {
    match serde_json::to_string_pretty(message) {
        Ok(json) => println!("// {}\n{}\n", name, json),
        Err(e) => eprintln!("failed to encode {}: {}", name, e),
    }
}
