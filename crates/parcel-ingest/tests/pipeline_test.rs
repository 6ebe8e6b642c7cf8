//! End-to-end tests for the attachment pipeline.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GenericImageView, ImageBuffer, Rgb};
use tempfile::TempDir;

use parcel_ingest::{
    AdapterRegistry, AttachmentPipeline, CanonicalType, Error, ExtractorKind, PipelineConfig,
};

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::default().with_temp_dir(root.join("staging"))
}

fn write_png(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 200]));
    img.save(path).unwrap();
}

fn decoded_dimensions(data_uri: &str) -> (u32, u32) {
    let b64 = data_uri.strip_prefix("data:image/jpeg;base64,").unwrap();
    image::load_from_memory(&STANDARD.decode(b64).unwrap())
        .unwrap()
        .dimensions()
}

fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_data_uri_payload_end_to_end() {
    let dir = TempDir::new().unwrap();
    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();

    let staged = pipeline
        .stage_raw_payload("greeting", "data:text/plain;base64,SGVsbG8=")
        .await
        .unwrap();
    assert!(staged.starts_with(dir.path().join("staging")));
    assert!(staged.to_string_lossy().ends_with("_greeting.tmp"));

    let result = pipeline.prepare(&staged, None).await.unwrap();
    assert_eq!(result.content, "Hello");
    assert_eq!(result.file_type.as_str(), "text/plain");
    assert!(result.tokens > 0);
    assert_eq!(result.metadata.unwrap().size, 5);
}

#[tokio::test]
async fn test_tsx_source_with_transport_stream_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("component.tsx");
    let mut source = String::from("G");
    source.push_str(&"/".repeat(187));
    source.push('G');
    source.push_str("\nexport const App = () => <div />;\n");
    assert_eq!(source.as_bytes()[188], b'G');
    std::fs::write(&path, &source).unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();
    assert_eq!(result.file_type.as_str(), "text/typescript");
    assert_eq!(result.content, source);
    assert_eq!(result.metadata.unwrap().kind, "TypeScript source code");
}

#[tokio::test]
async fn test_oversized_image_keeps_metadata_and_thumbnail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scan.png");
    write_png(&path, 300, 200);

    let pipeline =
        AttachmentPipeline::new(config(dir.path()).with_image_max_bytes(16)).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();

    assert_eq!(result.file_type.as_str(), "image/png");
    assert_eq!(result.content, "");
    assert_eq!(result.tokens, 80);
    assert!(result.metadata.is_some());
    let thumbnail = result.thumbnail.expect("thumbnail should still be produced");
    assert_eq!(decoded_dimensions(&thumbnail), (256, 171));
}

#[tokio::test]
async fn test_small_image_is_not_upscaled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("icon.png");
    write_png(&path, 120, 80);

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();

    assert_eq!(decoded_dimensions(&result.content), (120, 80));
    assert_eq!(result.tokens, 13);
    assert_eq!(decoded_dimensions(&result.thumbnail.unwrap()), (120, 80));
}

#[tokio::test]
async fn test_large_image_is_bounded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("panorama.png");
    write_png(&path, 800, 200);

    let pipeline = AttachmentPipeline::new(config(dir.path()).with_image_max_dimension(400)).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();

    assert_eq!(decoded_dimensions(&result.content), (400, 100));
    assert_eq!(result.tokens, parcel_core::estimate_image_tokens(400, 100));
}

#[tokio::test]
async fn test_staged_file_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();

    let staged = pipeline
        .stage_raw_payload("notes.txt", "plain contents")
        .await
        .unwrap();
    assert!(staged.exists());

    pipeline.temp_files().tracked_delete(&staged).await.unwrap();
    assert!(!staged.exists());
    pipeline.temp_files().tracked_delete(&staged).await.unwrap();
    assert!(!pipeline.temp_files().is_tracked(&staged).await);
}

#[tokio::test]
async fn test_invalid_base64_payload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();

    let result = pipeline
        .stage_raw_payload("bad", "data:text/plain;base64,@@@not-base64@@@")
        .await;
    assert!(matches!(result, Err(Error::InvalidPayload(_))));
    assert!(pipeline.temp_files().tracked_paths().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_staged_file_removed_after_delay() {
    let dir = TempDir::new().unwrap();
    let pipeline = AttachmentPipeline::new(
        config(dir.path()).with_cleanup_delay(Duration::from_secs(60)),
    )
    .unwrap();

    let staged = pipeline.stage_raw_payload("later.txt", "soon gone").await.unwrap();
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(staged.exists());

    tokio::time::sleep(Duration::from_secs(2)).await;
    // let the cleanup task finish its blocking remove
    for _ in 0..50 {
        if !staged.exists() {
            break;
        }
        tokio::task::yield_now().await;
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(!staged.exists());
}

#[tokio::test]
async fn test_csv_is_rendered_as_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.csv");
    std::fs::write(&path, "name,role\nAda,\"engineer, lead\"\n").unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();
    assert_eq!(result.file_type.as_str(), "text/csv");
    assert_eq!(result.content, "| name | role |\n| Ada | engineer, lead |\n");
    assert_eq!(
        pipeline.registry().resolve(&result.file_type),
        Some(ExtractorKind::Csv)
    );
}

#[tokio::test]
async fn test_docx_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memo.docx");
    std::fs::write(&path, docx_bytes(&["First line", "Second line"])).unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();
    assert_eq!(
        result.file_type.as_str(),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(result.content, "First line\nSecond line");
    assert!(result.tokens > 0);
}

#[tokio::test]
async fn test_directory_attachment() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("bundle");
    std::fs::create_dir_all(root.join("nested")).unwrap();
    std::fs::write(root.join("one.txt"), "1234").unwrap();
    std::fs::write(root.join("nested/two.txt"), "56").unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&root, None).await.unwrap();

    assert_eq!(result.file_type, CanonicalType::directory());
    assert_eq!(result.content, "");
    assert_eq!(result.tokens, 0);
    assert!(result.thumbnail.is_none());
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.name, "bundle");
    assert_eq!(metadata.size, 6);
    assert_eq!(metadata.kind, "Folder (3 items)");
}

#[tokio::test]
async fn test_empty_registry_reports_missing_extractor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "text").unwrap();

    let pipeline =
        AttachmentPipeline::with_registry(config(dir.path()), AdapterRegistry::empty()).unwrap();
    match pipeline.prepare(&path, None).await {
        Err(Error::NoExtractor(file_type)) => assert_eq!(file_type, "text/plain"),
        other => panic!("expected NoExtractor, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_path_is_not_found() {
    let dir = TempDir::new().unwrap();
    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(dir.path().join("nope.pdf"), None).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_degraded_extraction_still_returns_result() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"PK\x03\x04 not really a workbook").unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();
    assert_eq!(result.content, "");
    assert_eq!(result.tokens, 0);
    assert!(result.metadata.is_some());
}

#[tokio::test]
async fn test_result_serializes_to_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, r#"{"k": 1}"#).unwrap();

    let pipeline = AttachmentPipeline::new(config(dir.path())).unwrap();
    let result = pipeline.prepare(&path, None).await.unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["type"], "application/json");
    assert_eq!(value["content"], r#"{"k": 1}"#);
    assert_eq!(value["name"], "data.json");
}
