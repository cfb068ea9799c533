//! Contract Invariant Tests
//!
//! These tests verify the guarantees the badge and submission pipeline make.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use eventbadge_core::{
    export::{SharePayload, SHARE_TITLE},
    photo::MAX_PHOTO_BYTES,
    queue::PENDING_LIST_KEY,
    Acknowledgement, ArtifactExporter, BadgeError, Compositor, Connectivity, DirectorySaver,
    ExportError, HttpStore, IngestError, NoShareFacility, OfflineQueue, PhotoUpload, Poster, PosterSource, RecordPatch,
    RegistrationPipeline, RegistrationRecord, RemoteStore, Session, ShareFacility, ShareOutcome,
    SubmissionOutcome, SubmissionPayload, SubmissionPipeline, Template, TemplateRegistry,
    TransportError, DEFAULT_TEMPLATE_ID,
};

/// Remote store that records every write and optionally fails.
#[derive(Clone, Default)]
struct RecordingStore {
    writes: Arc<Mutex<Vec<SubmissionPayload>>>,
    fail_with: Option<String>,
}

impl RecordingStore {
    fn failing(reason: &str) -> Self {
        Self { fail_with: Some(reason.to_string()), ..Default::default() }
    }

    fn writes(&self) -> Vec<SubmissionPayload> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn write(&self, payload: &SubmissionPayload) -> Result<Acknowledgement, TransportError> {
        self.writes.lock().unwrap().push(payload.clone());
        match &self.fail_with {
            Some(reason) => Err(TransportError::Request(reason.clone())),
            None => Ok(Acknowledgement { status: 200, message: Some("Registration saved successfully".into()) }),
        }
    }
}

/// Share facility that keeps what it was given.
#[derive(Clone, Default)]
struct RecordingShare {
    shared: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    reject: bool,
}

impl ShareFacility for RecordingShare {
    fn is_available(&self) -> bool {
        true
    }

    fn share(&self, payload: &SharePayload<'_>) -> Result<(), ExportError> {
        if self.reject {
            return Err(ExportError::ShareRejected("user cancelled".into()));
        }
        assert_eq!(payload.title, SHARE_TITLE);
        self.shared
            .lock()
            .unwrap()
            .push((payload.file_name.to_string(), payload.bytes.to_vec()));
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    queue_dir: std::path::PathBuf,
    out_dir: std::path::PathBuf,
    store: RecordingStore,
    pipeline: RegistrationPipeline,
}

fn fixture(store: RecordingStore) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let queue_dir = dir.path().join("queue");
    let out_dir = dir.path().join("out");
    let submission = SubmissionPipeline::new(Box::new(store.clone()), OfflineQueue::new(&queue_dir));
    let pipeline = RegistrationPipeline::new(TemplateRegistry::builtin(), Compositor::new(), submission);
    Fixture { _dir: dir, queue_dir, out_dir, store, pipeline }
}

fn asha() -> RegistrationRecord {
    RegistrationRecord {
        name: "Asha Rao".into(),
        phone: "9876543210".into(),
        email: "asha@example.com".into(),
        gender: "female".into(),
        locality: "MG Road".into(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        ..Default::default()
    }
}

fn png(w: u32, h: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(w, h, Rgba(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn poster() -> Poster {
    Poster::decode(&png(270, 310, [30, 60, 120, 255])).unwrap()
}

fn session_with_photo(online: bool) -> Session {
    let mut session = Session::new(Connectivity::new(online));
    session.update_record(asha().into());
    session
        .ingest_photo(&PhotoUpload::new(png(120, 160, [220, 180, 150, 255]), "image/png"))
        .unwrap();
    session
}

#[test]
fn invariant_compose_then_export_is_non_empty() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);

    let badge = f
        .pipeline
        .generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .unwrap()
        .clone();
    assert!(!badge.is_empty());

    let exporter = ArtifactExporter::new(Box::new(DirectorySaver::new(&f.out_dir)), Box::new(NoShareFacility));
    let path = exporter.download(&badge, &session.record().name).unwrap();
    assert_eq!(path.file_name().unwrap(), "event-badge-Asha Rao.png");
    let bytes = std::fs::read(path).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(bytes, badge.bytes());
}

#[test]
fn invariant_default_template_draws_poster_artwork() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);

    let badge = f.pipeline.generate_badge(&mut session, DEFAULT_TEMPLATE_ID, None).unwrap();
    let img = image::load_from_memory(badge.bytes()).unwrap().to_rgba8();
    let artwork = Poster::bundled().unwrap();

    // Left half of the badge, well clear of the photo overlay.
    for (x, y) in [(100, 100), (60, 400), (200, 580)] {
        let px = *img.get_pixel(x, y);
        assert_eq!(px, *artwork.image().get_pixel(x, y), "({}, {})", x, y);
        assert_ne!(px, Rgba([255, 255, 255, 255]), "({}, {})", x, y);
    }
}

#[tokio::test]
async fn invariant_async_photo_rejection_leaves_state_unchanged() {
    let mut session = session_with_photo(true);
    let before = session.photo().cloned();

    let too_big = PhotoUpload::new(vec![0u8; MAX_PHOTO_BYTES as usize + 1], "image/png");
    assert!(matches!(session.ingest_photo_async(too_big).await, Err(IngestError::FileTooLarge { .. })));
    let not_image = PhotoUpload::new(png(4, 4, [0, 0, 0, 255]), "application/octet-stream");
    assert!(matches!(session.ingest_photo_async(not_image).await, Err(IngestError::InvalidImageType(_))));
    assert_eq!(session.photo().cloned(), before);

    let replacement = PhotoUpload::new(png(10, 10, [1, 2, 3, 255]), "image/png");
    let photo = session.ingest_photo_async(replacement).await.unwrap();
    assert_eq!(photo.image().dimensions(), (10, 10));
}

#[test]
fn invariant_oversized_photo_rejected_and_state_unchanged() {
    let mut session = session_with_photo(true);
    let before = session.photo().cloned();

    let upload = PhotoUpload::new(vec![0u8; MAX_PHOTO_BYTES as usize + 1], "image/jpeg");
    let err = session.ingest_photo(&upload).unwrap_err();
    assert!(matches!(err, IngestError::FileTooLarge { .. }));
    assert_eq!(session.photo().cloned(), before);
}

#[test]
fn invariant_non_image_rejected_and_state_unchanged() {
    let mut session = Session::default();
    for content_type in ["text/plain", "application/pdf", "video/mp4", ""] {
        let upload = PhotoUpload::new(png(4, 4, [0, 0, 0, 255]), content_type);
        let err = session.ingest_photo(&upload).unwrap_err();
        assert!(matches!(err, IngestError::InvalidImageType(_)), "{}", content_type);
        assert!(session.photo().is_none());
    }
}

#[test]
fn invariant_compose_is_idempotent() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let poster = poster();

    let first = f.pipeline.generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster)).unwrap().clone();
    let second = f.pipeline.generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster)).unwrap().clone();
    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(first.fingerprint, second.fingerprint);
}

#[tokio::test]
async fn invariant_offline_submission_queues_without_writing() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(false);

    let completion = f
        .pipeline
        .complete_registration(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .await
        .unwrap();

    assert!(matches!(completion.submission, SubmissionOutcome::QueuedOffline { .. }));
    assert!(f.store.writes().is_empty());

    let queue = OfflineQueue::new(&f.queue_dir);
    let entries = queue.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload.record, asha());
    assert_eq!(entries[0].payload.badge_template, DEFAULT_TEMPLATE_ID);
    assert!(entries[0].payload.photo_uploaded);
    assert!(entries[0].error.is_none());
    assert_eq!(queue.latest().unwrap(), Some(completion.payload));
}

#[tokio::test]
async fn invariant_direct_failure_queues_with_reason() {
    let store = RecordingStore::failing("connection reset");
    let queue_dir = tempfile::tempdir().unwrap();
    let pipeline = SubmissionPipeline::new(Box::new(store.clone()), OfflineQueue::new(queue_dir.path()));

    let payload = SubmissionPayload::new(asha(), DEFAULT_TEMPLATE_ID, false);
    let outcome = pipeline.submit(payload.clone(), &Connectivity::new(true)).await;

    match &outcome {
        SubmissionOutcome::QueuedAfterFailure { reason, .. } => assert!(reason.contains("connection reset")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.writes().len(), 1);

    let entries = pipeline.queue().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, payload);
    assert!(!entries[0].error.as_deref().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn invariant_online_end_to_end_delivers_exact_fields() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);

    let completion = f
        .pipeline
        .complete_registration(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .await
        .unwrap();
    assert!(completion.submission.is_delivered());

    let writes = f.store.writes();
    assert_eq!(writes.len(), 1);
    let sent = serde_json::to_value(&writes[0]).unwrap();
    assert_eq!(sent["name"], "Asha Rao");
    assert_eq!(sent["phone"], "9876543210");
    assert_eq!(sent["email"], "asha@example.com");
    assert_eq!(sent["gender"], "female");
    assert_eq!(sent["locality"], "MG Road");
    assert_eq!(sent["city"], "Bengaluru");
    assert_eq!(sent["state"], "Karnataka");
    assert_eq!(sent["badgeTemplate"], "EventPoster");
    assert_eq!(sent["photoUploaded"], true);

    assert!(OfflineQueue::new(&f.queue_dir).is_empty().unwrap());
    assert!(!f.queue_dir.join(format!("{}.json", PENDING_LIST_KEY)).exists());
    assert_eq!(session.badge().map(|b| b.fingerprint.clone()), Some(completion.badge.fingerprint));
}

#[tokio::test]
async fn invariant_skipped_photo_reports_not_uploaded() {
    let f = fixture(RecordingStore::default());
    let mut session = Session::new(Connectivity::new(true));
    session.update_record(asha().into());
    session.skip_photo();

    f.pipeline
        .complete_registration(&mut session, DEFAULT_TEMPLATE_ID, None)
        .await
        .unwrap();
    assert!(!f.store.writes()[0].photo_uploaded);
}

#[tokio::test]
async fn invariant_invalid_record_blocks_compose_and_submit() {
    let f = fixture(RecordingStore::default());
    let mut session = Session::new(Connectivity::new(true));
    session.update_record(RecordPatch { name: Some("Asha Rao".into()), ..Default::default() });

    let err = f
        .pipeline
        .complete_registration(&mut session, DEFAULT_TEMPLATE_ID, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BadgeError::Validation(ref v) if !v.is_empty()));
    assert!(session.badge().is_none());
    assert!(f.store.writes().is_empty());
}

#[tokio::test]
async fn invariant_rasterization_failure_keeps_previous_badge() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let previous = f
        .pipeline
        .generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .unwrap()
        .fingerprint
        .clone();

    // Template whose poster file does not exist.
    let mut registry = TemplateRegistry::builtin();
    registry.register(Template {
        id: "Broken".into(),
        poster: PosterSource::File(f.out_dir.join("missing.png")),
        ..Template::event_poster()
    });
    let submission = SubmissionPipeline::new(Box::new(f.store.clone()), OfflineQueue::new(&f.queue_dir));
    let pipeline = RegistrationPipeline::new(registry, Compositor::new(), submission);

    let err = pipeline.complete_registration(&mut session, "Broken", None).await.unwrap_err();
    assert!(matches!(err, BadgeError::Rasterization(_)));
    assert_eq!(err.user_message(), "Failed to generate badge. Please try again.");
    assert_eq!(session.badge().unwrap().fingerprint, previous);
    assert!(f.store.writes().is_empty());
}

#[test]
fn invariant_share_fallback_produces_download_file() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let badge = f
        .pipeline
        .generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .unwrap()
        .clone();

    let exporter = ArtifactExporter::new(Box::new(DirectorySaver::new(&f.out_dir)), Box::new(NoShareFacility));
    let downloaded = std::fs::read(exporter.download(&badge, "Asha Rao").unwrap()).unwrap();

    match exporter.share(&badge, "Asha Rao").unwrap() {
        ShareOutcome::Download { path, notice } => {
            assert!(!notice.is_empty());
            assert_eq!(std::fs::read(path).unwrap(), downloaded);
        }
        other => panic!("expected download fallback, got {:?}", other),
    }
}

#[test]
fn invariant_share_hands_over_full_file() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let badge = f
        .pipeline
        .generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .unwrap()
        .clone();

    let share = RecordingShare::default();
    let exporter = ArtifactExporter::new(Box::new(DirectorySaver::new(&f.out_dir)), Box::new(share.clone()));
    let outcome = exporter.share(&badge, "Asha Rao").unwrap();
    assert_eq!(outcome, ShareOutcome::Shared { file_name: "event-badge.png".into() });

    let shared = share.shared.lock().unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].1, badge.bytes());
    assert!(!f.out_dir.exists());
}

#[test]
fn invariant_rejected_share_is_surfaced() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let badge = f
        .pipeline
        .generate_badge(&mut session, DEFAULT_TEMPLATE_ID, Some(&poster()))
        .unwrap()
        .clone();

    let share = RecordingShare { reject: true, ..Default::default() };
    let exporter = ArtifactExporter::new(Box::new(DirectorySaver::new(&f.out_dir)), Box::new(share));
    let err = exporter.share(&badge, "Asha Rao").unwrap_err();
    assert!(matches!(err, ExportError::ShareRejected(_)));
    assert_eq!(
        BadgeError::from(err).user_message(),
        "Failed to share badge. Please try downloading instead."
    );
}

#[test]
fn invariant_template_not_found_error() {
    let f = fixture(RecordingStore::default());
    let mut session = session_with_photo(true);
    let err = f.pipeline.generate_badge(&mut session, "nonexistent", None).unwrap_err();
    assert!(err.to_string().contains("Template not found"));
    assert!(session.badge().is_none());
}

/// Serve one HTTP exchange on a local port and return the endpoint URL.
async fn serve_once(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/register", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + len {
                    break;
                }
            }
        }
        let response = format!(
            "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    url
}

fn http_pipeline(url: String, queue_dir: &std::path::Path) -> SubmissionPipeline {
    let store = HttpStore::new(Some(url), Some("secret".into()), Duration::from_secs(5)).unwrap();
    SubmissionPipeline::new(Box::new(store), OfflineQueue::new(queue_dir))
}

#[tokio::test]
async fn invariant_http_server_error_is_queued_with_reason() {
    let url = serve_once("HTTP/1.1 500 Internal Server Error", "").await;
    let queue_dir = tempfile::tempdir().unwrap();
    let pipeline = http_pipeline(url, queue_dir.path());

    let payload = SubmissionPayload::new(asha(), DEFAULT_TEMPLATE_ID, true);
    match pipeline.submit(payload.clone(), &Connectivity::new(true)).await {
        SubmissionOutcome::QueuedAfterFailure { reason, .. } => assert!(reason.contains("500"), "{}", reason),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let entries = pipeline.queue().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, payload);
    assert!(!entries[0].error.as_deref().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn invariant_http_rejection_body_is_queued() {
    let url = serve_once("HTTP/1.1 200 OK", r#"{"success":false,"error":"Sheet is full"}"#).await;
    let queue_dir = tempfile::tempdir().unwrap();
    let pipeline = http_pipeline(url, queue_dir.path());

    let outcome = pipeline
        .submit(SubmissionPayload::new(asha(), DEFAULT_TEMPLATE_ID, false), &Connectivity::new(true))
        .await;
    match outcome {
        SubmissionOutcome::QueuedAfterFailure { reason, .. } => assert!(reason.contains("Sheet is full")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(pipeline.queue().len().unwrap(), 1);
}

#[tokio::test]
async fn invariant_http_unreachable_endpoint_is_queued() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/register", listener.local_addr().unwrap());
    drop(listener);
    let queue_dir = tempfile::tempdir().unwrap();
    let pipeline = http_pipeline(url, queue_dir.path());

    let outcome = pipeline
        .submit(SubmissionPayload::new(asha(), DEFAULT_TEMPLATE_ID, false), &Connectivity::new(true))
        .await;
    match outcome {
        SubmissionOutcome::QueuedAfterFailure { reason, .. } => assert!(!reason.is_empty()),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(pipeline.queue().len().unwrap(), 1);
}

#[tokio::test]
async fn invariant_http_acknowledged_write_is_delivered() {
    let url = serve_once("HTTP/1.1 200 OK", r#"{"success":true,"message":"Registration saved successfully"}"#).await;
    let queue_dir = tempfile::tempdir().unwrap();
    let pipeline = http_pipeline(url, queue_dir.path());

    let outcome = pipeline
        .submit(SubmissionPayload::new(asha(), DEFAULT_TEMPLATE_ID, true), &Connectivity::new(true))
        .await;
    match outcome {
        SubmissionOutcome::Delivered { acknowledgement } => {
            assert_eq!(acknowledgement.status, 200);
            assert_eq!(acknowledgement.message.as_deref(), Some("Registration saved successfully"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(pipeline.queue().is_empty().unwrap());
}
