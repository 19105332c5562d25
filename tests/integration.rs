use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use image::{GrayImage, Luma};
use pretty_assertions::assert_eq;

use fieldscan::config::ManagerConfig;
use fieldscan::core::geometry::{accept_distinct, Line, Rect, DEFAULT_NEAR_DISTANCE};
use fieldscan::core::settings::{EngineMode, PageSegMode};
use fieldscan::error::{ConfigError, ManagerError, RecognitionError};
use fieldscan::events::{EventKind, ManagerEvent, ManagerEventListener};
use fieldscan::layout::{LineDetector, Orientation};
use fieldscan::ocr::{OcrEngine, OcrError, OcrPage};
use fieldscan::pages::FilePageSource;
use fieldscan::{
    DocumentType, Field, ManagerState, RecognitionManager, RecognitionOutcome, RecognitionSettings,
};

const WAIT: Duration = Duration::from_secs(20);

const FORM_TEXT: &str = "\
MOM Foreign Worker Employment Details
Employer Details
Name of Employer: ACME BUILDERS PTE. LTD.
Employer Tel No: 62345678
CPF Submission No: 201012345K-JAN-15
Name of foreign worker: JOHN SMITH TAN
Passport No: K1234567
Date of Birth: 01/02/1985
WP No: 0123456789
FIN: G1234567N
Nationality: INDIAN
Occupation: CONSTRUCTION WORKER
";

type Script = dyn Fn(&GrayImage, &RecognitionSettings) -> String + Send + Sync;

/// Answers the reference word for the self-test and otherwise reads
/// whatever the script says.
struct ScriptedEngine {
    script: Box<Script>,
}

impl ScriptedEngine {
    fn new(script: impl Fn(&GrayImage, &RecognitionSettings) -> String + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
        }
    }

    fn fixed(text: &'static str) -> Self {
        Self::new(move |_, _| text.to_string())
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(
        &self,
        image: &GrayImage,
        _region: Option<Rect>,
        settings: &RecognitionSettings,
    ) -> Result<OcrPage, OcrError> {
        if settings.page_seg_mode() == PageSegMode::SingleWord {
            return Ok(OcrPage::from_text("TEST"));
        }
        Ok(OcrPage::from_text(&(self.script)(image, settings)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Blocks the first recognition call until released.
struct GatedEngine {
    entered: Sender<()>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl OcrEngine for GatedEngine {
    fn recognize(
        &self,
        _image: &GrayImage,
        _region: Option<Rect>,
        settings: &RecognitionSettings,
    ) -> Result<OcrPage, OcrError> {
        if settings.page_seg_mode() == PageSegMode::SingleWord {
            return Ok(OcrPage::from_text("test"));
        }
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = self.entered.send(());
            let _ = gate.recv_timeout(WAIT);
        }
        Ok(OcrPage::from_text("nothing recognizable here"))
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Finds no lines and counts how often it was asked.
#[derive(Default)]
struct CountingDetector {
    calls: AtomicUsize,
}

impl LineDetector for CountingDetector {
    fn detect_lines(&self, _image: &GrayImage, _orientation: Orientation, _min_length: u32) -> Vec<Line> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<ManagerEvent>>,
}

impl EventLog {
    fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl ManagerEventListener for EventLog {
    fn system_exception(&self, event: &ManagerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn recognition_exception(&self, event: &ManagerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn miscellaneous_exception(&self, event: &ManagerEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn write_page(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    GrayImage::from_pixel(width, height, Luma([255]))
        .save(&path)
        .expect("write page image");
    path
}

fn started_manager(engine: Arc<dyn OcrEngine>, temp: &Path, config: ManagerConfig) -> RecognitionManager {
    let manager = RecognitionManager::new(engine, Arc::new(FilePageSource::default())).with_config(
        ManagerConfig {
            temp_dir: Some(temp.to_path_buf()),
            poll_interval_ms: 10,
            ..config
        },
    );
    manager.init().expect("init");
    manager.start().expect("start");
    manager
}

fn wait(outcome: Option<RecognitionOutcome>) -> RecognitionOutcome {
    outcome.expect("job finished in time")
}

/// Scenario: a page matching no keyword set finishes with no type.
#[test]
fn unrecognized_document_finishes_without_type() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "invoice.png", 30, 20);

    let engine = Arc::new(ScriptedEngine::fixed("Quarterly invoice\nTotal due"));
    let manager = started_manager(engine, temp.path(), ManagerConfig::default());

    let report = wait(manager.push_file(&page).wait_timeout(WAIT)).expect("not an error");
    assert_eq!(report.id, "invoice.png");
    assert_eq!(report.document_type, None);
    assert_eq!(report.completeness, 0);
    assert!(report.data.is_none());

    manager.stop();
    Ok(())
}

/// Scenario: a complete form yields every field.
#[test]
fn complete_form_reaches_full_completeness() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "form.png", 40, 30);

    let engine = Arc::new(ScriptedEngine::fixed(FORM_TEXT));
    let manager = started_manager(engine, temp.path(), ManagerConfig::default());

    let report = wait(manager.push_file(&page).wait_timeout(WAIT)).expect("not an error");
    assert_eq!(report.document_type, Some(DocumentType::ManpowerForm));
    assert_eq!(report.completeness, 100);
    assert_eq!(report.passes.len(), 1);

    let data = report.data.expect("record");
    assert_eq!(data.get(Field::FullName), Some("JOHN SMITH TAN"));
    assert_eq!(data.get(Field::PassportNumber), Some("K1234567"));
    assert_eq!(data.get(Field::DateOfBirth), Some("01/02/1985"));
    assert_eq!(data.get(Field::WorkPermitNumber), Some("0123456789"));
    assert_eq!(data.get(Field::NricOrFinNumber), Some("G1234567N"));
    assert_eq!(data.get(Field::Nationality), Some("INDIAN"));
    assert_eq!(data.get(Field::Occupation), Some("CONSTRUCTION WORKER"));
    assert_eq!(data.get(Field::EmployerName), Some("ACME BUILDERS PTE. LTD."));
    assert_eq!(data.get(Field::EmployerTelephone), Some("62345678"));
    assert_eq!(data.get(Field::EmployerUen), Some("201012345K-JAN-15"));

    manager.stop();
    Ok(())
}

/// Scenario: stopping with queued work aborts everything not yet started
/// while the target in flight still finishes.
#[test]
fn stop_aborts_queued_targets() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let pages: Vec<PathBuf> = (0..3)
        .map(|i| write_page(input.path(), &format!("scan-{i}.png"), 20 + i, 20 + i))
        .collect();

    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
    let engine = Arc::new(GatedEngine {
        entered: entered_tx,
        gate: Mutex::new(Some(gate_rx)),
    });
    let manager = Arc::new(started_manager(engine, temp.path(), ManagerConfig::default()));

    let handles: Vec<_> = pages.iter().map(|page| manager.push_file(page)).collect();
    entered_rx.recv_timeout(WAIT)?;

    let watcher = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            while manager.is_running() {
                thread::sleep(Duration::from_millis(5));
            }
            let _ = gate_tx.send(());
        })
    };
    manager.stop();
    watcher.join().expect("watcher thread");

    let mut outcomes = handles.into_iter().map(|h| wait(h.wait_timeout(WAIT)));
    let first = outcomes.next().expect("first outcome").expect("in-flight target finishes");
    assert_eq!(first.id, "scan-0.png");
    for outcome in outcomes {
        let failure = outcome.expect_err("queued target aborted");
        assert!(matches!(failure.error, RecognitionError::Aborted));
    }
    assert_eq!(manager.queue_len(), 0);
    assert_eq!(manager.state(), ManagerState::Uninitialized);
    Ok(())
}

/// Scenario: a later rung fills only what the earlier one left unset.
#[test]
fn ladder_passes_merge_without_overwriting() -> Result<()> {
    const BASIC_TEXT: &str = "\
MOM Foreign Worker Employment Details
Name of foreign worker: JOHN SMITH TAN
Passport No: K1234567
Date of Birth: 01/02/1985
WP No: 0123456789
FIN: G1234567N
";
    const FULL_TEXT: &str = "\
Name of foreign worker: WRONG NAME
Nationality: INDIAN
Occupation: CONSTRUCTION WORKER
Name of Employer: ACME BUILDERS PTE. LTD.
Employer Tel No: 62345678
CPF Submission No: 201012345K-JAN-15
";

    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "form.png", 40, 30);

    let engine = Arc::new(ScriptedEngine::new(|_, settings| {
        match settings.engine_mode() {
            EngineMode::Full => FULL_TEXT,
            _ => BASIC_TEXT,
        }
        .to_string()
    }));
    let ladder = vec![
        RecognitionSettings::new(90, EngineMode::Basic, PageSegMode::SingleBlock),
        RecognitionSettings::new(90, EngineMode::Full, PageSegMode::SingleBlock),
    ];
    let config = ManagerConfig {
        debug_output: true,
        ladder: ladder.into(),
        ..ManagerConfig::default()
    };
    let manager = started_manager(engine, temp.path(), config);

    let report = wait(manager.push_file(&page).wait_timeout(WAIT)).expect("not an error");
    let completeness: Vec<u8> = report.passes.iter().map(|p| p.completeness).collect();
    assert_eq!(completeness, vec![50, 100]);
    assert_eq!(report.completeness, 100);

    let data = report.data.expect("record");
    assert_eq!(data.get(Field::FullName), Some("JOHN SMITH TAN"));
    assert_eq!(data.get(Field::Nationality), Some("INDIAN"));
    assert_eq!(data.get(Field::EmployerUen), Some("201012345K-JAN-15"));

    let trace = fs::read_to_string(temp.path().join("debug").join("form.png.txt"))?;
    assert!(trace.contains("iteration: 0\tcompleteness: 50\n"));
    assert!(trace.contains("iteration: 1\tcompleteness: 100\n"));

    manager.stop();
    Ok(())
}

/// Scenario: near-duplicate detections collapse to one line.
#[test]
fn near_duplicate_lines_are_merged() {
    let lines = vec![
        Line::from_coords(50.0, 100.0, 850.0, 100.0),
        Line::from_coords(52.0, 104.0, 848.0, 103.0),
    ];
    assert_eq!(accept_distinct(lines, DEFAULT_NEAR_DISTANCE).len(), 1);
}

#[test]
fn concurrent_producers_keep_their_submission_order() -> Result<()> {
    const PRODUCERS: usize = 4;
    const BATCH: usize = 5;

    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "invoice.png", 30, 20);
    let engine = Arc::new(ScriptedEngine::fixed("Quarterly invoice"));
    let manager = started_manager(engine, temp.path(), ManagerConfig::default());

    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let (manager, page, done_tx) = (&manager, &page, done_tx.clone());
            scope.spawn(move || {
                for seq in 0..BATCH {
                    let done_tx = done_tx.clone();
                    manager.push_file_with(page, move |outcome| {
                        let _ = done_tx.send((producer, seq, outcome.is_ok()));
                    });
                }
            });
        }
    });
    drop(done_tx);

    let mut finished = Vec::new();
    for _ in 0..PRODUCERS * BATCH {
        finished.push(done_rx.recv_timeout(WAIT)?);
    }
    manager.stop();
    assert!(done_rx.try_recv().is_err(), "one notification per job");

    assert!(finished.iter().all(|(_, _, ok)| *ok));
    for producer in 0..PRODUCERS {
        let order: Vec<usize> = finished
            .iter()
            .filter(|(p, _, _)| *p == producer)
            .map(|(_, seq, _)| *seq)
            .collect();
        assert_eq!(order, (0..BATCH).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn custom_detector_serves_table_row_search() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "form.png", 40, 30);

    let detector = Arc::new(CountingDetector::default());
    let engine = Arc::new(ScriptedEngine::fixed(
        "MOM Foreign Worker Employment Details\nName of foreign worker: JOHN SMITH TAN",
    ));
    let manager = RecognitionManager::new(engine, Arc::new(FilePageSource::default()))
        .with_detector(detector.clone())
        .with_config(ManagerConfig {
            temp_dir: Some(temp.path().to_path_buf()),
            poll_interval_ms: 10,
            ..ManagerConfig::default()
        });
    manager.init()?;
    manager.start()?;

    let report = wait(manager.push_file(&page).wait_timeout(WAIT)).expect("not an error");
    assert_eq!(report.document_type, Some(DocumentType::ManpowerForm));
    assert!(report.completeness < 100);
    // Rows are searched once per page, horizontally and vertically.
    assert_eq!(detector.calls.load(Ordering::SeqCst), 2);

    manager.stop();
    Ok(())
}

#[test]
fn unreadable_file_fails_and_worker_continues() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let broken = input.path().join("broken.png");
    fs::write(&broken, b"not a png")?;
    let good = write_page(input.path(), "form.png", 40, 30);

    let log = Arc::new(EventLog::default());
    let engine = Arc::new(ScriptedEngine::fixed(FORM_TEXT));
    let manager = started_manager(engine, temp.path(), ManagerConfig::default());
    manager.set_event_listener(log.clone());

    let failed = manager.push_file(&broken);
    let finished = manager.push_file(&good);

    let failure = wait(failed.wait_timeout(WAIT)).expect_err("broken image");
    assert!(matches!(failure.error, RecognitionError::Image(_)));
    let report = wait(finished.wait_timeout(WAIT)).expect("worker survived");
    assert_eq!(report.completeness, 100);
    assert_eq!(log.kinds(), vec![EventKind::Recognition]);

    manager.stop();
    Ok(())
}

#[test]
fn card_without_title_finishes_empty() -> Result<()> {
    let input = tempfile::tempdir()?;
    let temp = tempfile::tempdir()?;
    let page = write_page(input.path(), "card.png", 50, 32);

    let engine = Arc::new(ScriptedEngine::fixed(
        "SECTOR construction\nThis card is issued under the Foreign Manpower Act",
    ));
    let manager = started_manager(engine, temp.path(), ManagerConfig::default());

    let report = wait(manager.push_file(&page).wait_timeout(WAIT)).expect("not an error");
    assert_eq!(report.document_type, Some(DocumentType::WorkPermitCard));
    assert_eq!(report.completeness, 0);
    assert_eq!(report.passes.len(), 2);

    manager.stop();
    Ok(())
}

#[test]
fn configuration_is_frozen_while_running() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let log = Arc::new(EventLog::default());
    let manager = started_manager(
        Arc::new(ScriptedEngine::fixed("")),
        temp.path(),
        ManagerConfig::default(),
    );
    manager.set_event_listener(log.clone());
    assert!(manager.is_running());
    manager.start()?;

    assert!(matches!(manager.set_temp_dir("/elsewhere"), Err(ConfigError::Running)));
    assert!(matches!(manager.set_debug_output(true), Err(ConfigError::Running)));
    assert_eq!(log.kinds(), vec![EventKind::Miscellaneous; 2]);

    manager.stop();
    assert_eq!(manager.state(), ManagerState::Uninitialized);
    manager.set_debug_output(true)?;

    assert!(matches!(manager.start(), Err(ManagerError::NotInitialized)));
    assert_eq!(log.kinds().last(), Some(&EventKind::System));

    manager.init()?;
    manager.start()?;
    manager.stop();
    Ok(())
}

#[test]
fn push_all_files_queues_supported_files_in_name_order() -> Result<()> {
    let input = tempfile::tempdir()?;
    for name in ["b.png", "a.JPG", "c.gif", "notes.txt"] {
        fs::write(input.path().join(name), b"queued, never read")?;
    }
    fs::create_dir(input.path().join("d.png"))?;

    let manager = RecognitionManager::new(
        Arc::new(ScriptedEngine::fixed("")),
        Arc::new(FilePageSource::default()),
    );
    let handles = manager.push_all_files(input.path())?;
    let ids: Vec<&str> = handles.iter().map(|h| h.id()).collect();
    assert_eq!(ids, vec!["a.JPG", "b.png", "c.gif"]);
    assert_eq!(manager.queue_len(), 3);
    Ok(())
}

/// Needs `tesseract` with English data on the PATH.
#[test]
#[ignore]
fn tesseract_reads_reference_image() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let manager = RecognitionManager::new(
        Arc::new(fieldscan::ocr::TesseractEngine::new()),
        Arc::new(FilePageSource::default()),
    );
    manager.set_temp_dir(temp.path())?;
    manager.init()?;
    Ok(())
}
