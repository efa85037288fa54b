//! Integration test: session states, the file browser, and messages
//!
//! Exercises the state machine through the frontend's entry points the way a
//! host would: menu clicks, browser picks, engine failures, and archive
//! import/export.

use rewired_core::backend::MemoryBackend;
use rewired_core::catalog::BuiltinCatalog;
use rewired_core::config::FrontendConfig;
use rewired_core::engine::{Speed, SpeedControl};
use rewired_core::record::FileKind;
use rewired_core::store::RecordStore;
use rewired_core::test_utils::*;
use rewired_core::timer::Millis;
use rewired_session::frontend::{Frontend, Input, Key, LOAD_FAILED};
use rewired_session::session::{MessageOutcome, Session, SessionState, SessionTimings};

type TestFrontend = Frontend<FakeEngine, MemoryLocation>;

fn frontend_with(catalog: BuiltinCatalog, backend: &MemoryBackend) -> TestFrontend {
    let store = RecordStore::new(catalog, fixed_clock());
    let mut f = Frontend::new(
        FakeEngine::new(),
        store,
        MemoryLocation::new(),
        FrontendConfig::default(),
    );
    f.start(backend, Millis(0));
    f.engine_ready(Millis(0));
    f
}

fn to_menu(f: &mut TestFrontend) {
    f.input(Input::Key(Key::Space), Millis(0));
    f.advance(Millis(300));
    assert_eq!(f.state(), SessionState::MenuActive);
}

#[test]
fn empty_game_listing_skips_the_browser() {
    let mut f = frontend_with(BuiltinCatalog::new(), &MemoryBackend::new());
    to_menu(&mut f);

    f.menu_click(0, Millis(400));
    assert_ne!(f.state(), SessionState::ModalFileBrowser);
    assert_eq!(f.state(), SessionState::ExecLaunching);
    assert_eq!(f.engine().last_exec(), Some(("game.exe", "")));
    assert!(!f.browser().is_open());

    f.process_started(Millis(500));
    assert!(!f.open_chip_browser(0, Millis(600)), "no chips stored");
    assert_eq!(f.state(), SessionState::Exec);
}

#[test]
fn browser_pick_loads_the_lab() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);

    f.menu_click(1, Millis(400));
    assert_eq!(f.state(), SessionState::ModalFileBrowser);
    let names: Vec<&str> = f.browser().entries().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["Tutorial Lab.lsv"]);

    assert!(f.browser_select(0, Millis(500)));
    assert_eq!(f.state(), SessionState::Exec);
    assert!(!f.browser().is_open());
    assert!(f.engine().calls.contains(&EngineCall::SetSaveBuffer {
        bytes: lab_save(),
        compressed: false
    }));
}

#[test]
fn browser_start_new_launches_the_choice_program() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.menu_click(1, Millis(400));

    f.browser_start_new(Millis(500));
    assert_eq!(f.state(), SessionState::ExecLaunching);
    assert_eq!(f.engine().last_exec(), Some(("lab.exe", "")));
}

#[test]
fn rejected_pick_shows_notice_and_returns_to_the_browser() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.menu_click(1, Millis(400));
    f.engine_mut().accept_load = false;

    assert!(!f.browser_select(0, Millis(500)));
    assert_eq!(f.state(), SessionState::ModalMessage);
    assert_eq!(f.session().message(), Some("FAILED to load Tutorial Lab.lsv"));

    f.dismiss_message(Millis(600));
    assert_eq!(f.state(), SessionState::ModalFileBrowser);
    assert!(f.browser().is_open());
}

#[test]
fn modal_states_pause_and_restore_speed() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.menu_click(1, Millis(400));
    f.browser_select(0, Millis(500));
    f.engine_mut().set_speed(Speed(2.0));

    assert!(f.open_chip_browser(3, Millis(600)));
    assert_eq!(f.state(), SessionState::ModalFileBrowser);
    assert!(f.engine().speed().is_paused());
    assert_eq!(f.browser().modes(), &[FileKind::Chip]);

    f.browser_select(0, Millis(700));
    assert_eq!(f.state(), SessionState::Exec);
    assert_eq!(f.engine().speed(), Speed(2.0));
    assert!(f.engine().calls.contains(&EngineCall::LoadChip(3)));
}

#[test]
fn cancelled_chip_browser_returns_to_the_lab() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.menu_click(1, Millis(400));
    f.browser_select(0, Millis(500));

    f.open_chip_browser(0, Millis(600));
    f.browser_cancel(Millis(700));
    assert_eq!(f.state(), SessionState::Exec);
    assert_eq!(f.engine().speed(), Speed::NORMAL);
}

#[test]
fn error_halt_is_terminal() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.engine_failed("out of memory");

    f.menu_click(0, Millis(400));
    f.input(Input::Key(Key::Enter), Millis(500));
    f.load_save_file(&world_save(0), false, Millis(600));
    f.location_changed(Millis(700));
    f.process_exited(Millis(800));
    assert!(!f.dismiss_message(Millis(900)));
    f.advance(Millis(60_000));

    assert_eq!(f.state(), SessionState::ErrorHalt);
    assert_eq!(f.session().message(), Some("Fail.\n\nout of memory"));
}

#[test]
fn newer_message_supersedes_older() {
    let mut engine = FakeEngine::new();
    let mut session = Session::new(SessionTimings::default(), 3);
    session.splash_input(&mut engine, Millis(0));

    let first = session.show_message("first", &mut engine, Millis(10));
    let second = session.show_message("second", &mut engine, Millis(20));
    assert_eq!(first.outcome(), Some(MessageOutcome::Superseded));
    assert!(!second.is_resolved());
    assert_eq!(session.message(), Some("second"));

    assert!(session.dismiss(&mut engine, Millis(30)));
    assert_eq!(second.outcome(), Some(MessageOutcome::Dismissed));
    assert_eq!(session.state(), SessionState::MenuTransition);
}

#[test]
fn picked_save_file_that_fails_shows_notice() {
    let mut f = frontend_with(builtin_catalog(), &MemoryBackend::new());
    to_menu(&mut f);
    f.engine_mut().accept_load = false;

    f.load_save_file(&world_save(0), false, Millis(400));
    assert_eq!(f.session().message(), Some(LOAD_FAILED));

    let oversized = vec![0u8; f.config().max_file_size + 1];
    f.dismiss_message(Millis(500));
    let loads = f.engine().count(|c| matches!(c, EngineCall::SetSaveBuffer { .. }));
    f.load_save_file(&oversized, false, Millis(600));
    assert_eq!(
        f.engine().count(|c| matches!(c, EngineCall::SetSaveBuffer { .. })),
        loads
    );
}

#[test]
fn degraded_store_still_serves_the_session() {
    let store = RecordStore::new(builtin_catalog(), fixed_clock());
    let mut f = Frontend::new(
        FakeEngine::new(),
        store,
        MemoryLocation::new(),
        FrontendConfig::default(),
    );
    f.start(&FailingOpener, Millis(0));
    f.engine_ready(Millis(0));
    assert!(!f.store().is_persistent());

    let saved = f.save_written(&lab_save());
    assert_eq!(saved.name, "Saved Lab (2026-10-18 14.03.04).lsv");
    assert_eq!(saved.bytes, lab_save());
    assert!(!saved.stored, "nothing durable without storage");
    assert_eq!(f.store().list_files().len(), 2, "built-ins only");

    to_menu(&mut f);
    f.menu_click(1, Millis(400));
    assert_eq!(f.state(), SessionState::ModalFileBrowser);
}

#[test]
fn archive_moves_files_between_stores() {
    let mut source = frontend_with(BuiltinCatalog::new(), &MemoryBackend::new());
    source.save_written(&world_save(0));
    source.save_written(&lab_save());
    let exported = source.export_archive().unwrap();

    let mut target = frontend_with(BuiltinCatalog::new(), &MemoryBackend::new());
    let imported = target.import_archive(&exported.bytes, Millis(10)).unwrap();
    assert_eq!(imported.len(), 2);
    assert_eq!(target.session().message(), Some("2 files stored"));

    let mut names: Vec<String> = target.store().list_files().map(|e| e.meta.name).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Robotropolis, World 1 (2026-10-18 14.03.04).gsv".to_string(),
            "Saved Lab (2026-10-18 14.03.04).lsv".to_string(),
        ]
    );

    assert!(target.import_archive(b"not a zip", Millis(20)).is_err());
    assert!(target.session().message().unwrap().starts_with("FAILED to import archive"));
}
