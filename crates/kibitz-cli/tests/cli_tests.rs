//! CLI integration tests for kibitz

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Config that never finds an engine, so nothing depends on what is installed.
fn offline_config(dir: &Path) -> PathBuf {
    let path = dir.join("kibitz.toml");
    fs::write(
        &path,
        "[engine]\npath = \"/nonexistent/kibitz-test-engine\"\ndiscover = false\n",
    )
    .unwrap();
    path
}

/// The mock engine is built next to the `kibitz` binary when the whole workspace is tested.
fn mock_engine() -> Option<PathBuf> {
    let path = PathBuf::from(env!("CARGO_BIN_EXE_kibitz")).with_file_name(format!(
        "kibitz-mock-engine{}",
        std::env::consts::EXE_SUFFIX
    ));
    path.exists().then_some(path)
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("analyze"))
        .stdout(contains("repl"))
        .stdout(contains("play"));
}

#[test]
fn analyze_requires_a_source() {
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("analyze");
    cmd.assert().failure();
}

#[test]
fn analyze_help_offers_the_clipboard() {
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.args(["analyze", "--help"]);
    cmd.assert().success().stdout(contains("--clipboard"));
}

#[test]
fn clipboard_is_one_source_among_the_others() {
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.args(["analyze", "--clipboard", "--fen", "8/8/8/8/8/8/8/8 w - - 0 1"]);
    cmd.assert().failure().stderr(contains("cannot be used with"));
}

#[test]
fn analyze_rejects_bad_fen() {
    let td = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--config")
        .arg(offline_config(td.path()))
        .arg("analyze")
        .arg("--fen")
        .arg("not a fen");
    cmd.assert().failure().stderr(contains("invalid FEN"));
}

#[test]
fn analyze_reports_text_without_a_board() {
    let td = tempdir().unwrap();
    let text = td.path().join("vision.txt");
    fs::write(&text, "I could not see a chess board in this image.").unwrap();

    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--config")
        .arg(offline_config(td.path()))
        .arg("analyze")
        .arg("--text")
        .arg(&text);
    cmd.assert()
        .failure()
        .stderr(contains("board resolution failed"));
}

#[test]
fn analyze_fails_without_an_engine() {
    let td = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--config")
        .arg(offline_config(td.path()))
        .arg("analyze")
        .arg("--fen")
        .arg("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
    cmd.assert()
        .failure()
        .stderr(contains("engine connection failed"));
}

#[test]
fn play_without_an_engine_still_records_moves() {
    let td = tempdir().unwrap();
    let pgn = td.path().join("game.pgn");
    let script = format!(
        "white none\ne2e4\ne7e5\nmove g1f3\nmoves\nsave {}\nquit\n",
        pgn.display()
    );

    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--config")
        .arg(offline_config(td.path()))
        .arg("play")
        .write_stdin(script);
    cmd.assert()
        .success()
        .stdout(contains("White: Pawn e2 -> e4"))
        .stdout(contains("Black: Pawn e7 -> e5"))
        .stdout(contains("1. e4 e5 2. Nf3"))
        .stdout(contains("Saved"));

    let saved = fs::read_to_string(&pgn).unwrap();
    assert!(saved.contains("[White \"Player\"]"));
    assert!(saved.contains("1. e4 e5 2. Nf3 *"));
}

#[test]
fn play_loads_a_pgn_and_reports_errors() {
    let td = tempdir().unwrap();
    let pgn = td.path().join("in.pgn");
    fs::write(
        &pgn,
        "[Event \"Casual\"]\n[Result \"*\"]\n\n1. d4 {solid} d5 2. c4 *\n",
    )
    .unwrap();
    let script = format!(
        "black none\nload {}\nmoves\ne2e5\nfen\nquit\n",
        pgn.display()
    );

    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--config")
        .arg(offline_config(td.path()))
        .arg("play")
        .write_stdin(script);
    cmd.assert()
        .success()
        .stdout(contains("(3 plies)"))
        .stdout(contains("1. d4 d5 2. c4"))
        .stdout(contains("illegal"))
        .stdout(contains(
            "rnbqkbnr/ppp1pppp/8/3p4/2PP4/8/PP2PPPP/RNBQKBNR b KQkq - 0 2",
        ));
}

#[test]
fn analyze_with_mock_engine_finds_mate() {
    let Some(engine) = mock_engine() else {
        eprintln!("kibitz-mock-engine not built; skipping");
        return;
    };
    let mut cmd = Command::cargo_bin("kibitz").unwrap();
    cmd.arg("--engine")
        .arg(&engine)
        .arg("analyze")
        .arg("--fen")
        .arg("7k/6pp/8/8/8/8/8/R6K w - - 0 1")
        .arg("--depth")
        .arg("4")
        .arg("--verbose");
    cmd.assert()
        .success()
        .stdout(contains("Best move: Rook a1 -> a8, checkmate (Ra8#)"))
        .stdout(contains("Mate in 1!"));
}
