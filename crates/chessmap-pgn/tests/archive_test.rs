use chessmap_pgn::{
    Color, GameError, GameResult, PgnSplitter, RecordSource, open_reader, parse_game, replay,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

const ARCHIVE: &str = "\
[Event \"Fool's mate\"]
[Result \"0-1\"]

1. f3 e5 2. g4 Qh4# 0-1

[Event \"Scholar's mate\"]
[Result \"1-0\"]

1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 {blunder} 4. Qxf7# 1-0

[Event \"Broken\"]
[Result \"*\"]

1. e4 e5 2. Ke3 *
";

fn collect(source: &mut impl RecordSource) -> Vec<chessmap_pgn::RawGameBlock> {
    let mut blocks = Vec::new();
    while let Some(block) = source.next_block().unwrap() {
        blocks.push(block);
    }
    blocks
}

#[test]
fn gzip_archive_splits_parses_and_replays() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("games.pgn.gz");
    let mut enc = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(ARCHIVE.as_bytes()).unwrap();
    enc.finish().unwrap();

    let mut splitter = PgnSplitter::new(open_reader(&path).unwrap());
    let blocks = collect(&mut splitter);
    assert_eq!(blocks.len(), 3);
    assert_eq!(splitter.emitted(), 3);
    assert_eq!(blocks.iter().map(|b| b.line).collect::<Vec<_>>(), vec![1, 6, 11]);

    let fools = parse_game(&blocks[0]).unwrap();
    assert_eq!(fools.result, GameResult::BlackWins);
    let pos = replay(&fools).unwrap();
    assert_eq!(chessmap_pgn::Position::turn(&pos), Color::White);

    let scholars = parse_game(&blocks[1]).unwrap();
    assert_eq!(scholars.tag("Event"), Some("Scholar's mate"));
    assert!(scholars.ends_with_mate_marker());
    let pos = replay(&scholars).unwrap();
    assert!(chessmap_pgn::Position::is_checkmate(&pos));

    let broken = parse_game(&blocks[2]).unwrap();
    match replay(&broken).unwrap_err() {
        GameError::IllegalMove { index, notation, .. } => {
            assert_eq!(index, 2);
            assert_eq!(notation, "Ke3");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn plain_archive_with_stray_text_between_games() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("games.pgn");
    fs::write(&path, format!("garbage line\n\n{ARCHIVE}")).unwrap();

    let blocks = collect(&mut PgnSplitter::new(open_reader(&path).unwrap()));
    assert_eq!(blocks.len(), 4);
    assert!(matches!(parse_game(&blocks[0]), Err(GameError::Parse { line: 1, .. })));
    assert!(parse_game(&blocks[1]).is_ok());
}
