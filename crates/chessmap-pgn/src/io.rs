//! アーカイブ入力のオープン
//!
//! 圧縮の有無は拡張子ではなく先頭のマジックバイトで判定する。
//! 連結された gzip メンバ（`cat a.gz b.gz`）も続けて読む。

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::bufread::MultiGzDecoder;

const READER_BUF_CAP: usize = 128 * 1024; // 128 KiB
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub type ArchiveReader = Box<dyn BufRead + Send>;

/// `-` は標準入力。gzip なら透過的に展開する
pub fn open_reader<P: AsRef<Path>>(path: P) -> io::Result<ArchiveReader> {
    let p = path.as_ref();
    let raw: Box<dyn Read + Send> =
        if p.as_os_str() == "-" { Box::new(io::stdin()) } else { Box::new(File::open(p)?) };
    sniff(BufReader::with_capacity(READER_BUF_CAP, raw))
}

fn sniff<R: BufRead + Send + 'static>(mut input: R) -> io::Result<ArchiveReader> {
    if input.fill_buf()?.starts_with(&GZIP_MAGIC) {
        log::debug!("gzip archive detected");
        let dec = MultiGzDecoder::new(input);
        return Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, dec)));
    }
    Ok(Box::new(input))
}
