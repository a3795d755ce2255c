//! 所見ストリームの出力先（標準出力・ファイル・gzip）

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

const SINK_BUF_CAP: usize = 64 * 1024; // 64 KiB

/// 出力先。gzip は `finish` しないと末尾が書かれないので、最後に必ず呼ぶ
#[must_use = "call .finish() to surface compression/flush errors"]
pub enum FindingSink {
    Stdout(BufWriter<Stdout>),
    File(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FindingSink {
    /// `-` は標準出力、拡張子 `.gz` は gzip 圧縮
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let p = path.as_ref();
        if p.as_os_str() == "-" {
            return Ok(Self::Stdout(BufWriter::with_capacity(SINK_BUF_CAP, io::stdout())));
        }
        let file = BufWriter::with_capacity(SINK_BUF_CAP, File::create(p)?);
        let gz = p.extension().is_some_and(|e| e.eq_ignore_ascii_case("gz"));
        Ok(if gz {
            Self::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            Self::File(file)
        })
    }

    /// ログ用の種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdout(_) => "stdout",
            Self::File(_) => "file",
            Self::Gzip(_) => "gzip",
        }
    }

    fn inner(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
            Self::Gzip(w) => w,
        }
    }

    /// gzip のトレーラを書き、バッファを吐き出す
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Stdout(mut w) => w.flush(),
            Self::File(mut w) => w.flush(),
            Self::Gzip(enc) => enc.finish()?.flush(),
        }
    }
}

impl Write for FindingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn gzip_sink_is_readable_after_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.txt.GZ");
        let mut sink = FindingSink::create(&path).unwrap();
        assert_eq!(sink.kind(), "gzip");
        sink.write_all(b"cKe1\ncQh4\ngame\n").unwrap();
        sink.finish().unwrap();

        let mut dec = flate2::read::GzDecoder::new(File::open(&path).unwrap());
        let mut s = String::new();
        dec.read_to_string(&mut s).unwrap();
        assert_eq!(s, "cKe1\ncQh4\ngame\n");
    }

    #[test]
    fn plain_sink_flushes_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.txt");
        let mut sink = FindingSink::create(&path).unwrap();
        assert_eq!(sink.kind(), "file");
        sink.write_all(b"game\n").unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "game\n");
    }

    #[test]
    fn dash_selects_stdout() {
        assert_eq!(FindingSink::create("-").unwrap().kind(), "stdout");
    }
}
