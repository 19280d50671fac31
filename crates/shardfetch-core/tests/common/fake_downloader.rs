//! Shell script standing in for the downloader in integration tests.
//!
//! It accepts the same arguments as the real downloader and behaves according
//! to the last path segments of the URL:
//!
//! - `.../ok/<bytes>`: writes `<bytes>` bytes to the `-o` template with ext `mp4`
//! - `.../webm/<bytes>`: same with ext `webm`
//! - `.../small`: writes 100 bytes and exits 0
//! - `.../slow/<bytes>`: sleeps one second, then behaves like `ok/<bytes>`
//! - `.../sleep`: leaves a `.part` file and sleeps
//! - `.../helper`: starts a background writer (like ffmpeg under yt-dlp) that
//!   creates a fragment `.part` file after one second, then waits for it
//! - `.../unavailable`: prints an unavailable error and exits 1
//! - anything else: prints an HTTP error and exits 1
//!
//! The script is run as `sh <script> <args...>` so it never has to be executable.

use std::path::{Path, PathBuf};

const SCRIPT: &str = r#"
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) url="$1"; shift ;;
  esac
done
base=$(printf '%s' "$out" | sed 's/\.%(ext)s$//')
mode="${url#*/fake/}"
case "$mode" in
  ok/*)
    head -c "${mode#ok/}" /dev/zero > "$base.mp4" ;;
  webm/*)
    head -c "${mode#webm/}" /dev/zero > "$base.webm" ;;
  slow/*)
    sleep 1
    head -c "${mode#slow/}" /dev/zero > "$base.mp4" ;;
  helper)
    ( sleep 1; printf partial > "$base.f137.mp4.part"; sleep 30 ) &
    wait ;;
  small)
    head -c 100 /dev/zero > "$base.mp4" ;;
  sleep)
    printf 'partial' > "$base.mp4.part"
    exec sleep 30 ;;
  unavailable)
    echo "ERROR: [youtube] abc: Video unavailable. This video has been removed" >&2
    exit 1 ;;
  *)
    echo "WARNING: retrying" >&2
    echo "ERROR: unable to download video data: HTTP Error 403: Forbidden" >&2
    exit 1 ;;
esac
"#;

/// Write the script into `dir` and return its path.
pub fn install(dir: &Path) -> PathBuf {
    let path = dir.join("fake-downloader.sh");
    std::fs::write(&path, SCRIPT).unwrap();
    path
}

pub fn url(mode: &str) -> String {
    format!("https://example.com/fake/{mode}")
}
