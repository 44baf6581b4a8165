use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A file the upload step cannot do without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Credentials(PathBuf),
    Video(PathBuf),
}

impl Missing {
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Credentials(path) => write!(f, "Missing {}.", path.display()),
            Missing::Video(path) => write!(f, "Missing video file {}.", path.display()),
        }
    }
}

/// Prints the diagnostic line to `out` and returns the process exit code.
pub fn report(missing: &Missing, out: &mut impl Write) -> io::Result<i32> {
    writeln!(out, "{missing}")?;
    out.flush()?;
    Ok(missing.exit_code())
}

/// Credentials are checked before the video.
pub fn check(credentials: &Path, video: &Path) -> Result<(), Missing> {
    if !credentials.exists() {
        return Err(Missing::Credentials(credentials.to_owned()));
    }
    if !video.exists() {
        return Err(Missing::Video(video.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_reported_first() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        let video = dir.path().join("video.mp4");

        let missing = check(&credentials, &video).unwrap_err();

        assert_eq!(missing, Missing::Credentials(credentials));
        assert_eq!(missing.exit_code(), 1);
    }

    #[test]
    fn default_credentials_message() {
        let missing = Missing::Credentials(PathBuf::from("credentials.json"));
        assert_eq!(missing.to_string(), "Missing credentials.json.");
    }

    #[test]
    fn missing_video_exits_with_one() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        std::fs::write(&credentials, "{}").unwrap();
        let video = dir.path().join("best_message_leaks_video.mp4");

        let missing = check(&credentials, &video).unwrap_err();

        assert_eq!(missing.exit_code(), 1);
        assert_eq!(
            missing.to_string(),
            format!("Missing video file {}.", video.display())
        );
    }

    #[test]
    fn report_prints_line_and_exits_with_one() {
        let mut out = Vec::new();
        let code = report(&Missing::Credentials(PathBuf::from("credentials.json")), &mut out).unwrap();
        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Missing credentials.json.\n");

        let mut out = Vec::new();
        let code = report(&Missing::Video(PathBuf::from("./video/out.mp4")), &mut out).unwrap();
        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Missing video file ./video/out.mp4.\n");
    }

    #[test]
    fn passes_when_both_exist() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        let video = dir.path().join("video.mp4");
        std::fs::write(&credentials, "{}").unwrap();
        std::fs::write(&video, b"").unwrap();

        assert_eq!(check(&credentials, &video), Ok(()));
    }
}
