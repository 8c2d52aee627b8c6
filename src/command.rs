//! Invocation construction for the external downloader binary
//!
//! [`CommandBuilder`] maps a [`DownloadRequest`] plus a target folder to a
//! fully-resolved [`Invocation`] (program path + ordered argument list).
//! Building never fails: malformed quality values already fell back to
//! [`Quality::Highest`] during parsing, and every other input is passed
//! through verbatim.

use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::types::{DownloadRequest, MediaMode, Quality};

/// Browser cookie-extraction priority order
///
/// When no cookie file is configured (or the configured one does not exist),
/// the builder asks the downloader to extract cookies from the first browser
/// in this list. Only the first entry is ever used; the rest document the
/// intended order should multi-browser fallback be added.
pub const BROWSER_PRIORITY: [&str; 5] = ["chrome", "firefox", "edge", "opera", "brave"];

/// Output filename template relative to the target folder
///
/// The playlist-index prefix keeps concurrently-ordered playlist outputs from
/// colliding and preserves their on-disk order.
const OUTPUT_TEMPLATE: &str = "%(playlist_index)s_%(title)s.%(ext)s";

/// Fully-resolved external-process command
///
/// Produced once per task start and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Path of the executable to launch
    pub program: PathBuf,
    /// Ordered argument list
    pub args: Vec<String>,
}

impl Invocation {
    /// Single-line rendering for logs and diagnostics
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Maps download requests to downloader invocations
///
/// Tool paths are resolved once at construction; [`build`](Self::build) then
/// only assembles strings, apart from a read-only existence probe of the
/// configured cookie file (so a cookie jar dropped in while the application
/// runs is picked up by the next download).
#[derive(Clone, Debug)]
pub struct CommandBuilder {
    ytdlp: PathBuf,
    ffmpeg: PathBuf,
    cookie_file: Option<PathBuf>,
}

impl CommandBuilder {
    /// Builder with explicit tool paths (no discovery)
    pub fn new(ytdlp: PathBuf, ffmpeg: PathBuf, cookie_file: Option<PathBuf>) -> Self {
        Self {
            ytdlp,
            ffmpeg,
            cookie_file,
        }
    }

    /// Builder with tool paths resolved from configuration
    ///
    /// Resolution order per tool: explicit configured path, then a binary
    /// sitting alongside the running executable, then PATH search (if
    /// enabled), then the bare program name. A bare name that resolves to
    /// nothing at launch time surfaces as a LaunchError on the task that
    /// tried it, not here.
    pub fn from_tools(tools: &ToolsConfig) -> Self {
        Self {
            ytdlp: resolve_tool("yt-dlp", tools.ytdlp_path.as_deref(), tools.search_path),
            ffmpeg: resolve_tool("ffmpeg", tools.ffmpeg_path.as_deref(), tools.search_path),
            cookie_file: tools.cookie_file.clone(),
        }
    }

    /// Path the builder will use for the downloader binary
    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp
    }

    /// Path the builder will pass as the muxer location
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    /// Build the invocation for one request into `target_folder`
    ///
    /// Audio requests select the best audio-only stream and extract it into
    /// the requested codec; video requests select a combined stream capped at
    /// the quality tier's height ceiling (none for Highest) and mux into the
    /// requested container. Every invocation carries the same robustness
    /// flags and exactly one cookie flag pair.
    pub fn build(&self, request: &DownloadRequest, target_folder: &Path) -> Invocation {
        let output_template = target_folder.join(OUTPUT_TEMPLATE);
        let mut args: Vec<String> = Vec::with_capacity(16);

        args.push("-f".to_string());
        args.push(format_selector(request.mode, request.quality));

        match request.mode {
            MediaMode::Audio => {
                args.push("--extract-audio".to_string());
                args.push("--audio-format".to_string());
                args.push(request.container.clone());
            }
            MediaMode::Video => {
                args.push("--merge-output-format".to_string());
                args.push(request.container.clone());
            }
        }

        args.push("-o".to_string());
        args.push(output_template.to_string_lossy().into_owned());

        // Robustness flags, identical on every invocation
        args.push("--ffmpeg-location".to_string());
        args.push(self.ffmpeg.to_string_lossy().into_owned());
        args.push("--no-check-certificate".to_string());
        args.push("--ignore-errors".to_string());
        args.push("--geo-bypass".to_string());

        match &self.cookie_file {
            Some(cookie_file) if cookie_file.exists() => {
                args.push("--cookies".to_string());
                args.push(cookie_file.to_string_lossy().into_owned());
            }
            _ => {
                args.push("--cookies-from-browser".to_string());
                args.push(BROWSER_PRIORITY[0].to_string());
            }
        }

        args.push(request.url.clone());

        Invocation {
            program: self.ytdlp.clone(),
            args,
        }
    }
}

/// Stream format selector for the given mode and quality tier
fn format_selector(mode: MediaMode, quality: Quality) -> String {
    match mode {
        MediaMode::Audio => "bestaudio/best".to_string(),
        MediaMode::Video => match quality.height_ceiling() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            None => "bestvideo+bestaudio/best".to_string(),
        },
    }
}

/// Resolve one external tool's path
fn resolve_tool(name: &str, explicit: Option<&Path>, search_path: bool) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    // A binary shipped alongside the running executable wins over PATH
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let bundled = dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));
        if bundled.exists() {
            return bundled;
        }
    }

    if search_path
        && let Ok(found) = which::which(name)
    {
        return found;
    }

    // Last resort: bare name, resolved (or not) by the OS at spawn time
    PathBuf::from(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(PathBuf::from("yt-dlp"), PathBuf::from("ffmpeg"), None)
    }

    fn all_requests() -> Vec<DownloadRequest> {
        let mut requests = vec![
            DownloadRequest::audio("https://example.com/a", "mp3"),
            DownloadRequest::audio("https://example.com/b", "wav"),
        ];
        for quality in Quality::ALL {
            requests.push(DownloadRequest::video(
                "https://example.com/v",
                "mp4",
                quality,
            ));
        }
        requests
    }

    fn height_ceiling_args(invocation: &Invocation) -> usize {
        invocation
            .args
            .iter()
            .filter(|a| a.contains("height<="))
            .count()
    }

    #[test]
    fn test_audio_request_extracts_audio_without_height_ceiling() {
        let invocation = builder().build(
            &DownloadRequest::audio("https://example.com/song", "mp3"),
            Path::new("/tmp/dl"),
        );

        let args = &invocation.args;
        assert!(args.contains(&"--extract-audio".to_string()));
        let pos = args.iter().position(|a| a == "--audio-format").unwrap();
        assert_eq!(args[pos + 1], "mp3");
        assert_eq!(
            height_ceiling_args(&invocation),
            0,
            "audio requests must carry no height ceiling"
        );
        assert!(
            !args.contains(&"--merge-output-format".to_string()),
            "audio requests must not request muxing"
        );
    }

    #[test]
    fn test_video_720p_caps_both_streams_and_muxes() {
        let invocation = builder().build(
            &DownloadRequest::video("https://example.com/clip", "mp4", Quality::P720),
            Path::new("/tmp/dl"),
        );

        let args = &invocation.args;
        let fmt_pos = args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(
            args[fmt_pos + 1],
            "bestvideo[height<=720]+bestaudio/best[height<=720]",
            "ceiling must apply to both the video and the combined fallback stream"
        );
        let merge_pos = args.iter().position(|a| a == "--merge-output-format").unwrap();
        assert_eq!(args[merge_pos + 1], "mp4");
    }

    #[test]
    fn test_height_ceiling_appears_exactly_once_per_capped_video_request() {
        let b = builder();
        for request in all_requests() {
            let invocation = b.build(&request, Path::new("/tmp/dl"));
            let expected =
                if request.mode == MediaMode::Video && request.quality != Quality::Highest {
                    1
                } else {
                    0
                };
            assert_eq!(
                height_ceiling_args(&invocation),
                expected,
                "unexpected ceiling count for {:?}/{:?}",
                request.mode,
                request.quality
            );
        }
    }

    #[test]
    fn test_highest_quality_has_no_ceiling() {
        let invocation = builder().build(
            &DownloadRequest::video("https://example.com/v", "mkv", Quality::Highest),
            Path::new("/tmp/dl"),
        );
        let fmt_pos = invocation.args.iter().position(|a| a == "-f").unwrap();
        assert_eq!(invocation.args[fmt_pos + 1], "bestvideo+bestaudio/best");
    }

    #[test]
    fn test_browser_fallback_when_no_cookie_file() {
        let b = builder();
        for request in all_requests() {
            let invocation = b.build(&request, Path::new("/tmp/dl"));
            let args = &invocation.args;
            let pos = args
                .iter()
                .position(|a| a == "--cookies-from-browser")
                .unwrap();
            assert_eq!(
                args[pos + 1], BROWSER_PRIORITY[0],
                "fallback must use the first browser in the priority list"
            );
            assert!(
                !args.contains(&"--cookies".to_string()),
                "browser fallback and explicit cookie file are mutually exclusive"
            );
        }
    }

    #[test]
    fn test_existing_cookie_file_is_passed_explicitly() {
        let dir = tempfile::tempdir().unwrap();
        let cookie_path = dir.path().join("cookies.txt");
        std::fs::write(&cookie_path, "# Netscape HTTP Cookie File\n").unwrap();

        let b = CommandBuilder::new(
            PathBuf::from("yt-dlp"),
            PathBuf::from("ffmpeg"),
            Some(cookie_path.clone()),
        );
        let invocation = b.build(
            &DownloadRequest::audio("https://example.com/a", "mp3"),
            Path::new("/tmp/dl"),
        );

        let args = &invocation.args;
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], cookie_path.to_string_lossy());
        assert!(!args.contains(&"--cookies-from-browser".to_string()));
    }

    #[test]
    fn test_missing_cookie_file_falls_back_to_browser() {
        let b = CommandBuilder::new(
            PathBuf::from("yt-dlp"),
            PathBuf::from("ffmpeg"),
            Some(PathBuf::from("/nonexistent/cookies.txt")),
        );
        let invocation = b.build(
            &DownloadRequest::audio("https://example.com/a", "mp3"),
            Path::new("/tmp/dl"),
        );
        assert!(
            invocation
                .args
                .contains(&"--cookies-from-browser".to_string())
        );
    }

    #[test]
    fn test_robustness_flags_on_every_invocation() {
        let b = builder();
        for request in all_requests() {
            let invocation = b.build(&request, Path::new("/tmp/dl"));
            let args = &invocation.args;
            for flag in ["--no-check-certificate", "--ignore-errors", "--geo-bypass"] {
                assert!(
                    args.contains(&flag.to_string()),
                    "missing {} for {:?}",
                    flag,
                    request
                );
            }
            let pos = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
            assert_eq!(args[pos + 1], "ffmpeg");
        }
    }

    #[test]
    fn test_output_template_namespaces_into_target_folder() {
        let invocation = builder().build(
            &DownloadRequest::video("https://example.com/v", "mp4", Quality::Highest),
            Path::new("/data/videos"),
        );
        let args = &invocation.args;
        let pos = args.iter().position(|a| a == "-o").unwrap();
        let template = &args[pos + 1];
        assert!(template.starts_with("/data/videos"));
        assert!(
            template.ends_with("%(playlist_index)s_%(title)s.%(ext)s"),
            "template must carry the playlist position token: {}",
            template
        );
    }

    #[test]
    fn test_url_is_final_argument() {
        let b = builder();
        for request in all_requests() {
            let invocation = b.build(&request, Path::new("/tmp/dl"));
            assert_eq!(invocation.args.last().unwrap(), &request.url);
        }
    }

    #[test]
    fn test_quality_label_fallback_never_fails() {
        let parsed: Quality = "4320p-ultra".parse().unwrap();
        assert_eq!(parsed, Quality::Highest);
        let parsed: Quality = "720p".parse().unwrap();
        assert_eq!(parsed, Quality::P720);
    }
}
