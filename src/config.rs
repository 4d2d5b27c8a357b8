//! Configuration management.
//!
//! Priority chain: CLI flags > `CASTD_*` environment variables > config
//! files (`.castd.toml` in the working directory, then `config.toml` in the
//! user config directory) > built-in defaults.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const DEFAULT_HTTP_LISTEN: &str = "0.0.0.0:8080";

/// Configuration structure matching the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    http: HttpConfig,
    #[serde(default)]
    srt: SrtConfig,
    #[serde(default)]
    source: SourceConfig,
    #[serde(default)]
    encode: EncodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HttpConfig {
    listen: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SrtConfig {
    // See the srt-live-transmit documentation for the URI syntax.
    combined: String,
    present: String,
    camera: String,
}

impl Default for SrtConfig {
    fn default() -> Self {
        Self {
            combined: "srt://[::]:7000?mode=listener".to_string(),
            present: "srt://[::]:7001?mode=listener".to_string(),
            camera: "srt://[::]:7002?mode=listener".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SourceConfig {
    /// Engine element kind for the presentation video source.
    present: String,
    /// Extra element properties for the presentation source, verbatim.
    present_opts: String,
    camera: String,
    camera_opts: String,
    audio: String,
    audio_opts: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            present: "videotestsrc".to_string(),
            present_opts: String::new(),
            camera: "videotestsrc".to_string(),
            camera_opts: String::new(),
            audio: "audiotestsrc".to_string(),
            audio_opts: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncodeConfig {
    /// Offload scaling, compositing and H.264 encoding to the GPU.
    hw_accel: bool,
    video_bitrate_kbps: u32,
    audio_bitrate_kbps: u32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            hw_accel: false,
            video_bitrate_kbps: 4000,
            audio_bitrate_kbps: 128,
        }
    }
}

/// CLI-provided overrides, highest priority in the chain.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen_http: Option<SocketAddr>,
    pub listen_srt_combined: Option<String>,
    pub listen_srt_present: Option<String>,
    pub listen_srt_camera: Option<String>,
    pub source_present: Option<String>,
    pub source_present_opts: Option<String>,
    pub source_camera: Option<String>,
    pub source_camera_opts: Option<String>,
    pub source_audio: Option<String>,
    pub source_audio_opts: Option<String>,
    pub hw_accel: Option<bool>,
    pub video_bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: Option<u32>,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Address at which to listen for HTTP requests.
    pub listen_http: SocketAddr,

    /// SRT listen URI for the combined (composited) stream.
    pub listen_srt_combined: String,
    /// SRT listen URI for the presentation stream.
    pub listen_srt_present: String,
    /// SRT listen URI for the camera stream.
    pub listen_srt_camera: String,

    /// Engine element kind for the presentation source, plus verbatim
    /// properties.
    pub source_present: String,
    pub source_present_opts: String,
    pub source_camera: String,
    pub source_camera_opts: String,
    pub source_audio: String,
    pub source_audio_opts: String,

    /// Enable hardware acceleration in the filter graph.
    pub hw_accel: bool,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl DaemonConfig {
    /// Load configuration with the full priority chain.
    pub fn load(overrides: Overrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir().ok().map(|d| d.join(".castd.toml"));
        let user_config = directories::ProjectDirs::from("", "", "castd")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        if let Some(ref path) = user_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }
        if let Some(ref path) = local_config {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // CASTD_HTTP__LISTEN, CASTD_SOURCE__PRESENT_OPTS, ...
        figment = figment.merge(Env::prefixed("CASTD_").split("__"));

        let mut file: ConfigFile = figment.extract()?;

        let o = overrides;
        if let Some(v) = o.listen_http {
            file.http.listen = v;
        }
        if let Some(v) = o.listen_srt_combined {
            file.srt.combined = v;
        }
        if let Some(v) = o.listen_srt_present {
            file.srt.present = v;
        }
        if let Some(v) = o.listen_srt_camera {
            file.srt.camera = v;
        }
        if let Some(v) = o.source_present {
            file.source.present = v;
        }
        if let Some(v) = o.source_present_opts {
            file.source.present_opts = v;
        }
        if let Some(v) = o.source_camera {
            file.source.camera = v;
        }
        if let Some(v) = o.source_camera_opts {
            file.source.camera_opts = v;
        }
        if let Some(v) = o.source_audio {
            file.source.audio = v;
        }
        if let Some(v) = o.source_audio_opts {
            file.source.audio_opts = v;
        }
        if let Some(v) = o.hw_accel {
            file.encode.hw_accel = v;
        }
        if let Some(v) = o.video_bitrate_kbps {
            file.encode.video_bitrate_kbps = v;
        }
        if let Some(v) = o.audio_bitrate_kbps {
            file.encode.audio_bitrate_kbps = v;
        }

        Ok(Self {
            listen_http: file.http.listen,
            listen_srt_combined: file.srt.combined,
            listen_srt_present: file.srt.present,
            listen_srt_camera: file.srt.camera,
            source_present: file.source.present,
            source_present_opts: file.source.present_opts,
            source_camera: file.source.camera,
            source_camera_opts: file.source.camera_opts,
            source_audio: file.source.audio,
            source_audio_opts: file.source.audio_opts,
            hw_accel: file.encode.hw_accel,
            video_bitrate_kbps: file.encode.video_bitrate_kbps,
            audio_bitrate_kbps: file.encode.audio_bitrate_kbps,
        })
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            listen_http: file.http.listen,
            listen_srt_combined: file.srt.combined,
            listen_srt_present: file.srt.present,
            listen_srt_camera: file.srt.camera,
            source_present: file.source.present,
            source_present_opts: file.source.present_opts,
            source_camera: file.source.camera,
            source_camera_opts: file.source.camera_opts,
            source_audio: file.source.audio,
            source_audio_opts: file.source.audio_opts,
            hw_accel: file.encode.hw_accel,
            video_bitrate_kbps: file.encode.video_bitrate_kbps,
            audio_bitrate_kbps: file.encode.audio_bitrate_kbps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn defaults_without_any_input() {
        std::env::remove_var("CASTD_HTTP__LISTEN");
        std::env::remove_var("CASTD_ENCODE__HW_ACCEL");

        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let config = DaemonConfig::load(Overrides::default()).unwrap();

        let _ = std::env::set_current_dir(original_dir);

        assert_eq!(config.listen_http, DEFAULT_HTTP_LISTEN.parse().unwrap());
        assert_eq!(config.source_present, "videotestsrc");
        assert_eq!(config.listen_srt_combined, "srt://[::]:7000?mode=listener");
        assert!(!config.hw_accel);
        assert_eq!(config.video_bitrate_kbps, 4000);
    }

    #[test]
    #[serial]
    fn config_file_is_picked_up() {
        std::env::remove_var("CASTD_HTTP__LISTEN");

        let temp_dir = TempDir::new().unwrap();
        let config_content = r#"
[http]
listen = "127.0.0.1:9090"

[encode]
hw_accel = true
video_bitrate_kbps = 6000
audio_bitrate_kbps = 128
"#;
        fs::write(temp_dir.path().join(".castd.toml"), config_content).unwrap();

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let config = DaemonConfig::load(Overrides::default()).unwrap();

        let _ = std::env::set_current_dir(original_dir);

        assert_eq!(config.listen_http, "127.0.0.1:9090".parse().unwrap());
        assert!(config.hw_accel);
        assert_eq!(config.video_bitrate_kbps, 6000);
    }

    #[test]
    #[serial]
    fn cli_overrides_win() {
        std::env::set_var("CASTD_SRT__COMBINED", "srt://[::]:9000?mode=listener");

        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let config = DaemonConfig::load(Overrides {
            listen_srt_combined: Some("srt://[::]:9999?mode=listener".to_string()),
            source_camera: Some("v4l2src".to_string()),
            source_camera_opts: Some("device=/dev/video2".to_string()),
            ..Overrides::default()
        })
        .unwrap();

        let _ = std::env::set_current_dir(original_dir);
        std::env::remove_var("CASTD_SRT__COMBINED");

        assert_eq!(config.listen_srt_combined, "srt://[::]:9999?mode=listener");
        assert_eq!(config.source_camera, "v4l2src");
        assert_eq!(config.source_camera_opts, "device=/dev/video2");
    }

    #[test]
    #[serial]
    fn env_overrides_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".castd.toml"),
            "[srt]\npresent = \"srt://[::]:7101?mode=listener\"",
        )
        .unwrap();

        std::env::set_var("CASTD_SRT__PRESENT", "srt://[::]:7201?mode=listener");

        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let config = DaemonConfig::load(Overrides::default()).unwrap();

        let _ = std::env::set_current_dir(original_dir);
        std::env::remove_var("CASTD_SRT__PRESENT");

        assert_eq!(config.listen_srt_present, "srt://[::]:7201?mode=listener");
    }
}
