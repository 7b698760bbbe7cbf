use std::path::PathBuf;

use clap::Parser;

use crate::device::{DeviceSpec, DeviceType};
use crate::error::{NspdError, Result};
use crate::session::SessionConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nspd",
    version,
    about = "Interactive spectrum and time-series viewer for a correlator spectrum server.",
    after_help = "Type `help` at the NSPD> prompt for the list of commands.
Without -s, -f loads a single stand-alone cycle file and no server is used."
)]
pub struct Args {
    /// Screen device, as <file>/<type> (png, svg or ps) or /null.
    #[arg(short = 'd', long, default_value = "nspd_screen.png/png", value_name = "DEVICE")]
    pub device: String,

    /// File type for dumps whose name has no recognised extension.
    #[arg(short = 'D', long, value_enum, default_value_t = DeviceType::Png, value_name = "TYPE")]
    pub dump_type: DeviceType,

    /// Show a stand-alone cycle file instead of connecting to a server.
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "server")]
    pub file: Option<PathBuf>,

    /// Spectrum server port.
    #[arg(short = 'p', long, env = "NSPD_PORT", default_value_t = 8880)]
    pub port: u16,

    /// Spectrum server host.
    #[arg(short = 's', long, env = "NSPD_SERVER", value_name = "HOST")]
    pub server: Option<String>,

    /// Name the server knows this client by. Defaults to $USER.
    #[arg(short = 'u', long, env = "NSPD_USER", value_name = "NAME")]
    pub user: Option<String>,

    /// More log output on stderr; repeat for more detail.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Start with the time-series pages.
    #[arg(long)]
    pub vis: bool,

    /// Minutes of history on the time-series pages.
    #[arg(long, default_value_t = 20.0, value_name = "MINUTES")]
    pub history: f32,
}

impl Args {
    pub fn into_config(self) -> Result<SessionConfig> {
        if self.server.is_none() && self.file.is_none() {
            return Err(NspdError::parse(
                "either a server (-s) or a cycle file (-f) is required",
            ));
        }
        if !self.history.is_finite() || self.history <= 0.0 {
            return Err(NspdError::out_of_range("--history must be a positive number of minutes"));
        }
        let device = DeviceSpec::parse(&self.device)?;
        let username = self
            .user
            .or_else(|| std::env::var("USER").ok())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "nspd".to_string());
        Ok(SessionConfig {
            device,
            dump_type: self.dump_type,
            file: self.file,
            server: self.server,
            port: self.port,
            username,
            start_in_vis: self.vis,
            history_length: self.history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("nspd").chain(argv.iter().copied()))
    }

    #[test]
    fn server_session_defaults() {
        let config = parse(&["-s", "localhost", "-u", "obs"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.server.as_deref(), Some("localhost"));
        assert_eq!(config.username, "obs");
        assert_eq!(config.dump_type, DeviceType::Png);
        assert_eq!(
            config.device,
            DeviceSpec::File {
                path: PathBuf::from("nspd_screen.png"),
                kind: DeviceType::Png
            }
        );
        assert!(!config.start_in_vis);
        assert_eq!(config.history_length, 20.0);
    }

    #[test]
    fn flags_map_onto_the_config() {
        let args = parse(&[
            "-f", "cycle.nspd", "-d", "/null", "-D", "ps", "-vv", "--vis", "--history", "45",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        let config = args.into_config().unwrap();
        assert_eq!(config.file, Some(PathBuf::from("cycle.nspd")));
        assert_eq!(config.device, DeviceSpec::Null);
        assert_eq!(config.dump_type, DeviceType::Ps);
        assert!(config.start_in_vis);
        assert_eq!(config.history_length, 45.0);
    }

    #[test]
    fn a_data_source_is_required() {
        let err = parse(&["-u", "obs"]).unwrap().into_config().unwrap_err();
        assert!(matches!(err, NspdError::Parse(_)));
        assert!(parse(&["-s", "host", "-f", "cycle.nspd"]).is_err());
    }

    #[test]
    fn bad_device_is_rejected() {
        let err = parse(&["-s", "host", "-d", "screen.gif/gif"])
            .unwrap()
            .into_config()
            .unwrap_err();
        assert!(matches!(err, NspdError::Device(_)));
        assert!(parse(&["-s", "host", "-D", "gif"]).is_err());
    }
}
