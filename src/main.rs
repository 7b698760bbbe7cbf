use std::os::fd::AsFd;
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{error, info};

use nspd::args::Args;
use nspd::device::open_device;
use nspd::logging::init_tracing;
use nspd::network::ServerLink;
use nspd::protocol::{ClientInfo, CLIENT_TYPE};
use nspd::session::Session;
use nspd::terminal::{wait_ready, Ready, Terminal};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if std::env::args().len() <= 1 {
                let mut cmd = Args::command();
                let _ = cmd.print_help();
                process::exit(1);
            }
            e.exit();
        }
    };
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        error!("{:#}", e);
        eprintln!("nspd: {:#}", e);
        process::exit(1);
    }
}

/// False once the server has gone away; anything else that fails is
/// passed up.
fn still_connected(result: nspd::Result<()>, terminal: &mut Terminal) -> anyhow::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_fatal_network() => {
            terminal.message(&format!("lost the server: {}", e))?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.into_config().context("invalid arguments")?;
    let device = open_device(&config.device)
        .with_context(|| format!("cannot open the screen device {}", config.device))?;

    let link = match (&config.server, &config.file) {
        (Some(host), None) => {
            let client = ClientInfo {
                client_id: format!("{}-{}", CLIENT_TYPE, process::id()),
                username: config.username.clone(),
            };
            Some(ServerLink::connect(host, config.port, client).context("cannot reach the spectrum server")?)
        }
        _ => None,
    };

    let mut session = Session::new(config, device, link);
    let mut terminal = Terminal::new(session.prompt()).context("cannot set up the terminal")?;
    let mut running = still_connected(session.start(), &mut terminal)?;

    while running && !session.should_quit() {
        for message in session.take_messages() {
            terminal.message(&message)?;
        }
        terminal.set_prompt(session.prompt());
        terminal.show_prompt()?;

        let server_fd = session.link().map(|link| link.as_fd());
        let (from_terminal, from_server) = match wait_ready(server_fd, -1)? {
            Ready::Interrupted | Ready::TimedOut => (false, false),
            Ready::Sources { terminal: t, server: s } => (t, s),
        };
        if terminal.take_resize() {
            terminal.show_prompt()?;
        }

        if from_server {
            let received = match session.link_mut() {
                Some(link) => link.receive(),
                None => Ok(Vec::new()),
            };
            match received {
                Ok(responses) => {
                    for response in responses {
                        running = still_connected(session.handle_response(response), &mut terminal)?;
                        if !running {
                            break;
                        }
                    }
                }
                Err(e) => running = still_connected(Err(e), &mut terminal)?,
            }
        }

        if from_terminal && running {
            match terminal.read_lines()? {
                None => {
                    info!("end of input");
                    break;
                }
                Some(lines) => {
                    for line in lines {
                        running = still_connected(session.handle_line(&line), &mut terminal)?;
                        if !running || session.should_quit() {
                            break;
                        }
                    }
                }
            }
        }
    }

    for message in session.take_messages() {
        terminal.message(&message)?;
    }
    session.close().context("cannot write the screen device")?;
    info!("session ended");
    Ok(())
}
