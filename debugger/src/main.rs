use std::io::IsTerminal;

use clap::{ArgAction, Parser};
use debugger::{parse_breakpoint, Controller, ControllerConfig, Policy};
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use transport::{Breakpoint, DebugMessage};

/// Attach to a device's JavaScript engine and drive a debug session.
#[derive(Debug, Parser)]
struct Args {
    /// Engine address: a ws:// URL, or tcp://host:port for a raw connection
    #[clap(env = "XSBUG_URL", default_value = "ws://runmod.local:8080")]
    url: String,

    /// Breakpoint as PATH:LINE, may be repeated
    #[clap(short, long = "breakpoint", value_parser = parse_breakpoint)]
    breakpoints: Vec<Breakpoint>,

    /// Break when an exception is thrown
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    break_on_exceptions: bool,

    /// Break before the first statement runs
    #[clap(long)]
    break_on_start: bool,

    /// Automatic reaction to login and break events
    #[clap(long, value_enum, default_value_t = Policy::Continue)]
    policy: Policy,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if std::io::stderr().is_terminal() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .json()
            .init();
    }
    color_eyre::install()?;

    let args = Args::parse();
    tracing::debug!(?args, "parsed command line arguments");

    let (commands, documents) = debugger::client::connect(&args.url)
        .await
        .wrap_err("attaching to engine")?;

    let mut controller = Controller::new(
        commands,
        ControllerConfig {
            breakpoints: args.breakpoints,
            break_on_exceptions: args.break_on_exceptions,
            break_on_start: args.break_on_start,
            policy: args.policy,
        },
    );

    let events = controller.events();
    std::thread::spawn(move || {
        for event in events {
            match event {
                DebugMessage::Login(login) => println!("login: {} {}", login.name, login.value),
                DebugMessage::Break(brk) => {
                    println!("break: {}:{} {}", brk.path, brk.line, brk.message)
                }
                DebugMessage::Log(text) => print!("{text}"),
                _ => {}
            }
        }
    });

    debugger::drive(documents, &mut controller).await
}
