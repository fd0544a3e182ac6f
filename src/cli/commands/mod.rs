use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version = built_info::GIT_COMMIT_HASH.map_or_else(
        || env!("CARGO_PKG_VERSION").to_string(),
        |hash| format!("{} ({hash})", env!("CARGO_PKG_VERSION")),
    );

    Command::new("pg_topology")
        .about("PostgreSQL cluster topology discovery for quorum-commit replication")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("9434")
                .env("PG_TOPOLOGY_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("listen")
                .long("listen")
                .help("Address to bind, all interfaces by default")
                .env("PG_TOPOLOGY_LISTEN")
                .value_name("ADDR"),
        )
        .arg(
            Arg::new("dsn")
                .long("dsn")
                .help("Candidate host connection strings, probed in the given order")
                .default_value("postgresql://postgres@localhost:5432/postgres")
                .env("PG_TOPOLOGY_DSN")
                .value_name("DSN,DSN,...")
                .value_delimiter(',') // split CLI and env values by comma
                .action(ArgAction::Append), // allow repeated flags if desired
        )
        .arg(
            Arg::new("probe-timeout-ms")
                .long("probe-timeout-ms")
                .help("Deadline for one probe (connect + queries)")
                .default_value("1000")
                .env("PG_TOPOLOGY_PROBE_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("discovery-interval-ms")
                .long("discovery-interval-ms")
                .help("Cadence of the discovery loop")
                .default_value("1000")
                .env("PG_TOPOLOGY_DISCOVERY_INTERVAL_MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase verbosity, -vv for debug")
                .action(ArgAction::Count),
        )
}
