use std::fs::OpenOptions;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use resolv_wrapper::config::Overrides;
use resolv_wrapper::{logging, DnsServer, RecordTable};

/// Answer to every A query when no hosts file is given.
const DEFAULT_A_REC: Ipv4Addr = Ipv4Addr::new(127, 0, 10, 10);
const ENV_TEST_A_REC: &str = "RWRAP_TEST_A_REC";

#[derive(Parser, Debug)]
#[command(name = "dns_srv", about = "Fake DNS server for resolver tests")]
struct Args {
    /// Address to bind
    #[arg(short, long = "bind-addr", default_value = "127.0.0.1")]
    bind_addr: IpAddr,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = 53)]
    port: u16,

    /// Fake hosts file with the records to serve
    #[arg(long)]
    hosts: Option<PathBuf>,

    /// Write the server's PID to this file once the socket is bound
    #[arg(long)]
    pid: Option<PathBuf>,
}

fn write_pidfile(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Cannot create pidfile {}", path.display()))?;
    writeln!(file, "{}", std::process::id())
        .with_context(|| format!("Cannot write pidfile {}", path.display()))?;
    Ok(())
}

fn load_table(args: &Args) -> Result<RecordTable> {
    if let Some(path) = &args.hosts {
        return RecordTable::from_hosts_file(path)
            .with_context(|| format!("Cannot load hosts file {}", path.display()));
    }

    let ip = match std::env::var(ENV_TEST_A_REC) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{ENV_TEST_A_REC} is not an IPv4 address: {value}"))?,
        Err(_) => DEFAULT_A_REC,
    };
    Ok(RecordTable::new().with_default_a(ip))
}

fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(Overrides::from_env().debug_level.max(1));

    let table = load_table(&args)?;
    let server = DnsServer::bind((args.bind_addr, args.port), table)
        .with_context(|| format!("Cannot setup server on {}:{}", args.bind_addr, args.port))?;

    if let Some(path) = &args.pid {
        write_pidfile(path)?;
        info!(path = %path.display(), "Wrote pidfile");
    }

    server.run()
}
