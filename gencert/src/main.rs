use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use enough_gencert::{validate_service_name, Authority};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "enough-gencert")]
#[command(about = "Mint a CA, a server certificate and client certificates")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// A short, shared service name eg 'WidgetCluster'
    #[arg(long)]
    name: Option<String>,

    /// Path to an existing CA cert PEM file
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Path to an existing CA private key PEM file (PKCS#8)
    #[arg(long)]
    ca_key: Option<PathBuf>,

    /// Number of client cert / key pairs to generate
    #[arg(long, default_value_t = 1)]
    clients: u32,

    /// Index to start minting new client certs from
    #[arg(long, default_value_t = 0)]
    client_offset: u32,

    /// Extra host names or IP addresses for the server certificate
    #[arg(long = "host", default_values = ["localhost", "127.0.0.1"])]
    hosts: Vec<String>,

    /// Directory the PEM files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

/// Where the CA comes from
#[derive(Debug, PartialEq, Eq)]
enum CaSource<'a> {
    Fresh(&'a str),
    Existing { cert: &'a PathBuf, key: &'a PathBuf },
}

/// Client indices to mint, `client_offset..client_offset + clients`
fn client_range(args: &Args) -> Result<std::ops::Range<u32>> {
    let end = args
        .client_offset
        .checked_add(args.clients)
        .with_context(|| {
            format!(
                "--client-offset {} plus --clients {} exceeds {}",
                args.client_offset,
                args.clients,
                u32::MAX
            )
        })?;
    Ok(args.client_offset..end)
}

/// Exactly one of `--name` or the `--ca-cert`/`--ca-key` pair is accepted
fn ca_source(args: &Args) -> Result<CaSource<'_>> {
    match (&args.name, &args.ca_cert, &args.ca_key) {
        (Some(name), None, None) => {
            validate_service_name(name)?;
            Ok(CaSource::Fresh(name))
        }
        (None, Some(cert), Some(key)) => Ok(CaSource::Existing { cert, key }),
        _ => bail!("--name OR --ca-cert and --ca-key required"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level: tracing::Level = args
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level {:?}", args.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let source = ca_source(&args).context("Bad configuration flags")?;
    let clients = client_range(&args).context("Bad configuration flags")?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {:?}", args.out_dir))?;

    let ca = match source {
        CaSource::Fresh(name) => {
            let ca = Authority::new(name).context("Failed to create CA cert")?;
            ca.issued().write_pair(&args.out_dir, "ca")?;

            let server = ca
                .create_server_cert(&args.hosts)
                .context("Failed to create server cert")?;
            server.write_pair(&args.out_dir, "server")?;
            ca
        }
        CaSource::Existing { cert, key } => {
            Authority::from_files(cert, key).context("Failed to load CA")?
        }
    };
    info!("Using CA for service {:?}", ca.service());

    for i in clients {
        let client = ca
            .create_client_cert(i)
            .with_context(|| format!("Unable to create client cert {i}"))?;
        client.write_pair(&args.out_dir, &format!("client{i}"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("enough-gencert").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn name_alone_mints_fresh_ca() {
        let args = parse(&["--name", "WidgetCluster"]);
        assert_eq!(ca_source(&args).unwrap(), CaSource::Fresh("WidgetCluster"));
        assert_eq!(args.hosts, vec!["localhost", "127.0.0.1"]);
        assert_eq!((args.clients, args.client_offset), (1, 0));
    }

    #[test]
    fn existing_ca_needs_both_files() {
        let args = parse(&["--ca-cert", "ca_cert.pem", "--ca-key", "ca_key.pem"]);
        assert!(matches!(ca_source(&args), Ok(CaSource::Existing { .. })));

        let half = parse(&["--ca-cert", "ca_cert.pem"]);
        assert!(ca_source(&half).is_err());
    }

    #[test]
    fn name_and_ca_files_are_exclusive() {
        let both = parse(&[
            "--name", "svc", "--ca-cert", "ca_cert.pem", "--ca-key", "ca_key.pem",
        ]);
        assert!(ca_source(&both).is_err());
        assert!(ca_source(&parse(&[])).is_err());
    }

    #[test]
    fn client_range_follows_offset() {
        let args = parse(&["--name", "svc", "--clients", "3", "--client-offset", "5"]);
        assert_eq!(client_range(&args).unwrap(), 5..8);
    }

    #[test]
    fn client_range_overflow_is_refused() {
        let args = parse(&[
            "--name",
            "svc",
            "--clients",
            "2",
            "--client-offset",
            &u32::MAX.to_string(),
        ]);
        assert!(client_range(&args).is_err());
    }

    #[test]
    fn oversized_name_is_refused() {
        let long = "x".repeat(141);
        let args = parse(&["--name", &long]);
        assert!(ca_source(&args).is_err());
    }
}
