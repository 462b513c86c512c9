use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config_path: PathBuf,
    pub static_dir: Option<PathBuf>,
}

enum ParseOutcome {
    Args(CliArgs),
    Help,
}

fn usage() {
    eprintln!(
        "usage:
  shipwatch-monitor [--host <host>] [--port <port>] [--config <path>] [--static-dir <path>]
"
    );
}

fn parse_args_impl(mut args: impl Iterator<Item = String>) -> Result<ParseOutcome, String> {
    let mut host = None;
    let mut port = None;
    let mut config_path: Option<PathBuf> = None;
    let mut static_dir: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--host requires a value".to_string())?;
                host = Some(value);
            }
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--port requires a value".to_string())?;
                port = Some(
                    value
                        .parse::<u16>()
                        .map_err(|_| format!("invalid port: {value}"))?,
                );
            }
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--static-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--static-dir requires a value".to_string())?;
                static_dir = Some(PathBuf::from(value));
            }
            "-h" | "--help" | "help" => {
                return Ok(ParseOutcome::Help);
            }
            _ => {}
        }
    }

    Ok(ParseOutcome::Args(CliArgs {
        host,
        port,
        config_path: shipwatch_config::resolve_config_path(config_path),
        static_dir,
    }))
}

pub fn parse_args() -> CliArgs {
    match parse_args_impl(std::env::args().skip(1)) {
        Ok(ParseOutcome::Args(args)) => args,
        Ok(ParseOutcome::Help) => {
            usage();
            std::process::exit(0);
        }
        Err(error) => {
            eprintln!("error: {error}");
            usage();
            std::process::exit(2);
        }
    }
}
