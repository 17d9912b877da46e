#![cfg(not(tarpaulin_include))]

use chrono::{Local, NaiveDate};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use tasksheet::clock::{Clock, SystemClock};
use tasksheet::downloader::{self, CSV_FILE_NAME, CsvEncoding};
use tasksheet::options::estimated_from_choice;
use tasksheet::share::{PayloadIssuer, ShareService, SignedUrlIssuer, TokenStore};
use tasksheet::{AppConfig, Defaults, TaskSheet, qr};

const USAGE: &str = "Usage: tasksheet-cli [options] [TASKS_FILE]

Reads one task per line from TASKS_FILE (or stdin) and writes a CSV.

Options:
  -o, --out FILE        output file, '-' for stdout (default tasks.csv)
  --encoding ENC        utf-8-sig | shift_jis (default from TASKSHEET_CSV_ENCODING)
  --due YYYY-MM-DD      due date (default tomorrow)
  --schedule TIME       schedule, e.g. 930 or 17:25
  --section TEXT        section (default 10:00)
  --project TEXT        project
  --tag TEXT            tag
  --estimated N|その他   estimate in minutes
  --other N             minutes used when --estimated is その他
  --share               print a temporary download link and QR code
  -h, --help            show this help";

struct Args {
    input: Option<String>,
    out: String,
    encoding: Option<CsvEncoding>,
    defaults: Defaults,
    share: bool,
}

fn parse_args(args: &[String], today: NaiveDate) -> Result<Option<Args>, String> {
    let mut parsed = Args {
        input: None,
        out: CSV_FILE_NAME.to_string(),
        encoding: None,
        defaults: Defaults::for_today(today),
        share: false,
    };
    let mut estimated_choice: Option<String> = None;
    let mut other = parsed.defaults.estimated;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", name))
        };

        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-o" | "--out" => parsed.out = value(arg.as_str())?,
            "--encoding" => parsed.encoding = Some(value(arg.as_str())?.parse()?),
            "--due" => {
                let raw = value(arg.as_str())?;
                parsed.defaults.due_date =
                    tasksheet::task::parse_due_date(&raw).ok_or_else(|| format!("invalid date: {}", raw))?;
            }
            "--schedule" => parsed.defaults.schedule = value(arg.as_str())?,
            "--section" => parsed.defaults.section = value(arg.as_str())?,
            "--project" => parsed.defaults.project = value(arg.as_str())?,
            "--tag" => parsed.defaults.tag = value(arg.as_str())?,
            "--estimated" => estimated_choice = Some(value(arg.as_str())?),
            "--other" => {
                let raw = value(arg.as_str())?;
                other = raw.trim().parse().map_err(|_| format!("invalid minutes: {}", raw))?;
            }
            "--share" => parsed.share = true,
            flag if flag.starts_with('-') && flag != "-" => return Err(format!("unknown option: {}", flag)),
            path => parsed.input = Some(path.to_string()),
        }
    }

    if let Some(choice) = estimated_choice {
        parsed.defaults.estimated = estimated_from_choice(&choice, other);
    }
    parsed.defaults = parsed.defaults.normalized();

    Ok(Some(parsed))
}

fn read_tasks(input: Option<&str>) -> io::Result<String> {
    match input {
        Some(path) if path != "-" => fs::read_to_string(path),
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let s = Instant::now();
    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let today = clock.now().with_timezone(&Local).date_naive();

    let args = match parse_args(&args, today) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Err(message) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            std::process::exit(2);
        }
    };

    let mut sheet = TaskSheet::new();
    let added = sheet.append_lines(&read_tasks(args.input.as_deref())?, &args.defaults);
    let rows = sheet.export(&args.defaults);
    let encoding = args.encoding.unwrap_or(config.csv_encoding);
    let bytes = downloader::export_csv(&rows, encoding);

    if args.out == "-" {
        io::stdout().write_all(&bytes)?;
    } else {
        fs::write(&args.out, &bytes)?;
        eprintln!("Wrote {} task(s) to {} ({})", added, args.out, encoding);
    }

    if args.share {
        // No server outlives this process, so only links that carry or host
        // the data themselves are usable here.
        let store = Arc::new(TokenStore::new(clock.clone()));
        let mut service = ShareService::new(store, clock.clone());
        if let Some(storage) = config.storage.clone() {
            service = service.with_issuer(SignedUrlIssuer::new(storage, clock.clone())?);
        }
        if let Some(public_url) = config.public_url.as_deref() {
            service = service.with_issuer(PayloadIssuer::new(public_url, config.payload_link_limit, clock.clone()));
        }

        match service.issue(&bytes, CSV_FILE_NAME, config.share_ttl_minutes).await {
            Ok(link) => {
                if let Some(warning) = &link.warning {
                    eprintln!("Warning: {}", warning);
                }
                println!("{}", link.url);
                println!("({}, expires {})", link.strategy, link.expires_at.with_timezone(&Local).format("%H:%M:%S"));
                match qr::to_terminal(&link.url) {
                    Ok(code) => println!("{}", code),
                    Err(e) => eprintln!("QR code unavailable: {}", e),
                }
            }
            Err(e) => {
                eprintln!(
                    "Error: {} (set TASKSHEET_PUBLIC_URL or the SUPABASE_* variables to share from the command line)",
                    e
                );
                std::process::exit(1);
            }
        }
    }

    log::info!("Total elapsed time: {:.1} seconds", s.elapsed().as_secs_f64());

    Ok(())
}
