use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use mdl::cli::KindArg;
use mdl::commands::{run_download, DownloadOptions};
use mdl::progress::{ConsoleSink, NullSink, ProgressSink};
use mdl::state::DEFAULT_CHUNK_SIZE;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media URL to download
    url: String,

    /// Directory to save the downloaded file
    #[arg(short = 'd', long = "output-dir", default_value = "downloads")]
    output_dir: PathBuf,

    /// JSON file with custom headers (flat string map, merged over defaults)
    #[arg(long = "headers-file")]
    headers_file: Option<PathBuf>,

    /// JSON file with custom cookies (flat string map, merged over defaults)
    #[arg(long = "cookies-file")]
    cookies_file: Option<PathBuf>,

    /// Skip default headers/cookies for public URLs
    #[arg(short = 'n', long = "no-auth")]
    no_auth: bool,

    /// Ranged request size in bytes
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Maximum retries for a range that keeps answering 403
    #[arg(long = "max-retries", default_value_t = 10)]
    max_retries: u32,

    /// Treat the URL as audio or video instead of classifying by extension
    #[arg(short = 'k', long = "kind", value_enum, default_value = "auto")]
    kind: KindArg,

    /// Skip the ffmpeg faststart pass on finished videos
    #[arg(long = "no-remux")]
    no_remux: bool,

    /// Suppress the progress bar and log output
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_target(false)
            .init();
    }

    let sink: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(ConsoleSink::new())
    };

    let mut options = DownloadOptions::new(&args.url, &args.output_dir);
    options.headers_file = args.headers_file;
    options.cookies_file = args.cookies_file;
    options.no_auth = args.no_auth;
    options.chunk_size = args.chunk_size;
    options.max_forbidden_retries = args.max_retries;
    options.kind = Some(args.kind.resolve(&args.url));
    options.remux = !args.no_remux;

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let outcome = rt.block_on(run_download(&options, sink.as_ref()));

    if outcome.success {
        println!("{}", outcome.output_path);
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", outcome.message);
        ExitCode::FAILURE
    }
}
