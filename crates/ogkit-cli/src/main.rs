//! ogkit CLI - link previews from the command line

use clap::{Parser, Subcommand, ValueEnum};
use ogkit::{output_schema, FetchOptions, OpenGraphResult, Previewer};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for fetch subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// JSON format
    #[default]
    Json,
    /// Markdown with YAML frontmatter
    Md,
}

/// ogkit - bounded Open Graph fetcher
#[derive(Parser, Debug)]
#[command(name = "ogkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a URL and print its link-preview metadata
    Fetch {
        /// URL to fetch
        url: String,

        /// Deadline for the whole call in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum number of body bytes to read
        #[arg(long)]
        max_bytes: Option<usize>,

        /// Maximum number of redirects to follow
        #[arg(long, default_value_t = ogkit::DEFAULT_MAX_REDIRECTS)]
        max_redirects: usize,

        /// Custom User-Agent
        #[arg(long)]
        user_agent: Option<String>,

        /// Output format
        #[arg(long, short, default_value = "json")]
        output: OutputFormat,
    },
    /// Print the JSON schema of the result
    Schema,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Fetch {
            url,
            timeout_ms,
            max_bytes,
            max_redirects,
            user_agent,
            output,
        }) => {
            let previewer = build_previewer(timeout_ms, max_bytes, max_redirects, user_agent);
            run_fetch(&previewer, &url, output).await;
        }
        Some(Commands::Schema) => {
            let json = serde_json::to_string_pretty(&output_schema()).unwrap_or_else(|e| {
                eprintln!("Error serializing schema: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
        None => {
            eprintln!("Usage: ogkit fetch <URL>");
            eprintln!("   or: ogkit schema");
            eprintln!("   or: ogkit --help");
            std::process::exit(1);
        }
    }
}

fn build_previewer(
    timeout_ms: Option<u64>,
    max_bytes: Option<usize>,
    max_redirects: usize,
    user_agent: Option<String>,
) -> Previewer {
    let mut builder = Previewer::builder().max_redirects(max_redirects);

    if let Some(ms) = timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    if let Some(bytes) = max_bytes {
        builder = builder.max_bytes(bytes);
    }
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }

    builder.build().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    })
}

async fn run_fetch(previewer: &Previewer, url: &str, output: OutputFormat) {
    let result = previewer
        .fetch_open_graph(url, FetchOptions::default())
        .await;

    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                eprintln!("Error serializing result: {}", e);
                std::process::exit(1);
            });
            writeln_safe(&json);
        }
        OutputFormat::Md => writeln_safe(&format_md_with_frontmatter(&result)),
    }

    if result.is_error() {
        std::process::exit(1);
    }
}

/// Format result as markdown with YAML frontmatter
fn format_md_with_frontmatter(result: &OpenGraphResult) -> String {
    let mut output = String::new();

    output.push_str("---\n");
    output.push_str(&format!("url: {}\n", result.url));
    if let Some(ref site_name) = result.site_name {
        output.push_str(&format!("site_name: {}\n", site_name));
    }
    if let Some(ref og_type) = result.og_type {
        output.push_str(&format!("type: {}\n", og_type));
    }
    if let Some(ref image_url) = result.image_url {
        output.push_str(&format!("image_url: {}\n", image_url));
    }
    if let Some(ref canonical_url) = result.canonical_url {
        output.push_str(&format!("canonical_url: {}\n", canonical_url));
    }
    output.push_str(&format!("fetched_at: {}\n", result.fetched_at.to_rfc3339()));
    output.push_str("---\n");

    // Error code goes in the body so failures read as plain text
    if let Some(code) = result.error {
        output.push_str(&format!("error: {}", code));
        return output;
    }

    if let Some(ref title) = result.title {
        output.push_str(&format!("# {}\n", title));
    }
    if let Some(ref description) = result.description {
        if result.title.is_some() {
            output.push('\n');
        }
        output.push_str(description);
        output.push('\n');
    }

    output
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogkit::{ErrorCode, PartialMetadata};

    #[test]
    fn test_format_md_basic() {
        let result = OpenGraphResult::from_metadata(
            "https://example.com",
            PartialMetadata {
                title: Some("Hello World".to_string()),
                description: Some("A page".to_string()),
                site_name: Some("Example".to_string()),
                ..Default::default()
            },
        );

        let output = format_md_with_frontmatter(&result);

        assert!(output.starts_with("---\n"));
        assert!(output.contains("url: https://example.com\n"));
        assert!(output.contains("site_name: Example\n"));
        assert!(output.contains("fetched_at: "));
        assert!(output.contains("---\n# Hello World\n\nA page\n"));
        assert!(!output.contains("image_url"));
    }

    #[test]
    fn test_format_md_error_as_body() {
        let result = OpenGraphResult::failed("https://example.com/gone", ErrorCode::BadStatus);

        let output = format_md_with_frontmatter(&result);

        assert!(output.contains("url: https://example.com/gone\n"));
        assert!(output.ends_with("---\nerror: bad-status"));
        assert!(!output.contains("# "));
    }

    #[test]
    fn test_format_md_without_title() {
        let result = OpenGraphResult::from_metadata(
            "https://example.com",
            PartialMetadata {
                description: Some("Only a description".to_string()),
                ..Default::default()
            },
        );

        let output = format_md_with_frontmatter(&result);

        assert!(output.ends_with("---\nOnly a description\n"));
    }

    #[test]
    fn test_build_previewer_overrides() {
        let previewer = build_previewer(Some(1500), Some(4096), 2, Some("test-agent".into()));

        assert_eq!(previewer.timeout(), Duration::from_millis(1500));
        assert_eq!(previewer.max_bytes(), 4096);
    }

    #[test]
    fn test_cli_parses_fetch() {
        let cli = Cli::parse_from([
            "ogkit",
            "fetch",
            "https://example.com",
            "--timeout-ms",
            "2000",
            "-o",
            "md",
        ]);

        match cli.command {
            Some(Commands::Fetch {
                url,
                timeout_ms,
                max_redirects,
                output,
                ..
            }) => {
                assert_eq!(url, "https://example.com");
                assert_eq!(timeout_ms, Some(2000));
                assert_eq!(max_redirects, ogkit::DEFAULT_MAX_REDIRECTS);
                assert!(matches!(output, OutputFormat::Md));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
