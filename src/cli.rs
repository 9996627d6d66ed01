use crate::results::OutputFormat;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Write Latency Benchmark - closed-loop write latency and throughput measurement
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Target server address (host:port)
    #[clap(short = 's', long, default_value = crate::defaults::TARGET, help_heading = "Core Options")]
    pub target: String,

    /// Measurement interval between checkpoints (e.g. 500ms, 2s; bare numbers are ms)
    #[clap(short = 'i', long, value_parser = parse_duration, default_value = "2000ms", help_heading = "Core Options")]
    pub interval: Duration,

    /// Total execution time, rounded up to a whole number of intervals
    #[clap(short = 't', long, value_parser = parse_duration, default_value = "10000ms", help_heading = "Core Options")]
    pub total_time: Duration,

    /// Payload size of each write in bytes
    #[clap(short = 'm', long, default_value_t = crate::defaults::PAYLOAD_SIZE, help_heading = "Core Options")]
    pub payload_size: usize,

    /// Output file for results
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE, help_heading = "Output")]
    pub output_file: PathBuf,

    /// Output format (inferred from the output file extension when omitted)
    #[clap(long, value_enum, help_heading = "Output")]
    pub format: Option<OutputFormat>,

    /// Label written into the report
    #[clap(long, default_value = crate::defaults::LABEL, help_heading = "Output")]
    pub label: String,

    /// Percentiles to calculate for latency statistics (comma-separated)
    #[clap(long, value_delimiter = ',', default_values_t = crate::defaults::PERCENTILES.to_vec(), help_heading = "Output")]
    pub percentiles: Vec<f64>,

    /// Maximum number of latency samples kept in memory
    #[clap(long, default_value_t = crate::defaults::RECORDER_CAPACITY, help_heading = "Tuning")]
    pub capacity: usize,

    /// Pin the worker thread to this CPU core
    #[clap(long, help_heading = "Tuning")]
    pub worker_affinity: Option<usize>,

    /// Timeout for establishing the connection
    #[clap(long, value_parser = parse_duration, help_heading = "Tuning")]
    pub connect_timeout: Option<Duration>,

    /// Read/write timeout for each request; a timed-out write ends the run
    #[clap(long, value_parser = parse_duration, help_heading = "Tuning")]
    pub io_timeout: Option<Duration>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = ArgAction::Count, help_heading = "Logging")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, conflicts_with = "verbose", help_heading = "Logging")]
    pub quiet: bool,

    /// Also write logs to this file
    #[clap(long, help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// Run the reference target server on --target instead of a benchmark
    #[clap(long, help_heading = "Server")]
    pub serve: bool,

    /// Largest payload the reference server accepts
    #[clap(long, default_value_t = crate::defaults::SERVER_MAX_PAYLOAD, help_heading = "Server")]
    pub max_payload: usize,
}

impl Args {
    /// Output format, explicit or inferred from the file name
    pub fn output_format(&self) -> OutputFormat {
        self.format
            .unwrap_or_else(|| OutputFormat::from_path(&self.output_file))
    }
}

/// Parse duration from string (e.g., "500ms", "2s", "1m"); a bare number is milliseconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix("us") {
        (stripped, "us")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "ms")
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a non-negative number: {}", s));
    }

    let nanos_per_unit = match unit {
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Ok(Duration::from_nanos((num * nanos_per_unit).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("0.02s").unwrap(), Duration::from_millis(20));
        // Bare numbers are milliseconds
        assert_eq!(parse_duration("2000").unwrap(), Duration::from_secs(2));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let args = Args::try_parse_from(["write-latency-bench"]).unwrap();

        assert_eq!(args.target, crate::defaults::TARGET);
        assert_eq!(args.interval, crate::defaults::MEASURE_INTERVAL);
        assert_eq!(args.total_time, crate::defaults::TOTAL_EXEC_TIME);
        assert_eq!(args.payload_size, crate::defaults::PAYLOAD_SIZE);
        assert_eq!(args.capacity, crate::defaults::RECORDER_CAPACITY);
        assert_eq!(args.percentiles, crate::defaults::PERCENTILES.to_vec());
        assert_eq!(args.output_file, PathBuf::from(crate::defaults::OUTPUT_FILE));
        assert_eq!(args.output_format(), OutputFormat::Json);
        assert_eq!(args.verbose, 0);
        assert!(!args.serve);
    }

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "write-latency-bench",
            "-s",
            "db.local:9000",
            "-i",
            "1s",
            "-t",
            "30s",
            "-m",
            "512",
            "-o",
            "out.csv",
            "--percentiles",
            "50,99.9",
            "--worker-affinity",
            "2",
            "--io-timeout",
            "250",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.target, "db.local:9000");
        assert_eq!(args.interval, Duration::from_secs(1));
        assert_eq!(args.total_time, Duration::from_secs(30));
        assert_eq!(args.payload_size, 512);
        assert_eq!(args.output_format(), OutputFormat::Csv);
        assert_eq!(args.percentiles, vec![50.0, 99.9]);
        assert_eq!(args.worker_affinity, Some(2));
        assert_eq!(args.io_timeout, Some(Duration::from_millis(250)));
        assert_eq!(args.connect_timeout, None);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let args =
            Args::try_parse_from(["write-latency-bench", "-o", "out.csv", "--format", "json"])
                .unwrap();
        assert_eq!(args.output_format(), OutputFormat::Json);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["write-latency-bench", "-q", "-v"]).is_err());
    }
}
