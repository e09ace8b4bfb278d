use clap::Parser;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use create2_predictor::stats::{format_duration, RateSnapshot};
use create2_predictor::{
    format_number, run_batch, Create2Predictor, DispatchConfig, Network, PredictStats,
    SaltSource, SaltStrategy,
};

#[cfg(target_os = "macos")]
use create2_predictor::gpu;

const DEFAULT_IMPLEMENTATION: &str = "0xa84c57e9966df7df79bff42f35c68aae71796f64";
const DEFAULT_DEPLOYER: &str = "0xfe15afcb5b9831b8af5fd984678250e95de8e312";

const KNOWN_VECTOR_SALT: &str = "test-salt-test";
const KNOWN_VECTOR_ADDRESS: &str = "0x22FBFB2264B9Cd1ADe8ce5013012c817878D783C";

#[derive(Parser)]
#[command(name = "create2-bench")]
#[command(about = "CREATE2 minimal-proxy address prediction benchmark", long_about = None)]
struct Cli {
    /// Implementation contract address (0x-prefixed hex)
    #[arg(long, default_value = DEFAULT_IMPLEMENTATION)]
    implementation: String,

    /// Deployer address (0x-prefixed hex)
    #[arg(long, default_value = DEFAULT_DEPLOYER)]
    deployer: String,

    /// Total number of predictions to compute
    #[arg(short = 'n', long, default_value_t = 5_000_000)]
    total: usize,

    /// Number of worker threads (default: all CPU cores)
    #[arg(short = 't', long, value_name = "N")]
    threads: Option<usize>,

    /// Network profile: evm or tron
    #[arg(long, default_value = "evm", value_parser = ["evm", "tron"])]
    network: String,

    /// Salt strategy: sequential, random or prng
    #[arg(long = "salt", default_value = "sequential",
          value_parser = ["sequential", "random", "prng"])]
    salt_strategy: String,

    /// Base seed for the prng salt strategy
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Progress report interval in milliseconds
    #[arg(long, default_value_t = 100)]
    report_interval: u64,

    /// Run the known-vector self check and exit
    #[arg(long)]
    verify: bool,

    /// Search for addresses ending with the given suffix (runs until Ctrl+C)
    #[arg(long, value_name = "SUFFIX")]
    find: Option<String>,

    /// Use the Metal GPU pipeline (macOS only)
    #[arg(long)]
    gpu: bool,

    /// GPU batch size
    #[arg(long, default_value_t = 262_144)]
    batch_size: usize,
}

fn parse_network(s: &str) -> Network {
    match s {
        "tron" => Network::Tron,
        _ => Network::Evm,
    }
}

fn parse_strategy(s: &str) -> SaltStrategy {
    match s {
        "random" => SaltStrategy::CryptoRandom,
        "prng" => SaltStrategy::LanePrng,
        _ => SaltStrategy::Sequential,
    }
}

fn main() {
    let cli = Cli::parse();
    let network = parse_network(&cli.network);

    if cli.verify {
        std::process::exit(run_verify());
    }

    let exit_code = if let Some(suffix) = cli.find.clone() {
        run_find(&cli, network, &suffix)
    } else if cli.gpu {
        run_gpu_benchmark(&cli, network)
    } else {
        run_cpu_benchmark(&cli, network)
    };
    std::process::exit(exit_code);
}

/// Known-vector conformance check shared by every port of the predictor
fn run_verify() -> i32 {
    println!("Running known-vector self check...");
    println!("  Implementation: {}", DEFAULT_IMPLEMENTATION);
    println!("  Deployer:       {}", DEFAULT_DEPLOYER);
    println!("  Salt:           {}", KNOWN_VECTOR_SALT);

    let predictor = Create2Predictor::new(Network::Evm);
    match predictor.predict(DEFAULT_IMPLEMENTATION, DEFAULT_DEPLOYER, KNOWN_VECTOR_SALT) {
        Ok(address) if address == KNOWN_VECTOR_ADDRESS => {
            println!("  Result:         {} (match)", address);
            0
        }
        Ok(address) => {
            eprintln!("  Result:         {} (MISMATCH, expected {})", address, KNOWN_VECTOR_ADDRESS);
            1
        }
        Err(e) => {
            eprintln!("  Prediction failed: {}", e);
            1
        }
    }
}

fn run_cpu_benchmark(cli: &Cli, network: Network) -> i32 {
    let threads = cli.threads.unwrap_or_else(num_cpus::get);
    let strategy = parse_strategy(&cli.salt_strategy);

    println!("CREATE2 address prediction benchmark (CPU)");
    println!("Total predictions: {}", format_number(cli.total as u64));
    println!("Implementation:    {}", cli.implementation);
    println!("Deployer:          {}", cli.deployer);
    println!("Network:           {}", network);
    println!("Salt strategy:     {}", strategy);
    println!("Threads:           {}", threads);
    println!("{}", "-".repeat(72));

    let predictor = Create2Predictor::new(network);
    let stats = Arc::new(PredictStats::new());
    let mut config = DispatchConfig::new(cli.total);
    config.threads = threads;
    config.strategy = strategy;
    config.base_seed = cli.seed;

    let reporter = spawn_reporter(stats.clone(), cli.total as u64, cli.report_interval);

    let result = run_batch(&predictor, &cli.implementation, &cli.deployer, &config, &stats);

    reporter.stop();

    match result {
        Ok(report) => {
            let elapsed = report.elapsed;
            let avg_tps = report.completed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            println!("\n{}", "-".repeat(72));
            println!("Benchmark results:");
            println!("  Total predictions: {}", format_number(report.completed));
            println!("  Elapsed:           {}", format_duration(elapsed));
            println!("  Average rate:      {:.2} ops/sec", avg_tps);
            println!(
                "  Per prediction:    {:.2} us",
                elapsed.as_micros() as f64 / report.completed.max(1) as f64
            );
            println!("  Threads:           {}", threads);
            0
        }
        Err(e) => {
            eprintln!("\nBatch aborted at iteration {}: {}", e.index(), e);
            1
        }
    }
}

/// Continuous suffix search across worker threads; prints every match and
/// runs until interrupted.
fn run_find(cli: &Cli, network: Network, suffix: &str) -> i32 {
    let threads = cli.threads.unwrap_or_else(num_cpus::get);
    let strategy = match parse_strategy(&cli.salt_strategy) {
        // sequential salts would make every worker retrace the same stream
        SaltStrategy::Sequential => SaltStrategy::CryptoRandom,
        other => other,
    };

    println!("Searching for addresses ending with '{}'", suffix);
    println!("Implementation: {}", cli.implementation);
    println!("Deployer:       {}", cli.deployer);
    println!("Network:        {}", network);
    println!("Salt strategy:  {}", strategy);
    println!("Threads:        {}", threads);
    println!("Press Ctrl+C to stop");
    println!("{}", "-".repeat(72));

    let predictor = Arc::new(Create2Predictor::new(network));
    let stats = Arc::new(PredictStats::new());
    let running = Arc::new(AtomicBool::new(true));
    let (sender, receiver) = mpsc::channel::<(String, String)>();

    for lane in 0..threads {
        let predictor = predictor.clone();
        let stats = stats.clone();
        let running = running.clone();
        let sender = sender.clone();
        let implementation = cli.implementation.clone();
        let deployer = cli.deployer.clone();
        let suffix = suffix.to_string();
        let seed = cli.seed;

        thread::spawn(move || {
            let mut source = SaltSource::for_lane(strategy, seed, lane as u64);
            let mut index = lane;
            let mut local_count = 0u64;

            while running.load(Ordering::Relaxed) {
                let salt = match source.next(index) {
                    Ok(salt) => salt,
                    Err(e) => {
                        eprintln!("salt generation failed: {}", e);
                        running.store(false, Ordering::Relaxed);
                        return;
                    }
                };
                index += threads;

                match predictor.predict(&implementation, &deployer, &salt) {
                    Ok(address) => {
                        if address.ends_with(&suffix) && sender.send((salt, address)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        eprintln!("prediction failed: {}", e);
                        running.store(false, Ordering::Relaxed);
                        return;
                    }
                }

                local_count += 1;
                if local_count >= 1000 {
                    stats.add(local_count);
                    local_count = 0;
                }
            }
        });
    }
    drop(sender);

    let mut snapshot = RateSnapshot::new();
    loop {
        match receiver.recv_timeout(Duration::from_millis(cli.report_interval)) {
            Ok((salt, address)) => {
                println!("\nFound matching address!");
                println!("  Salt:    {}", salt);
                println!("  Address: {}", address);
                println!("  After:   {} predictions", format_number(stats.completed()));
                println!("{}", "-".repeat(72));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let (avg, current) = snapshot.sample(&stats);
                print!(
                    "\rTried: {} | avg: {:.0}/s | now: {:.0}/s | elapsed: {}   ",
                    format_number(stats.completed()),
                    avg,
                    current,
                    format_duration(stats.elapsed())
                );
                let _ = std::io::stdout().flush();
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => return 1,
        }

        if !running.load(Ordering::Relaxed) {
            return 1;
        }
    }
}

#[cfg(target_os = "macos")]
fn run_gpu_benchmark(cli: &Cli, network: Network) -> i32 {
    println!("CREATE2 address prediction benchmark (GPU)");
    println!("Total predictions: {}", format_number(cli.total as u64));
    println!("Implementation:    {}", cli.implementation);
    println!("Deployer:          {}", cli.deployer);
    println!("Network:           {}", network);
    println!("GPU batch size:    {}", format_number(cli.batch_size as u64));
    println!("Salt generation:   on-GPU PCG32 streams");
    println!("{}", "-".repeat(72));

    let context = match gpu::initialize() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("GPU initialization failed: {}", e);
            return 1;
        }
    };
    println!("Metal device: {}", context.device_name());

    let predictor = match gpu::GpuPredictor::new(context, network, cli.batch_size) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("GPU pipeline setup failed: {}", e);
            return 1;
        }
    };

    let stats = PredictStats::new();
    let mut snapshot = RateSnapshot::new();
    let mut processed = 0usize;
    let mut batch_seed = cli.seed as u32;

    while processed < cli.total {
        let batch = cli.batch_size.min(cli.total - processed);
        match predictor.predict_batch_random(&cli.implementation, &cli.deployer, batch, batch_seed)
        {
            Ok(addresses) => {
                processed += addresses.len();
                stats.add(addresses.len() as u64);
                batch_seed = batch_seed.wrapping_add(1);

                let (avg, current) = snapshot.sample(&stats);
                let percentage = processed as f64 / cli.total as f64 * 100.0;
                print!(
                    "\rProgress: {:.2}% ({}/{}) | avg: {:.0}/s | now: {:.0}/s | elapsed: {}",
                    percentage,
                    processed,
                    cli.total,
                    avg,
                    current,
                    format_duration(stats.elapsed())
                );
                let _ = std::io::stdout().flush();
            }
            Err(e) => {
                eprintln!("\nGPU batch failed after {} predictions: {}", processed, e);
                return 1;
            }
        }
    }

    let elapsed = stats.elapsed();
    println!("\n{}", "-".repeat(72));
    println!("Benchmark results (GPU):");
    println!("  Total predictions: {}", format_number(processed as u64));
    println!("  Elapsed:           {}", format_duration(elapsed));
    println!(
        "  Average rate:      {:.2} ops/sec",
        processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    0
}

#[cfg(not(target_os = "macos"))]
fn run_gpu_benchmark(_cli: &Cli, _network: Network) -> i32 {
    eprintln!("GPU acceleration requires Metal and is only available on macOS");
    1
}

/// Background progress printer for the CPU benchmark
struct Reporter {
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl Reporter {
    fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn spawn_reporter(stats: Arc<PredictStats>, total: u64, interval_ms: u64) -> Reporter {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();

    let handle = thread::spawn(move || {
        let mut snapshot = RateSnapshot::new();
        while flag.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(interval_ms.max(10)));
            let completed = stats.completed();
            if completed == 0 {
                continue;
            }
            let (avg, current) = snapshot.sample(&stats);
            let percentage = completed as f64 / total.max(1) as f64 * 100.0;
            print!(
                "\rProgress: {:.2}% ({}/{}) | avg: {:.0}/s | now: {:.0}/s | elapsed: {}",
                percentage,
                format_number(completed),
                format_number(total),
                avg,
                current,
                format_duration(stats.elapsed())
            );
            let _ = std::io::stdout().flush();
        }
    });

    Reporter { running, handle }
}
