extern crate clap;
extern crate colored;
extern crate rust_gnss_acq;
extern crate serde_json;

use std::error::Error;
use std::sync::Arc;

use clap::{Arg, App, ArgMatches};
use colored::*;
use rust_gnss_acq::{AcqError, SampleBuffer};
use rust_gnss_acq::block::{BlockFunctionality, StopHandle, TopBlock, Valve};
use rust_gnss_acq::block::block_tree_sync_static::{Series, SplitAndMerge};
use rust_gnss_acq::block::flowgraph::RunReport;
use rust_gnss_acq::channel::{event_queue, ChannelEvent, GnssSynchro};
use rust_gnss_acq::config::{self, AcquisitionConfig, InMemoryConfiguration};
use rust_gnss_acq::gnss::common::acquisition::{Acquisition, AcquisitionResult};
use rust_gnss_acq::gnss::common::replica::{GnssSystem, Signal};
use rust_gnss_acq::gnss::galileo_e1::memory_codes::MemoryCodeBook;
use rust_gnss_acq::io::SampleFileSource;
use rustfft::num_complex::Complex;
use tracing_subscriber::EnvFilter;

const ROLE:&str = "Acquisition";

fn parse_arg<T: std::str::FromStr>(matches:&ArgMatches, name:&str) -> Result<Option<T>, AcqError> {
	match matches.value_of(name) {
		Some(s) => s.parse().map(Some).map_err(|_| AcqError::InvalidProperty{ key: name.to_string(), value: s.to_string() }),
		None    => Ok(None),
	}
}

// Command line options win over the JSON file
fn build_configuration(matches:&ArgMatches) -> Result<InMemoryConfiguration, Box<dyn Error>> {
	let mut cfg = match matches.value_of("config") {
		Some(path) => InMemoryConfiguration::from_json_reader(std::fs::File::open(path)?)?,
		None       => InMemoryConfiguration::new(),
	};

	let overrides = [
		("sample_rate_sps", config::FS_KEY.to_string()),
		("threshold",       format!("{}.threshold", ROLE)),
		("sampled_ms",      format!("{}.sampled_ms", ROLE)),
		("doppler_max",     format!("{}.doppler_max", ROLE)),
		("doppler_step",    format!("{}.doppler_step", ROLE)),
		("item_type",       format!("{}.item_type", ROLE)),
		("implementation",  format!("{}.implementation", ROLE)),
		("codes",           format!("{}.codes_file", ROLE)),
	];
	for (arg, key) in overrides.iter() {
		if let Some(value) = matches.value_of(arg) { cfg.set_property(key, value); }
	}
	if matches.is_present("cboc")   { cfg.set_property(&format!("{}.cboc", ROLE), "true"); }
	if matches.is_present("repeat") { cfg.set_property(&format!("{}.repeat_satellite", ROLE), "true"); }

	Ok(cfg)
}

fn print_result(result:&AcquisitionResult) {
	let result_str = format!("{:9.2} [Hz], {:6} [samples], {:10.2} (x{:.1} over next peak), attempt {}", result.doppler_hz, result.code_phase,
		result.test_statistic, result.peak_ratio(), result.attempt);
	let sat_str = format!("ch {:02} {}{} PRN {:02}", result.channel_id, result.system, result.signal, result.prn);
	if result.detected { eprintln!("{} {}", sat_str, result_str.green()); }
	else               { eprintln!("{} {}", sat_str, result_str.yellow()); }
}

async fn run_flowgraph<C, D, B>(block:B, source:SampleFileSource<std::fs::File>, stops:Vec<StopHandle>) -> Result<RunReport<AcquisitionResult>, Box<dyn Error>>
	where B: BlockFunctionality<C, D, SampleBuffer, AcquisitionResult> + Send + 'static, C: Send + 'static, D: Send + 'static {

	let top = TopBlock::new("acquisition", block);

	let mut all_stops = stops;
	all_stops.push(top.stop_handle());
	if let Err(e) = ctrlc::set_handler(move || {
		for stop in all_stops.iter() { stop.request_stop(); }
	}) {
		tracing::warn!(error = %e, "Unable to install Ctrl-C handler");
	}

	// The top block owns every event sender, so dropping it here lets the controller finish
	let (_top, report) = top.start(source).await?;
	Ok(report)
}

async fn run(matches:ArgMatches<'static>) -> Result<(), Box<dyn Error>> {
	let cfg = build_configuration(&matches)?;

	let system:char = parse_arg(&matches, "system")?.unwrap_or('E');
	let signal_str:&str = matches.value_of("signal").unwrap_or("1C");
	let signal = Signal::from_parts(system, signal_str)?;
	let first_channel:usize = parse_arg(&matches, "channel")?.unwrap_or(0);
	let max_samples:Option<u64> = parse_arg(&matches, "max_samples")?;

	let acq_config = AcquisitionConfig::from_configuration(&cfg, ROLE, first_channel)?;

	let code_book:Option<Arc<MemoryCodeBook>> = match (signal.system(), &acq_config.codes_file) {
		(GnssSystem::Galileo, Some(path)) => Some(Arc::new(MemoryCodeBook::from_file(signal, path)?)),
		(GnssSystem::Galileo, None)       => return Err(AcqError::MissingCodeBook(signal.name().to_string()).into()),
		(GnssSystem::Gps, _)              => None,
	};

	let prns:Vec<u32> = match parse_arg(&matches, "prn")? {
		Some(prn) => vec![prn],
		None => match &code_book {
			Some(book) => (1..=(book.len() as u32)).collect(),
			None       => signal.prn_range().collect(),
		}
	};

	eprintln!("Searching {} PRN {:?} in {} at {} [samples/sec], threshold {}", signal, prns,
		matches.value_of("filename").unwrap_or(""), acq_config.fs_in, acq_config.threshold);

	let (tx, mut rx) = event_queue();

	let mut stops:Vec<StopHandle> = vec![];
	let mut acqs:Vec<Acquisition> = vec![];
	for (idx, prn) in prns.iter().enumerate() {
		let channel = first_channel + idx;
		let mut acq = Acquisition::from_configuration(&cfg, ROLE, channel)?;
		acq.set_gnss_synchro(GnssSynchro::new(channel, system, signal_str, *prn));
		acq.set_channel_queue(tx.clone());
		if let Some(book) = &code_book { acq.set_code_book(book.clone()); }
		acq.init()?;
		acq.reset();
		stops.push(acq.stop_handle());
		acqs.push(acq);
	}

	let controller = tokio::task::spawn_blocking(move || {
		let mut events:Vec<ChannelEvent> = vec![];
		while let Some(event) = rx.blocking_pop() {
			match &event {
				ChannelEvent::AcqSuccess(s) => eprintln!("{}", format!("ACQ SUCCESS ch {:02} PRN {:02}: {:.2} [Hz], {} [samples] at sample {}",
					s.channel_id, s.prn, s.acq_doppler_hz, s.acq_delay_samples, s.acq_samplestamp_samples).green()),
				ChannelEvent::AcqFail         => eprintln!("{}", "ACQ FAIL".yellow()),
				ChannelEvent::StreamExhausted => eprintln!("{}", "STREAM EXHAUSTED".yellow()),
				ChannelEvent::ValveClosed     => eprintln!("Valve closed"),
			}
			events.push(event);
		}
		events
	});

	let filename = matches.value_of("filename").ok_or_else(|| AcqError::MissingProperty("filename".to_string()))?;
	let source = SampleFileSource::from_file(filename, acq_config.item_type)?;
	let channels = SplitAndMerge::from_iter(acqs.into_iter());

	let report = match max_samples {
		Some(max) => {
			let valve:Valve<Complex<f64>> = Valve::new(max, Some(tx));
			run_flowgraph(Series::new(valve, channels), source, stops).await?
		},
		None => {
			drop(tx);
			run_flowgraph(channels, source, stops).await?
		}
	};

	for result in report.outputs.iter() { print_result(result); }
	let events = controller.await?;
	let n_success = events.iter().filter(|e| e.is_success()).count();
	eprintln!("{} samples, {} results, {} satellites acquired, stopped by {:?}", report.samples, report.outputs.len(), n_success, report.reason);

	// Output data in JSON format
	println!("{}", serde_json::to_string_pretty(&report.outputs)?);

	Ok(())
}

#[tokio::main]
async fn main() {

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rust_gnss_acq=info")))
		.with_writer(std::io::stderr)
		.init();

	let matches = App::new("GNSS Acquisition")
		.version("0.1.0")
		.about("Takes IQ samples from a capture file and searches for GPS L1 C/A or Galileo E1 satellites")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.required(true).takes_value(true))
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("JSON file with flat GNSS-SDR style properties")
			.takes_value(true))
		.arg(Arg::with_name("system")
			.long("system")
			.takes_value(true)
			.possible_values(&["G", "E"]))
		.arg(Arg::with_name("signal")
			.long("signal")
			.takes_value(true)
			.possible_values(&["1C", "1B"]))
		.arg(Arg::with_name("prn")
			.short("p").long("prn")
			.help("Satellite to search for; every PRN if omitted")
			.takes_value(true))
		.arg(Arg::with_name("channel")
			.long("channel")
			.takes_value(true))
		.arg(Arg::with_name("sample_rate_sps")
			.short("s").long("sample_rate_sps")
			.takes_value(true))
		.arg(Arg::with_name("threshold")
			.short("t").long("threshold")
			.takes_value(true))
		.arg(Arg::with_name("sampled_ms")
			.long("sampled_ms")
			.takes_value(true))
		.arg(Arg::with_name("doppler_max")
			.long("doppler_max")
			.takes_value(true))
		.arg(Arg::with_name("doppler_step")
			.long("doppler_step")
			.takes_value(true))
		.arg(Arg::with_name("item_type")
			.long("item_type")
			.takes_value(true)
			.possible_values(&["gr_complex", "cshort", "ishort", "cbyte", "ibyte"]))
		.arg(Arg::with_name("implementation")
			.long("implementation")
			.takes_value(true)
			.possible_values(&["Galileo_E1_PCPS_Ambiguous_Acquisition", "GPS_L1_CA_PCPS_Acquisition"]))
		.arg(Arg::with_name("codes")
			.long("codes")
			.help("Galileo E1 memory codes as ICD hex, one PRN per line")
			.takes_value(true))
		.arg(Arg::with_name("cboc")
			.long("cboc")
			.help("Resolve the E1B/E1C sub-carrier ambiguity with both CBOC replicas"))
		.arg(Arg::with_name("repeat")
			.long("repeat")
			.help("Keep searching new buffers after a failed attempt"))
		.arg(Arg::with_name("max_samples")
			.short("m").long("max_samples")
			.help("Close the input valve after this many samples")
			.takes_value(true))
		.get_matches();

	if let Err(e) = run(matches).await {
		eprintln!("{}", format!("Error: {}", e).red());
		std::process::exit(1);
	}

}
