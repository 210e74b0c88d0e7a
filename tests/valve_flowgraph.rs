use std::thread;
use std::time::Duration;

use rustfft::num_complex::Complex;

use rust_gnss_acq::{AcqError, SampleBuffer};
use rust_gnss_acq::block::{BlockFunctionality, BlockResult, TopBlock, Valve};
use rust_gnss_acq::block::block_tree_sync_static::Series;
use rust_gnss_acq::block::flowgraph::StopReason;
use rust_gnss_acq::channel::{event_queue, ChannelEvent, GnssSynchro, PopError};
use rust_gnss_acq::config::InMemoryConfiguration;
use rust_gnss_acq::gnss::common::acquisition::Acquisition;

// Swallows everything and keeps count
#[derive(Default)]
struct NullSink { received:usize }

impl BlockFunctionality<(), usize, SampleBuffer, ()> for NullSink {
	fn control(&mut self, _:&()) -> Result<usize, AcqError> { Ok(self.received) }
	fn apply(&mut self, input:&SampleBuffer) -> BlockResult<()> {
		self.received += input.len();
		BlockResult::NotReady
	}
}

fn constant(n:usize) -> impl Iterator<Item=Complex<f64>> + Send { (0..n).map(|_| Complex{ re: 1.0, im: 0.0 }) }

#[test]
fn valve_closes_after_item_count() {
	let (tx, mut rx) = event_queue();
	let valve:Valve<Complex<f64>> = Valve::new(100, Some(tx));
	let mut top = TopBlock::new("valve", Series::new(valve, NullSink::default())).with_buffer_size(64);

	let report = top.run(constant(1000));
	assert_eq!(report.reason, StopReason::BlockDone);
	assert_eq!(top.block().right().received, 100);
	assert_eq!(top.block().left().status().forwarded, 100);
	assert!(top.block().left().status().closed);

	drop(top);
	let mut events = vec![];
	while let Some(event) = rx.try_pop() { events.push(event); }
	assert_eq!(events, vec![ChannelEvent::ValveClosed]);
}

#[tokio::test(flavor = "multi_thread")]
async fn valve_starves_acquisition() {
	let mut cfg = InMemoryConfiguration::new();
	cfg.set_property("GNSS-SDR.internal_fs_hz", "2048000");
	cfg.set_property("Acquisition.implementation", "GPS_L1_CA_PCPS_Acquisition");
	cfg.set_property("Acquisition.sampled_ms", "1");
	cfg.set_property("Acquisition.threshold", "10");
	cfg.set_property("Acquisition.doppler_max", "5000");
	cfg.set_property("Acquisition.doppler_step", "500");

	let (tx, rx) = event_queue();
	let mut acq = Acquisition::from_configuration(&cfg, "Acquisition", 0).unwrap();
	acq.set_gnss_synchro(GnssSynchro::new(0, 'G', "1C", 1));
	acq.set_channel_queue(tx.clone());
	acq.init().unwrap();
	acq.reset();

	// The valve shuts before one 2048-sample integration buffer is complete
	let valve:Valve<Complex<f64>> = Valve::new(1500, Some(tx));
	let top = TopBlock::new("starved", Series::new(valve, acq)).with_buffer_size(500);

	let controller = thread::spawn(move || {
		let mut rx = rx;
		let mut events = vec![];
		loop {
			match rx.pop_timeout(Duration::from_secs(30)) {
				Ok(event) => events.push(event),
				Err(e) => {
					assert_eq!(e, PopError::Closed);
					break;
				}
			}
		}
		events
	});

	let (top, report) = top.start(constant(10000)).await.unwrap();
	assert_eq!(report.reason, StopReason::BlockDone);
	assert!(report.outputs.is_empty());
	assert!(!top.block().right().is_armed());
	drop(top);

	let events = controller.join().unwrap();
	assert_eq!(events, vec![ChannelEvent::ValveClosed, ChannelEvent::StreamExhausted]);
}

#[test]
fn events_from_two_producers_arrive_in_push_order() {
	let (tx, mut rx) = event_queue();
	let first = tx.clone();
	let second = tx;

	let a = thread::spawn(move || {
		for _ in 0..50 { first.push(ChannelEvent::AcqFail); }
	});
	let b = thread::spawn(move || {
		for _ in 0..50 { second.push(ChannelEvent::ValveClosed); }
	});
	a.join().unwrap();
	b.join().unwrap();

	let mut events = vec![];
	while let Some(event) = rx.blocking_pop() { events.push(event); }
	assert_eq!(events.len(), 100);
	assert_eq!(events.iter().filter(|e| e.code() == 2).count(), 50);
	assert_eq!(events.iter().filter(|e| e.code() == 0).count(), 50);
	assert!(rx.try_pop().is_none());
}
