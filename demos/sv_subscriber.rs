//! SV subscriber demo.
//!
//! Subscribes to APPID 0x4000 on the interface given as first argument
//! (default `eth0`), prints svID and smpCnt of every ASDU and appends the
//! INT32 at data offset 32 to `vol1.csv`. Stops on Ctrl-C.
//!
//! ```text
//! sudo cargo run --example sv_subscriber -- enp3s0
//! ```

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voltage_sv::listener::DEFAULT_FORWARD_CAPACITY;
use voltage_sv::receiver::DEFAULT_INTERFACE;
use voltage_sv::{forwarding_channel, Receiver, ReceiverConfig, SampledValue, Subscriber};

const APP_ID: u16 = 0x4000;
const REPORT_PATH: &str = "vol1.csv";
const VOL1_OFFSET: usize = 32;

fn report(file: &mut File, sample: &SampledValue) -> std::io::Result<()> {
    let asdu = &sample.asdu;
    println!("svUpdateListener called");
    if let Some(sv_id) = &asdu.sv_id {
        println!("  svID=({sv_id})");
    }
    println!("  smpCnt: {}", asdu.smp_cnt);

    if asdu.data.len() >= 8 {
        match asdu.data().read_i32(VOL1_OFFSET) {
            Ok(vol1) => {
                println!("   vol1: {vol1}");
                writeln!(file, "{vol1}")?;
            }
            Err(e) => warn!(smp_cnt = asdu.smp_cnt, error = %e, "Data set too short for vol1"),
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let interface = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_INTERFACE.to_owned());
    info!(interface = %interface, "Using interface");

    File::create(REPORT_PATH)?;
    let mut vol1_report = OpenOptions::new().append(true).open(REPORT_PATH)?;

    let (listener, mut samples) = forwarding_channel(DEFAULT_FORWARD_CAPACITY);
    let mut receiver = Receiver::with_config(ReceiverConfig::new(interface));
    receiver.add_subscriber(Subscriber::new(APP_ID, listener.clone()));

    if let Err(e) = receiver.start() {
        eprintln!(
            "Failed to start SV subscriber ({e}). Reason can be that the Ethernet interface \
             doesn't exist or root permission are required."
        );
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut health = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            sample = samples.recv() => match sample {
                Some(sample) => report(&mut vol1_report, &sample)?,
                None => break,
            },
            _ = &mut ctrl_c => break,
            _ = health.tick() => {}
        }
        if !receiver.is_running() {
            if let Some(e) = receiver.last_error() {
                warn!(error = %e, "Capture ended");
            }
            break;
        }
    }

    receiver.stop();
    info!(
        stats = ?receiver.stats(),
        dropped = listener.dropped(),
        "SV subscriber stopped"
    );
    Ok(())
}
