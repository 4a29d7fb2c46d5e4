//! Subcommand implementations.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gpio_proxy_client::sim::{SimDaemon, SimServer};
use gpio_proxy_client::{ClientResult, PinManager, ProxyClient, ProxyConfig, Transport};
use gpio_proxy_drivers::{Hd44780, Hd44780Pins, Led};
use tracing::{info, warn};

use crate::cli::OWNER;
use crate::error::{CliError, CliResult};
use crate::output::Report;

pub fn connect(config: &ProxyConfig) -> CliResult<PinManager> {
    let client = ProxyClient::connect(config)?;
    info!(peer = client.peer(), timeout = ?client.timeout(), "connected");
    Ok(PinManager::new(client))
}

/// Read `pin`, first making it an input if `input` is set.
pub fn get<T: Transport>(pins: &PinManager<T>, pin: u32, input: bool) -> CliResult<Report> {
    pins.acquire(pin, OWNER)?;
    let value = if input {
        pins.configure_input(pin).and_then(|()| pins.get(pin))
    } else {
        pins.get(pin)
    };
    let value = finish(pins, pin, value)?;
    Ok(Report::Get { pin, value })
}

pub fn set<T: Transport>(pins: &PinManager<T>, pin: u32, value: u8) -> CliResult<Report> {
    pins.acquire(pin, OWNER)?;
    let result = pins
        .configure_output(pin, value)
        .and_then(|()| pins.set(pin, value));
    finish(pins, pin, result)?;
    Ok(Report::Set { pin, value })
}

/// Release `pin` after an operation. The operation's error wins over a
/// release error, which is then only logged.
fn finish<T: Transport, V>(pins: &PinManager<T>, pin: u32, result: ClientResult<V>) -> CliResult<V> {
    let released = pins.release(pin);
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), released) => {
            if let Err(release_err) = released {
                warn!(pin, error = %release_err, "failed to release pin after error");
            }
            Err(e.into())
        }
    }
}

pub fn probe<T: Transport>(pins: &PinManager<T>, first: u32, last: u32) -> CliResult<Report> {
    if first > last {
        return Err(CliError::PinRange { first, last });
    }
    let available = pins.probe(first..=last, OWNER)?;
    Ok(Report::Probe {
        first,
        last,
        available,
    })
}

/// Flash `pin`. Zero cycles means until `stop` is set; otherwise `stop`
/// ends the run early.
pub fn blink<T: Transport>(
    pins: &PinManager<T>,
    pin: u32,
    cycles: u32,
    interval: Duration,
    stop: &AtomicBool,
) -> CliResult<Report> {
    let mut led = Led::attach(pins, pin, OWNER)?;
    let done = if cycles == 0 {
        led.blink_until(interval, stop)
    } else {
        let mut done = 0;
        let mut result = Ok(());
        while done < u64::from(cycles) && !stop.load(Ordering::Relaxed) {
            result = led.blink(1, interval);
            if result.is_err() {
                break;
            }
            done += 1;
        }
        result.map(|()| done)
    };
    let released = led.release();
    let cycles = done?;
    released?;
    Ok(Report::Blink { pin, cycles })
}

pub fn lcd<T: Transport>(pins: &PinManager<T>, text: &str, layout: Option<&Path>) -> CliResult<Report> {
    let layout = match layout {
        Some(path) => load_layout(path)?,
        None => Hd44780Pins::default(),
    };
    let mut display = Hd44780::attach(pins, layout)?;
    let result = display.init().and_then(|()| {
        for (row, line) in text.lines().enumerate() {
            if row > 0 {
                display.set_cursor(row as u8, 0)?;
            }
            display.write_str(line)?;
        }
        Ok(())
    });
    let released = display.release();
    result?;
    released?;
    Ok(Report::Lcd {
        text: text.to_string(),
    })
}

pub fn sim(bind: std::net::SocketAddr, pin_count: usize, stop: &AtomicBool) -> CliResult<Report> {
    let server = SimServer::bind(bind, SimDaemon::new(pin_count))?;
    let bound = server.local_addr()?;
    info!(addr = %bound, pins = pin_count, "simulated daemon listening");
    server.run(stop)?;
    let handled = server.daemon().lock().handled();
    Ok(Report::Sim {
        bind: bound.to_string(),
        handled,
    })
}

fn load_layout(path: &Path) -> CliResult<Hd44780Pins> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadLayout {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&text)?)
}
