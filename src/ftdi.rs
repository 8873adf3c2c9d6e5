//! FTDI D2XX transport for the K-line.
//!
//! Uses the D2XX drivers directly instead of the VCP serial layer: the
//! wake-up procedures need bit-bang control of the TX pin, and the 1 ms
//! latency timer keeps short responses from sitting in the USB buffer.

use std::thread;
use std::time::{Duration, Instant};

use libftd2xx::{BitMode, Ftdi, FtdiCommon};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::transport::{DataBits, Parity, StopBits, Transport};

/// Interval between queue polls while waiting for response bytes.
const READ_POLL: Duration = Duration::from_millis(1);

/// Attached FTDI device, for the startup scan.
#[derive(Debug, Clone)]
pub struct FtdiDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub description: String,
    pub serial_number: String,
}

/// List all attached FTDI devices.
pub fn list_devices() -> Result<Vec<FtdiDevice>, TransportError> {
    let devices = libftd2xx::list_devices().map_err(open_err)?;

    Ok(devices
        .into_iter()
        .map(|info| FtdiDevice {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            description: info.description,
            serial_number: info.serial_number,
        })
        .collect())
}

/// Exclusive handle on one FTDI adapter.
pub struct FtdiTransport {
    device: Ftdi,
    open: bool,
}

impl FtdiTransport {
    /// Open the first attached device matching `vendor_id:product_id`.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, TransportError> {
        let devices = libftd2xx::list_devices().map_err(open_err)?;
        let index = devices
            .iter()
            .position(|d| d.vendor_id == vendor_id && d.product_id == product_id)
            .ok_or_else(|| {
                TransportError::Open(format!(
                    "no FTDI device {vendor_id:04X}:{product_id:04X} attached"
                ))
            })?;

        info!(
            "Opening FTDI device {:04X}:{:04X} (index {})...",
            vendor_id, product_id, index
        );

        let mut device = Ftdi::with_index(index as i32).map_err(open_err)?;
        device.reset().map_err(open_err)?;
        device
            .set_timeouts(Duration::from_millis(1000), Duration::from_millis(1000))
            .map_err(open_err)?;
        device.purge_all().map_err(open_err)?;

        info!("FTDI device opened");
        Ok(Self { device, open: true })
    }
}

impl Transport for FtdiTransport {
    fn configure(
        &mut self,
        baud_rate: u32,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<(), TransportError> {
        debug!("Configuring line: {} baud", baud_rate);

        self.device.set_baud_rate(baud_rate).map_err(cfg_err)?;
        self.device
            .set_data_characteristics(
                match data_bits {
                    DataBits::Seven => libftd2xx::BitsPerWord::Bits7,
                    DataBits::Eight => libftd2xx::BitsPerWord::Bits8,
                },
                match stop_bits {
                    StopBits::One => libftd2xx::StopBits::Bits1,
                    StopBits::Two => libftd2xx::StopBits::Bits2,
                },
                match parity {
                    Parity::None => libftd2xx::Parity::No,
                    Parity::Odd => libftd2xx::Parity::Odd,
                    Parity::Even => libftd2xx::Parity::Even,
                },
            )
            .map_err(cfg_err)?;
        self.device.set_flow_control_none().map_err(cfg_err)?;

        // Minimum latency so a short response surfaces without waiting
        // for a full USB buffer.
        self.device
            .set_latency_timer(Duration::from_millis(1))
            .map_err(cfg_err)?;

        Ok(())
    }

    fn set_manual_line_mode(&mut self, enabled: bool) -> Result<(), TransportError> {
        if enabled {
            // Mask 0x01: TXD is the only output pin.
            self.device
                .set_bit_mode(0x01, BitMode::AsyncBitbang)
                .map_err(io_err)?;
        } else {
            self.device
                .set_bit_mode(0x00, BitMode::Reset)
                .map_err(io_err)?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let written = self.device.write(buf).map_err(io_err)?;
        if written != buf.len() {
            return Err(TransportError::Io(format!(
                "short write: {} of {} bytes",
                written,
                buf.len()
            )));
        }
        Ok(())
    }

    fn read_bytes(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            let queued = self.device.queue_status().map_err(io_err)?;
            if queued > 0 {
                let mut buf = vec![0u8; queued.min(max_len)];
                let read = self.device.read(&mut buf).map_err(io_err)?;
                buf.truncate(read);
                return Ok(buf);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            thread::sleep(READ_POLL);
        }
    }

    fn purge_buffers(&mut self) -> Result<(), TransportError> {
        self.device.purge_all().map_err(io_err)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.open {
            info!("Closing FTDI connection");
            self.device.close().map_err(io_err)?;
            self.open = false;
        }
        Ok(())
    }
}

impl Drop for FtdiTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn open_err<E: std::fmt::Display>(err: E) -> TransportError {
    TransportError::Open(err.to_string())
}

fn cfg_err<E: std::fmt::Display>(err: E) -> TransportError {
    TransportError::Configure(err.to_string())
}

fn io_err<E: std::fmt::Display>(err: E) -> TransportError {
    TransportError::Io(err.to_string())
}
