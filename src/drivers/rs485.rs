//! RS485 inverter link driver.
//!
//! Half-duplex transceiver on UART1 at 4800 baud 8N1.  The driver-enable
//! pin is raised for exactly one frame: DE high, write 8 bytes, wait for
//! the shift register to drain, DE low.  Dropping DE before the last stop
//! bit leaves the inverter with a truncated frame.
//!
//! The DE pin is any [`embedded_hal::digital::OutputPin`], so host tests
//! can observe its transitions.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::app::ports::SerialPort;
use crate::error::LinkError;
use crate::link::CommandFrame;

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::{
    delay::TickType,
    gpio::AnyIOPin,
    uart::{self, UartDriver, UART1},
    units::Hertz,
};

/// Upper bound on waiting for the TX FIFO to empty.  A frame takes
/// about 17 ms at 4800 baud.
#[cfg(target_os = "espidf")]
const TX_DONE_TIMEOUT_MS: u64 = 100;

pub struct Rs485Driver<De: OutputPin> {
    de: De,
    #[cfg(target_os = "espidf")]
    uart: UartDriver<'static>,
    /// Simulation: every frame put on the wire.
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<CommandFrame>,
}

#[cfg(target_os = "espidf")]
impl<De: OutputPin> Rs485Driver<De> {
    /// Open UART1 on the board's RS485 pins at `baud`, 8N1.
    pub fn open(uart1: UART1, baud: u32, mut de: De) -> Result<Self, LinkError> {
        de.set_low().map_err(|_| LinkError::DriverEnable)?;

        // SAFETY: the RS485 GPIOs are reserved for this driver in `pins`
        // and not handed out through `Peripherals` anywhere else.
        let (tx, rx) = unsafe {
            (
                AnyIOPin::new(crate::pins::RS485_TX_GPIO),
                AnyIOPin::new(crate::pins::RS485_RX_GPIO),
            )
        };
        let config = uart::config::Config::new().baudrate(Hertz(baud));
        let uart = UartDriver::new(
            uart1,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )
        .map_err(|e| {
            log::error!("RS485: UART init failed: {}", e);
            LinkError::WriteFailed
        })?;

        info!(
            "RS485: UART{} at {} baud 8N1 (TX={}, RX={}, DE={})",
            crate::pins::RS485_UART_NUM,
            baud,
            crate::pins::RS485_TX_GPIO,
            crate::pins::RS485_RX_GPIO,
            crate::pins::RS485_DE_GPIO
        );
        Ok(Self { de, uart })
    }

    fn platform_write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let written = self.uart.write(bytes).map_err(|_| LinkError::WriteFailed)?;
        if written != bytes.len() {
            return Err(LinkError::ShortWrite { written });
        }
        self.uart
            .wait_tx_done(TickType::new_millis(TX_DONE_TIMEOUT_MS).ticks())
            .map_err(|_| LinkError::TxTimeout)
    }
}

#[cfg(not(target_os = "espidf"))]
impl<De: OutputPin> Rs485Driver<De> {
    /// Simulation driver that records frames instead of transmitting.
    pub fn new(mut de: De) -> Result<Self, LinkError> {
        de.set_low().map_err(|_| LinkError::DriverEnable)?;
        info!("RS485(sim): recording frames");
        Ok(Self { de, sent: Vec::new() })
    }

    pub fn sent(&self) -> &[CommandFrame] {
        &self.sent
    }

    fn platform_write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let frame: &[u8; crate::link::FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| LinkError::ShortWrite { written: bytes.len() })?;
        let demand = crate::link::frame::decode(frame).map_err(|_| LinkError::WriteFailed)?;
        self.sent.push(crate::link::frame::encode(demand));
        Ok(())
    }
}

impl<De: OutputPin> SerialPort for Rs485Driver<De> {
    fn write_frame(&mut self, frame: &CommandFrame) -> Result<(), LinkError> {
        self.de.set_high().map_err(|_| LinkError::DriverEnable)?;
        let result = self.platform_write(frame.as_bytes());
        // Release the bus even when the write failed.
        let release = self.de.set_low().map_err(|_| LinkError::DriverEnable);
        result.and(release)
    }
}
