//! Relay outputs on Raspberry Pi GPIO.

use rppal::gpio::{Gpio, OutputPin};
use tank_traits::{Actuator, BoxError, Channel};

use crate::error::HwError;

/// Active-high relays. A channel without a pin reports an error on write.
pub struct GpioRelays {
    heater: Option<OutputPin>,
    chiller: Option<OutputPin>,
    dose: Option<OutputPin>,
}

impl GpioRelays {
    pub fn new(
        heater_pin: Option<u8>,
        chiller_pin: Option<u8>,
        dose_pin: Option<u8>,
    ) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let output = |pin: Option<u8>| -> Result<Option<OutputPin>, HwError> {
            pin.map(|p| {
                gpio.get(p)
                    .map(|pin| pin.into_output_low())
                    .map_err(|e| HwError::Gpio(format!("pin {p}: {e}")))
            })
            .transpose()
        };
        Ok(Self {
            heater: output(heater_pin)?,
            chiller: output(chiller_pin)?,
            dose: output(dose_pin)?,
        })
    }
}

impl Actuator for GpioRelays {
    fn set_drive(&mut self, channel: Channel, on: bool) -> Result<(), BoxError> {
        let pin = match channel {
            Channel::Heater => self.heater.as_mut(),
            Channel::Chiller => self.chiller.as_mut(),
            Channel::Dose => self.dose.as_mut(),
        };
        let Some(pin) = pin else {
            return Err(Box::new(HwError::Gpio(format!(
                "{} relay not wired",
                channel.as_str()
            ))));
        };
        if on {
            pin.set_high();
        } else {
            pin.set_low();
        }
        tracing::debug!(channel = channel.as_str(), on, "gpio relay");
        Ok(())
    }
}
