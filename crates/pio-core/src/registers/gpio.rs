//! `IO_BANK0` hardware registers and the emulator-only `GPIO_EMU` view.

use crate::error::AccessError;
use crate::gpio::{Gpio, GPIO_COUNT};
use crate::registers::{
    apply_write, info, unknown, FieldDescriptor, RegisterAccess, RegisterDescriptor,
    RegisterInfo, RegisterSet,
};

/// Number of `IO_BANK0` word slots (`STATUS` and `CTRL` per pin).
pub const IO_BANK0_REGISTER_COUNT: usize = 2 * GPIO_COUNT;

/// Index of `GPIO_EMU` `PINS_IN`.
pub const PINS_IN: usize = 0;
/// Index of `GPIO_EMU` `PAD_IN`.
pub const PAD_IN: usize = 1;
/// Index of `GPIO_EMU` `PAD_OUT`.
pub const PAD_OUT: usize = 2;
/// Index of `GPIO_EMU` `PAD_OE`.
pub const PAD_OE: usize = 3;

const GPIO_STATUS: RegisterDescriptor =
    RegisterDescriptor::new("STATUS", 0, RegisterAccess::ReadOnly).with_fields(&[
        FieldDescriptor::new("IRQTOPROC", 26, 1),
        FieldDescriptor::new("INTOPERI", 19, 1),
        FieldDescriptor::new("INFROMPAD", 17, 1),
        FieldDescriptor::new("OETOPAD", 13, 1),
        FieldDescriptor::new("OEFROMPERI", 12, 1),
        FieldDescriptor::new("OUTTOPAD", 9, 1),
        FieldDescriptor::new("OUTFROMPERI", 8, 1),
    ]);
const GPIO_CTRL: RegisterDescriptor =
    RegisterDescriptor::new("CTRL", 0x1F, RegisterAccess::ReadWrite).with_fields(&[
        FieldDescriptor::new("IRQOVER", 28, 2),
        FieldDescriptor::new("INOVER", 16, 2),
        FieldDescriptor::new("OEOVER", 12, 2),
        FieldDescriptor::new("OUTOVER", 8, 2),
        FieldDescriptor::new("FUNCSEL", 0, 5),
    ]);

/// View of the `IO_BANK0` registers.
#[derive(Debug)]
pub struct IoBank0Registers<'a> {
    gpio: &'a mut Gpio,
}

impl<'a> IoBank0Registers<'a> {
    /// Creates the view.
    pub const fn new(gpio: &'a mut Gpio) -> Self {
        Self { gpio }
    }
}

impl RegisterSet for IoBank0Registers<'_> {
    fn set_label(&self) -> &'static str {
        "IO_BANK0"
    }

    fn describe(&self, index: usize) -> Option<RegisterInfo> {
        if index >= IO_BANK0_REGISTER_COUNT {
            return None;
        }
        let descriptor = if index % 2 == 0 { &GPIO_STATUS } else { &GPIO_CTRL };
        Some(info(
            self.set_label(),
            &format!("GPIO{}_", index / 2),
            descriptor,
            None,
        ))
    }

    fn read_register(&mut self, index: usize) -> Result<u32, AccessError> {
        if index >= IO_BANK0_REGISTER_COUNT {
            return Err(unknown(self.set_label(), index));
        }
        let pin = index / 2;
        Ok(if index % 2 == 0 {
            self.gpio.status(pin)
        } else {
            self.gpio.terminal(pin).ctrl()
        })
    }

    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        if index >= IO_BANK0_REGISTER_COUNT {
            return Err(unknown(self.set_label(), index));
        }
        if index % 2 == 1 {
            let terminal = self.gpio.terminal_mut(index / 2);
            let value = apply_write(terminal.ctrl(), bits, mask, xor);
            terminal.set_ctrl(value);
        }
        Ok(())
    }
}

static GPIO_EMU_REGISTERS: [RegisterDescriptor; 4] = [
    RegisterDescriptor::new("PINS_IN", 0, RegisterAccess::ReadWrite),
    RegisterDescriptor::new("PAD_IN", 0, RegisterAccess::ReadOnly),
    RegisterDescriptor::new("PAD_OUT", 0, RegisterAccess::ReadOnly),
    RegisterDescriptor::new("PAD_OE", 0, RegisterAccess::ReadOnly),
];

/// View of the emulator-only pin registers: external inputs plus pad levels.
#[derive(Debug)]
pub struct GpioEmuRegisters<'a> {
    gpio: &'a mut Gpio,
}

impl<'a> GpioEmuRegisters<'a> {
    /// Creates the view.
    pub const fn new(gpio: &'a mut Gpio) -> Self {
        Self { gpio }
    }
}

impl RegisterSet for GpioEmuRegisters<'_> {
    fn set_label(&self) -> &'static str {
        "GPIO_EMU"
    }

    fn describe(&self, index: usize) -> Option<RegisterInfo> {
        let descriptor = GPIO_EMU_REGISTERS.get(index)?;
        Some(info(self.set_label(), "", descriptor, None))
    }

    fn read_register(&mut self, index: usize) -> Result<u32, AccessError> {
        match index {
            PINS_IN => Ok(self.gpio.external_inputs()),
            PAD_IN => Ok(self.gpio.pad_in_mask()),
            PAD_OUT => Ok(self.gpio.pad_out_mask()),
            PAD_OE => Ok(self.gpio.pad_oe_mask()),
            _ => Err(unknown(self.set_label(), index)),
        }
    }

    fn write_register(
        &mut self,
        index: usize,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), AccessError> {
        match index {
            PINS_IN => {
                let value = apply_write(self.gpio.external_inputs(), bits, mask, xor);
                self.gpio.set_external_inputs(value);
                Ok(())
            }
            PAD_IN | PAD_OUT | PAD_OE => Ok(()),
            _ => Err(unknown(self.set_label(), index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GpioEmuRegisters, IoBank0Registers, IO_BANK0_REGISTER_COUNT, PAD_IN, PINS_IN};
    use crate::bit::{Bit, Direction};
    use crate::gpio::{Function, Gpio};
    use crate::registers::RegisterSet;

    #[test]
    fn io_bank0_reset_values_match_descriptors() {
        let mut gpio = Gpio::new();
        let mut regs = IoBank0Registers::new(&mut gpio);
        for index in 0..IO_BANK0_REGISTER_COUNT {
            let info = regs.describe(index).expect("described");
            assert_eq!(regs.read_register(index), Ok(info.descriptor.reset), "{}", info.label);
        }
        assert_eq!(regs.register_label(7).as_deref(), Some("IO_BANK0_GPIO3_CTRL"));
    }

    #[test]
    fn ctrl_write_selects_function() {
        let mut gpio = Gpio::new();
        let mut regs = IoBank0Registers::new(&mut gpio);
        regs.write_register(2 * 5 + 1, Function::Pio1.value(), 0x1F, false)
            .expect("writable");
        assert_eq!(gpio.terminal(5).function, Function::Pio1);
    }

    #[test]
    fn external_inputs_loop_into_pad_in() {
        let mut gpio = Gpio::new();
        let mut regs = GpioEmuRegisters::new(&mut gpio);
        regs.write_register(PINS_IN, 0b101, u32::MAX, false)
            .expect("writable");
        assert_eq!(regs.read_register(PAD_IN), Ok(0b101));
        assert_eq!(regs.register_label(PINS_IN).as_deref(), Some("GPIO_EMU_PINS_IN"));
    }

    #[test]
    fn pad_in_follows_driven_output() {
        let mut gpio = Gpio::new();
        gpio.set_function(2, Function::Pio0);
        gpio.set_pio_pin_direction(0, 2, Direction::Out);
        gpio.set_pio_pin_level(0, 2, Bit::High);
        let mut regs = GpioEmuRegisters::new(&mut gpio);
        assert_eq!(regs.read_register(PAD_IN), Ok(0b100));
        assert_eq!(regs.read_register(super::PAD_OE), Ok(0b100));
    }
}
